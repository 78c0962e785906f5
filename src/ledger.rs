//! Token ledger: the balance gate for paid operations.
//!
//! `charge` is an atomic check-and-deduct — `false` means insufficient funds
//! and no mutation. `balance` exists so the orchestrator can abort an
//! expensive render *before* any side effect; the deduction itself still
//! goes through `charge` afterwards. Exempt actors never reach the ledger.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, actor_id: Uuid) -> Result<i64>;
    /// Deduct `amount` if the balance covers it. Returns `false` (with no
    /// mutation) on insufficient funds.
    async fn charge(&self, actor_id: Uuid, amount: i64, description: &str) -> Result<bool>;
    async fn credit(&self, actor_id: Uuid, amount: i64, description: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub actor_id: Uuid,
    /// Negative for charges, positive for credits.
    pub amount: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory ledger with an append-only entry log.
#[derive(Default)]
pub struct MemoryLedger {
    balances: RwLock<HashMap<Uuid, i64>>,
    entries: RwLock<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(actor_id: Uuid, balance: i64) -> Self {
        let ledger = Self::new();
        ledger.balances.write().insert(actor_id, balance);
        ledger
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, actor_id: Uuid) -> Result<i64> {
        Ok(*self.balances.read().get(&actor_id).unwrap_or(&0))
    }

    async fn charge(&self, actor_id: Uuid, amount: i64, description: &str) -> Result<bool> {
        let mut balances = self.balances.write();
        let balance = balances.entry(actor_id).or_insert(0);
        if *balance < amount {
            return Ok(false);
        }
        *balance -= amount;
        self.entries.write().push(LedgerEntry {
            actor_id,
            amount: -amount,
            description: description.to_string(),
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn credit(&self, actor_id: Uuid, amount: i64, description: &str) -> Result<()> {
        *self.balances.write().entry(actor_id).or_insert(0) += amount;
        self.entries.write().push(LedgerEntry {
            actor_id,
            amount,
            description: description.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}
