pub mod action;
pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod llm;
pub mod render;
pub mod storage;
pub mod types;
pub mod vault;

// Re-export primary types for convenience
pub use chat::engine::ChatEngine;
pub use config::AppConfig;
pub use error::ChatError;
pub use ledger::{Ledger, MemoryLedger};
pub use llm::{ChatModel, OpenAiCompatClient};
pub use storage::{MemoryStore, RecordStore};
pub use types::{Actor, Chat, DocumentKind, MessageRole, StoredFile, StoredMessage};
pub use vault::FileVault;

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;
