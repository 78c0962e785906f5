//! Record store interface: the orchestrator's view of persistence.
//!
//! Three collections (chats, files, messages) with equality/sort/limit
//! queries — no joins; the engine composes results itself. `MemoryStore`
//! is the reference implementation, sufficient for embedding and tests; a
//! database-backed store plugs in behind the same trait.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{Chat, StoredFile, StoredMessage};

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_chat(&self, chat: Chat) -> Result<()>;
    async fn chat(&self, chat_id: Uuid) -> Result<Option<Chat>>;
    /// Chats of one owner, most recently updated first.
    async fn chats_for_owner(&self, owner_id: Uuid, limit: usize) -> Result<Vec<Chat>>;
    async fn set_chat_title(&self, chat_id: Uuid, title: &str) -> Result<()>;
    async fn touch_chat(&self, chat_id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn delete_chat(&self, chat_id: Uuid) -> Result<()>;

    async fn insert_file(&self, file: StoredFile) -> Result<()>;
    async fn file(&self, file_id: Uuid) -> Result<Option<StoredFile>>;
    /// Files of one chat in insertion order, capped.
    async fn files_for_chat(&self, chat_id: Uuid, limit: usize) -> Result<Vec<StoredFile>>;
    /// Remove every file record of a chat, returning the removed records so
    /// the caller can clean up backing bytes.
    async fn delete_files_for_chat(&self, chat_id: Uuid) -> Result<Vec<StoredFile>>;

    async fn insert_message(&self, message: StoredMessage) -> Result<()>;
    /// Trailing messages of a chat, newest first, capped.
    async fn recent_messages(&self, chat_id: Uuid, limit: usize) -> Result<Vec<StoredMessage>>;
    async fn count_messages(&self, chat_id: Uuid) -> Result<usize>;
    async fn delete_messages_for_chat(&self, chat_id: Uuid) -> Result<()>;
}

/// In-memory store. Insertion order is preserved per collection, which is
/// what gives the transcript and "recent files" queries their ordering.
#[derive(Default)]
pub struct MemoryStore {
    chats: RwLock<Vec<Chat>>,
    files: RwLock<Vec<StoredFile>>,
    messages: RwLock<Vec<StoredMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_chat(&self, chat: Chat) -> Result<()> {
        self.chats.write().push(chat);
        Ok(())
    }

    async fn chat(&self, chat_id: Uuid) -> Result<Option<Chat>> {
        Ok(self.chats.read().iter().find(|c| c.id == chat_id).cloned())
    }

    async fn chats_for_owner(&self, owner_id: Uuid, limit: usize) -> Result<Vec<Chat>> {
        let mut chats: Vec<Chat> = self
            .chats
            .read()
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        chats.truncate(limit);
        Ok(chats)
    }

    async fn set_chat_title(&self, chat_id: Uuid, title: &str) -> Result<()> {
        if let Some(chat) = self.chats.write().iter_mut().find(|c| c.id == chat_id) {
            chat.title = title.to_string();
        }
        Ok(())
    }

    async fn touch_chat(&self, chat_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(chat) = self.chats.write().iter_mut().find(|c| c.id == chat_id) {
            chat.updated_at = at;
        }
        Ok(())
    }

    async fn delete_chat(&self, chat_id: Uuid) -> Result<()> {
        self.chats.write().retain(|c| c.id != chat_id);
        Ok(())
    }

    async fn insert_file(&self, file: StoredFile) -> Result<()> {
        self.files.write().push(file);
        Ok(())
    }

    async fn file(&self, file_id: Uuid) -> Result<Option<StoredFile>> {
        Ok(self.files.read().iter().find(|f| f.id == file_id).cloned())
    }

    async fn files_for_chat(&self, chat_id: Uuid, limit: usize) -> Result<Vec<StoredFile>> {
        Ok(self
            .files
            .read()
            .iter()
            .filter(|f| f.chat_id == chat_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_files_for_chat(&self, chat_id: Uuid) -> Result<Vec<StoredFile>> {
        let mut files = self.files.write();
        let removed: Vec<StoredFile> = files.iter().filter(|f| f.chat_id == chat_id).cloned().collect();
        files.retain(|f| f.chat_id != chat_id);
        Ok(removed)
    }

    async fn insert_message(&self, message: StoredMessage) -> Result<()> {
        self.messages.write().push(message);
        Ok(())
    }

    async fn recent_messages(&self, chat_id: Uuid, limit: usize) -> Result<Vec<StoredMessage>> {
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_messages(&self, chat_id: Uuid) -> Result<usize> {
        Ok(self.messages.read().iter().filter(|m| m.chat_id == chat_id).count())
    }

    async fn delete_messages_for_chat(&self, chat_id: Uuid) -> Result<()> {
        self.messages.write().retain(|m| m.chat_id != chat_id);
        Ok(())
    }
}
