pub mod engine;

use std::path::PathBuf;
use uuid::Uuid;

use crate::types::{Chat, StoredFile, StoredMessage};

/// Outcome of one handled user message: the persisted assistant message,
/// the generated file (if the model requested one), and the tokens actually
/// charged.
#[derive(Debug, Clone)]
pub struct EngineReply {
    pub message: StoredMessage,
    pub generated_file: Option<StoredFile>,
    pub cost: i64,
}

/// Outcome of a file upload: the stored record, the synthetic user message,
/// and a short extraction preview for the UI.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub file: StoredFile,
    pub message_id: Uuid,
    pub preview: String,
}

/// Resolved download: on-disk path, user-facing name, and MIME descriptor.
#[derive(Debug, Clone)]
pub struct DownloadFile {
    pub path: PathBuf,
    pub display_name: String,
    pub content_type: &'static str,
}

/// Outcome of deleting a chat. Paths whose backing bytes could not be
/// removed are reported instead of silently dropped.
#[derive(Debug, Clone)]
pub struct ChatDeletion {
    pub removed_files: usize,
    pub orphaned_paths: Vec<PathBuf>,
}

/// A chat with its full message history (chronological) and files (newest
/// first).
#[derive(Debug, Clone)]
pub struct ChatDetail {
    pub chat: Chat,
    pub messages: Vec<StoredMessage>,
    pub files: Vec<StoredFile>,
}
