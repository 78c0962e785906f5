use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Closed set of document kinds the assistant understands. Dispatch over
/// this enum is exhaustive; anything outside the supported extensions lands
/// on `Unsupported` and degrades gracefully instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Modern spreadsheet (.xlsx)
    Tabular,
    /// Legacy binary spreadsheet (.xls)
    LegacyTabular,
    /// Word-processing document (.docx)
    Word,
    /// Slide deck (.pptx)
    SlideDeck,
    Pdf,
    /// Plain text (.txt, .rtf)
    PlainText,
    Unsupported,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "xlsx" => Self::Tabular,
            "xls" => Self::LegacyTabular,
            "docx" => Self::Word,
            "pptx" => Self::SlideDeck,
            "pdf" => Self::Pdf,
            "txt" | "rtf" => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    /// Extension a file of this kind is written with.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Tabular => "xlsx",
            Self::LegacyTabular => "xls",
            Self::Word => "docx",
            Self::SlideDeck => "pptx",
            Self::Pdf => "pdf",
            Self::PlainText => "txt",
            Self::Unsupported => "bin",
        }
    }

    /// MIME type used for the download content descriptor.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Tabular => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::LegacyTabular => "application/vnd.ms-excel",
            Self::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::SlideDeck => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
            Self::Unsupported => "application/octet-stream",
        }
    }

    /// Short label used in extraction error placeholders ("Error reading
    /// Excel file: ...").
    pub fn error_label(&self) -> &'static str {
        match self {
            Self::Tabular | Self::LegacyTabular => "Excel",
            Self::Word => "Word",
            Self::SlideDeck => "PowerPoint",
            Self::Pdf => "PDF",
            Self::PlainText => "text",
            Self::Unsupported => "unknown",
        }
    }
}

/// An authenticated user (or an exempt administrator) driving the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    /// Exempt actors bypass balance checks and deductions entirely.
    pub exempt: bool,
}

impl Actor {
    pub fn user(id: Uuid) -> Self {
        Self { id, exempt: false }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, exempt: true }
    }
}

/// A conversation thread owning messages and files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One message of a chat. Append-only; never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// The file this message uploaded or generated, if any.
    pub file_id: Option<Uuid>,
    pub file_name: Option<String>,
    /// Tokens charged for producing this message (assistant messages only).
    pub cost_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// An uploaded or generated document tracked by a chat.
///
/// `extracted_content` is set once at upload time (truncated to the storage
/// budget) and stays empty for generated files that were never re-analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub extracted_content: String,
    pub is_generated: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful render, used to build the follow-up file record
/// and message. Never persisted as-is.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub path: PathBuf,
    pub display_name: String,
    pub kind: DocumentKind,
}
