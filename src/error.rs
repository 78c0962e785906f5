use thiserror::Error;

/// Caller-facing failures of the chat engine. Everything recoverable
/// (extraction problems, model failures, malformed actions) is converted to
/// in-band reply text before it reaches this type; these variants are the
/// cases a caller must branch on.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat not found")]
    ChatNotFound,

    #[error("file not found")]
    FileNotFound,

    #[error("access denied")]
    Forbidden,

    #[error("file type not supported: {0}")]
    UnsupportedType(String),

    #[error("insufficient balance: need {required}, have {balance}")]
    InsufficientBalance { required: i64, balance: i64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// HTTP status the surrounding product maps this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::ChatNotFound | ChatError::FileNotFound => 404,
            ChatError::Forbidden => 403,
            ChatError::UnsupportedType(_) => 400,
            ChatError::InsufficientBalance { .. } => 402,
            ChatError::Internal(_) => 500,
        }
    }
}
