//! Error taxonomy shared by mutations, persistence, import and the AI bridge.
//!
//! Every variant maps to a stable IPC error code so the UI can decide how
//! to surface it (blocking prompt, warning toast, rejected import).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Missing or malformed required field. No mutation was applied.
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read import file: {0}")]
    ImportParse(String),

    #[error("invalid import format: {0}")]
    ImportFormat(String),

    #[error(transparent)]
    Ai(#[from] AiError),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "bad_params",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Storage(_) => "storage_failed",
            StoreError::Serialization(_) => "serialization_failed",
            StoreError::Io(_) => "io_failed",
            StoreError::ImportParse(_) => "import_parse_failed",
            StoreError::ImportFormat(_) => "import_invalid_format",
            StoreError::Ai(_) => "ai_failed",
        }
    }
}

#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI service is not configured")]
    NotConfigured,

    #[error("AI request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AI service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AI response could not be parsed: {0}")]
    Parse(String),

    #[error("AI response was empty")]
    Empty,
}

pub type Result<T> = std::result::Result<T, StoreError>;
