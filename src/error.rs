//! Error types for the posture engine

use thiserror::Error;

/// Errors surfaced by the engine's public operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    DateParse(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// True when the error is the caller's fault (maps to a 4xx-class
    /// status at the transport layer); storage and JSON faults are not.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::NotFound(_)
                | EngineError::Conflict(_)
                | EngineError::DateParse(_)
        )
    }
}
