//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No record exists for the session
    #[error("No checkpoint for session: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed record or patch
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),
}
