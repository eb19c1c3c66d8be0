//! Error types for the pipeline and its collaborators

use pixelpipe_core::EngineError;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Failure of an external collaborator (vision model, action integration).
///
/// Steps decide what a failure means: classification downgrades it to
/// `UNKNOWN`, actions record it as `ActionResult::Failure`, extraction fails
/// the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The service could not be reached or the request did not complete.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an error.
    #[error("Model error: {0}")]
    Model(String),

    /// The answer did not have the expected structure.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The input artifact could not be read.
    #[error("Cannot read artifact {path}: {reason}")]
    Artifact { path: String, reason: String },
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        CollaboratorError::Transport(err.to_string())
    }
}

/// Errors surfaced by the pipeline facade.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}
