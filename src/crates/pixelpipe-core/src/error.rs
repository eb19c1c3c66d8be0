//! Error types for graph construction and session execution.
//!
//! Three layers, from innermost out:
//!
//! - [`StateError`] - an update violated the merge contract of the state
//!   (immutable field touched, illegal transition, wrong shape, foreign field).
//! - [`StepError`] - a step could not produce an update. The engine never
//!   propagates it to the caller; it becomes a `FAILED` session record
//!   carrying the message, with the last good state preserved.
//! - [`EngineError`] - what callers of the engine see: build-time
//!   configuration problems, unknown sessions, operations attempted in the
//!   wrong session status, cancellation and storage failures.
//!
//! ```rust
//! use pixelpipe_core::error::{EngineError, StateError};
//!
//! fn explain(err: &EngineError) -> String {
//!     match err {
//!         EngineError::NotFound(id) => format!("no session named {id}"),
//!         EngineError::SessionState { status, operation, .. } => {
//!             format!("cannot {operation} while {status}")
//!         }
//!         EngineError::State(StateError::Transition { field, .. }) => {
//!             format!("{field} is already decided")
//!         }
//!         other => other.to_string(),
//!     }
//! }
//! ```

use pixelpipe_checkpoint::{CheckpointError, EngineStatus};
use thiserror::Error;

/// Convenience result type using [`EngineError`]
pub type Result<T> = std::result::Result<T, EngineError>;

/// Violations of a state's merge rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The field may not change once the session exists.
    #[error("Field '{0}' is immutable")]
    Immutable(String),

    /// The field only moves forward (e.g. unset -> set) and this update would move it elsewhere.
    #[error("Illegal transition of '{field}' from {from} to {to}")]
    Transition {
        field: String,
        from: String,
        to: String,
    },

    /// The value does not have the shape implied by the rest of the state.
    #[error("Field '{field}' has the wrong shape: {reason}")]
    Shape { field: String, reason: String },

    /// A step, or `update_state`, wrote a field outside its write set.
    #[error("Step '{step}' does not own field '{field}'")]
    Ownership { step: String, field: String },
}

/// Failure of a single step.
#[derive(Error, Debug)]
pub enum StepError {
    /// The step's collaborator failed and the step chose not to downgrade it.
    #[error("Step failed: {0}")]
    Failed(String),

    /// The step's update could not be merged.
    #[error(transparent)]
    State(#[from] StateError),
}

impl StepError {
    pub fn failed(message: impl Into<String>) -> Self {
        StepError::Failed(message.into())
    }
}

/// Errors surfaced by the engine and graph builder.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed graph. Only produced while building.
    #[error("Graph configuration error: {0}")]
    Configuration(String),

    /// Unknown session id.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Operation not legal in the session's current status.
    #[error("Session '{session_id}' is {status}; cannot {operation}")]
    SessionState {
        session_id: String,
        status: EngineStatus,
        operation: String,
    },

    /// An external update was rejected by the state's merge rules.
    #[error("Rejected state update: {0}")]
    State(#[from] StateError),

    /// The run was cancelled while `step` was executing. The last record is intact.
    #[error("Session '{session_id}' cancelled during step '{step}'")]
    Cancelled { session_id: String, step: String },

    /// `step` exceeded the configured step timeout. The last record is intact.
    #[error("Step '{step}' of session '{session_id}' timed out after {duration_ms}ms")]
    Timeout {
        session_id: String,
        step: String,
        duration_ms: u64,
    },

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn session_state(
        session_id: impl Into<String>,
        status: EngineStatus,
        operation: impl Into<String>,
    ) -> Self {
        EngineError::SessionState {
            session_id: session_id.into(),
            status,
            operation: operation.into(),
        }
    }
}
