//! The persisted shape of a session.
//!
//! A [`SessionRecord`] is everything needed to inspect or continue a session
//! without re-running anything: the state as of the last completed step, the
//! pointer to the step that runs next, and the engine status.
//!
//! ```text
//! {
//!   "session_id": "session_v1",
//!   "input":  { "artifact_ref": "shot.png", ... },
//!   "state":  { "artifact_ref": "shot.png", "classification": "EVENT", ... },
//!   "next_step": "human_review",
//!   "engine_status": "PAUSED",
//!   "error": null,
//!   "step": 2,
//!   "source": "step",
//!   "updated_at": "2024-06-01T09:00:00Z"
//! }
//! ```

use crate::error::{CheckpointError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a session (one run of a graph over one input).
pub type SessionId = String;

/// Lifecycle status of a session.
///
/// `Running` is never written by the engine; it is reported for sessions that
/// currently hold their execution lock. Between steps a session is persisted
/// as `Ready`, so an interrupted run leaves a resumable record behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineStatus {
    /// Positioned at `next_step`, nothing executing.
    Ready,
    /// A step is executing for this session.
    Running,
    /// Halted before the interrupt point named by `next_step`.
    Paused,
    /// Reached a terminal step.
    Done,
    /// A step failed; the state is the last good one.
    Failed,
}

impl EngineStatus {
    /// `Done` and `Failed` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineStatus::Done | EngineStatus::Failed)
    }

    /// Whether a `resume` may pick the session up.
    pub fn is_resumable(&self) -> bool {
        matches!(self, EngineStatus::Ready | EngineStatus::Paused)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngineStatus::Ready => "READY",
            EngineStatus::Running => "RUNNING",
            EngineStatus::Paused => "PAUSED",
            EngineStatus::Done => "DONE",
            EngineStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// What produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    /// Session creation.
    Input,
    /// Written by the engine while walking the graph.
    Step,
    /// External patch applied through [`Checkpointer::update`](crate::Checkpointer::update).
    Update,
}

/// Durable snapshot of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,

    /// The input the session was started with; used to recognise repeated starts.
    pub input: Value,

    /// Full state as of the last completed step.
    pub state: Value,

    /// Step to run next. `None` once the graph terminated.
    pub next_step: Option<String>,

    pub engine_status: EngineStatus,

    /// Failure description when `engine_status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Number of steps executed so far.
    pub step: u64,

    pub source: RecordSource,

    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A fresh record positioned at `entry`, with `input` as both input and state.
    pub fn new(session_id: impl Into<SessionId>, input: Value, entry: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: input.clone(),
            input,
            next_step: Some(entry.into()),
            engine_status: EngineStatus::Ready,
            error: None,
            step: 0,
            source: RecordSource::Input,
            updated_at: Utc::now(),
        }
    }

    /// The step the session halted before, if it is paused.
    pub fn paused_at(&self) -> Option<&str> {
        match self.engine_status {
            EngineStatus::Paused => self.next_step.as_deref(),
            _ => None,
        }
    }

    /// Shallow-merge the top-level keys of `patch` into the state.
    ///
    /// Nested values are replaced, never merged. `next_step`, status and step
    /// counter are left untouched.
    pub fn apply_patch(&mut self, patch: Value) -> Result<()> {
        let Value::Object(updates) = patch else {
            return Err(CheckpointError::Invalid(
                "state patch must be a JSON object".to_string(),
            ));
        };
        let Some(state) = self.state.as_object_mut() else {
            return Err(CheckpointError::Invalid(format!(
                "state of session {} is not a JSON object",
                self.session_id
            )));
        };

        for (key, value) in updates {
            state.insert(key, value);
        }
        self.source = RecordSource::Update;
        self.updated_at = Utc::now();
        Ok(())
    }
}
