//! Storage abstraction for session records.
//!
//! The engine talks to persistence exclusively through [`Checkpointer`]. A
//! backend stores, per session, an append-only list of [`SessionRecord`]s; the
//! newest entry is the authoritative one.
//!
//! # Contract
//!
//! - `save` appends. It must not be observable half-written: after it returns
//!   `Ok`, `get` yields exactly the saved record.
//! - `update` patches the newest record's state and appends the result. The
//!   step pointer, status and step counter are preserved, so a paused session
//!   stays paused at the same step.
//! - Records of different sessions never interfere.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use pixelpipe_checkpoint::{Checkpointer, SessionRecord, Result};
//!
//! struct SqliteCheckpointer { /* pool */ }
//!
//! #[async_trait]
//! impl Checkpointer for SqliteCheckpointer {
//!     async fn save(&self, record: SessionRecord) -> Result<()> {
//!         // INSERT INTO session_records ...
//!         Ok(())
//!     }
//!     // get / update / history / sessions ...
//! }
//! ```

use crate::error::{CheckpointError, Result};
use crate::record::{SessionId, SessionRecord};
use async_trait::async_trait;
use serde_json::Value;

/// Durable storage for session records.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Append `record` as the newest entry of its session.
    async fn save(&self, record: SessionRecord) -> Result<()>;

    /// Newest record of a session, if it exists.
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Newest record of a session, failing with `NotFound` if absent.
    async fn load(&self, session_id: &str) -> Result<SessionRecord> {
        self.get(session_id)
            .await?
            .ok_or_else(|| CheckpointError::NotFound(session_id.to_string()))
    }

    /// Shallow-merge `patch` into the newest state and append the result.
    ///
    /// Returns the record as written.
    async fn update(&self, session_id: &str, patch: Value) -> Result<SessionRecord>;

    /// All records of a session, oldest first. Empty if the session is unknown.
    async fn history(&self, session_id: &str) -> Result<Vec<SessionRecord>>;

    /// Identifiers of every stored session.
    async fn sessions(&self) -> Result<Vec<SessionId>>;

    /// Drop every record of a session.
    async fn delete(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }
}
