//! In-memory [`Checkpointer`].
//!
//! Records live in a `HashMap` keyed by session id behind a tokio `RwLock`.
//! Nothing survives the process, which is what tests and the interactive CLI
//! want. Cloning the checkpointer shares the underlying storage.

use crate::error::{CheckpointError, Result};
use crate::record::{SessionId, SessionRecord};
use crate::traits::Checkpointer;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-session record lists, newest last.
type RecordStorage = Arc<RwLock<HashMap<SessionId, Vec<SessionRecord>>>>;

/// Thread-safe in-memory session storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointer {
    storage: RecordStorage,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with at least one record.
    pub async fn session_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of records across all sessions.
    pub async fn record_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|records| records.len())
            .sum()
    }

    /// Clear all records (useful for testing)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, record: SessionRecord) -> Result<()> {
        if record.session_id.is_empty() {
            return Err(CheckpointError::Invalid(
                "session_id must not be empty".to_string(),
            ));
        }

        tracing::trace!(
            session_id = %record.session_id,
            step = record.step,
            status = %record.engine_status,
            "Saving session record"
        );

        let mut storage = self.storage.write().await;
        storage
            .entry(record.session_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let storage = self.storage.read().await;
        Ok(storage
            .get(session_id)
            .and_then(|records| records.last())
            .cloned())
    }

    async fn update(&self, session_id: &str, patch: Value) -> Result<SessionRecord> {
        // Hold the write lock across read-modify-append so concurrent patches serialize.
        let mut storage = self.storage.write().await;
        let records = storage
            .get_mut(session_id)
            .ok_or_else(|| CheckpointError::NotFound(session_id.to_string()))?;
        let mut next = records
            .last()
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(session_id.to_string()))?;

        next.apply_patch(patch)?;
        records.push(next.clone());
        Ok(next)
    }

    async fn history(&self, session_id: &str) -> Result<Vec<SessionRecord>> {
        let storage = self.storage.read().await;
        Ok(storage.get(session_id).cloned().unwrap_or_default())
    }

    async fn sessions(&self) -> Result<Vec<SessionId>> {
        let storage = self.storage.read().await;
        let mut ids: Vec<SessionId> = storage.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.remove(session_id);
        Ok(())
    }
}
