//! Session execution engine.
//!
//! The [`Engine`] walks a [`Graph`] for one session at a time per session id,
//! persisting a [`SessionRecord`] after every step. Its observable state
//! machine:
//!
//! ```text
//!                 start
//!                   │
//!                   ▼
//!   ┌────────► READY(next) ──── step ok, next is interrupt ───► PAUSED(next)
//!   │               │                                            │
//!   │          step ok, edge                           resume (runs `next`)
//!   │               │                                            │
//!   └───────────────┘◄───────────────────────────────────────────┘
//!                   │
//!        no outgoing edge │ step error
//!                   ▼            ▼
//!                 DONE        FAILED
//! ```
//!
//! `RUNNING` is not persisted. It is reported for sessions whose
//! [`SessionGuard`] is held, which is how `start`/`resume` on a busy session
//! fail fast.
//!
//! # Guarantees
//!
//! - A step's update is merged on a copy of the state and persisted before
//!   the engine moves on; a failing step leaves the previous record in place.
//! - Cancellation and step timeouts abort the in-flight step only. Nothing is
//!   written, so the last record (`READY` or `PAUSED`) stays valid and the
//!   session can be resumed.
//! - A step may only set fields it declared in its write set, and
//!   [`Engine::update_state`] only the graph's external write set.
//! - A new session's initial state must pass [`GraphState::validate_initial`].

use crate::error::{EngineError, Result, StateError, StepError};
use crate::graph::{Graph, Step};
use crate::session::{SessionGuard, SessionRegistry};
use crate::state::{GraphState, PartialUpdate};
use chrono::{DateTime, Utc};
use pixelpipe_checkpoint::{
    CheckpointError, Checkpointer, EngineStatus, RecordSource, SessionRecord,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Engine tuning.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Upper bound on a single step's execution time.
    pub step_timeout: Option<Duration>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }
}

/// Typed view of a session record.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<S> {
    pub session_id: String,
    pub state: S,
    pub status: EngineStatus,
    pub next_step: Option<String>,
    pub error: Option<String>,
    pub step: u64,
    pub updated_at: DateTime<Utc>,
}

impl<S: GraphState> Snapshot<S> {
    pub fn from_record(record: SessionRecord) -> Result<Self> {
        Ok(Self {
            state: serde_json::from_value(record.state)?,
            session_id: record.session_id,
            status: record.engine_status,
            next_step: record.next_step,
            error: record.error,
            step: record.step,
            updated_at: record.updated_at,
        })
    }

    /// The step this session is paused before, if any.
    pub fn paused_at(&self) -> Option<&str> {
        match self.status {
            EngineStatus::Paused => self.next_step.as_deref(),
            _ => None,
        }
    }
}

/// Runs sessions of one graph against one checkpointer.
pub struct Engine<S: GraphState> {
    graph: Arc<Graph<S>>,
    checkpointer: Arc<dyn Checkpointer>,
    sessions: SessionRegistry,
    config: EngineConfig,
}

impl<S: GraphState> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            checkpointer: Arc::clone(&self.checkpointer),
            sessions: self.sessions.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: GraphState> Engine<S> {
    pub fn new(graph: impl Into<Arc<Graph<S>>>, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            graph: graph.into(),
            checkpointer,
            sessions: SessionRegistry::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn graph(&self) -> &Graph<S> {
        &self.graph
    }

    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a session at the entry step and run it until it pauses or terminates.
    ///
    /// Starting an existing session with the same input runs nothing and
    /// returns its current snapshot. A different input is rejected, as is an
    /// initial state that fails [`GraphState::validate_initial`].
    #[tracing::instrument(skip_all, fields(session_id = %session_id))]
    pub async fn start(&self, session_id: &str, initial: S) -> Result<Snapshot<S>> {
        initial.validate_initial()?;
        let input = serde_json::to_value(&initial)?;
        let guard = self.acquire(session_id, "start")?;

        if let Some(existing) = self.checkpointer.get(session_id).await? {
            if existing.input != input {
                return Err(EngineError::session_state(
                    session_id,
                    existing.engine_status,
                    "start with a different input",
                ));
            }
            tracing::info!(
                status = %existing.engine_status,
                "Session exists; returning current snapshot"
            );
            return Snapshot::from_record(existing);
        }

        let record = SessionRecord::new(session_id, input, self.graph.entry());
        self.checkpointer.save(record.clone()).await?;
        tracing::info!(entry = %self.graph.entry(), "Session started");

        self.run(guard, record, initial, false).await
    }

    /// Continue a `PAUSED` or `READY` session from its recorded step.
    #[tracing::instrument(skip_all, fields(session_id = %session_id))]
    pub async fn resume(&self, session_id: &str) -> Result<Snapshot<S>> {
        let guard = self.acquire(session_id, "resume")?;
        let record = self.load(session_id).await?;

        let past_interrupt = match record.engine_status {
            EngineStatus::Paused => true,
            EngineStatus::Ready => false,
            status => return Err(EngineError::session_state(session_id, status, "resume")),
        };
        let state: S = serde_json::from_value(record.state.clone())?;
        tracing::info!(next_step = ?record.next_step, "Resuming session");

        self.run(guard, record, state, past_interrupt).await
    }

    /// Merge `update` into the state of a paused session without moving it.
    ///
    /// Every field the update sets must be in the graph's external write set.
    /// The update then passes through the state's merge rules; only the
    /// fields it sets are written.
    #[tracing::instrument(skip_all, fields(session_id = %session_id, fields = ?update.fields()))]
    pub async fn update_state(&self, session_id: &str, update: S::Update) -> Result<Snapshot<S>> {
        let _guard = self.acquire(session_id, "update state")?;
        let record = self.load(session_id).await?;
        if record.engine_status != EngineStatus::Paused {
            return Err(EngineError::session_state(
                session_id,
                record.engine_status,
                "update state",
            ));
        }

        let fields = update.fields();
        if let Some(field) = fields.iter().find(|f| !self.graph.accepts_external(f)) {
            return Err(StateError::Ownership {
                step: "update_state".to_string(),
                field: field.to_string(),
            }
            .into());
        }

        let state: S = serde_json::from_value(record.state)?;
        let merged = serde_json::to_value(state.merged(update)?)?;

        let mut patch = Map::new();
        for field in fields {
            let value = merged.get(field).cloned().unwrap_or(Value::Null);
            patch.insert(field.to_string(), value);
        }

        let record = self
            .checkpointer
            .update(session_id, Value::Object(patch))
            .await?;
        tracing::info!("Session state updated");
        Snapshot::from_record(record)
    }

    /// Current snapshot without running anything.
    pub async fn get_state(&self, session_id: &str) -> Result<Snapshot<S>> {
        let record = self.load(session_id).await?;
        let mut snapshot = Snapshot::from_record(record)?;
        if self.sessions.is_running(session_id) {
            snapshot.status = EngineStatus::Running;
        }
        Ok(snapshot)
    }

    pub async fn status(&self, session_id: &str) -> Result<EngineStatus> {
        Ok(self.get_state(session_id).await?.status)
    }

    /// Every persisted snapshot of a session, oldest first.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Snapshot<S>>> {
        let records = self.checkpointer.history(session_id).await?;
        if records.is_empty() {
            return Err(EngineError::NotFound(session_id.to_string()));
        }
        records.into_iter().map(Snapshot::from_record).collect()
    }

    /// Ask a running session to stop after abandoning its in-flight step.
    pub fn cancel(&self, session_id: &str) -> bool {
        let cancelled = self.sessions.cancel(session_id);
        if cancelled {
            tracing::info!(session_id = %session_id, "Cancellation requested");
        }
        cancelled
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.sessions.is_running(session_id)
    }

    /// Remove a session's records. Fails while it is running.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let _guard = self.acquire(session_id, "delete")?;
        self.checkpointer.delete(session_id).await?;
        Ok(())
    }

    pub async fn sessions(&self) -> Result<Vec<String>> {
        Ok(self.checkpointer.sessions().await?)
    }

    fn acquire(&self, session_id: &str, operation: &str) -> Result<SessionGuard> {
        self.sessions
            .acquire(session_id)
            .ok_or_else(|| EngineError::session_state(session_id, EngineStatus::Running, operation))
    }

    async fn load(&self, session_id: &str) -> Result<SessionRecord> {
        match self.checkpointer.load(session_id).await {
            Ok(record) => Ok(record),
            Err(CheckpointError::NotFound(id)) => Err(EngineError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn run(
        &self,
        mut guard: SessionGuard,
        mut record: SessionRecord,
        mut state: S,
        mut past_interrupt: bool,
    ) -> Result<Snapshot<S>> {
        loop {
            let Some(step_name) = record.next_step.clone() else {
                tracing::info!(steps = record.step, "Session completed");
                return Snapshot::from_record(record);
            };

            if !past_interrupt && self.graph.is_interrupt_point(&step_name) {
                record = SessionRecord {
                    engine_status: EngineStatus::Paused,
                    source: RecordSource::Step,
                    updated_at: Utc::now(),
                    ..record
                };
                self.checkpointer.save(record.clone()).await?;
                tracing::info!(step = %step_name, "Session paused before interrupt point");
                return Snapshot::from_record(record);
            }
            past_interrupt = false;

            let step = self.graph.step(&step_name).ok_or_else(|| {
                EngineError::Configuration(format!(
                    "recorded step '{step_name}' is not in the graph"
                ))
            })?;

            if guard.is_cancelled() {
                return Err(EngineError::Cancelled {
                    session_id: record.session_id,
                    step: step_name,
                });
            }

            tracing::debug!(step = %step_name, "Executing step");
            let outcome = self
                .execute(&mut guard, step, state.clone())
                .await?
                .and_then(|update| apply(step, &state, update));

            let next_state = match outcome {
                Ok(next_state) => next_state,
                Err(err) => {
                    tracing::error!(step = %step_name, error = %err, "Step failed");
                    record = SessionRecord {
                        engine_status: EngineStatus::Failed,
                        error: Some(format!("{step_name}: {err}")),
                        source: RecordSource::Step,
                        updated_at: Utc::now(),
                        ..record
                    };
                    self.checkpointer.save(record.clone()).await?;
                    return Snapshot::from_record(record);
                }
            };

            let next_step = self.graph.route(&step_name, &next_state).into_step();
            let engine_status = match next_step {
                Some(_) => EngineStatus::Ready,
                None => EngineStatus::Done,
            };
            let next = SessionRecord {
                state: serde_json::to_value(&next_state)?,
                next_step,
                engine_status,
                error: None,
                step: record.step + 1,
                source: RecordSource::Step,
                updated_at: Utc::now(),
                ..record
            };
            self.checkpointer.save(next.clone()).await?;
            tracing::debug!(
                step = %step_name,
                next_step = ?next.next_step,
                status = %next.engine_status,
                "Checkpoint written"
            );

            record = next;
            state = next_state;
        }
    }

    /// Run one step, racing it against cancellation and the step timeout.
    async fn execute(
        &self,
        guard: &mut SessionGuard,
        step: &Step<S>,
        state: S,
    ) -> Result<std::result::Result<S::Update, StepError>> {
        let session_id = guard.session_id().to_string();
        let work = step.execute(state);
        let limit = self.config.step_timeout;
        let bounded = async move {
            match limit {
                Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| limit),
                None => Ok(work.await),
            }
        };

        tokio::select! {
            outcome = bounded => match outcome {
                Ok(result) => Ok(result),
                Err(limit) => {
                    tracing::warn!(
                        step = %step.name,
                        timeout_ms = limit.as_millis() as u64,
                        "Step timed out"
                    );
                    Err(EngineError::Timeout {
                        session_id,
                        step: step.name.clone(),
                        duration_ms: limit.as_millis() as u64,
                    })
                }
            },
            _ = guard.cancelled() => {
                tracing::warn!(step = %step.name, "Step cancelled");
                Err(EngineError::Cancelled {
                    session_id,
                    step: step.name.clone(),
                })
            }
        }
    }
}

/// Check the step's write set, then merge on a copy.
fn apply<S: GraphState>(
    step: &Step<S>,
    state: &S,
    update: S::Update,
) -> std::result::Result<S, StepError> {
    if let Some(field) = update.fields().into_iter().find(|field| !step.owns(field)) {
        return Err(StateError::Ownership {
            step: step.name.clone(),
            field: field.to_string(),
        }
        .into());
    }
    Ok(state.merged(update)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{parity_graph, Counter, CounterUpdate};
    use pixelpipe_checkpoint::InMemoryCheckpointer;

    fn engine() -> Engine<Counter> {
        Engine::new(parity_graph(), Arc::new(InMemoryCheckpointer::new()))
    }

    #[tokio::test]
    async fn test_even_value_runs_to_done() {
        let engine = engine();
        let snapshot = engine.start("s-1", Counter::new("even", 8)).await.unwrap();

        assert_eq!(snapshot.status, EngineStatus::Done);
        assert_eq!(snapshot.state.value, 4);
        assert_eq!(snapshot.next_step, None);
        assert_eq!(snapshot.step, 2);
    }

    #[tokio::test]
    async fn test_odd_value_pauses_before_review() {
        let engine = engine();
        let snapshot = engine.start("s-1", Counter::new("odd", 3)).await.unwrap();

        assert_eq!(snapshot.paused_at(), Some("review"));
        assert_eq!(snapshot.state.value, 4);

        let done = engine.resume("s-1").await.unwrap();
        assert_eq!(done.status, EngineStatus::Done);
        assert_eq!(done.state.value, 4);
    }

    #[tokio::test]
    async fn test_update_state_goes_through_merge_rules() {
        let engine = engine();
        engine.start("s-1", Counter::new("odd", 1)).await.unwrap();

        let approve = CounterUpdate {
            approved: Some(true),
            ..Default::default()
        };
        let patched = engine.update_state("s-1", approve.clone()).await.unwrap();
        assert_eq!(patched.state.approved, Some(true));
        assert_eq!(patched.paused_at(), Some("review"));

        // Same value again is accepted, a reversal is not.
        engine.update_state("s-1", approve).await.unwrap();
        let reverse = CounterUpdate {
            approved: Some(false),
            ..Default::default()
        };
        let err = engine.update_state("s-1", reverse).await.unwrap_err();
        assert!(matches!(err, EngineError::State(StateError::Transition { .. })));
        assert_eq!(engine.get_state("s-1").await.unwrap().state.approved, Some(true));
    }

    #[tokio::test]
    async fn test_update_state_rejects_fields_outside_external_writes() {
        let engine = engine();
        engine.start("s-1", Counter::new("odd", 1)).await.unwrap();

        let sneaky = CounterUpdate {
            value: Some(100),
            approved: Some(true),
        };
        let err = engine.update_state("s-1", sneaky).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::State(StateError::Ownership { ref field, .. }) if field == "value"
        ));

        let snapshot = engine.get_state("s-1").await.unwrap();
        assert_eq!(snapshot.state.value, 2);
        assert_eq!(snapshot.state.approved, None);
        assert_eq!(engine.history("s-1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_history_records_every_write() {
        let engine = engine();
        engine.start("s-1", Counter::new("odd", 1)).await.unwrap();

        let history = engine.history("s-1").await.unwrap();
        let statuses: Vec<_> = history.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                EngineStatus::Ready,
                EngineStatus::Ready,
                EngineStatus::Ready,
                EngineStatus::Paused
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let engine = engine();
        assert!(matches!(
            engine.resume("ghost").await,
            Err(EngineError::NotFound(id)) if id == "ghost"
        ));
        assert!(matches!(
            engine.history("ghost").await,
            Err(EngineError::NotFound(_))
        ));
    }
}
