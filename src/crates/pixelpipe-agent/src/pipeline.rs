//! Session-level facade used by drivers.
//!
//! A [`Pipeline`] owns one engine over the screenshot graph. The protocol a
//! driver follows:
//!
//! 1. [`start_session`](Pipeline::start_session) runs classification and
//!    extraction, then pauses before `human_review` (or fails).
//! 2. The driver presents the snapshot's `extracted_data` and collects a decision.
//! 3. [`submit_decision`](Pipeline::submit_decision) records it without running anything.
//! 4. [`resume`](Pipeline::resume) runs the review barrier and, if approved,
//!    the action; the session ends `DONE` or `FAILED`.

use crate::actions::ActionDispatcher;
use crate::collaborators::Collaborators;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::graph::build_graph;
use crate::ollama::OllamaVision;
use crate::state::{HumanDecision, PipelineState, PipelineUpdate};
use pixelpipe_checkpoint::{Checkpointer, InMemoryCheckpointer};
use pixelpipe_core::{Engine, EngineConfig, EngineStatus, Snapshot};
use std::sync::Arc;

/// Snapshot of a pipeline session.
pub type PipelineSnapshot = Snapshot<PipelineState>;

#[derive(Clone)]
pub struct Pipeline {
    engine: Engine<PipelineState>,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, checkpointer: Arc<dyn Checkpointer>) -> Result<Self> {
        Self::with_engine_config(collaborators, checkpointer, EngineConfig::default())
    }

    pub fn with_engine_config(
        collaborators: Collaborators,
        checkpointer: Arc<dyn Checkpointer>,
        config: EngineConfig,
    ) -> Result<Self> {
        let graph = build_graph(&collaborators)?;
        let engine = Engine::new(graph, checkpointer).with_config(config);
        Ok(Self { engine })
    }

    /// Ollama-backed pipeline with the built-in actions and in-memory checkpoints.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        config.validate()?;
        let vision = Arc::new(OllamaVision::new(config.clone())?);
        let collaborators = Collaborators::new(
            vision.clone(),
            vision,
            Arc::new(ActionDispatcher::new()),
        );
        tracing::info!(model = %config.model, url = %config.ollama_url, "Pipeline configured");
        Self::with_engine_config(
            collaborators,
            Arc::new(InMemoryCheckpointer::new()),
            config.engine_config(),
        )
    }

    pub fn engine(&self) -> &Engine<PipelineState> {
        &self.engine
    }

    /// Start (or return the existing) session over `artifact_ref`.
    pub async fn start_session(
        &self,
        session_id: &str,
        artifact_ref: impl Into<String>,
    ) -> Result<PipelineSnapshot> {
        let snapshot = self
            .engine
            .start(session_id, PipelineState::new(artifact_ref))
            .await?;
        Ok(snapshot)
    }

    /// Record the reviewer's decision on a paused session.
    ///
    /// Submitting the same decision again is accepted; a different one is rejected.
    pub async fn submit_decision(&self, session_id: &str, decision: HumanDecision) -> Result<()> {
        self.engine
            .update_state(session_id, PipelineUpdate::decided(decision))
            .await?;
        tracing::info!(session_id = %session_id, %decision, "Decision recorded");
        Ok(())
    }

    pub async fn resume(&self, session_id: &str) -> Result<PipelineSnapshot> {
        Ok(self.engine.resume(session_id).await?)
    }

    pub async fn state(&self, session_id: &str) -> Result<PipelineSnapshot> {
        Ok(self.engine.get_state(session_id).await?)
    }

    pub async fn status(&self, session_id: &str) -> Result<EngineStatus> {
        Ok(self.engine.status(session_id).await?)
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<PipelineSnapshot>> {
        Ok(self.engine.history(session_id).await?)
    }

    pub fn cancel(&self, session_id: &str) -> bool {
        self.engine.cancel(session_id)
    }

    /// Mermaid flowchart of the pipeline graph.
    pub fn describe(&self) -> String {
        self.engine.graph().describe()
    }
}
