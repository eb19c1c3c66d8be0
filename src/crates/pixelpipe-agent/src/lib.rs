//! # pixelpipe-agent
//!
//! Screenshot triage on top of `pixelpipe-core`: a vision model classifies an
//! image as an event, receipt or code error, extracts structured data, a human
//! approves it, and the matching integration acts on it.
//!
//! ```text
//! vision_router ─► extract_{event,receipt,code} ─► ‖human_review‖ ─► tool_{calendar,expense,notes}
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use pixelpipe_agent::testing::stub_collaborators;
//! use pixelpipe_agent::{HumanDecision, Pipeline};
//! use pixelpipe_checkpoint::InMemoryCheckpointer;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (collaborators, actions) = stub_collaborators();
//! let pipeline = Pipeline::new(collaborators, Arc::new(InMemoryCheckpointer::new()))?;
//!
//! let paused = pipeline.start_session("session_v1", "event.png").await?;
//! assert_eq!(paused.paused_at(), Some("human_review"));
//!
//! pipeline.submit_decision("session_v1", HumanDecision::Approved).await?;
//! let done = pipeline.resume("session_v1").await?;
//! assert!(done.state.action_result.unwrap().is_success());
//! assert_eq!(actions.call_count(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Against a real model, use [`Pipeline::from_config`] with an [`AgentConfig`].

pub mod actions;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod ollama;
pub mod pipeline;
pub mod routing;
pub mod state;
pub mod testing;

pub use actions::{ActionDispatcher, CalendarAction, ExpenseLedger, NoteStore};
pub use collaborators::{ActionRunner, Classifier, Collaborators, Extractor};
pub use config::AgentConfig;
pub use error::{AgentError, CollaboratorError, Result};
pub use graph::build_graph;
pub use ollama::OllamaVision;
pub use pipeline::{Pipeline, PipelineSnapshot};
pub use routing::ActionRoute;
pub use state::{
    ActionResult, Classification, CodeData, EventData, ExtractedData, HumanDecision,
    PipelineState, PipelineUpdate, ReceiptData,
};
