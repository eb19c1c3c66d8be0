//! Interfaces of the services the pipeline calls out to.
//!
//! The engine treats each call as opaque and potentially slow. Implementations
//! must be cheap to share (`Arc<dyn ...>`) and safe to call from several
//! sessions at once.

use crate::error::CollaboratorError;
use crate::state::{ActionResult, Classification, ExtractedData};
use async_trait::async_trait;
use std::sync::Arc;

/// Decides what an artifact shows.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, artifact_ref: &str) -> Result<Classification, CollaboratorError>;
}

/// Pulls schema-shaped data out of an artifact.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// The returned variant must follow `classification`.
    async fn extract(
        &self,
        artifact_ref: &str,
        classification: Classification,
    ) -> Result<ExtractedData, CollaboratorError>;
}

/// Performs the approved side effect for extracted data.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(
        &self,
        classification: Classification,
        data: &ExtractedData,
    ) -> Result<ActionResult, CollaboratorError>;
}

/// The full set of collaborators a pipeline graph is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn Classifier>,
    pub extractor: Arc<dyn Extractor>,
    pub actions: Arc<dyn ActionRunner>,
}

impl Collaborators {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        extractor: Arc<dyn Extractor>,
        actions: Arc<dyn ActionRunner>,
    ) -> Self {
        Self {
            classifier,
            extractor,
            actions,
        }
    }
}
