//! Scripted collaborators for tests and offline runs.
//!
//! ```rust
//! use pixelpipe_agent::testing::{RecordingActions, StubClassifier, StubExtractor};
//! use pixelpipe_agent::{Classification, Collaborators};
//! use std::sync::Arc;
//!
//! let actions = Arc::new(RecordingActions::new());
//! let collaborators = Collaborators::new(
//!     Arc::new(StubClassifier::new().with("standup.png", Classification::Event)),
//!     Arc::new(StubExtractor::new()),
//!     actions.clone(),
//! );
//! assert_eq!(actions.call_count(), 0);
//! ```

use crate::collaborators::{ActionRunner, Classifier, Collaborators, Extractor};
use crate::error::CollaboratorError;
use crate::state::{ActionResult, Classification, CodeData, EventData, ExtractedData, ReceiptData};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// `{title: "Standup", date: "2024-06-01", time: "09:00", attendees: null}`
pub fn standup() -> ExtractedData {
    ExtractedData::Event(EventData {
        title: "Standup".to_string(),
        date: "2024-06-01".to_string(),
        time: "09:00".to_string(),
        attendees: None,
    })
}

/// Canned extraction per classification; `None` for `UNKNOWN`.
pub fn sample_data(classification: Classification) -> Option<ExtractedData> {
    match classification {
        Classification::Event => Some(standup()),
        Classification::Receipt => Some(ExtractedData::Receipt(ReceiptData {
            merchant: "Corner Shop".to_string(),
            total: "$12.40".to_string(),
            date: "2024-06-01".to_string(),
            items: "milk, bread, coffee".to_string(),
        })),
        Classification::Code => Some(ExtractedData::Code(CodeData {
            language: "Rust".to_string(),
            error_msg: "borrow of moved value: `state`".to_string(),
            suggested_fix: "Clone the state before moving it into the task.".to_string(),
        })),
        Classification::Unknown => None,
    }
}

/// Classifies by exact artifact name.
#[derive(Debug, Default)]
pub struct StubClassifier {
    answers: HashMap<String, Classification>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl StubClassifier {
    /// Unmapped artifacts classify as `UNKNOWN`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, artifact_ref: impl Into<String>, classification: Classification) -> Self {
        self.answers.insert(artifact_ref.into(), classification);
        self
    }

    /// Fail with a transport error for `artifact_ref`.
    pub fn failing(mut self, artifact_ref: impl Into<String>) -> Self {
        self.failing.insert(artifact_ref.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, artifact_ref: &str) -> Result<Classification, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(artifact_ref) {
            return Err(CollaboratorError::Transport(format!(
                "stub classifier refused {artifact_ref}"
            )));
        }
        Ok(self
            .answers
            .get(artifact_ref)
            .copied()
            .unwrap_or(Classification::Unknown))
    }
}

/// Returns [`sample_data`] unless told otherwise.
#[derive(Debug, Default)]
pub struct StubExtractor {
    answers: HashMap<Classification, ExtractedData>,
    failing: HashSet<Classification>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, classification: Classification, data: ExtractedData) -> Self {
        self.answers.insert(classification, data);
        self
    }

    pub fn failing(mut self, classification: Classification) -> Self {
        self.failing.insert(classification);
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wait for a notification on `gate` before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(
        &self,
        _artifact_ref: &str,
        classification: Classification,
    ) -> Result<ExtractedData, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(&classification) {
            return Err(CollaboratorError::Model(format!(
                "stub extraction failure for {classification}"
            )));
        }
        self.answers
            .get(&classification)
            .cloned()
            .or_else(|| sample_data(classification))
            .ok_or_else(|| {
                CollaboratorError::InvalidResponse(format!("no schema for {classification}"))
            })
    }
}

/// Records every action call and answers `Success` (or a fixed failure).
#[derive(Debug, Default)]
pub struct RecordingActions {
    calls: Mutex<Vec<(Classification, ExtractedData)>>,
    failure: Option<String>,
}

impl RecordingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(Classification, ExtractedData)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ActionRunner for RecordingActions {
    async fn run(
        &self,
        classification: Classification,
        data: &ExtractedData,
    ) -> Result<ActionResult, CollaboratorError> {
        self.calls.lock().push((classification, data.clone()));
        match &self.failure {
            Some(reason) => Err(CollaboratorError::Transport(reason.clone())),
            None => Ok(ActionResult::Success),
        }
    }
}

/// Stubs that classify `event.png`, `receipt.png` and `code.png` by name,
/// everything else as `UNKNOWN`, plus the recording action runner.
pub fn stub_collaborators() -> (Collaborators, Arc<RecordingActions>) {
    let classifier = StubClassifier::new()
        .with("event.png", Classification::Event)
        .with("receipt.png", Classification::Receipt)
        .with("code.png", Classification::Code);
    let actions = Arc::new(RecordingActions::new());
    let collaborators = Collaborators::new(
        Arc::new(classifier),
        Arc::new(StubExtractor::new()),
        actions.clone(),
    );
    (collaborators, actions)
}
