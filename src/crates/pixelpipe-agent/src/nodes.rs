//! Step bodies of the screenshot pipeline.
//!
//! Each function takes the collaborator it needs and a snapshot of the state,
//! and returns a [`PipelineUpdate`]. How a collaborator failure is handled
//! differs per stage:
//!
//! - classification falls back to `UNKNOWN`, so the session still reaches
//!   review with nothing extracted
//! - extraction fails the step, leaving the classified state as the last
//!   good checkpoint
//! - actions record `ActionResult::Failure(reason)`

use crate::collaborators::{ActionRunner, Classifier, Extractor};
use crate::state::{ActionResult, Classification, PipelineState, PipelineUpdate};
use pixelpipe_core::StepError;
use std::sync::Arc;

pub const VISION_ROUTER: &str = "vision_router";
pub const EXTRACT_EVENT: &str = "extract_event";
pub const EXTRACT_RECEIPT: &str = "extract_receipt";
pub const EXTRACT_CODE: &str = "extract_code";
pub const HUMAN_REVIEW: &str = "human_review";
pub const TOOL_CALENDAR: &str = "tool_calendar";
pub const TOOL_EXPENSE: &str = "tool_expense";
pub const TOOL_NOTES: &str = "tool_notes";

pub async fn classify(
    classifier: Arc<dyn Classifier>,
    state: PipelineState,
) -> Result<PipelineUpdate, StepError> {
    let classification = match classifier.classify(&state.artifact_ref).await {
        Ok(classification) => classification,
        Err(err) => {
            tracing::warn!(
                artifact = %state.artifact_ref,
                error = %err,
                "Classification failed; using UNKNOWN"
            );
            Classification::Unknown
        }
    };
    tracing::info!(artifact = %state.artifact_ref, %classification, "Artifact classified");
    Ok(PipelineUpdate::classified(classification))
}

pub async fn extract(
    extractor: Arc<dyn Extractor>,
    expected: Classification,
    state: PipelineState,
) -> Result<PipelineUpdate, StepError> {
    if state.classification != Some(expected) {
        return Err(StepError::failed(format!(
            "{expected} extraction reached with classification {:?}",
            state.classification
        )));
    }

    tracing::info!(artifact = %state.artifact_ref, classification = %expected, "Extracting data");
    let data = extractor
        .extract(&state.artifact_ref, expected)
        .await
        .map_err(|err| StepError::failed(err.to_string()))?;

    Ok(PipelineUpdate::extracted(data))
}

pub async fn act(
    actions: Arc<dyn ActionRunner>,
    expected: Classification,
    state: PipelineState,
) -> Result<PipelineUpdate, StepError> {
    if !state.is_approved() {
        return Err(StepError::failed("action reached without approval"));
    }
    let Some(data) = state.extracted_data.as_ref() else {
        return Err(StepError::failed("action reached without extracted data"));
    };

    let result = match actions.run(expected, data).await {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(classification = %expected, error = %err, "Action failed");
            ActionResult::Failure(err.to_string())
        }
    };
    Ok(PipelineUpdate::acted(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::HumanDecision;
    use crate::testing::{standup, RecordingActions, StubClassifier, StubExtractor};
    use pixelpipe_core::GraphState;

    #[tokio::test]
    async fn test_classifier_failure_becomes_unknown() {
        let classifier = Arc::new(StubClassifier::new().failing("broken.png"));
        let update = classify(classifier, PipelineState::new("broken.png"))
            .await
            .unwrap();
        assert_eq!(update.classification, Some(Classification::Unknown));
    }

    #[tokio::test]
    async fn test_extractor_failure_fails_step() {
        let extractor = Arc::new(StubExtractor::new().failing(Classification::Event));
        let state = PipelineState::new("a.png")
            .merged(PipelineUpdate::classified(Classification::Event))
            .unwrap();

        let err = extract(extractor, Classification::Event, state)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("stub extraction failure"));
    }

    #[tokio::test]
    async fn test_action_failure_is_recorded() {
        let actions = Arc::new(RecordingActions::failing("calendar offline"));
        let state = PipelineState::new("a.png")
            .merged(PipelineUpdate::classified(Classification::Event))
            .and_then(|s| s.merged(PipelineUpdate::extracted(standup())))
            .and_then(|s| s.merged(PipelineUpdate::decided(HumanDecision::Approved)))
            .unwrap();

        let update = act(actions, Classification::Event, state).await.unwrap();
        assert!(matches!(
            update.action_result,
            Some(ActionResult::Failure(reason)) if reason.contains("calendar offline")
        ));
    }
}
