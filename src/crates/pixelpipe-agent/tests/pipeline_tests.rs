//! End-to-end sessions through the screenshot pipeline with scripted collaborators.

use pixelpipe_agent::testing::{
    sample_data, standup, RecordingActions, StubClassifier, StubExtractor,
};
use pixelpipe_agent::{
    ActionResult, AgentError, Classification, Collaborators, HumanDecision, Pipeline,
    PipelineState, PipelineUpdate,
};
use pixelpipe_checkpoint::{Checkpointer, InMemoryCheckpointer};
use pixelpipe_core::{EngineConfig, EngineError, EngineStatus, StateError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct Fixture {
    pipeline: Pipeline,
    checkpointer: Arc<InMemoryCheckpointer>,
    classifier: Arc<StubClassifier>,
    extractor: Arc<StubExtractor>,
    actions: Arc<RecordingActions>,
}

fn classifier() -> StubClassifier {
    StubClassifier::new()
        .with("event.png", Classification::Event)
        .with("receipt.png", Classification::Receipt)
        .with("code.png", Classification::Code)
        .with("meme.png", Classification::Unknown)
        .failing("corrupt.png")
}

fn fixture_with(extractor: StubExtractor, config: EngineConfig) -> Fixture {
    build_fixture(extractor, RecordingActions::new(), config)
}

fn build_fixture(
    extractor: StubExtractor,
    actions: RecordingActions,
    config: EngineConfig,
) -> Fixture {
    let classifier = Arc::new(classifier());
    let extractor = Arc::new(extractor);
    let actions = Arc::new(actions);
    let checkpointer = Arc::new(InMemoryCheckpointer::new());

    let collaborators = Collaborators::new(classifier.clone(), extractor.clone(), actions.clone());
    let pipeline = Pipeline::with_engine_config(
        collaborators,
        checkpointer.clone() as Arc<dyn Checkpointer>,
        config,
    )
    .unwrap();

    Fixture {
        pipeline,
        checkpointer,
        classifier,
        extractor,
        actions,
    }
}

fn fixture() -> Fixture {
    fixture_with(StubExtractor::new(), EngineConfig::new())
}

#[tokio::test]
async fn test_approved_sessions_reach_done_with_success() {
    let cases = [
        ("event.png", Classification::Event),
        ("receipt.png", Classification::Receipt),
        ("code.png", Classification::Code),
    ];

    for (artifact, classification) in cases {
        let f = fixture();
        let session = format!("session-{artifact}");

        let paused = f.pipeline.start_session(&session, artifact).await.unwrap();
        assert_eq!(paused.paused_at(), Some("human_review"));
        assert_eq!(paused.state.classification, Some(classification));
        assert_eq!(paused.state.extracted_data, sample_data(classification));

        f.pipeline
            .submit_decision(&session, HumanDecision::Approved)
            .await
            .unwrap();
        let done = f.pipeline.resume(&session).await.unwrap();

        assert_eq!(done.status, EngineStatus::Done);
        assert_eq!(done.state.action_result, Some(ActionResult::Success));
        let extracted = done.state.extracted_data.unwrap();
        assert_eq!(extracted.classification(), classification);
        assert_eq!(f.actions.calls(), vec![(classification, extracted)]);
    }
}

#[tokio::test]
async fn test_unknown_goes_straight_to_review_and_never_acts() {
    let f = fixture();

    let paused = f.pipeline.start_session("s-1", "meme.png").await.unwrap();
    assert_eq!(paused.paused_at(), Some("human_review"));
    assert_eq!(paused.state.classification, Some(Classification::Unknown));
    assert_eq!(paused.state.extracted_data, None);
    assert_eq!(f.extractor.calls(), 0);

    f.pipeline
        .submit_decision("s-1", HumanDecision::Approved)
        .await
        .unwrap();
    let done = f.pipeline.resume("s-1").await.unwrap();

    assert_eq!(done.status, EngineStatus::Done);
    assert_eq!(done.state.action_result, None);
    assert_eq!(f.actions.call_count(), 0);

    let visited: Vec<_> = f
        .pipeline
        .history("s-1")
        .await
        .unwrap()
        .into_iter()
        .filter_map(|s| s.next_step)
        .collect();
    assert!(visited.iter().all(|step| !step.starts_with("extract_") && !step.starts_with("tool_")));
}

#[tokio::test]
async fn test_classifier_failure_is_downgraded_to_unknown() {
    let f = fixture();

    let paused = f.pipeline.start_session("s-1", "corrupt.png").await.unwrap();
    assert_eq!(paused.paused_at(), Some("human_review"));
    assert_eq!(paused.state.classification, Some(Classification::Unknown));
    assert_eq!(f.classifier.calls(), 1);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let f = fixture();

    let first = f.pipeline.start_session("s-1", "event.png").await.unwrap();
    let records = f.checkpointer.record_count().await;
    let second = f.pipeline.start_session("s-1", "event.png").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(f.classifier.calls(), 1);
    assert_eq!(f.extractor.calls(), 1);
    assert_eq!(f.checkpointer.record_count().await, records);

    let err = f
        .pipeline
        .start_session("s-1", "receipt.png")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Engine(EngineError::SessionState { status: EngineStatus::Paused, .. })
    ));
}

#[tokio::test]
async fn test_extraction_failure_preserves_last_checkpoint() {
    let f = fixture_with(
        StubExtractor::new().failing(Classification::Receipt),
        EngineConfig::new(),
    );

    let failed = f.pipeline.start_session("s-1", "receipt.png").await.unwrap();
    assert_eq!(failed.status, EngineStatus::Failed);
    assert_eq!(failed.next_step.as_deref(), Some("extract_receipt"));
    assert!(failed.error.as_deref().unwrap().contains("stub extraction failure"));

    // Last good state: classified, nothing extracted.
    assert_eq!(failed.state.classification, Some(Classification::Receipt));
    assert_eq!(failed.state.extracted_data, None);

    let history = f.pipeline.history("s-1").await.unwrap();
    let before_failure = &history[history.len() - 2];
    assert_eq!(before_failure.state, failed.state);
    assert_eq!(before_failure.status, EngineStatus::Ready);

    let err = f.pipeline.resume("s-1").await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Engine(EngineError::SessionState { status: EngineStatus::Failed, .. })
    ));
}

#[tokio::test]
async fn test_pause_is_strict() {
    let f = fixture();

    let paused = f.pipeline.start_session("s-1", "event.png").await.unwrap();
    assert_eq!(paused.status, EngineStatus::Paused);
    assert_eq!(f.actions.call_count(), 0);

    // Resuming without a decision runs review and finishes without acting.
    let done = f.pipeline.resume("s-1").await.unwrap();
    assert_eq!(done.status, EngineStatus::Done);
    assert_eq!(done.state.action_result, None);
    assert_eq!(f.actions.call_count(), 0);
}

#[tokio::test]
async fn test_rejection_finishes_without_action() {
    let f = fixture();
    f.pipeline.start_session("s-1", "receipt.png").await.unwrap();

    f.pipeline
        .submit_decision("s-1", HumanDecision::Rejected)
        .await
        .unwrap();
    let done = f.pipeline.resume("s-1").await.unwrap();

    assert_eq!(done.status, EngineStatus::Done);
    assert_eq!(done.state.human_decision, Some(HumanDecision::Rejected));
    assert_eq!(done.state.action_result, None);
    assert_eq!(f.actions.call_count(), 0);
}

#[tokio::test]
async fn test_standup_event_is_acted_on_exactly_once() {
    let f = fixture_with(
        StubExtractor::new().with(Classification::Event, standup()),
        EngineConfig::new(),
    );

    let paused = f.pipeline.start_session("s-1", "event.png").await.unwrap();
    assert_eq!(
        serde_json::to_value(&paused.state.extracted_data).unwrap(),
        serde_json::json!({
            "title": "Standup",
            "date": "2024-06-01",
            "time": "09:00",
            "attendees": null
        })
    );

    f.pipeline
        .submit_decision("s-1", HumanDecision::Approved)
        .await
        .unwrap();
    let done = f.pipeline.resume("s-1").await.unwrap();

    assert_eq!(done.state.action_result, Some(ActionResult::Success));
    assert_eq!(f.actions.calls(), vec![(Classification::Event, standup())]);
}

#[tokio::test]
async fn test_decision_rules() {
    let f = fixture();

    let err = f
        .pipeline
        .submit_decision("ghost", HumanDecision::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Engine(EngineError::NotFound(_))));

    f.pipeline.start_session("s-1", "code.png").await.unwrap();
    f.pipeline
        .submit_decision("s-1", HumanDecision::Approved)
        .await
        .unwrap();
    // Same decision again is a no-op.
    f.pipeline
        .submit_decision("s-1", HumanDecision::Approved)
        .await
        .unwrap();

    let err = f
        .pipeline
        .submit_decision("s-1", HumanDecision::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Engine(EngineError::State(StateError::Transition { .. }))
    ));

    // The patch did not move the session.
    let state = f.pipeline.state("s-1").await.unwrap();
    assert_eq!(state.paused_at(), Some("human_review"));
    assert_eq!(state.state.human_decision, Some(HumanDecision::Approved));

    f.pipeline.resume("s-1").await.unwrap();
    let err = f
        .pipeline
        .submit_decision("s-1", HumanDecision::Approved)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Engine(EngineError::SessionState { status: EngineStatus::Done, .. })
    ));
    assert!(matches!(
        f.pipeline.resume("s-1").await,
        Err(AgentError::Engine(EngineError::SessionState { .. }))
    ));
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let f = fixture();
    let artifacts = ["event.png", "receipt.png", "code.png", "meme.png"];

    let tasks: Vec<_> = artifacts
        .iter()
        .enumerate()
        .map(|(i, artifact)| {
            let pipeline = f.pipeline.clone();
            let artifact = artifact.to_string();
            tokio::spawn(async move {
                let session = format!("s-{i}");
                pipeline.start_session(&session, artifact.as_str()).await.unwrap();
                pipeline
                    .submit_decision(&session, HumanDecision::Approved)
                    .await
                    .unwrap();
                pipeline.resume(&session).await.unwrap()
            })
        })
        .collect();

    for (task, artifact) in tasks.into_iter().zip(artifacts) {
        let done = task.await.unwrap();
        assert_eq!(done.status, EngineStatus::Done);
        assert_eq!(done.state.artifact_ref, artifact);
    }
    assert_eq!(f.actions.call_count(), 3);
    assert_eq!(f.checkpointer.session_count().await, 4);
}

#[tokio::test]
async fn test_busy_session_fails_fast_and_survives_cancel() {
    let gate = Arc::new(Notify::new());
    let f = fixture_with(StubExtractor::new().gated(gate.clone()), EngineConfig::new());

    let pipeline = f.pipeline.clone();
    let running = tokio::spawn(async move { pipeline.start_session("s-1", "event.png").await });

    while f.pipeline.status("s-1").await.ok() != Some(EngineStatus::Running) {
        tokio::task::yield_now().await;
    }
    let err = f.pipeline.resume("s-1").await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::Engine(EngineError::SessionState { status: EngineStatus::Running, .. })
    ));

    assert!(f.pipeline.cancel("s-1"));
    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, AgentError::Engine(EngineError::Cancelled { .. })));

    // Classification survived; extraction is still pending.
    let state = f.pipeline.state("s-1").await.unwrap();
    assert_eq!(state.status, EngineStatus::Ready);
    assert_eq!(state.next_step.as_deref(), Some("extract_event"));
    assert_eq!(state.state.classification, Some(Classification::Event));
    assert_eq!(state.state.extracted_data, None);

    gate.notify_one();
    let paused = f.pipeline.resume("s-1").await.unwrap();
    assert_eq!(paused.paused_at(), Some("human_review"));
    assert_eq!(paused.state.extracted_data, Some(standup()));
    assert_eq!(f.classifier.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_extraction_times_out() {
    let f = fixture_with(
        StubExtractor::new().with_delay(Duration::from_secs(600)),
        EngineConfig::new().with_step_timeout(Duration::from_secs(30)),
    );

    let err = f
        .pipeline
        .start_session("s-1", "code.png")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Engine(EngineError::Timeout { ref step, .. }) if step == "extract_code"
    ));

    let state = f.pipeline.state("s-1").await.unwrap();
    assert_eq!(state.status, EngineStatus::Ready);
    assert_eq!(state.state.classification, Some(Classification::Code));
}

#[tokio::test]
async fn test_failed_action_still_finishes() {
    let f = build_fixture(
        StubExtractor::new(),
        RecordingActions::failing("calendar offline"),
        EngineConfig::new(),
    );

    f.pipeline.start_session("s-1", "event.png").await.unwrap();
    f.pipeline
        .submit_decision("s-1", HumanDecision::Approved)
        .await
        .unwrap();
    let done = f.pipeline.resume("s-1").await.unwrap();

    assert_eq!(done.status, EngineStatus::Done);
    assert_eq!(done.error, None);
    match done.state.action_result {
        Some(ActionResult::Failure(reason)) => assert!(reason.contains("calendar offline")),
        other => panic!("expected a failed action, got {other:?}"),
    }
    assert_eq!(f.actions.call_count(), 1);
}

#[tokio::test]
async fn test_external_update_cannot_write_action_result() {
    let f = fixture();
    f.pipeline.start_session("s-1", "meme.png").await.unwrap();

    let forged = PipelineUpdate {
        human_decision: Some(HumanDecision::Approved),
        action_result: Some(ActionResult::Success),
        ..Default::default()
    };
    let err = f
        .pipeline
        .engine()
        .update_state("s-1", forged)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::State(StateError::Ownership { ref field, .. }) if field == "action_result"
    ));

    // Nothing was written; the session finishes without an action.
    let paused = f.pipeline.state("s-1").await.unwrap();
    assert_eq!(paused.paused_at(), Some("human_review"));
    assert_eq!(paused.state.human_decision, None);

    let done = f.pipeline.resume("s-1").await.unwrap();
    assert_eq!(done.status, EngineStatus::Done);
    assert_eq!(done.state.action_result, None);
    assert_eq!(f.actions.call_count(), 0);
}

#[tokio::test]
async fn test_start_rejects_preloaded_state() {
    let f = fixture();

    let preloaded = PipelineState {
        classification: Some(Classification::Code),
        extracted_data: sample_data(Classification::Receipt),
        ..PipelineState::new("code.png")
    };
    let err = f
        .pipeline
        .engine()
        .start("s-1", preloaded)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::State(StateError::Shape { ref field, .. }) if field == "classification"
    ));

    assert!(matches!(
        f.pipeline.state("s-1").await,
        Err(AgentError::Engine(EngineError::NotFound(_)))
    ));
    assert_eq!(f.classifier.calls(), 0);
    assert_eq!(f.checkpointer.session_count().await, 0);
}
