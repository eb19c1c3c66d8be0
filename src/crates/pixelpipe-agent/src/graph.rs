//! Wiring of the screenshot pipeline.
//!
//! ```text
//!                      ┌─ EVENT ───► extract_event ───┐
//!  vision_router ──────┼─ RECEIPT ─► extract_receipt ─┼──► ‖human_review‖
//!                      ├─ CODE ────► extract_code ────┘         │
//!                      └─ UNKNOWN ─────────────────────────────►│
//!                                                               │
//!            ┌─────────────── Calendar ◄──── approved EVENT ────┤
//!            │  tool_calendar / tool_expense / tool_notes       │
//!            ▼                                                  ▼
//!         __end__ ◄───────────────── Finish (rejected / UNKNOWN)
//! ```
//!
//! `human_review` is a barrier and an interrupt point: sessions pause before
//! it with classification and extraction persisted. `human_decision` is the
//! only field a caller may patch while paused.

use crate::collaborators::Collaborators;
use crate::nodes::{
    self, EXTRACT_CODE, EXTRACT_EVENT, EXTRACT_RECEIPT, HUMAN_REVIEW, TOOL_CALENDAR, TOOL_EXPENSE,
    TOOL_NOTES, VISION_ROUTER,
};
use crate::routing::{route_action, route_extraction, ActionRoute};
use crate::state::{Classification, PipelineState};
use pixelpipe_core::{Graph, GraphBuilder, Result, END};
use std::sync::Arc;

/// Build the pipeline graph around `collaborators`.
pub fn build_graph(collaborators: &Collaborators) -> Result<Graph<PipelineState>> {
    let mut builder = GraphBuilder::<PipelineState>::new();

    let classifier = Arc::clone(&collaborators.classifier);
    builder.add_step(VISION_ROUTER, &["classification"], move |state| {
        nodes::classify(Arc::clone(&classifier), state)
    });

    for (name, classification) in [
        (EXTRACT_EVENT, Classification::Event),
        (EXTRACT_RECEIPT, Classification::Receipt),
        (EXTRACT_CODE, Classification::Code),
    ] {
        let extractor = Arc::clone(&collaborators.extractor);
        builder.add_step(name, &["extracted_data"], move |state| {
            nodes::extract(Arc::clone(&extractor), classification, state)
        });
        builder.add_edge(name, HUMAN_REVIEW);
    }

    builder.add_barrier(HUMAN_REVIEW);

    for (name, classification) in [
        (TOOL_CALENDAR, Classification::Event),
        (TOOL_EXPENSE, Classification::Receipt),
        (TOOL_NOTES, Classification::Code),
    ] {
        let actions = Arc::clone(&collaborators.actions);
        builder.add_step(name, &["action_result"], move |state| {
            nodes::act(Arc::clone(&actions), classification, state)
        });
        builder.add_edge(name, END);
    }

    builder
        .set_entry(VISION_ROUTER)
        .add_conditional_edge(
            VISION_ROUTER,
            route_extraction,
            [
                (Classification::Event, EXTRACT_EVENT),
                (Classification::Receipt, EXTRACT_RECEIPT),
                (Classification::Code, EXTRACT_CODE),
                (Classification::Unknown, HUMAN_REVIEW),
            ],
        )
        .add_conditional_edge(
            HUMAN_REVIEW,
            route_action,
            [
                (ActionRoute::Calendar, TOOL_CALENDAR),
                (ActionRoute::Expenses, TOOL_EXPENSE),
                (ActionRoute::Notes, TOOL_NOTES),
                (ActionRoute::Finish, END),
            ],
        )
        .interrupt_before(HUMAN_REVIEW)
        .external_writes(&["human_decision"]);

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::stub_collaborators;
    use pixelpipe_core::StepKind;

    #[test]
    fn test_pipeline_graph_builds() {
        let graph = build_graph(&stub_collaborators().0).unwrap();

        assert_eq!(graph.entry(), VISION_ROUTER);
        assert!(graph.is_interrupt_point(HUMAN_REVIEW));
        assert_eq!(graph.step(HUMAN_REVIEW).unwrap().kind, StepKind::Barrier);
        assert_eq!(graph.steps().count(), 8);
        assert_eq!(graph.external_writes(), &["human_decision"]);
        for tool in [TOOL_CALENDAR, TOOL_EXPENSE, TOOL_NOTES] {
            assert_eq!(graph.step(tool).unwrap().writes, vec!["action_result"]);
        }
    }

    #[test]
    fn test_description_shows_routes() {
        let graph = build_graph(&stub_collaborators().0).unwrap();
        let text = graph.describe();

        assert!(text.contains("vision_router -. UNKNOWN .-> human_review"));
        assert!(text.contains("human_review -. Finish .-> __end__([__end__])"));
        assert!(text.contains("class human_review interrupt"));
    }
}
