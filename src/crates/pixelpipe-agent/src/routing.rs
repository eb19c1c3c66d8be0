//! Routers of the screenshot pipeline.

use crate::state::{Classification, PipelineState};
use pixelpipe_core::RouteKey;

/// Which extraction step to run. An unset classification counts as `UNKNOWN`.
pub fn route_extraction(state: &PipelineState) -> Classification {
    state.classification.unwrap_or(Classification::Unknown)
}

/// Outcome of the approval router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionRoute {
    Calendar,
    Expenses,
    Notes,
    /// Terminate without acting.
    Finish,
}

impl RouteKey for ActionRoute {
    fn domain() -> &'static [Self] {
        &[
            ActionRoute::Calendar,
            ActionRoute::Expenses,
            ActionRoute::Notes,
            ActionRoute::Finish,
        ]
    }
}

/// Pick the action for an approved, extracted session; finish otherwise.
pub fn route_action(state: &PipelineState) -> ActionRoute {
    if !state.is_approved() || state.extracted_data.is_none() {
        return ActionRoute::Finish;
    }
    match state.classification {
        Some(Classification::Event) => ActionRoute::Calendar,
        Some(Classification::Receipt) => ActionRoute::Expenses,
        Some(Classification::Code) => ActionRoute::Notes,
        Some(Classification::Unknown) | None => ActionRoute::Finish,
    }
}
