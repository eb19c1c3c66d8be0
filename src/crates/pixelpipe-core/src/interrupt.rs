//! Interrupt points.
//!
//! An interrupt point pauses a session *before* the named step runs. The
//! state of the previous step is already persisted at that moment, so a
//! caller can inspect or patch it, then resume. Resuming executes the step the
//! pause occurred before; it is never skipped.

use serde::{Deserialize, Serialize};

/// Steps to pause before.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptConfig {
    pub interrupt_before: Vec<String>,
}

impl InterruptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set steps to interrupt before
    pub fn with_interrupt_before<I, N>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.interrupt_before = steps.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn add(&mut self, step: impl Into<String>) {
        let step = step.into();
        if !self.interrupt_before.contains(&step) {
            self.interrupt_before.push(step);
        }
    }

    /// Check if should interrupt before a specific step
    pub fn should_interrupt_before(&self, step: &str) -> bool {
        self.interrupt_before.iter().any(|s| s == step)
    }
}
