//! Immutable step graph.
//!
//! A [`Graph`] is produced by [`GraphBuilder::build`](crate::GraphBuilder::build)
//! and never changes afterwards. It owns the steps, at most one outgoing
//! edge per step (plain or conditional), the entry step and the interrupt
//! points. A step without an outgoing edge is terminal.
//!
//! # Visualization
//!
//! [`Graph::describe`] renders a Mermaid flowchart:
//!
//! ```text
//! flowchart TD
//!     __start__([__start__]) --> classify
//!     classify -. EVENT .-> extract
//!     classify -. UNKNOWN .-> review
//!     extract --> review
//!     review --> __end__([__end__])
//!     class review interrupt
//! ```

use crate::error::StepError;
use crate::interrupt::InterruptConfig;
use crate::route::{Target, END, START};
use crate::state::GraphState;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

/// Future returned by a step executor.
pub type StepFuture<U> = BoxFuture<'static, Result<U, StepError>>;

/// Type-erased step body.
pub type StepExecutor<S> =
    Arc<dyn Fn(S) -> StepFuture<<S as GraphState>::Update> + Send + Sync>;

/// Type-erased router of a conditional edge.
pub type RouterFn<S> = Arc<dyn Fn(&S) -> Target + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Produces a partial update from the state.
    Transform,
    /// Does nothing; exists to be paused before.
    Barrier,
}

/// A named unit of work.
pub struct Step<S: GraphState> {
    pub name: String,
    pub kind: StepKind,
    /// State fields this step may set.
    pub writes: Vec<&'static str>,
    pub(crate) executor: StepExecutor<S>,
}

impl<S: GraphState> Step<S> {
    pub fn owns(&self, field: &str) -> bool {
        self.writes.iter().any(|owned| *owned == field)
    }

    /// Run the step against a snapshot of the state.
    pub fn execute(&self, state: S) -> StepFuture<S::Update> {
        (self.executor)(state)
    }
}

impl<S: GraphState> fmt::Debug for Step<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("writes", &self.writes)
            .finish()
    }
}

/// Outgoing edge of a step.
pub enum Edge<S: GraphState> {
    Direct(Target),
    Conditional {
        router: RouterFn<S>,
        /// `(route label, target)` in declaration order.
        branches: Vec<(String, Target)>,
    },
}

impl<S: GraphState> Edge<S> {
    /// Every target this edge can lead to.
    pub fn targets(&self) -> Vec<&Target> {
        match self {
            Edge::Direct(target) => vec![target],
            Edge::Conditional { branches, .. } => branches.iter().map(|(_, t)| t).collect(),
        }
    }
}

impl<S: GraphState> fmt::Debug for Edge<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(target) => f.debug_tuple("Direct").field(target).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("branches", branches)
                .finish_non_exhaustive(),
        }
    }
}

/// Validated, immutable workflow topology.
pub struct Graph<S: GraphState> {
    pub(crate) steps: HashMap<String, Step<S>>,
    /// Declaration order, for stable descriptions.
    pub(crate) order: Vec<String>,
    pub(crate) edges: HashMap<String, Edge<S>>,
    pub(crate) entry: String,
    pub(crate) interrupts: InterruptConfig,
    /// Fields an external update may set.
    pub(crate) external_writes: Vec<&'static str>,
}

impl<S: GraphState> Graph<S> {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn step(&self, name: &str) -> Option<&Step<S>> {
        self.steps.get(name)
    }

    /// Steps in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &Step<S>> {
        self.order.iter().filter_map(|name| self.steps.get(name))
    }

    pub fn edge(&self, from: &str) -> Option<&Edge<S>> {
        self.edges.get(from)
    }

    pub fn interrupts(&self) -> &InterruptConfig {
        &self.interrupts
    }

    pub fn is_interrupt_point(&self, step: &str) -> bool {
        self.interrupts.should_interrupt_before(step)
    }

    pub fn external_writes(&self) -> &[&'static str] {
        &self.external_writes
    }

    pub fn accepts_external(&self, field: &str) -> bool {
        self.external_writes.iter().any(|owned| *owned == field)
    }

    /// Resolve the step that follows `from` for `state`. No edge means the session ends.
    pub fn route(&self, from: &str, state: &S) -> Target {
        match self.edges.get(from) {
            None => Target::End,
            Some(Edge::Direct(target)) => target.clone(),
            Some(Edge::Conditional { router, .. }) => router(state),
        }
    }

    /// Mermaid flowchart of the topology.
    pub fn describe(&self) -> String {
        let mut out = String::from("flowchart TD\n");

        let _ = writeln!(out, "    {} --> {}", mermaid_node(START), mermaid_node(&self.entry));
        for name in &self.order {
            match self.edges.get(name) {
                None => {
                    let _ = writeln!(out, "    {} --> {}", mermaid_node(name), mermaid_node(END));
                }
                Some(Edge::Direct(target)) => {
                    let _ = writeln!(
                        out,
                        "    {} --> {}",
                        mermaid_node(name),
                        mermaid_node(target.name())
                    );
                }
                Some(Edge::Conditional { branches, .. }) => {
                    for (label, target) in branches {
                        let _ = writeln!(
                            out,
                            "    {} -. {} .-> {}",
                            mermaid_node(name),
                            label,
                            mermaid_node(target.name())
                        );
                    }
                }
            }
        }
        for name in &self.interrupts.interrupt_before {
            let _ = writeln!(out, "    class {name} interrupt");
        }
        out
    }
}

fn mermaid_node(name: &str) -> String {
    if name == START || name == END {
        format!("{name}([{name}])")
    } else {
        name.to_string()
    }
}

impl<S: GraphState> fmt::Debug for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("entry", &self.entry)
            .field("steps", &self.order)
            .field("edges", &self.edges)
            .field("interrupts", &self.interrupts)
            .field("external_writes", &self.external_writes)
            .finish()
    }
}
