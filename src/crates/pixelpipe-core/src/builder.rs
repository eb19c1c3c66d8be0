//! Graph construction and build-time validation.
//!
//! [`GraphBuilder`] collects steps, edges, the entry point and interrupt
//! points, then [`build`](GraphBuilder::build) checks the whole definition at
//! once and reports every problem found in a single
//! [`EngineError::Configuration`]:
//!
//! - exactly one entry step
//! - step names are unique and not reserved (`__start__`, `__end__`)
//! - every edge source and target is a declared step (or `__end__`)
//! - at most one outgoing edge per step
//! - every conditional router maps its whole key domain
//! - interrupt points name declared steps
//! - every step is reachable from the entry
//!
//! Fields that callers may patch through
//! [`Engine::update_state`](crate::Engine::update_state) are declared with
//! [`external_writes`](GraphBuilder::external_writes); by default none are.
//!
//! # Example
//!
//! ```rust
//! use pixelpipe_core::{GraphBuilder, GraphState, PartialUpdate, RouteKey, StateError};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Doc { text: String, shouted: bool }
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct DocUpdate { text: Option<String> }
//!
//! impl PartialUpdate for DocUpdate {
//!     fn fields(&self) -> Vec<&'static str> {
//!         self.text.iter().map(|_| "text").collect()
//!     }
//! }
//!
//! impl GraphState for Doc {
//!     type Update = DocUpdate;
//!     fn merge(&mut self, update: DocUpdate) -> Result<(), StateError> {
//!         if let Some(text) = update.text { self.text = text; }
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Loud { Yes, No }
//!
//! impl RouteKey for Loud {
//!     fn domain() -> &'static [Self] { &[Loud::Yes, Loud::No] }
//! }
//!
//! let mut builder = GraphBuilder::<Doc>::new();
//! builder
//!     .add_step("read", &[], |_doc| async { Ok(DocUpdate::default()) })
//!     .add_step("shout", &["text"], |doc: Doc| async move {
//!         Ok(DocUpdate { text: Some(doc.text.to_uppercase()) })
//!     })
//!     .add_barrier("review")
//!     .set_entry("read")
//!     .add_conditional_edge(
//!         "read",
//!         |doc: &Doc| if doc.shouted { Loud::Yes } else { Loud::No },
//!         [(Loud::Yes, "shout"), (Loud::No, "review")],
//!     )
//!     .add_edge("shout", "review")
//!     .interrupt_before("review");
//!
//! let graph = builder.build().unwrap();
//! assert_eq!(graph.entry(), "read");
//! ```

use crate::error::{EngineError, Result, StepError};
use crate::graph::{Edge, Graph, RouterFn, Step, StepExecutor, StepKind};
use crate::interrupt::InterruptConfig;
use crate::route::{RouteKey, Target, END, START};
use crate::state::GraphState;
use futures::FutureExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

/// Mutable graph definition.
pub struct GraphBuilder<S: GraphState> {
    steps: Vec<Step<S>>,
    edges: Vec<(String, Edge<S>)>,
    entries: Vec<String>,
    interrupts: InterruptConfig,
    external_writes: Vec<&'static str>,
    problems: Vec<String>,
}

impl<S: GraphState> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            edges: Vec::new(),
            entries: Vec::new(),
            interrupts: InterruptConfig::new(),
            external_writes: Vec::new(),
            problems: Vec::new(),
        }
    }

    /// Register a transform step that may write the fields in `writes`.
    pub fn add_step<F, Fut>(
        &mut self,
        name: impl Into<String>,
        writes: &[&'static str],
        step: F,
    ) -> &mut Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<S::Update, StepError>> + Send + 'static,
    {
        let executor: StepExecutor<S> = Arc::new(move |state| step(state).boxed());
        self.push_step(name.into(), StepKind::Transform, writes.to_vec(), executor)
    }

    /// Register a no-op step, typically used as an interrupt point.
    pub fn add_barrier(&mut self, name: impl Into<String>) -> &mut Self {
        let executor: StepExecutor<S> =
            Arc::new(|_state| futures::future::ready(Ok(S::Update::default())).boxed());
        self.push_step(name.into(), StepKind::Barrier, Vec::new(), executor)
    }

    fn push_step(
        &mut self,
        name: String,
        kind: StepKind,
        writes: Vec<&'static str>,
        executor: StepExecutor<S>,
    ) -> &mut Self {
        if name.is_empty() || name == START || name == END {
            self.problems.push(format!("'{name}' is not a valid step name"));
        } else if self.steps.iter().any(|s| s.name == name) {
            self.problems.push(format!("step '{name}' is declared twice"));
        } else {
            self.steps.push(Step {
                name,
                kind,
                writes,
                executor,
            });
        }
        self
    }

    /// Add a plain edge. `to` may be [`END`]; an edge from [`START`] declares the entry.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        let from = from.into();
        let to = to.into();
        if from == START {
            return self.set_entry(to);
        }
        self.edges.push((from, Edge::Direct(Target::from(to))));
        self
    }

    /// Add an edge whose target is chosen by `router` from a closed key set.
    ///
    /// Each key in `K::domain()` must appear in `branches`; a branch target of
    /// [`END`] terminates the session.
    pub fn add_conditional_edge<K, R, B, T>(
        &mut self,
        from: impl Into<String>,
        router: R,
        branches: B,
    ) -> &mut Self
    where
        K: RouteKey,
        R: Fn(&S) -> K + Send + Sync + 'static,
        B: IntoIterator<Item = (K, T)>,
        T: Into<String>,
    {
        let from = from.into();
        let mut mapping: HashMap<K, Target> = HashMap::new();
        let mut labelled = Vec::new();

        for (key, target) in branches {
            let target = Target::from(target.into());
            if mapping.insert(key, target.clone()).is_some() {
                self.problems
                    .push(format!("router on '{from}' maps {} twice", key.label()));
                continue;
            }
            labelled.push((key.label(), target));
        }
        for key in K::domain() {
            if !mapping.contains_key(key) {
                self.problems
                    .push(format!("router on '{from}' has no target for {}", key.label()));
            }
        }

        let source = from.clone();
        let router: RouterFn<S> = Arc::new(move |state| {
            let key = router(state);
            match mapping.get(&key) {
                Some(target) => target.clone(),
                None => {
                    tracing::warn!(
                        step = %source,
                        key = %key.label(),
                        "Unmapped route; terminating"
                    );
                    Target::End
                }
            }
        });

        self.edges.push((
            from,
            Edge::Conditional {
                router,
                branches: labelled,
            },
        ));
        self
    }

    pub fn set_entry(&mut self, step: impl Into<String>) -> &mut Self {
        self.entries.push(step.into());
        self
    }

    /// Pause sessions immediately before `step` runs.
    pub fn interrupt_before(&mut self, step: impl Into<String>) -> &mut Self {
        self.interrupts.add(step);
        self
    }

    /// Allow external updates to set `fields` while a session is paused.
    pub fn external_writes(&mut self, fields: &[&'static str]) -> &mut Self {
        for &field in fields {
            if !self.external_writes.contains(&field) {
                self.external_writes.push(field);
            }
        }
        self
    }

    /// Validate and freeze the definition.
    pub fn build(self) -> Result<Graph<S>> {
        let GraphBuilder {
            steps,
            edges,
            entries,
            interrupts,
            external_writes,
            mut problems,
        } = self;

        let order: Vec<String> = steps.iter().map(|s| s.name.clone()).collect();
        let declared: HashSet<&str> = order.iter().map(String::as_str).collect();

        match entries.as_slice() {
            [] => problems.push("no entry step declared".to_string()),
            [entry] if !declared.contains(entry.as_str()) => {
                problems.push(format!("entry step '{entry}' is not declared"))
            }
            [_] => {}
            many => problems.push(format!("multiple entry steps declared: {}", many.join(", "))),
        }

        let mut outgoing: HashMap<String, Edge<S>> = HashMap::new();
        for (from, edge) in edges {
            if !declared.contains(from.as_str()) {
                problems.push(format!("edge source '{from}' is not declared"));
            }
            for target in edge.targets() {
                if let Target::Step(name) = target {
                    if !declared.contains(name.as_str()) {
                        problems.push(format!(
                            "edge '{from}' -> '{name}' targets an undeclared step"
                        ));
                    }
                }
            }
            if outgoing.contains_key(&from) {
                problems.push(format!("step '{from}' has more than one outgoing edge"));
                continue;
            }
            outgoing.insert(from, edge);
        }

        for name in &interrupts.interrupt_before {
            if !declared.contains(name.as_str()) {
                problems.push(format!("interrupt point '{name}' is not declared"));
            }
        }

        if problems.is_empty() {
            if let Some(entry) = entries.first() {
                let reachable = reachable_from(entry, &outgoing);
                for name in &order {
                    if !reachable.contains(name.as_str()) {
                        problems.push(format!("step '{name}' is unreachable from '{entry}'"));
                    }
                }
            }
        }

        if !problems.is_empty() {
            return Err(EngineError::Configuration(problems.join("; ")));
        }

        let entry = entries.into_iter().next().unwrap_or_default();
        tracing::debug!(entry = %entry, steps = order.len(), "Graph built");

        Ok(Graph {
            steps: steps.into_iter().map(|s| (s.name.clone(), s)).collect(),
            order,
            edges: outgoing,
            entry,
            interrupts,
            external_writes,
        })
    }
}

impl<S: GraphState> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn reachable_from<'a, S: GraphState>(
    entry: &'a str,
    edges: &'a HashMap<String, Edge<S>>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::from([entry]);
    let mut queue = VecDeque::from([entry]);
    while let Some(current) = queue.pop_front() {
        let Some(edge) = edges.get(current) else {
            continue;
        };
        for target in edge.targets() {
            if let Target::Step(name) = target {
                if seen.insert(name.as_str()) {
                    queue.push_back(name.as_str());
                }
            }
        }
    }
    seen
}
