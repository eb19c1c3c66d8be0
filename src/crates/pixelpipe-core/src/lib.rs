//! # pixelpipe-core
//!
//! A small workflow engine: a directed graph of steps with closed-enum
//! routers, checkpointing after every step, and pause-before interrupt points
//! that let an external actor inspect and patch state before execution
//! continues.
//!
//! ## Building blocks
//!
//! | Type | Role |
//! |------|------|
//! | [`GraphState`] / [`PartialUpdate`] | state threaded through the graph and the sparse updates steps return |
//! | [`GraphBuilder`] | declares steps, edges, entry and interrupt points; validates on `build` |
//! | [`RouteKey`] | closed set of values a conditional edge's router returns |
//! | [`Graph`] | immutable, validated topology |
//! | [`Engine`] | runs sessions: `start`, `resume`, `update_state`, `get_state`, `cancel` |
//!
//! Persistence goes through [`pixelpipe_checkpoint::Checkpointer`].
//!
//! ## Lifecycle of a session
//!
//! ```text
//! start ──► entry step ──► … ──► PAUSED(before interrupt point)
//!                                   │ update_state (inspect / patch)
//!                                   ▼
//!                                resume ──► interrupt step runs ──► … ──► DONE
//! ```
//!
//! A step that fails marks the session `FAILED` with its last good state and
//! the error text recorded. `DONE` and `FAILED` are final.

pub mod builder;
pub mod engine;
pub mod error;
pub mod graph;
pub mod interrupt;
pub mod route;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod fixtures;

pub use builder::GraphBuilder;
pub use engine::{Engine, EngineConfig, Snapshot};
pub use error::{EngineError, Result, StateError, StepError};
pub use graph::{Edge, Graph, Step, StepKind};
pub use interrupt::InterruptConfig;
pub use route::{RouteKey, Target, END, START};
pub use session::{SessionGuard, SessionRegistry};
pub use state::{GraphState, PartialUpdate};

pub use pixelpipe_checkpoint::{EngineStatus, SessionRecord};
