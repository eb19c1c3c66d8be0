//! The merge contract between steps and the running state.
//!
//! Steps never mutate the state. They return a [`PartialUpdate`] naming the
//! fields they set, and the engine folds it in with [`GraphState::merge`].
//! Merging is per top-level field: a set field overwrites, nested values are
//! replaced whole.
//!
//! Implementations encode their field invariants (write-once fields, legal
//! transitions, shape constraints) inside `merge`. The engine only ever calls
//! [`GraphState::merged`], which works on a copy, so a rejected update never
//! leaves a half-applied state behind.

use crate::error::StateError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A sparse update produced by one step.
pub trait PartialUpdate:
    Clone + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Names of the state fields this update sets, matching their serialized keys.
    fn fields(&self) -> Vec<&'static str>;

    fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// State threaded through a graph.
pub trait GraphState: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Update: PartialUpdate;

    /// Check a state handed to [`Engine::start`](crate::Engine::start) before
    /// it becomes the first checkpoint.
    fn validate_initial(&self) -> Result<(), StateError> {
        Ok(())
    }

    /// Fold `update` into `self`, or reject it.
    ///
    /// May leave `self` partially modified on error; use [`merged`](Self::merged)
    /// for all-or-nothing semantics.
    fn merge(&mut self, update: Self::Update) -> Result<(), StateError>;

    /// The state that results from applying `update`, leaving `self` untouched.
    fn merged(&self, update: Self::Update) -> Result<Self, StateError> {
        let mut next = self.clone();
        next.merge(update)?;
        Ok(next)
    }
}
