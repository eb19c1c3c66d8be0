//! Router keys and edge targets.
//!
//! A conditional edge is declared with a closed enum implementing
//! [`RouteKey`]. The builder checks that every value of
//! [`RouteKey::domain`] has a target, so an unmapped key is a build error
//! instead of a run-time surprise.

use std::fmt::{self, Debug};
use std::hash::Hash;

/// Name of the virtual node edges leave from to reach the entry step.
pub const START: &str = "__start__";

/// Name of the virtual node that terminates a session.
pub const END: &str = "__end__";

/// Closed set of values a router may return.
pub trait RouteKey: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every value the router can produce.
    fn domain() -> &'static [Self];

    /// Label used when describing the edge.
    fn label(&self) -> String {
        format!("{self:?}")
    }
}

/// Where an edge leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Step(String),
    End,
}

impl Target {
    pub fn step(name: impl Into<String>) -> Self {
        Target::Step(name.into())
    }

    /// Step name, or [`END`].
    pub fn name(&self) -> &str {
        match self {
            Target::Step(name) => name,
            Target::End => END,
        }
    }

    pub fn into_step(self) -> Option<String> {
        match self {
            Target::Step(name) => Some(name),
            Target::End => None,
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        if name == END {
            Target::End
        } else {
            Target::Step(name.to_string())
        }
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::from(name.as_str())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_name_maps_to_end() {
        assert_eq!(Target::from(END), Target::End);
        assert_eq!(Target::from("review"), Target::step("review"));
        assert_eq!(Target::End.into_step(), None);
        assert_eq!(Target::step("a").to_string(), "a");
    }
}
