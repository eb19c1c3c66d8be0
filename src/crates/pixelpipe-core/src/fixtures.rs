//! Small state and graph shared by unit tests.

use crate::builder::GraphBuilder;
use crate::error::StateError;
use crate::graph::Graph;
use crate::route::RouteKey;
use crate::state::{GraphState, PartialUpdate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub label: String,
    pub value: i64,
    pub approved: Option<bool>,
}

impl Counter {
    pub fn new(label: &str, value: i64) -> Self {
        Self {
            label: label.to_string(),
            value,
            approved: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
}

impl PartialUpdate for CounterUpdate {
    fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.value.is_some() {
            fields.push("value");
        }
        if self.approved.is_some() {
            fields.push("approved");
        }
        fields
    }
}

impl GraphState for Counter {
    type Update = CounterUpdate;

    fn merge(&mut self, update: CounterUpdate) -> Result<(), StateError> {
        if let Some(value) = update.value {
            self.value = value;
        }
        if let Some(approved) = update.approved {
            match self.approved {
                Some(current) if current != approved => {
                    return Err(StateError::Transition {
                        field: "approved".into(),
                        from: current.to_string(),
                        to: approved.to_string(),
                    })
                }
                _ => self.approved = Some(approved),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    Even,
    Odd,
}

impl RouteKey for Parity {
    fn domain() -> &'static [Self] {
        &[Parity::Even, Parity::Odd]
    }
}

/// `classify` routes even values to `halve` (terminal) and odd values through
/// `bump` to the `review` interrupt point. Only `approved` is externally writable.
pub fn parity_graph() -> Graph<Counter> {
    let mut builder = GraphBuilder::new();
    builder
        .add_step("classify", &[], |_c| async { Ok(CounterUpdate::default()) })
        .add_step("halve", &["value"], |c: Counter| async move {
            Ok(CounterUpdate {
                value: Some(c.value / 2),
                ..Default::default()
            })
        })
        .add_step("bump", &["value"], |c: Counter| async move {
            Ok(CounterUpdate {
                value: Some(c.value + 1),
                ..Default::default()
            })
        })
        .add_barrier("review")
        .set_entry("classify")
        .add_conditional_edge(
            "classify",
            |c: &Counter| {
                if c.value % 2 == 0 {
                    Parity::Even
                } else {
                    Parity::Odd
                }
            },
            [(Parity::Even, "halve"), (Parity::Odd, "bump")],
        )
        .add_edge("bump", "review")
        .interrupt_before("review")
        .external_writes(&["approved"]);

    match builder.build() {
        Ok(graph) => graph,
        Err(err) => panic!("fixture graph is invalid: {err}"),
    }
}
