//! Pipeline state, extraction schemas and their merge rules.
//!
//! ```text
//! {
//!   "artifact_ref": "screens/standup.png",
//!   "classification": "EVENT",
//!   "extracted_data": {"title": "Standup", "date": "2024-06-01", "time": "09:00", "attendees": null},
//!   "human_decision": "APPROVED",
//!   "action_result": "Success"
//! }
//! ```
//!
//! Field rules enforced by [`PipelineState::merge`](pixelpipe_core::GraphState::merge):
//!
//! | Field | Rule |
//! |-------|------|
//! | `artifact_ref` | immutable |
//! | `classification` | unset -> value, then fixed |
//! | `extracted_data` | shape must match `classification` |
//! | `human_decision` | unset -> APPROVED / REJECTED, then fixed |
//! | `action_result` | only after APPROVED |
//!
//! A session starts with only `artifact_ref` set.

use pixelpipe_core::{GraphState, PartialUpdate, RouteKey, StateError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a screenshot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    /// Calendar entries, invitations, dates.
    Event,
    /// Shopping receipts and bills.
    Receipt,
    /// Programming errors.
    Code,
    Unknown,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Event,
        Classification::Receipt,
        Classification::Code,
        Classification::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Event => "EVENT",
            Classification::Receipt => "RECEIPT",
            Classification::Code => "CODE",
            Classification::Unknown => "UNKNOWN",
        }
    }
}

impl RouteKey for Classification {
    fn domain() -> &'static [Self] {
        &Self::ALL
    }

    fn label(&self) -> String {
        self.as_str().to_string()
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown classification '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    pub title: String,
    /// YYYY-MM-DD
    pub date: String,
    pub time: String,
    /// Names of people mentioned, if any.
    #[serde(default)]
    pub attendees: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub merchant: String,
    /// Total amount with currency.
    pub total: String,
    pub date: String,
    /// Comma-separated list of top items.
    pub items: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeData {
    pub language: String,
    pub error_msg: String,
    pub suggested_fix: String,
}

/// Structured data pulled out of an artifact; the variant follows the classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedData {
    Event(EventData),
    Receipt(ReceiptData),
    Code(CodeData),
}

impl ExtractedData {
    /// The classification whose schema this data follows.
    pub fn classification(&self) -> Classification {
        match self {
            ExtractedData::Event(_) => Classification::Event,
            ExtractedData::Receipt(_) => Classification::Receipt,
            ExtractedData::Code(_) => Classification::Code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HumanDecision {
    Approved,
    Rejected,
}

impl HumanDecision {
    /// `APPROVED` (any case) approves; any other input rejects.
    pub fn from_input(input: &str) -> Self {
        if input.trim().eq_ignore_ascii_case("APPROVED") {
            HumanDecision::Approved
        } else {
            HumanDecision::Rejected
        }
    }
}

impl fmt::Display for HumanDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HumanDecision::Approved => f.write_str("APPROVED"),
            HumanDecision::Rejected => f.write_str("REJECTED"),
        }
    }
}

/// Outcome of the terminal action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResult {
    Success,
    Failure(String),
}

impl ActionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success)
    }
}

/// The record threaded through every step of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub artifact_ref: String,
    pub classification: Option<Classification>,
    pub extracted_data: Option<ExtractedData>,
    pub human_decision: Option<HumanDecision>,
    pub action_result: Option<ActionResult>,
}

impl PipelineState {
    /// Fresh state for a session over `artifact_ref`.
    pub fn new(artifact_ref: impl Into<String>) -> Self {
        Self {
            artifact_ref: artifact_ref.into(),
            ..Default::default()
        }
    }

    pub fn is_approved(&self) -> bool {
        self.human_decision == Some(HumanDecision::Approved)
    }
}

/// Sparse update returned by a pipeline step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_decision: Option<HumanDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_result: Option<ActionResult>,
}

impl PipelineUpdate {
    pub fn classified(classification: Classification) -> Self {
        Self {
            classification: Some(classification),
            ..Default::default()
        }
    }

    pub fn extracted(data: ExtractedData) -> Self {
        Self {
            extracted_data: Some(data),
            ..Default::default()
        }
    }

    pub fn decided(decision: HumanDecision) -> Self {
        Self {
            human_decision: Some(decision),
            ..Default::default()
        }
    }

    pub fn acted(result: ActionResult) -> Self {
        Self {
            action_result: Some(result),
            ..Default::default()
        }
    }
}

impl PartialUpdate for PipelineUpdate {
    fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.artifact_ref.is_some() {
            fields.push("artifact_ref");
        }
        if self.classification.is_some() {
            fields.push("classification");
        }
        if self.extracted_data.is_some() {
            fields.push("extracted_data");
        }
        if self.human_decision.is_some() {
            fields.push("human_decision");
        }
        if self.action_result.is_some() {
            fields.push("action_result");
        }
        fields
    }
}

/// Set a write-once field, accepting a repeat of the same value.
fn set_once<T>(field: &str, slot: &mut Option<T>, value: T) -> Result<(), StateError>
where
    T: PartialEq + fmt::Debug,
{
    match slot {
        Some(current) if *current != value => Err(StateError::Transition {
            field: field.to_string(),
            from: format!("{current:?}"),
            to: format!("{value:?}"),
        }),
        _ => {
            *slot = Some(value);
            Ok(())
        }
    }
}

impl GraphState for PipelineState {
    type Update = PipelineUpdate;

    fn validate_initial(&self) -> Result<(), StateError> {
        let set = [
            ("classification", self.classification.is_some()),
            ("extracted_data", self.extracted_data.is_some()),
            ("human_decision", self.human_decision.is_some()),
            ("action_result", self.action_result.is_some()),
        ];
        match set.into_iter().find(|(_, is_set)| *is_set) {
            Some((field, _)) => Err(StateError::Shape {
                field: field.to_string(),
                reason: "must be unset when a session starts".to_string(),
            }),
            None => Ok(()),
        }
    }

    fn merge(&mut self, update: PipelineUpdate) -> Result<(), StateError> {
        if let Some(artifact_ref) = update.artifact_ref {
            if artifact_ref != self.artifact_ref {
                return Err(StateError::Immutable("artifact_ref".to_string()));
            }
        }

        if let Some(classification) = update.classification {
            set_once("classification", &mut self.classification, classification)?;
        }

        if let Some(data) = update.extracted_data {
            let expected = self.classification;
            if expected != Some(data.classification()) {
                return Err(StateError::Shape {
                    field: "extracted_data".to_string(),
                    reason: format!(
                        "{} data does not match classification {}",
                        data.classification(),
                        expected.map_or("<unset>".to_string(), |c| c.to_string())
                    ),
                });
            }
            self.extracted_data = Some(data);
        }

        if let Some(decision) = update.human_decision {
            set_once("human_decision", &mut self.human_decision, decision)?;
        }

        if let Some(result) = update.action_result {
            if !self.is_approved() {
                return Err(StateError::Shape {
                    field: "action_result".to_string(),
                    reason: "no approved decision".to_string(),
                });
            }
            self.action_result = Some(result);
        }

        Ok(())
    }
}
