//! Terminal action integrations.
//!
//! The three integrations report their effect through `tracing` under the
//! `pixelpipe::actions` target and return `Success`. [`ActionDispatcher`]
//! selects one by classification.

use crate::collaborators::ActionRunner;
use crate::error::CollaboratorError;
use crate::state::{ActionResult, Classification, CodeData, EventData, ExtractedData, ReceiptData};
use async_trait::async_trait;

/// Creates calendar entries for events.
#[derive(Debug, Clone, Default)]
pub struct CalendarAction;

impl CalendarAction {
    pub fn create(&self, event: &EventData) -> ActionResult {
        tracing::info!(
            target: "pixelpipe::actions",
            title = %event.title,
            date = %event.date,
            time = %event.time,
            "Calendar: Created '{}' on {} at {}",
            event.title,
            event.date,
            event.time
        );
        ActionResult::Success
    }
}

/// Logs receipts as expenses.
#[derive(Debug, Clone, Default)]
pub struct ExpenseLedger;

impl ExpenseLedger {
    pub fn log(&self, receipt: &ReceiptData) -> ActionResult {
        tracing::info!(
            target: "pixelpipe::actions",
            merchant = %receipt.merchant,
            total = %receipt.total,
            "Expenses: Logged {} at {}",
            receipt.total,
            receipt.merchant
        );
        ActionResult::Success
    }
}

/// Stores suggested fixes for code errors.
#[derive(Debug, Clone, Default)]
pub struct NoteStore;

impl NoteStore {
    pub fn save(&self, code: &CodeData) -> ActionResult {
        tracing::info!(
            target: "pixelpipe::actions",
            language = %code.language,
            "Notes: Saved fix for {} error",
            code.language
        );
        ActionResult::Success
    }
}

/// Routes extracted data to the integration for its classification.
#[derive(Debug, Clone, Default)]
pub struct ActionDispatcher {
    calendar: CalendarAction,
    ledger: ExpenseLedger,
    notes: NoteStore,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionRunner for ActionDispatcher {
    async fn run(
        &self,
        classification: Classification,
        data: &ExtractedData,
    ) -> Result<ActionResult, CollaboratorError> {
        match (classification, data) {
            (Classification::Event, ExtractedData::Event(event)) => {
                Ok(self.calendar.create(event))
            }
            (Classification::Receipt, ExtractedData::Receipt(receipt)) => {
                Ok(self.ledger.log(receipt))
            }
            (Classification::Code, ExtractedData::Code(code)) => Ok(self.notes.save(code)),
            (classification, data) => Err(CollaboratorError::InvalidResponse(format!(
                "no action for {classification} with {} data",
                data.classification()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_data;

    #[tokio::test]
    async fn test_dispatch_by_classification() {
        let dispatcher = ActionDispatcher::new();
        for classification in [
            Classification::Event,
            Classification::Receipt,
            Classification::Code,
        ] {
            let data = sample_data(classification).unwrap();
            assert_eq!(
                dispatcher.run(classification, &data).await.unwrap(),
                ActionResult::Success
            );
        }
    }

    #[tokio::test]
    async fn test_mismatched_data_is_rejected() {
        let dispatcher = ActionDispatcher::new();
        let receipt = sample_data(Classification::Receipt).unwrap();

        assert!(dispatcher.run(Classification::Event, &receipt).await.is_err());
        assert!(dispatcher.run(Classification::Unknown, &receipt).await.is_err());
    }
}
