//! Built-in call-handling tools
//!
//! Each tool performs a lookup or side effect against an external
//! collaborator and returns a structured result map; where relevant it also
//! yields extracted facts (caller name, intent, tentative booking time) for
//! the conversation tracker.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use callbridge_core::{CallerType, FactsUpdate};

use crate::integrations::{CallerMessage, MessageStore, SchedulingService};
use crate::tool::{optional_str, required_str, Tool, ToolError, ToolOutput, ToolSchema};

/// Parse a spoken-style or ISO timestamp into UTC.
fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, ToolError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            ToolError::invalid_arguments(format!(
                "could not parse datetime '{raw}' (expected RFC3339 or YYYY-MM-DD HH:MM)"
            ))
        })
}

fn parse_caller_type(raw: Option<&str>) -> Option<CallerType> {
    match raw?.to_ascii_lowercase().as_str() {
        "new" => Some(CallerType::New),
        "returning" | "existing" => Some(CallerType::Returning),
        _ => None,
    }
}

/// Check upcoming availability with the scheduling backend.
pub struct CheckAvailabilityTool {
    scheduler: Arc<dyn SchedulingService>,
}

impl CheckAvailabilityTool {
    pub fn new(scheduler: Arc<dyn SchedulingService>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &str {
        "check_availability"
    }

    fn description(&self) -> &str {
        "Check upcoming appointment availability"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::object(
            self.name(),
            self.description(),
            &[(
                "from",
                "Earliest acceptable time (RFC3339 or YYYY-MM-DD HH:MM); defaults to now",
                false,
            )],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let from = match optional_str(&arguments, "from") {
            Some(raw) => parse_datetime(raw)?,
            None => Utc::now(),
        };

        let slots = self
            .scheduler
            .available_slots(from)
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;

        Ok(ToolOutput::new(json!({
            "status": "ok",
            "slots": slots
                .iter()
                .map(|s| json!({ "start": s.start.to_rfc3339(), "minutes": s.minutes }))
                .collect::<Vec<_>>(),
        })))
    }
}

/// Book an appointment and record the tentative booking time as a fact.
pub struct BookAppointmentTool {
    scheduler: Arc<dyn SchedulingService>,
}

impl BookAppointmentTool {
    pub fn new(scheduler: Arc<dyn SchedulingService>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for BookAppointmentTool {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment for the caller"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::object(
            self.name(),
            self.description(),
            &[
                ("caller_name", "Caller's name", true),
                ("datetime", "Appointment time (RFC3339 or YYYY-MM-DD HH:MM)", true),
                ("caller_type", "Whether the caller is new or returning", false),
                ("reason", "Stated reason for the appointment", false),
            ],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let caller_name = required_str(&arguments, "caller_name")?;
        let start = parse_datetime(required_str(&arguments, "datetime")?)?;

        let booking = self
            .scheduler
            .book(caller_name, start)
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;

        let facts = FactsUpdate {
            caller_name: Some(caller_name.to_string()),
            caller_type: parse_caller_type(optional_str(&arguments, "caller_type")),
            reason: optional_str(&arguments, "reason").map(String::from),
            booking_time: Some(start),
        };

        Ok(ToolOutput::new(json!({
            "status": "booked",
            "confirmation_id": booking.confirmation_id,
            "start": booking.start.to_rfc3339(),
        }))
        .with_facts(facts))
    }
}

/// Capture a message for a human to follow up on.
pub struct TakeMessageTool {
    store: Arc<dyn MessageStore>,
}

impl TakeMessageTool {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TakeMessageTool {
    fn name(&self) -> &str {
        "take_message"
    }

    fn description(&self) -> &str {
        "Take a message for a human to return the call"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::object(
            self.name(),
            self.description(),
            &[
                ("caller_name", "Caller's name", true),
                ("message", "The message to pass along", true),
            ],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let caller_name = required_str(&arguments, "caller_name")?;
        let content = required_str(&arguments, "message")?;

        self.store
            .take_message(CallerMessage {
                caller_name: caller_name.to_string(),
                content: content.to_string(),
                taken_at: Utc::now(),
            })
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;

        let facts = FactsUpdate {
            caller_name: Some(caller_name.to_string()),
            reason: Some(content.to_string()),
            ..Default::default()
        };

        Ok(ToolOutput::new(json!({
            "status": "message_taken",
            "detail": "A team member will call back as soon as possible.",
        }))
        .with_facts(facts))
    }
}

/// Signal that the caller should be handed to a human.
///
/// The actual transfer is performed by the telephony collaborator; this tool
/// only records the request and tells the agent what to say.
#[derive(Default)]
pub struct TransferToHumanTool;

impl TransferToHumanTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for TransferToHumanTool {
    fn name(&self) -> &str {
        "transfer_to_human"
    }

    fn description(&self) -> &str {
        "Transfer the caller to a human"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::object(
            self.name(),
            self.description(),
            &[("reason", "Why the caller asked for a human", false)],
        )
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let reason = optional_str(&arguments, "reason").map(String::from);
        tracing::info!(reason = reason.as_deref().unwrap_or("unspecified"), "Transfer requested");

        Ok(ToolOutput::new(json!({
            "status": "transfer_initiated",
            "detail": "Connecting the caller to the next available person.",
        }))
        .with_facts(FactsUpdate {
            reason,
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{StubMessageStore, StubSchedulingService};

    #[tokio::test]
    async fn test_book_appointment_returns_facts() {
        let scheduler = Arc::new(StubSchedulingService::new());
        let tool = BookAppointmentTool::new(scheduler.clone());

        let output = tool
            .execute(json!({
                "caller_name": "Dana",
                "datetime": "2026-09-01 14:00",
                "caller_type": "new",
                "reason": "consultation",
            }))
            .await
            .unwrap();

        assert_eq!(output.result["status"], "booked");
        let facts = output.facts.expect("booking yields facts");
        assert_eq!(facts.caller_name.as_deref(), Some("Dana"));
        assert_eq!(facts.caller_type, Some(CallerType::New));
        assert!(facts.booking_time.is_some());
        assert_eq!(scheduler.bookings().len(), 1);
    }

    #[tokio::test]
    async fn test_book_appointment_rejects_bad_datetime() {
        let tool = BookAppointmentTool::new(Arc::new(StubSchedulingService::new()));
        let err = tool
            .execute(json!({ "caller_name": "Dana", "datetime": "tomorrowish" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_take_message_stores_and_extracts() {
        let store = Arc::new(StubMessageStore::new());
        let tool = TakeMessageTool::new(store.clone());

        let output = tool
            .execute(json!({ "caller_name": "Ravi", "message": "please call back about the invoice" }))
            .await
            .unwrap();

        assert_eq!(output.result["status"], "message_taken");
        assert_eq!(store.messages().len(), 1);
        assert_eq!(
            output.facts.unwrap().reason.as_deref(),
            Some("please call back about the invoice")
        );
    }

    #[tokio::test]
    async fn test_check_availability_defaults_to_now() {
        let tool = CheckAvailabilityTool::new(Arc::new(StubSchedulingService::new()));
        let output = tool.execute(json!({})).await.unwrap();
        assert_eq!(output.result["slots"].as_array().unwrap().len(), 3);
    }
}
