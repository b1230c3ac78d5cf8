//! Tools the speech agent can call during a conversation
//!
//! A `Tool` is a named local capability with a JSON-schema argument map.
//! The `FunctionDispatcher` routes agent function-call requests to tools,
//! enforces per-tool timeouts, and degrades to a take-a-message fallback
//! when a tool is missing or broken.

pub mod call_tools;
pub mod dispatcher;
pub mod integrations;
pub mod tool;

pub use call_tools::{
    BookAppointmentTool, CheckAvailabilityTool, TakeMessageTool, TransferToHumanTool,
};
pub use dispatcher::{DispatchOutcome, FunctionDispatcher};
pub use integrations::{
    Booking, CallerMessage, IntegrationError, MessageStore, SchedulingService,
    StubMessageStore, StubSchedulingService, TimeSlot,
};
pub use tool::{Tool, ToolError, ToolOutput, ToolSchema, DEFAULT_TOOL_TIMEOUT_SECS};

use std::sync::Arc;

/// Dispatcher wired with the standard call-handling tools.
pub fn default_dispatcher(
    scheduler: Arc<dyn SchedulingService>,
    messages: Arc<dyn MessageStore>,
) -> FunctionDispatcher {
    let mut dispatcher = FunctionDispatcher::new();
    dispatcher.register(Arc::new(CheckAvailabilityTool::new(scheduler.clone())));
    dispatcher.register(Arc::new(BookAppointmentTool::new(scheduler)));
    dispatcher.register(Arc::new(TakeMessageTool::new(messages)));
    dispatcher.register(Arc::new(TransferToHumanTool::new()));
    dispatcher
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dispatcher_advertises_all_tools() {
        let dispatcher = default_dispatcher(
            Arc::new(StubSchedulingService::new()),
            Arc::new(StubMessageStore::new()),
        );
        let names: Vec<String> = dispatcher.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "book_appointment",
                "check_availability",
                "take_message",
                "transfer_to_human",
            ]
        );
    }
}
