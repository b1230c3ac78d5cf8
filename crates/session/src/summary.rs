//! Summary persistence boundary
//!
//! The bridge hands one `CallSummary` to a sink at session end. The storage
//! engine behind the sink is someone else's problem; the in-memory sink
//! serves development and tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use callbridge_core::CallSummary;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Failed to store summary: {0}")]
    Store(String),
}

/// Where call summaries go when a session ends
#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn store(&self, summary: CallSummary) -> Result<(), SummaryError>;
}

/// Keeps summaries in process memory.
#[derive(Default)]
pub struct InMemorySummarySink {
    summaries: Mutex<Vec<CallSummary>>,
}

impl InMemorySummarySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<CallSummary> {
        self.summaries.lock().clone()
    }

    pub fn get(&self, call_id: &str) -> Option<CallSummary> {
        self.summaries
            .lock()
            .iter()
            .find(|s| s.call_id == call_id)
            .cloned()
    }
}

#[async_trait]
impl SummarySink for InMemorySummarySink {
    async fn store(&self, summary: CallSummary) -> Result<(), SummaryError> {
        self.summaries.lock().push(summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbridge_core::ConversationTracker;

    #[tokio::test]
    async fn test_stored_summary_is_retrievable() {
        let sink = InMemorySummarySink::new();
        let tracker = ConversationTracker::new();
        sink.store(tracker.summary("call-9", None)).await.unwrap();

        assert_eq!(sink.all().len(), 1);
        assert!(sink.get("call-9").is_some());
        assert!(sink.get("call-0").is_none());
    }
}
