//! External collaborator boundaries for tools
//!
//! Scheduling and message capture live behind traits so production wiring
//! can swap in real backends; the stubs keep development and tests hermetic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use parking_lot::Mutex;
use thiserror::Error;

/// Integration errors
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// One bookable slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub minutes: u32,
}

/// A confirmed booking
#[derive(Debug, Clone)]
pub struct Booking {
    pub confirmation_id: String,
    pub caller_name: String,
    pub start: DateTime<Utc>,
}

/// Scheduling backend (availability lookups and bookings)
#[async_trait]
pub trait SchedulingService: Send + Sync {
    /// Slots available on or after `from`.
    async fn available_slots(&self, from: DateTime<Utc>) -> Result<Vec<TimeSlot>, IntegrationError>;

    /// Book a slot for the caller.
    async fn book(
        &self,
        caller_name: &str,
        start: DateTime<Utc>,
    ) -> Result<Booking, IntegrationError>;
}

/// Captured caller message
#[derive(Debug, Clone)]
pub struct CallerMessage {
    pub caller_name: String,
    pub content: String,
    pub taken_at: DateTime<Utc>,
}

/// Message capture backend
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn take_message(&self, message: CallerMessage) -> Result<(), IntegrationError>;
}

/// Stub scheduler: offers the next few on-the-hour slots and accepts any
/// booking.
#[derive(Default)]
pub struct StubSchedulingService {
    bookings: Mutex<Vec<Booking>>,
}

impl StubSchedulingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.bookings.lock().clone()
    }
}

#[async_trait]
impl SchedulingService for StubSchedulingService {
    async fn available_slots(
        &self,
        from: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, IntegrationError> {
        let next_hour = (from + Duration::hours(1))
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(from);

        Ok((0..3)
            .map(|i| TimeSlot {
                start: next_hour + Duration::hours(i),
                minutes: 30,
            })
            .collect())
    }

    async fn book(
        &self,
        caller_name: &str,
        start: DateTime<Utc>,
    ) -> Result<Booking, IntegrationError> {
        let booking = Booking {
            confirmation_id: format!("bk-{}", self.bookings.lock().len() + 1),
            caller_name: caller_name.to_string(),
            start,
        };
        self.bookings.lock().push(booking.clone());
        Ok(booking)
    }
}

/// Stub message store: keeps messages in memory.
#[derive(Default)]
pub struct StubMessageStore {
    messages: Mutex<Vec<CallerMessage>>,
}

impl StubMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<CallerMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl MessageStore for StubMessageStore {
    async fn take_message(&self, message: CallerMessage) -> Result<(), IntegrationError> {
        self.messages.lock().push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_scheduler_offers_future_slots() {
        let scheduler = StubSchedulingService::new();
        let now = Utc::now();
        let slots = scheduler.available_slots(now).await.unwrap();

        assert_eq!(slots.len(), 3);
        assert!(slots.iter().all(|s| s.start > now));
    }

    #[tokio::test]
    async fn test_stub_scheduler_records_bookings() {
        let scheduler = StubSchedulingService::new();
        let start = Utc::now() + Duration::hours(2);
        let booking = scheduler.book("Dana", start).await.unwrap();

        assert_eq!(booking.caller_name, "Dana");
        assert_eq!(scheduler.bookings().len(), 1);
    }
}
