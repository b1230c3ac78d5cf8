//! Per-call session orchestration
//!
//! The pieces that turn one telephony media stream and one speech-agent
//! connection into a conversation: wire protocols for both peers, the
//! circuit breaker guarding agent connects, the outbound agent client, the
//! session bridge itself, and the summary persistence boundary.

pub mod agent;
pub mod breaker;
pub mod bridge;
pub mod client;
pub mod summary;
pub mod telephony;

pub use agent::{AgentCommand, AgentEvent, SettingsBody};
pub use breaker::{BreakerRegistry, BreakerState, CircuitBreaker};
pub use bridge::{EndReason, SessionBridge, Stage};
pub use client::{AgentChannels, AgentConnector, ConnectError, WsAgentConnector};
pub use summary::{InMemorySummarySink, SummaryError, SummarySink};
pub use telephony::{
    parse_frame, MarkName, MediaPayload, StartMeta, TransportCommand, TransportEvent,
    TransportFrame,
};
