//! Core types for the call bridge
//!
//! This crate provides the pure building blocks used across the workspace:
//! - G.711 µ-law codec (telephony companded audio <-> linear PCM16)
//! - Linear-interpolation resampler
//! - Adaptive audio chunk buffer
//! - Conversation tracking and the end-of-call summary

pub mod buffer;
pub mod codec;
pub mod conversation;
pub mod resample;

pub use buffer::ChunkBuffer;
pub use conversation::{
    CallAnalytics, CallSummary, CallerType, ConversationTracker, ExtractedFacts, FactsUpdate,
    Turn, TurnRole,
};
pub use resample::resample;
