//! Conversation tracking: turns, extracted facts, and the call summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Speaker role for a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    /// The human caller
    #[serde(rename = "user")]
    Caller,
    /// The speech agent
    #[serde(rename = "assistant")]
    Agent,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::Caller => "user",
            TurnRole::Agent => "assistant",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One utterance in the transcript. Turns are appended only, never mutated
/// or reordered; the ordered sequence is the transcript of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// The turn arrived while a barge-in was in progress.
    #[serde(default)]
    pub interrupted: bool,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>, interrupted: bool) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            interrupted,
        }
    }
}

/// New/returning classification stated by or inferred for the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerType {
    New,
    Returning,
}

/// Business facts extracted over the course of the call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_type: Option<CallerType>,
    /// Stated reason for contact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Tentative booking time, if one was discussed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_time: Option<DateTime<Utc>>,
}

/// Partial facts produced by a tool call, merged into [`ExtractedFacts`].
///
/// Only fields the tool actually learned are set; existing facts are never
/// cleared by an absent field.
#[derive(Debug, Clone, Default)]
pub struct FactsUpdate {
    pub caller_name: Option<String>,
    pub caller_type: Option<CallerType>,
    pub reason: Option<String>,
    pub booking_time: Option<DateTime<Utc>>,
}

impl FactsUpdate {
    pub fn is_empty(&self) -> bool {
        self.caller_name.is_none()
            && self.caller_type.is_none()
            && self.reason.is_none()
            && self.booking_time.is_none()
    }
}

/// Turn counts and interruption analytics derived from the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnalytics {
    pub caller_turns: usize,
    pub agent_turns: usize,
    pub interruptions: usize,
}

/// Summary handed to the persistence collaborator at call end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSummary {
    pub call_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_sid: Option<String>,
    pub duration_secs: u64,
    pub transcript: Vec<Turn>,
    pub facts: ExtractedFacts,
    pub analytics: CallAnalytics,
}

/// Append-only turn log plus derived analytics for one call.
///
/// Owned exclusively by its session; mutated only as events arrive and read
/// once at session end to produce the [`CallSummary`].
#[derive(Debug)]
pub struct ConversationTracker {
    turns: Vec<Turn>,
    facts: ExtractedFacts,
    interruptions: usize,
    started_at: Instant,
}

impl ConversationTracker {
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            facts: ExtractedFacts::default(),
            interruptions: 0,
            started_at: Instant::now(),
        }
    }

    /// Append a turn to the transcript.
    pub fn add_turn(&mut self, role: TurnRole, content: impl Into<String>, interrupted: bool) {
        self.turns.push(Turn::new(role, content, interrupted));
    }

    /// Count one barge-in.
    pub fn record_interruption(&mut self) {
        self.interruptions += 1;
    }

    /// Merge facts learned by a tool call.
    pub fn apply_facts(&mut self, update: FactsUpdate) {
        if let Some(name) = update.caller_name {
            self.facts.caller_name = Some(name);
        }
        if let Some(caller_type) = update.caller_type {
            self.facts.caller_type = Some(caller_type);
        }
        if let Some(reason) = update.reason {
            self.facts.reason = Some(reason);
        }
        if let Some(time) = update.booking_time {
            self.facts.booking_time = Some(time);
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn interruption_count(&self) -> usize {
        self.interruptions
    }

    pub fn facts(&self) -> &ExtractedFacts {
        &self.facts
    }

    pub fn duration_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Build the end-of-call summary.
    pub fn summary(&self, call_id: impl Into<String>, stream_sid: Option<String>) -> CallSummary {
        let caller_turns = self
            .turns
            .iter()
            .filter(|t| t.role == TurnRole::Caller)
            .count();

        CallSummary {
            call_id: call_id.into(),
            stream_sid,
            duration_secs: self.duration_secs(),
            transcript: self.turns.clone(),
            facts: self.facts.clone(),
            analytics: CallAnalytics {
                caller_turns,
                agent_turns: self.turns.len() - caller_turns,
                interruptions: self.interruptions,
            },
        }
    }
}

impl Default for ConversationTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_append_in_order() {
        let mut tracker = ConversationTracker::new();
        tracker.add_turn(TurnRole::Caller, "hello", false);
        tracker.add_turn(TurnRole::Agent, "hi, how can I help?", false);

        assert_eq!(tracker.turn_count(), 2);
        assert_eq!(tracker.turns()[0].role, TurnRole::Caller);
        assert_eq!(tracker.turns()[1].content, "hi, how can I help?");
    }

    #[test]
    fn test_facts_merge_without_clearing() {
        let mut tracker = ConversationTracker::new();
        tracker.apply_facts(FactsUpdate {
            caller_name: Some("Dana".to_string()),
            ..Default::default()
        });
        tracker.apply_facts(FactsUpdate {
            reason: Some("reschedule appointment".to_string()),
            ..Default::default()
        });

        assert_eq!(tracker.facts().caller_name.as_deref(), Some("Dana"));
        assert_eq!(
            tracker.facts().reason.as_deref(),
            Some("reschedule appointment")
        );
    }

    #[test]
    fn test_summary_analytics() {
        let mut tracker = ConversationTracker::new();
        tracker.add_turn(TurnRole::Caller, "hello", false);
        tracker.add_turn(TurnRole::Agent, "hi", false);
        tracker.add_turn(TurnRole::Agent, "as I was saying", true);
        tracker.record_interruption();

        let summary = tracker.summary("call-1", Some("stream-1".to_string()));
        assert_eq!(summary.analytics.caller_turns, 1);
        assert_eq!(summary.analytics.agent_turns, 2);
        assert_eq!(summary.analytics.interruptions, 1);
        assert!(summary.transcript[2].interrupted);
    }

    #[test]
    fn test_turn_role_serializes_as_wire_names() {
        let json = serde_json::to_string(&TurnRole::Caller).unwrap();
        assert_eq!(json, "\"user\"");
        let role: TurnRole = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(role, TurnRole::Agent);
    }
}
