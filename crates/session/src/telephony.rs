//! Telephony media-stream wire protocol
//!
//! JSON control frames tagged by an `event` field, with base64 companded
//! audio embedded in `media` payloads. Field names on the wire are
//! camelCase.

use serde::{Deserialize, Serialize};

/// Inbound events from the telephony peer
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransportEvent {
    Connected,
    Start {
        start: StartMeta,
    },
    Media {
        media: MediaPayload,
    },
    Stop,
    Mark {
        mark: MarkName,
    },
    /// Recognized-but-unhandled event types (e.g. dtmf). Not an error.
    #[serde(other)]
    Unknown,
}

/// Stream identifiers delivered with the start event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMeta {
    pub stream_sid: String,
    pub call_sid: String,
}

/// Base64 companded audio payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

/// Named playback marker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkName {
    pub name: String,
}

/// Outbound messages to the telephony peer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransportCommand {
    #[serde(rename_all = "camelCase")]
    Media {
        stream_sid: String,
        media: MediaPayload,
    },
    #[serde(rename_all = "camelCase")]
    Mark {
        stream_sid: String,
        mark: MarkName,
    },
    /// Discard queued playback immediately (barge-in).
    #[serde(rename_all = "camelCase")]
    Clear { stream_sid: String },
}

impl TransportCommand {
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Media {
            stream_sid: stream_sid.into(),
            media: MediaPayload {
                payload: payload.into(),
            },
        }
    }

    pub fn mark(stream_sid: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Mark {
            stream_sid: stream_sid.into(),
            mark: MarkName { name: name.into() },
        }
    }

    pub fn clear(stream_sid: impl Into<String>) -> Self {
        Self::Clear {
            stream_sid: stream_sid.into(),
        }
    }
}

/// One frame off the telephony socket, parsed or not.
///
/// Malformed frames are carried (not dropped) so the session can count them
/// against its consecutive-error budget.
#[derive(Debug)]
pub enum TransportFrame {
    Event(TransportEvent),
    Malformed(String),
}

/// Parse one text frame from the telephony peer.
pub fn parse_frame(text: &str) -> TransportFrame {
    match serde_json::from_str::<TransportEvent>(text) {
        Ok(event) => TransportFrame::Event(event),
        Err(e) => TransportFrame::Malformed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_event() {
        let frame = parse_frame(
            r#"{"event":"start","start":{"streamSid":"MZ123","callSid":"CA456"}}"#,
        );
        match frame {
            TransportFrame::Event(TransportEvent::Start { start }) => {
                assert_eq!(start.stream_sid, "MZ123");
                assert_eq!(start.call_sid, "CA456");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_parse_media_event() {
        let frame = parse_frame(r#"{"event":"media","media":{"payload":"//79"}}"#);
        match frame {
            TransportFrame::Event(TransportEvent::Media { media }) => {
                assert_eq!(media.payload, "//79");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_event_is_unknown_not_malformed() {
        let frame = parse_frame(r#"{"event":"dtmf","dtmf":{"digit":"5"}}"#);
        assert!(matches!(
            frame,
            TransportFrame::Event(TransportEvent::Unknown)
        ));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            parse_frame("not json at all"),
            TransportFrame::Malformed(_)
        ));
    }

    #[test]
    fn test_outbound_media_uses_camel_case_tag() {
        let json = serde_json::to_value(TransportCommand::media("MZ123", "AAAA")).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ123");
        assert_eq!(json["media"]["payload"], "AAAA");
    }

    #[test]
    fn test_outbound_clear_shape() {
        let json = serde_json::to_value(TransportCommand::clear("MZ123")).unwrap();
        assert_eq!(json["event"], "clear");
        assert_eq!(json["streamSid"], "MZ123");
    }

    #[test]
    fn test_outbound_mark_shape() {
        let json = serde_json::to_value(TransportCommand::mark("MZ123", "agent-audio-1")).unwrap();
        assert_eq!(json["event"], "mark");
        assert_eq!(json["mark"]["name"], "agent-audio-1");
    }
}
