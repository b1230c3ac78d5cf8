//! Speech-agent wire protocol
//!
//! JSON messages tagged by a `type` field. Audio rides base64-encoded in
//! JSON; the client also accepts raw binary frames and normalizes them to
//! [`AgentEvent::ConversationAudio`] before they reach the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use callbridge_config::{AgentConfig, AudioConfig};
use callbridge_tools::ToolSchema;

/// Inbound events from the speech-agent peer
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    Welcome,
    SettingsApplied,
    UserStartedSpeaking,
    UtteranceEnd,
    /// Base64 PCM16 audio spoken by the agent.
    ConversationAudio { audio: String },
    /// One transcript line, role is "user" or "assistant".
    ConversationText { role: String, content: String },
    FunctionCallRequest {
        function_call_id: String,
        function_name: String,
        #[serde(default)]
        arguments: Value,
    },
    AgentAudioDone,
    Error { description: String },
    /// Event types this bridge does not consume. Logged, never fatal.
    #[serde(other)]
    Unknown,
}

/// Outbound messages to the speech-agent peer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AgentCommand {
    Settings(SettingsBody),
    /// Base64 PCM16 caller audio.
    AudioData { audio: String },
    FunctionCallResponse {
        function_call_id: String,
        /// JSON-encoded result map.
        output: String,
    },
}

/// Initial configuration sent once per connection
#[derive(Debug, Clone, Serialize)]
pub struct SettingsBody {
    pub audio: AudioFormats,
    pub instructions: String,
    /// Spoken by the agent as soon as settings are applied.
    pub greeting: String,
    pub functions: Vec<ToolSchema>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioFormats {
    pub input: AudioFormat,
    pub output: AudioFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioFormat {
    pub encoding: String,
    pub sample_rate: u32,
}

impl SettingsBody {
    /// Both directions carry linear PCM16 at the agent's clock; companding
    /// stays on the telephony side of the bridge.
    pub fn new(agent: &AgentConfig, audio: &AudioConfig, functions: Vec<ToolSchema>) -> Self {
        Self {
            audio: AudioFormats {
                input: AudioFormat {
                    encoding: "linear16".to_string(),
                    sample_rate: audio.agent_rate,
                },
                output: AudioFormat {
                    encoding: "linear16".to_string(),
                    sample_rate: audio.agent_rate,
                },
            },
            instructions: agent.instructions.clone(),
            greeting: agent.greeting.clone(),
            functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_call_request_deserializes() {
        let event: AgentEvent = serde_json::from_str(
            r#"{
                "type": "FunctionCallRequest",
                "function_call_id": "fc-1",
                "function_name": "book_appointment",
                "arguments": {"caller_name": "Dana"}
            }"#,
        )
        .unwrap();

        match event {
            AgentEvent::FunctionCallRequest {
                function_call_id,
                function_name,
                arguments,
            } => {
                assert_eq!(function_call_id, "fc-1");
                assert_eq!(function_name, "book_appointment");
                assert_eq!(arguments["caller_name"], "Dana");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_type_is_not_fatal() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"type":"PromptUpdated","prompt":"x"}"#).unwrap();
        assert!(matches!(event, AgentEvent::Unknown));
    }

    #[test]
    fn test_settings_serializes_with_type_tag() {
        let body = SettingsBody::new(
            &AgentConfig::default(),
            &AudioConfig::default(),
            vec![ToolSchema::object("take_message", "take a message", &[])],
        );
        let json = serde_json::to_value(AgentCommand::Settings(body)).unwrap();

        assert_eq!(json["type"], "Settings");
        assert_eq!(json["audio"]["input"]["encoding"], "linear16");
        assert_eq!(json["audio"]["input"]["sample_rate"], 8000);
        assert_eq!(json["functions"][0]["name"], "take_message");
        assert!(json["greeting"].as_str().is_some());
    }

    #[test]
    fn test_audio_data_shape() {
        let json = serde_json::to_value(AgentCommand::AudioData {
            audio: "AAAA".to_string(),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "AudioData", "audio": "AAAA"}));
    }
}
