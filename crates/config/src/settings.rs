//! Main settings module
//!
//! One explicit configuration struct, constructed once at startup and passed
//! by reference into the session bridge. No module-level mutable state.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Audio framing configuration
    #[serde(default)]
    pub audio: AudioConfig,

    /// Speech-agent peer configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Circuit breaker configuration
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Per-session defensive limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Audio framing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Telephony peer sample rate (companded mono).
    #[serde(default = "default_telephony_rate")]
    pub telephony_rate: u32,

    /// Speech-agent peer sample rate (linear PCM16).
    #[serde(default = "default_agent_rate")]
    pub agent_rate: u32,

    /// Target chunk duration sent to the speech agent.
    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u64,

    /// Upper bound on buffering delay before a partial chunk is flushed.
    #[serde(default = "default_max_buffer_delay_ms")]
    pub max_buffer_delay_ms: u64,
}

fn default_telephony_rate() -> u32 {
    8000
}

fn default_agent_rate() -> u32 {
    8000
}

fn default_chunk_ms() -> u64 {
    200
}

fn default_max_buffer_delay_ms() -> u64 {
    400
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            telephony_rate: default_telephony_rate(),
            agent_rate: default_agent_rate(),
            chunk_ms: default_chunk_ms(),
            max_buffer_delay_ms: default_max_buffer_delay_ms(),
        }
    }
}

impl AudioConfig {
    /// Target chunk size in PCM16 bytes at the agent rate.
    pub fn chunk_target_bytes(&self) -> usize {
        (self.agent_rate as usize * 2 * self.chunk_ms as usize) / 1000
    }
}

/// Speech-agent peer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// WebSocket endpoint of the speech-agent service.
    #[serde(default = "default_agent_endpoint")]
    pub endpoint: String,

    /// API key, defaulting from the AGENT_API_KEY environment variable.
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Instruction text sent in the initial settings message.
    #[serde(default = "default_instructions")]
    pub instructions: String,

    /// Greeting the agent speaks as soon as the session is configured.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Receive timeout on both peer loops; exceeding it ends the session.
    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,

    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_agent_endpoint() -> String {
    "wss://agent.example.com/v1/converse".to_string()
}

fn default_api_key() -> String {
    std::env::var("AGENT_API_KEY").unwrap_or_default()
}

fn default_instructions() -> String {
    "You are a friendly receptionist. Keep answers short and spoken-word \
     natural. Use the available functions to check availability, book \
     appointments, or take a message."
        .to_string()
}

fn default_greeting() -> String {
    "Hello! Thanks for calling. How can I help you today?".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_receive_timeout_secs() -> u64 {
    120
}

fn default_max_connect_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: default_agent_endpoint(),
            api_key: default_api_key(),
            instructions: default_instructions(),
            greeting: default_greeting(),
            connect_timeout_secs: default_connect_timeout_secs(),
            receive_timeout_secs: default_receive_timeout_secs(),
            max_connect_attempts: default_max_connect_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// Circuit breaker configuration for the speech-agent peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cool-down before an open breaker allows a half-open probe.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Consecutive half-open successes required to close.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    30
}

fn default_success_threshold() -> u32 {
    2
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            success_threshold: default_success_threshold(),
        }
    }
}

/// Per-session defensive limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Malformed/unparseable inbound messages tolerated before the session
    /// is terminated defensively.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
}

fn default_max_consecutive_errors() -> u32 {
    5
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_consecutive_errors: default_max_consecutive_errors(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from an optional TOML file with a BRIDGE_* environment
    /// overlay (e.g. BRIDGE_SERVER__PORT=9090).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("BRIDGE").separator("__"))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.telephony_rate == 0 || self.audio.agent_rate == 0 {
            return Err(ConfigError::Invalid(
                "sample rates must be non-zero".to_string(),
            ));
        }
        if self.audio.chunk_ms == 0 {
            return Err(ConfigError::Invalid(
                "audio.chunk_ms must be non-zero".to_string(),
            ));
        }
        if self.audio.max_buffer_delay_ms < self.audio.chunk_ms {
            return Err(ConfigError::Invalid(
                "audio.max_buffer_delay_ms must be >= audio.chunk_ms".to_string(),
            ));
        }
        if self.agent.max_connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_connect_attempts must be at least 1".to_string(),
            ));
        }
        if self.breaker.failure_threshold == 0 || self.breaker.success_threshold == 0 {
            return Err(ConfigError::Invalid(
                "breaker thresholds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.audio.telephony_rate, 8000);
        assert_eq!(settings.agent.receive_timeout_secs, 120);
    }

    #[test]
    fn test_chunk_target_bytes() {
        let audio = AudioConfig::default();
        // 200ms of PCM16 at 8kHz = 8000 * 2 * 0.2
        assert_eq!(audio.chunk_target_bytes(), 3200);
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut settings = Settings::default();
        settings.audio.telephony_rate = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_delay_below_chunk() {
        let mut settings = Settings::default();
        settings.audio.max_buffer_delay_ms = 50;
        assert!(settings.validate().is_err());
    }
}
