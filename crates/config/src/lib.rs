//! Configuration for the call bridge
//!
//! Settings are loaded once at startup (file + environment overlay) into an
//! explicit struct and passed into the components that need them.

pub mod settings;

pub use settings::{
    AgentConfig, AudioConfig, BreakerConfig, LimitsConfig, ServerConfig, Settings,
};

use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
