//! Tool trait and supporting types

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use callbridge_core::FactsUpdate;

/// Default timeout for tool execution (seconds)
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 10;

/// Tool execution errors
///
/// Unknown tool names and timeouts are not represented here; the dispatcher
/// owns those outcomes and never hands them back as errors.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

/// Structured result of a tool call
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Result map returned to the speech agent.
    pub result: Value,
    /// Facts the tool learned, applied to the conversation tracker.
    pub facts: Option<FactsUpdate>,
}

impl ToolOutput {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            facts: None,
        }
    }

    pub fn with_facts(mut self, facts: FactsUpdate) -> Self {
        if !facts.is_empty() {
            self.facts = Some(facts);
        }
        self
    }
}

/// Declared schema for one tool, advertised to the speech agent in the
/// initial settings message.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the argument map.
    pub parameters: Value,
}

impl ToolSchema {
    /// Object schema with string properties, the shape every tool here uses.
    pub fn object(
        name: impl Into<String>,
        description: impl Into<String>,
        properties: &[(&str, &str, bool)],
    ) -> Self {
        let mut props = serde_json::Map::new();
        let mut required = Vec::new();
        for (prop, desc, is_required) in properties {
            props.insert(
                prop.to_string(),
                json!({ "type": "string", "description": desc }),
            );
            if *is_required {
                required.push(prop.to_string());
            }
        }
        Self {
            name: name.into(),
            description: description.into(),
            parameters: json!({
                "type": "object",
                "properties": props,
                "required": required,
            }),
        }
    }
}

/// A local capability the speech agent can invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn schema(&self) -> ToolSchema;

    /// Execute with the structured argument map from the agent.
    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError>;

    /// Per-tool execution timeout.
    fn timeout_secs(&self) -> u64 {
        DEFAULT_TOOL_TIMEOUT_SECS
    }
}

/// Pull a required string argument out of the map.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing argument: {key}")))
}

/// Pull an optional string argument out of the map.
pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
