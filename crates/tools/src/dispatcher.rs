//! Function-call dispatch
//!
//! The dispatcher owns the registered tools and turns every function-call
//! request into a result the speech agent can speak from. Dispatch never
//! fails: unknown names, invalid arguments, execution errors and timeouts
//! all collapse into a structured take-a-message fallback so the call keeps
//! moving.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use callbridge_core::FactsUpdate;

use crate::tool::{Tool, ToolError, ToolSchema};

/// Outcome of one dispatched function call
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Result map to send back to the agent.
    pub result: Value,
    /// Facts extracted by the tool, if any.
    pub facts: Option<FactsUpdate>,
    /// Whether the tool ran to completion (false means fallback).
    pub succeeded: bool,
}

/// Registry and executor for the agent's callable tools
#[derive(Default)]
pub struct FunctionDispatcher {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl FunctionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. Re-registering replaces.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas of every registered tool, advertised in the agent settings.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute a named tool with a per-tool timeout.
    ///
    /// Always returns an outcome; callers can forward `result` to the agent
    /// unconditionally.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> DispatchOutcome {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "Unknown tool requested");
            return fallback_outcome(name, "is not available");
        };

        let timeout = Duration::from_secs(tool.timeout_secs());
        let run = tokio::time::timeout(timeout, tool.execute(arguments)).await;

        match run {
            Ok(Ok(output)) => {
                info!(tool = name, "Tool executed");
                DispatchOutcome {
                    result: output.result,
                    facts: output.facts,
                    succeeded: true,
                }
            }
            Ok(Err(err)) => {
                warn!(tool = name, error = %err, "Tool failed");
                match err {
                    ToolError::InvalidArguments(detail) => DispatchOutcome {
                        result: json!({
                            "status": "error",
                            "error": "invalid_arguments",
                            "detail": detail,
                        }),
                        facts: None,
                        succeeded: false,
                    },
                    ToolError::Execution(_) => fallback_outcome(name, "could not be completed"),
                }
            }
            Err(_) => {
                warn!(tool = name, timeout_secs = tool.timeout_secs(), "Tool timed out");
                fallback_outcome(name, "timed out")
            }
        }
    }
}

/// Fallback that steers the agent toward taking a message instead of
/// retrying a broken tool.
fn fallback_outcome(name: &str, what_happened: &str) -> DispatchOutcome {
    DispatchOutcome {
        result: json!({
            "status": "unavailable",
            "detail": format!(
                "The '{name}' action {what_happened}. Offer to take a message \
                 so a team member can follow up."
            ),
        }),
        facts: None,
        succeeded: false,
    }
}
