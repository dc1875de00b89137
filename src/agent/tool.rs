//! Retrieval tool contract and tool-call data types.
//!
//! Every retrieval capability implements [`ToolPort`] and is registered in a
//! [`ToolRegistry`] keyed by name. Agents only see [`ToolDefinition`]s; the
//! executor dispatches by name and never branches on tool identity.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match a registry entry).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call selected by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub tool_name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// Arguments accepted by every retrieval tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolArguments {
    /// Search keywords.
    pub keywords: String,
}

impl ToolInvocation {
    /// Decodes the invocation's keyword argument.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolInvocation`] if the arguments are not a
    /// JSON object with a `keywords` string.
    pub fn keywords(&self) -> Result<String, AgentError> {
        serde_json::from_str::<ToolArguments>(&self.arguments)
            .map(|args| args.keywords)
            .map_err(|e| AgentError::ToolInvocation {
                name: self.tool_name.clone(),
                message: format!("invalid arguments {:?}: {e}", self.arguments),
            })
    }
}

/// One retrieved snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutput {
    /// Where the snippet came from (file or document name).
    pub source_name: String,
    /// Snippet text.
    pub content: String,
}

/// Outcome of one tool invocation within an attempt.
///
/// `results` is empty both when nothing matched and when the tool failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was invoked.
    pub tool_name: String,
    /// Serialized arguments it was invoked with.
    pub arguments: String,
    /// Retrieved snippets in tool order.
    pub results: Vec<SearchOutput>,
}

/// Tool results gathered by one attempt, in invocation order.
pub type AttemptBatch = Vec<ToolResult>;

/// A named retrieval capability.
///
/// Implementations must return an empty list for "no results" and reserve
/// errors for transport or availability failures. Timeouts are the
/// implementation's responsibility.
#[async_trait]
pub trait ToolPort: Send + Sync {
    /// Unique tool name used for dispatch.
    fn name(&self) -> &str;

    /// Description shown to the model when it selects tools.
    fn description(&self) -> &str;

    /// Runs the retrieval for the given keywords.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ToolInvocation`] on transport failure.
    async fn invoke(&self, keywords: &str) -> Result<Vec<SearchOutput>, AgentError>;

    /// Function-calling definition for this tool.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "keywords": {
                        "type": "string",
                        "description": "Search keywords."
                    }
                },
                "required": ["keywords"],
                "additionalProperties": false
            }),
        }
    }
}

/// Name-keyed lookup of available tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolPort>>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn ToolPort>) -> Self {
        self.register(tool);
        self
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn ToolPort>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolPort>> {
        self.tools.get(name)
    }

    /// Returns `true` if a tool with `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions for every registered tool, ordered by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Registered tool names, ordered.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Renders an attempt batch as text for prompts and tool messages.
#[must_use]
pub fn render_results(results: &[SearchOutput]) -> String {
    if results.is_empty() {
        return "(no results)".to_string();
    }
    results
        .iter()
        .map(|r| format!("<source name=\"{}\">\n{}\n</source>", r.source_name, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}
