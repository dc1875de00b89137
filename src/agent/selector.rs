//! Tool selector.
//!
//! Advertises the registered tools to the model and turns its tool-call
//! intents into [`ToolInvocation`]s. A plain text reply means no tool is
//! needed for this attempt.

use async_trait::async_trait;
use tracing::debug;

use super::config::AgentConfig;
use super::conversation::ConversationLog;
use super::message::{ChatMessage, TokenUsage, assistant_message, assistant_tool_calls_message};
use super::provider::LlmProvider;
use super::tool::{ToolDefinition, ToolInvocation};
use super::traits::{Agent, with_retries};
use crate::error::AgentError;

/// Tools chosen for one attempt.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Invocations to execute, possibly empty.
    pub invocations: Vec<ToolInvocation>,
    /// Assistant message recording the choice in the conversation.
    pub message: ChatMessage,
    /// Tokens used by the selection call.
    pub usage: TokenUsage,
}

impl Selection {
    /// Selection with no tools, used when selection fails.
    #[must_use]
    pub fn none() -> Self {
        Self {
            invocations: Vec::new(),
            message: assistant_message("(no tool selected)"),
            usage: TokenUsage::default(),
        }
    }
}

/// Agent that decides which tools to call next.
pub struct ToolSelector {
    model: String,
    temperature: f32,
    max_tokens: u32,
    retries: u32,
    system_prompt: String,
    tools: Vec<ToolDefinition>,
}

impl ToolSelector {
    /// Creates a selector advertising `tools`.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String, tools: Vec<ToolDefinition>) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retries: config.max_call_retries,
            system_prompt,
            tools,
        }
    }

    /// Chooses tools for the next attempt from the conversation so far.
    ///
    /// The log is expected to end with the latest review advice when one
    /// exists, so the model can change approach.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Selection`] if the model fails or names an
    /// unknown tool or malformed arguments on every try.
    pub async fn select(
        &self,
        provider: &dyn LlmProvider,
        log: &ConversationLog,
    ) -> Result<Selection, AgentError> {
        with_retries(self.name(), self.retries, move |_| {
            self.try_select(provider, log)
        })
        .await
        .map_err(|e| match e {
            AgentError::Selection { .. } => e,
            other => AgentError::Selection {
                message: other.to_string(),
            },
        })
    }

    async fn try_select(
        &self,
        provider: &dyn LlmProvider,
        log: &ConversationLog,
    ) -> Result<Selection, AgentError> {
        let response = self.execute(provider, log.messages()).await?;

        if response.tool_calls.is_empty() {
            debug!(reply = %response.content, "no tool selected");
            let content = if response.content.trim().is_empty() {
                "(no tool selected)"
            } else {
                response.content.as_str()
            };
            return Ok(Selection {
                invocations: Vec::new(),
                message: assistant_message(content),
                usage: response.usage,
            });
        }

        for call in &response.tool_calls {
            self.validate(call)?;
        }

        Ok(Selection {
            message: assistant_tool_calls_message(response.tool_calls.clone()),
            invocations: response.tool_calls,
            usage: response.usage,
        })
    }

    fn validate(&self, call: &ToolInvocation) -> Result<(), AgentError> {
        if !self.tools.iter().any(|t| t.name == call.tool_name) {
            return Err(AgentError::Selection {
                message: format!("model selected unknown tool '{}'", call.tool_name),
            });
        }
        call.keywords().map_err(|e| AgentError::Selection {
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[async_trait]
impl Agent for ToolSelector {
    fn name(&self) -> &'static str {
        "selector"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }
}
