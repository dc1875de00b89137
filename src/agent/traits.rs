//! Agent trait definition.
//!
//! All agent roles (planner, selector, answer, reflection, final) implement
//! this trait, which provides a uniform way to build a request and call the
//! provider. [`with_retries`] wraps a call-and-parse step so each role gets
//! the same "one retry, then fail with my error kind" behaviour.

use std::future::Future;

use async_trait::async_trait;
use tracing::warn;

use super::message::{ChatMessage, ChatRequest, TokenUsage, system_message};
use super::provider::LlmProvider;
use super::schema::ResponseSchema;
use super::tool::{ToolDefinition, ToolInvocation};
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Tool calls the model asked for, if tools were advertised.
    pub tool_calls: Vec<ToolInvocation>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role with a fixed system prompt and
/// model configuration. Roles that need structured output override
/// [`Agent::response_schema`]; roles that select tools override
/// [`Agent::tools`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Schema the response must follow, if any.
    fn response_schema(&self) -> Option<ResponseSchema> {
        None
    }

    /// Tool definitions advertised to the model.
    fn tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    /// Builds a request with the system prompt followed by `messages`.
    fn build_request(&self, messages: &[ChatMessage]) -> ChatRequest {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(system_message(self.system_prompt()));
        all.extend_from_slice(messages);
        ChatRequest {
            model: self.model().to_string(),
            messages: all,
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            response_schema: self.response_schema(),
            tools: self.tools(),
        }
    }

    /// Executes the agent against the given conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        messages: &[ChatMessage],
    ) -> Result<AgentResponse, AgentError> {
        let request = self.build_request(messages);
        let response = provider.chat(&request).await?;

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            tool_calls: response.tool_calls,
        })
    }
}

/// Runs `op` until it succeeds or `retries` extra attempts have failed.
///
/// `op` receives the zero-based try number. The last error is returned.
/// Fatal errors (see [`AgentError::is_fatal`]) are returned without retrying.
///
/// # Errors
///
/// Returns the error of the final failed try.
pub async fn with_retries<T, F, Fut>(
    agent: &'static str,
    retries: u32,
    mut op: F,
) -> Result<T, AgentError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut try_number = 0;
    loop {
        match op(try_number).await {
            Ok(value) => return Ok(value),
            Err(e) if try_number < retries && !e.is_fatal() => {
                warn!(agent, try_number, error = %e, "agent call failed, retrying");
                try_number += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
