//! Plan generator.
//!
//! Decomposes the user's question into an ordered [`Plan`] of subtasks using
//! a structured-output call.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::message::{TokenUsage, user_message};
use super::prompt::build_planner_prompt;
use super::provider::LlmProvider;
use super::result::{Plan, RawPlan};
use super::schema::{ResponseSchema, decode, plan_schema};
use super::traits::{Agent, with_retries};
use crate::error::AgentError;

/// Agent that turns a question into subtasks.
pub struct PlanGenerator {
    model: String,
    max_tokens: u32,
    retries: u32,
    system_prompt: String,
}

impl PlanGenerator {
    /// Creates a plan generator with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retries: config.max_call_retries,
            system_prompt,
        }
    }

    /// Produces the plan for `question`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Planning`] if the call fails, the response does
    /// not match the plan schema, or the plan is empty after all retries.
    pub async fn plan(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
    ) -> Result<(Plan, TokenUsage), AgentError> {
        with_retries(self.name(), self.retries, move |_| {
            self.try_plan(provider, question)
        })
        .await
        .map_err(|e| match e {
            AgentError::Planning { .. } => e,
            other => AgentError::Planning {
                message: other.to_string(),
            },
        })
    }

    async fn try_plan(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
    ) -> Result<(Plan, TokenUsage), AgentError> {
        let messages = [user_message(&build_planner_prompt(question))];
        let response = self.execute(provider, &messages).await?;
        let raw: RawPlan = decode(&plan_schema(), &response.content)?;
        let plan = Plan::new(raw.subtasks)?;
        Ok((plan, response.usage))
    }
}

#[async_trait]
impl Agent for PlanGenerator {
    fn name(&self) -> &'static str {
        "planner"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn response_schema(&self) -> Option<ResponseSchema> {
        Some(plan_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::prompt::PLANNER_SYSTEM_PROMPT;
    use crate::agent::testing::{CallRole, RoutedProvider, failure, text};

    fn generator() -> PlanGenerator {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        PlanGenerator::new(&config, PLANNER_SYSTEM_PROMPT.to_string())
    }

    #[tokio::test]
    async fn test_plan_single_subtask() {
        let provider =
            RoutedProvider::new().plan(text(r#"{"subtasks": ["password reset procedure"]}"#));
        let (plan, usage) = generator()
            .plan(&provider, "How do I reset my password?")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(plan.subtasks(), ["password reset procedure"]);
        assert_eq!(usage.total_tokens, 15);

        let requests = provider.requests_for(CallRole::Plan);
        assert!(requests[0].messages[1].content.contains("reset my password"));
    }

    #[tokio::test]
    async fn test_plan_retries_once_after_empty_plan() {
        let provider = RoutedProvider::new()
            .plan(text(r#"{"subtasks": []}"#))
            .plan(text(r#"{"subtasks": ["backup notifications"]}"#));
        let (plan, _) = generator()
            .plan(&provider, "Why don't I get backup mails?")
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(plan.len(), 1);
        assert_eq!(provider.calls(CallRole::Plan), 2);
    }

    #[tokio::test]
    async fn test_plan_fails_after_retry() {
        let provider = RoutedProvider::new().plan(failure()).plan(text("not json"));
        let result = generator().plan(&provider, "q").await;
        assert!(matches!(result, Err(AgentError::Planning { .. })));
        assert_eq!(provider.calls(CallRole::Plan), 2);
    }
}
