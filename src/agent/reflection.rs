//! Reflection evaluator.
//!
//! Reviews a candidate answer against its subtask and the evidence it was
//! drafted from, returning a [`ReflectionResult`].

use async_trait::async_trait;

use super::config::AgentConfig;
use super::message::{TokenUsage, user_message};
use super::prompt::build_reflection_prompt;
use super::provider::LlmProvider;
use super::result::ReflectionResult;
use super::schema::{ResponseSchema, decode, reflection_schema};
use super::tool::AttemptBatch;
use super::traits::{Agent, with_retries};
use crate::error::AgentError;

/// Everything the evaluator looks at for one verdict.
#[derive(Debug, Clone, Copy)]
pub struct ReviewInput<'a> {
    /// Subtask being answered.
    pub subtask: &'a str,
    /// Candidate answer under review.
    pub answer: &'a str,
    /// Evidence from every attempt so far.
    pub batches: &'a [AttemptBatch],
    /// Advice already given for this subtask, oldest first.
    pub advice_history: &'a [String],
    /// Descriptions of the plan's other subtasks.
    pub other_subtasks: &'a [&'a str],
}

/// Agent that judges whether an answer resolves its subtask.
pub struct ReflectionEvaluator {
    model: String,
    max_tokens: u32,
    retries: u32,
    system_prompt: String,
}

impl ReflectionEvaluator {
    /// Creates a new reflection evaluator.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retries: config.max_call_retries,
            system_prompt,
        }
    }

    /// Reviews one candidate answer.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Evaluation`] when every try fails, does not
    /// match the reflection schema, or rejects the answer without advice.
    pub async fn evaluate(
        &self,
        provider: &dyn LlmProvider,
        input: ReviewInput<'_>,
    ) -> Result<(ReflectionResult, TokenUsage), AgentError> {
        let messages = [user_message(&build_reflection_prompt(
            input.subtask,
            input.answer,
            input.batches,
            input.advice_history,
            input.other_subtasks,
        ))];
        let messages = &messages;

        with_retries(self.name(), self.retries, move |_| async move {
            let response = self.execute(provider, messages).await?;
            let verdict: ReflectionResult = decode(&reflection_schema(), &response.content)?;
            if !verdict.is_completed && verdict.advice.trim().is_empty() {
                return Err(AgentError::Evaluation {
                    message: "answer rejected without advice".to_string(),
                });
            }
            Ok((verdict, response.usage))
        })
        .await
        .map_err(|e| match e {
            AgentError::Evaluation { .. } => e,
            other => AgentError::Evaluation {
                message: other.to_string(),
            },
        })
    }
}

#[async_trait]
impl Agent for ReflectionEvaluator {
    fn name(&self) -> &'static str {
        "reflection"
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
        Some(reflection_schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::prompt::REFLECTION_SYSTEM_PROMPT;
    use crate::agent::testing::{CallRole, RoutedProvider, failure, text, verdict};

    fn evaluator() -> ReflectionEvaluator {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        ReflectionEvaluator::new(&config, REFLECTION_SYSTEM_PROMPT.to_string())
    }

    fn input<'a>(history: &'a [String], others: &'a [&'a str]) -> ReviewInput<'a> {
        ReviewInput {
            subtask: "backup notifications",
            answer: "Check the SMTP settings.",
            batches: &[],
            advice_history: history,
            other_subtasks: others,
        }
    }

    #[tokio::test]
    async fn test_completed_verdict() {
        let provider = RoutedProvider::new().reflect(verdict(true, ""));
        let (result, _) = evaluator()
            .evaluate(&provider, input(&[], &[]))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(result.is_completed);
    }

    #[tokio::test]
    async fn test_history_and_other_subtasks_reach_the_model() {
        let provider = RoutedProvider::new().reflect(verdict(false, "search the QA archive"));
        let history = ["try the manual".to_string()];
        let (result, _) = evaluator()
            .evaluate(&provider, input(&history, &["two-factor setup"]))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(result.advice, "search the QA archive");

        let request = &provider.requests_for(CallRole::Reflect)[0];
        assert!(request.messages[1].content.contains("- try the manual"));
        assert!(request.messages[1].content.contains("- two-factor setup"));
    }

    #[tokio::test]
    async fn test_rejection_without_advice_is_retried() {
        let provider = RoutedProvider::new()
            .reflect(verdict(false, ""))
            .reflect(verdict(false, "use different keywords"));
        let (result, _) = evaluator()
            .evaluate(&provider, input(&[], &[]))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(result.advice, "use different keywords");
        assert_eq!(provider.calls(CallRole::Reflect), 2);
    }

    #[tokio::test]
    async fn test_evaluation_error_after_retry() {
        let provider = RoutedProvider::new().reflect(text("looks fine")).reflect(failure());
        let result = evaluator().evaluate(&provider, input(&[], &[])).await;
        assert!(matches!(result, Err(AgentError::Evaluation { .. })));
    }
}
