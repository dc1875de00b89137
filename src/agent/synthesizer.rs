//! Answer synthesis agents.
//!
//! [`AnswerSynthesizer`] drafts the candidate answer for one subtask from
//! every attempt's evidence. [`FinalAnswerAgent`] merges the subtask answers
//! into the reply to the user.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::conversation::ConversationLog;
use super::message::{TokenUsage, user_message};
use super::prompt::{build_answer_prompt, build_final_prompt};
use super::provider::LlmProvider;
use super::result::Subtask;
use super::tool::AttemptBatch;
use super::traits::{Agent, with_retries};
use crate::error::AgentError;

/// Answer carried forward when the first draft cannot be produced.
pub const UNABLE_TO_ANSWER: &str = "unable to answer";

/// Agent that drafts a subtask answer.
pub struct AnswerSynthesizer {
    model: String,
    temperature: f32,
    max_tokens: u32,
    retries: u32,
    system_prompt: String,
}

impl AnswerSynthesizer {
    /// Creates a new answer synthesizer.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retries: config.max_call_retries,
            system_prompt,
        }
    }

    /// Drafts an answer for `subtask` from the conversation and all
    /// attempt batches gathered so far.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Synthesis`] if every try fails or returns an
    /// empty answer.
    pub async fn answer(
        &self,
        provider: &dyn LlmProvider,
        log: &ConversationLog,
        subtask: &str,
        batches: &[AttemptBatch],
    ) -> Result<(String, TokenUsage), AgentError> {
        let request_log = log.append(user_message(&build_answer_prompt(subtask, batches)));
        let request_log = &request_log;
        with_retries(self.name(), self.retries, move |_| async move {
            let response = self.execute(provider, request_log.messages()).await?;
            non_empty(response.content, response.usage)
        })
        .await
        .map_err(into_synthesis)
    }
}

#[async_trait]
impl Agent for AnswerSynthesizer {
    fn name(&self) -> &'static str {
        "answer"
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
}

/// Agent that composes the final reply from subtask answers.
pub struct FinalAnswerAgent {
    model: String,
    temperature: f32,
    max_tokens: u32,
    retries: u32,
    system_prompt: String,
}

impl FinalAnswerAgent {
    /// Creates a new final answer agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retries: config.max_call_retries,
            system_prompt,
        }
    }

    /// Composes the reply to `question`. Incomplete subtasks are flagged in
    /// the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Synthesis`] if every try fails.
    pub async fn compose(
        &self,
        provider: &dyn LlmProvider,
        question: &str,
        subtasks: &[Subtask],
    ) -> Result<(String, TokenUsage), AgentError> {
        let messages = [user_message(&build_final_prompt(question, subtasks))];
        let messages = &messages;
        with_retries(self.name(), self.retries, move |_| async move {
            let response = self.execute(provider, messages).await?;
            non_empty(response.content, response.usage)
        })
        .await
        .map_err(into_synthesis)
    }

    /// Joins subtask answers in plan order without a model call.
    #[must_use]
    pub fn fallback(subtasks: &[Subtask]) -> String {
        subtasks
            .iter()
            .map(|s| s.final_answer.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl Agent for FinalAnswerAgent {
    fn name(&self) -> &'static str {
        "final"
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
}

fn non_empty(content: String, usage: TokenUsage) -> Result<(String, TokenUsage), AgentError> {
    if content.trim().is_empty() {
        return Err(AgentError::Synthesis {
            message: "model returned an empty answer".to_string(),
        });
    }
    Ok((content, usage))
}

fn into_synthesis(e: AgentError) -> AgentError {
    match e {
        AgentError::Synthesis { .. } => e,
        other => AgentError::Synthesis {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::prompt::{ANSWER_SYSTEM_PROMPT, FINAL_SYSTEM_PROMPT};
    use crate::agent::result::SubtaskOutcome;
    use crate::agent::testing::{CallRole, RoutedProvider, failure, text};
    use crate::agent::tool::{SearchOutput, ToolResult};

    fn config() -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn subtask(description: &str, answer: &str, is_completed: bool) -> Subtask {
        Subtask {
            description: description.to_string(),
            attempt_batches: Vec::new(),
            reflections: Vec::new(),
            challenge_count: 1,
            is_completed,
            outcome: if is_completed {
                SubtaskOutcome::Completed
            } else {
                SubtaskOutcome::BudgetExhausted
            },
            final_answer: answer.to_string(),
            usage: TokenUsage::default(),
        }
    }

    #[tokio::test]
    async fn test_answer_sees_every_batch() {
        let provider = RoutedProvider::new().answer(text("Use the 'Forgot password' link."));
        let agent = AnswerSynthesizer::new(&config(), ANSWER_SYSTEM_PROMPT.to_string());
        let batches = vec![
            vec![ToolResult {
                tool_name: "qa-search".to_string(),
                arguments: r#"{"keywords":"reset"}"#.to_string(),
                results: vec![SearchOutput {
                    source_name: "qa.txt".to_string(),
                    content: "earlier evidence".to_string(),
                }],
            }],
            Vec::new(),
        ];
        let log = ConversationLog::seeded("q", "password reset procedure");
        let (answer, _) = agent
            .answer(&provider, &log, "password reset procedure", &batches)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(answer, "Use the 'Forgot password' link.");

        let request = &provider.requests_for(CallRole::Answer)[0];
        let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        assert!(last.contains("earlier evidence"));
        assert!(last.contains(r#"<attempt number="2">"#));
    }

    #[tokio::test]
    async fn test_empty_answer_is_retried_then_fails() {
        let provider = RoutedProvider::new().answer(text("  ")).answer(failure());
        let agent = AnswerSynthesizer::new(&config(), ANSWER_SYSTEM_PROMPT.to_string());
        let log = ConversationLog::seeded("q", "s");
        let result = agent.answer(&provider, &log, "s", &[]).await;
        assert!(matches!(result, Err(AgentError::Synthesis { .. })));
        assert_eq!(provider.calls(CallRole::Answer), 2);
    }

    #[tokio::test]
    async fn test_compose_flags_incomplete_subtasks() {
        let provider = RoutedProvider::new().finish(text("Here is what we found."));
        let agent = FinalAnswerAgent::new(&config(), FINAL_SYSTEM_PROMPT.to_string());
        let subtasks = [
            subtask("two-factor setup", "Enable it in Security.", true),
            subtask("backup notifications", "Check SMTP.", false),
        ];
        let (reply, _) = agent
            .compose(&provider, "two questions", &subtasks)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(reply, "Here is what we found.");
        let request = &provider.requests_for(CallRole::Final)[0];
        assert!(request.messages[1].content.contains(r#"status="incomplete""#));
    }

    #[test]
    fn test_fallback_joins_in_plan_order() {
        let subtasks = [
            subtask("a", "first", true),
            subtask("b", "", false),
            subtask("c", "third", false),
        ];
        assert_eq!(FinalAnswerAgent::fallback(&subtasks), "first\n\nthird");
    }
}
