//! Top-level driver for one question.
//!
//! Plans once, runs every subtask strictly in plan order, then composes the
//! final answer. Only configuration and planning failures abort a run; once
//! a plan exists the coordinator always returns an [`AgentResult`].

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::AgentConfig;
use super::executor::ToolExecutor;
use super::message::TokenUsage;
use super::planner::PlanGenerator;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::result::{AgentResult, Plan, Subtask};
use super::subtask::{SubtaskInput, SubtaskOrchestrator};
use super::synthesizer::FinalAnswerAgent;
use super::tool::ToolRegistry;
use crate::error::AgentError;

/// Maximum accepted question length in bytes.
const MAX_QUESTION_LEN: usize = 10_000;

/// Runs the plan → subtasks → final answer pipeline.
pub struct AgentCoordinator {
    provider: Arc<dyn LlmProvider>,
    planner: PlanGenerator,
    subtasks: SubtaskOrchestrator,
    final_agent: FinalAnswerAgent,
}

impl AgentCoordinator {
    /// Creates a coordinator over `tools`.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling back
    /// to compiled-in defaults.
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AgentConfig, tools: ToolRegistry) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(provider, config, tools, &prompts)
    }

    /// Creates a coordinator with an explicit prompt set.
    pub fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        config: &AgentConfig,
        tools: ToolRegistry,
        prompts: &PromptSet,
    ) -> Self {
        let executor = ToolExecutor::new(tools, config.max_tool_concurrency);
        Self {
            provider,
            planner: PlanGenerator::new(config, prompts.planner.clone()),
            subtasks: SubtaskOrchestrator::new(config, prompts, executor),
            final_agent: FinalAnswerAgent::new(config, prompts.final_answer.clone()),
        }
    }

    /// Decomposes `question` without running it.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Planning`] for an empty or oversized question,
    /// or when planning fails.
    pub async fn plan(&self, question: &str) -> Result<(Plan, TokenUsage), AgentError> {
        validate_question(question)?;
        self.planner.plan(&*self.provider, question).await
    }

    /// Answers `question`.
    ///
    /// When `cancel` fires, the active subtask is finalized from its
    /// finished attempts and reported in [`AgentResult::interrupted`], later
    /// subtasks are skipped, and the final answer is assembled without a
    /// model call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Planning`] when no plan can be produced, or
    /// [`AgentError::Cancelled`] if cancellation arrives during planning.
    pub async fn run(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResult, AgentError> {
        let start = Instant::now();

        let (plan, mut usage) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AgentError::Cancelled),
            planned = self.plan(question) => planned?,
        };
        info!(subtasks = plan.len(), "plan ready");

        let mut subtasks: Vec<Subtask> = Vec::with_capacity(plan.len());
        let mut interrupted = None;
        let mut cancelled = false;

        for (idx, description) in plan.subtasks().iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let others: Vec<&str> = plan
                .subtasks()
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, s)| s.as_str())
                .collect();
            let input = SubtaskInput {
                question,
                description,
                other_subtasks: &others,
            };

            let report = self.subtasks.run(&*self.provider, input, cancel).await;
            usage.accumulate(report.subtask.usage);
            if report.interrupted {
                interrupted = Some(report.subtask);
                cancelled = true;
                break;
            }
            subtasks.push(report.subtask);
        }

        let final_answer = if cancelled {
            FinalAnswerAgent::fallback(&subtasks)
        } else {
            self.compose(question, &subtasks, &mut usage).await
        };

        let result = AgentResult {
            question: question.to_string(),
            plan,
            subtasks,
            final_answer,
            interrupted,
            cancelled,
            usage,
            elapsed: start.elapsed(),
        };
        info!(
            subtasks = result.subtasks.len(),
            incomplete = result.incomplete_subtasks().count(),
            cancelled = result.cancelled,
            total_tokens = result.usage.total_tokens,
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "run finished"
        );
        Ok(result)
    }

    async fn compose(&self, question: &str, subtasks: &[Subtask], usage: &mut TokenUsage) -> String {
        match self
            .final_agent
            .compose(&*self.provider, question, subtasks)
            .await
        {
            Ok((answer, call_usage)) => {
                usage.accumulate(call_usage);
                answer
            }
            Err(e) => {
                warn!(error = %e, "final answer composition failed, joining subtask answers");
                FinalAnswerAgent::fallback(subtasks)
            }
        }
    }
}

impl std::fmt::Debug for AgentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCoordinator")
            .field("provider", &self.provider.name())
            .field("max_challenges", &self.subtasks.max_challenges())
            .finish_non_exhaustive()
    }
}

fn validate_question(question: &str) -> Result<(), AgentError> {
    if question.trim().is_empty() {
        return Err(AgentError::Planning {
            message: "question cannot be empty".to_string(),
        });
    }
    if question.len() > MAX_QUESTION_LEN {
        return Err(AgentError::Planning {
            message: format!(
                "question exceeds maximum length ({} bytes, max {MAX_QUESTION_LEN})",
                question.len()
            ),
        });
    }
    Ok(())
}
