//! Per-subtask retry loop.
//!
//! [`SubtaskOrchestrator`] drives one subtask through an explicit state
//! machine:
//!
//! ```text
//! Init → SelectingTools → ExecutingTools → Answering → Reflecting
//!             ▲                  (skipped when no tool        │
//!             │                   is selected)                ├─→ Completed
//!             └──────────────── Looping ◄─────────────────────┤
//!                                                             └─→ BudgetExhausted
//! ```
//!
//! Every attempt pushes exactly one attempt batch and one reflection, so
//! `attempt_batches.len() == reflections.len() == challenge_count` holds
//! whenever the loop is between attempts. Failures of the selector,
//! synthesizer or evaluator degrade to a safe default instead of aborting.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{AgentConfig, BudgetPolicy};
use super::conversation::ConversationLog;
use super::executor::ToolExecutor;
use super::message::{TokenUsage, assistant_message, user_message};
use super::prompt::{PromptSet, build_advice_message};
use super::provider::LlmProvider;
use super::reflection::{ReflectionEvaluator, ReviewInput};
use super::result::{ReflectionResult, Subtask, SubtaskOutcome};
use super::selector::{Selection, ToolSelector};
use super::synthesizer::{AnswerSynthesizer, UNABLE_TO_ANSWER};
use super::tool::{AttemptBatch, ToolInvocation};

/// States of the subtask retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtaskState {
    /// Conversation seeded, no attempt started.
    Init,
    /// Asking the model which tools to call.
    SelectingTools,
    /// Running the selected tools.
    ExecutingTools,
    /// Drafting a candidate answer.
    Answering,
    /// Reviewing the candidate answer.
    Reflecting,
    /// Carrying the latest advice into the next attempt.
    Looping,
    /// A review accepted the answer.
    Completed,
    /// The attempt budget ran out.
    BudgetExhausted,
}

impl SubtaskState {
    /// Returns `true` for states that end the loop.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::BudgetExhausted)
    }
}

/// Finished subtask plus whether cancellation cut it short.
#[derive(Debug, Clone)]
pub struct SubtaskReport {
    /// The finalized subtask record.
    pub subtask: Subtask,
    /// `true` if the run was cancelled while this subtask was active.
    pub interrupted: bool,
}

/// Inputs identifying one subtask within a run.
#[derive(Debug, Clone, Copy)]
pub struct SubtaskInput<'a> {
    /// The user's original question.
    pub question: &'a str,
    /// Subtask description from the plan.
    pub description: &'a str,
    /// The plan's other subtask descriptions.
    pub other_subtasks: &'a [&'a str],
}

/// Working state owned by one run of the loop.
struct Attempts {
    log: ConversationLog,
    batches: Vec<AttemptBatch>,
    reflections: Vec<ReflectionResult>,
    challenge_count: usize,
    pending_calls: Vec<ToolInvocation>,
    pending_batch: AttemptBatch,
    answer: Option<String>,
    reviewed_answer: Option<String>,
    usage: TokenUsage,
}

impl Attempts {
    fn new(input: SubtaskInput<'_>) -> Self {
        Self {
            log: ConversationLog::seeded(input.question, input.description),
            batches: Vec::new(),
            reflections: Vec::new(),
            challenge_count: 0,
            pending_calls: Vec::new(),
            pending_batch: Vec::new(),
            answer: None,
            reviewed_answer: None,
            usage: TokenUsage::default(),
        }
    }

    fn advice_history(&self) -> Vec<String> {
        self.reflections.iter().map(|r| r.advice.clone()).collect()
    }

    fn last_answer(&self) -> &str {
        self.answer.as_deref().unwrap_or(UNABLE_TO_ANSWER)
    }

    /// Drops the unfinished attempt so the per-attempt lists stay aligned
    /// and the answer is the one from the last reviewed attempt.
    fn discard_partial_attempt(&mut self) {
        self.batches.truncate(self.reflections.len());
        self.challenge_count = self.reflections.len();
        self.answer.clone_from(&self.reviewed_answer);
    }

    fn finish(self, description: &str, state: SubtaskState, policy: &BudgetPolicy) -> Subtask {
        let is_completed = state == SubtaskState::Completed;
        let final_answer = if is_completed {
            self.last_answer().to_string()
        } else {
            policy.resolve(self.last_answer())
        };
        Subtask {
            description: description.to_string(),
            attempt_batches: self.batches,
            reflections: self.reflections,
            challenge_count: self.challenge_count,
            is_completed,
            outcome: if is_completed {
                SubtaskOutcome::Completed
            } else {
                SubtaskOutcome::BudgetExhausted
            },
            final_answer,
            usage: self.usage,
        }
    }
}

/// Bounded retry state machine for one subtask.
pub struct SubtaskOrchestrator {
    selector: ToolSelector,
    executor: ToolExecutor,
    synthesizer: AnswerSynthesizer,
    evaluator: ReflectionEvaluator,
    max_challenges: usize,
    budget_policy: BudgetPolicy,
}

impl SubtaskOrchestrator {
    /// Builds the per-subtask agents from configuration and prompts.
    #[must_use]
    pub fn new(config: &AgentConfig, prompts: &PromptSet, executor: ToolExecutor) -> Self {
        let tools = executor.registry().definitions();
        Self {
            selector: ToolSelector::new(config, prompts.selector.clone(), tools),
            executor,
            synthesizer: AnswerSynthesizer::new(config, prompts.answer.clone()),
            evaluator: ReflectionEvaluator::new(config, prompts.reflection.clone()),
            max_challenges: config.max_challenges.max(1),
            budget_policy: config.budget_policy.clone(),
        }
    }

    /// Attempts allowed per subtask.
    #[must_use]
    pub const fn max_challenges(&self) -> usize {
        self.max_challenges
    }

    /// Runs the retry loop for one subtask until it completes, exhausts its
    /// budget, or `cancel` fires.
    ///
    /// Never fails; degraded steps are logged and recorded in the subtask.
    pub async fn run(
        &self,
        provider: &dyn LlmProvider,
        input: SubtaskInput<'_>,
        cancel: &CancellationToken,
    ) -> SubtaskReport {
        let description = input.description;
        let mut attempts = Attempts::new(input);
        let mut state = SubtaskState::Init;

        info!(subtask = description, "subtask started");

        while !state.is_terminal() {
            if cancel.is_cancelled() {
                return self.interrupt(description, attempts);
            }
            let next = match state {
                SubtaskState::Init => Some(SubtaskState::SelectingTools),
                SubtaskState::SelectingTools => {
                    self.select(provider, &mut attempts, cancel).await
                }
                SubtaskState::ExecutingTools => self.execute(&mut attempts, cancel).await,
                SubtaskState::Answering => {
                    self.draft(provider, description, &mut attempts, cancel).await
                }
                SubtaskState::Reflecting => {
                    self.reflect(provider, input, &mut attempts, cancel).await
                }
                SubtaskState::Looping => Some(Self::carry_advice(&mut attempts)),
                SubtaskState::Completed | SubtaskState::BudgetExhausted => Some(state),
            };
            let Some(next) = next else {
                return self.interrupt(description, attempts);
            };
            debug!(
                subtask = description,
                attempt = attempts.challenge_count,
                from = ?state,
                to = ?next,
                "state transition"
            );
            state = next;
        }

        let subtask = attempts.finish(description, state, &self.budget_policy);
        info!(
            subtask = description,
            attempts = subtask.challenge_count,
            completed = subtask.is_completed,
            "subtask finished"
        );
        SubtaskReport {
            subtask,
            interrupted: false,
        }
    }

    async fn select(
        &self,
        provider: &dyn LlmProvider,
        attempts: &mut Attempts,
        cancel: &CancellationToken,
    ) -> Option<SubtaskState> {
        attempts.challenge_count += 1;
        let selection = match or_cancel(cancel, self.selector.select(provider, &attempts.log))
            .await?
        {
            Ok(selection) => selection,
            Err(e) => {
                warn!(attempt = attempts.challenge_count, error = %e, "selection failed, continuing without tools");
                Selection::none()
            }
        };
        attempts.usage.accumulate(selection.usage);
        attempts.log = attempts.log.append(selection.message);
        attempts.pending_batch = Vec::new();

        if selection.invocations.is_empty() {
            attempts.pending_calls = Vec::new();
            Some(SubtaskState::Answering)
        } else {
            attempts.pending_calls = selection.invocations;
            Some(SubtaskState::ExecutingTools)
        }
    }

    async fn execute(
        &self,
        attempts: &mut Attempts,
        cancel: &CancellationToken,
    ) -> Option<SubtaskState> {
        let calls = std::mem::take(&mut attempts.pending_calls);
        let round = or_cancel(cancel, self.executor.execute(&calls)).await?;
        attempts.log = attempts.log.extend(round.messages);
        attempts.pending_batch = round.batch;
        Some(SubtaskState::Answering)
    }

    async fn draft(
        &self,
        provider: &dyn LlmProvider,
        description: &str,
        attempts: &mut Attempts,
        cancel: &CancellationToken,
    ) -> Option<SubtaskState> {
        attempts
            .batches
            .push(std::mem::take(&mut attempts.pending_batch));

        let drafted = or_cancel(
            cancel,
            self.synthesizer
                .answer(provider, &attempts.log, description, &attempts.batches),
        )
        .await?;

        let answer = match drafted {
            Ok((answer, usage)) => {
                attempts.usage.accumulate(usage);
                answer
            }
            Err(e) => {
                warn!(attempt = attempts.challenge_count, error = %e, "synthesis failed, carrying previous answer forward");
                attempts.last_answer().to_string()
            }
        };
        attempts.log = attempts.log.append(assistant_message(&answer));
        attempts.answer = Some(answer);
        Some(SubtaskState::Reflecting)
    }

    async fn reflect(
        &self,
        provider: &dyn LlmProvider,
        input: SubtaskInput<'_>,
        attempts: &mut Attempts,
        cancel: &CancellationToken,
    ) -> Option<SubtaskState> {
        let history = attempts.advice_history();
        let review = ReviewInput {
            subtask: input.description,
            answer: attempts.last_answer(),
            batches: &attempts.batches,
            advice_history: &history,
            other_subtasks: input.other_subtasks,
        };
        let verdict = match or_cancel(cancel, self.evaluator.evaluate(provider, review)).await? {
            Ok((verdict, usage)) => {
                attempts.usage.accumulate(usage);
                verdict
            }
            Err(e) => {
                warn!(attempt = attempts.challenge_count, error = %e, "evaluation failed, treating answer as incomplete");
                ReflectionResult::no_guidance()
            }
        };

        let is_completed = verdict.is_completed;
        debug!(
            attempt = attempts.challenge_count,
            is_completed,
            advice = %verdict.advice,
            "reflection"
        );
        attempts.reflections.push(verdict);
        attempts.reviewed_answer.clone_from(&attempts.answer);

        Some(if is_completed {
            SubtaskState::Completed
        } else if attempts.challenge_count >= self.max_challenges {
            SubtaskState::BudgetExhausted
        } else {
            SubtaskState::Looping
        })
    }

    fn carry_advice(attempts: &mut Attempts) -> SubtaskState {
        if let Some(latest) = attempts.reflections.last() {
            let message = build_advice_message(attempts.challenge_count, &latest.advice);
            attempts.log = attempts.log.append(user_message(&message));
        }
        SubtaskState::SelectingTools
    }

    fn interrupt(&self, description: &str, mut attempts: Attempts) -> SubtaskReport {
        attempts.discard_partial_attempt();
        warn!(
            subtask = description,
            attempts = attempts.challenge_count,
            "subtask interrupted by cancellation"
        );
        SubtaskReport {
            subtask: attempts.finish(
                description,
                SubtaskState::BudgetExhausted,
                &self.budget_policy,
            ),
            interrupted: true,
        }
    }
}

/// Awaits `fut` unless `cancel` fires first.
async fn or_cancel<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}
