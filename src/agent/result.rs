//! Data types produced by a run: the plan, per-subtask records and the
//! final [`AgentResult`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::message::TokenUsage;
use super::tool::AttemptBatch;
use crate::error::AgentError;

/// Ordered, non-empty list of subtask descriptions.
///
/// Built once per question and never reordered afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    subtasks: Vec<String>,
}

impl Plan {
    /// Creates a plan, dropping blank entries.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Planning`] if no non-blank subtask remains.
    pub fn new(subtasks: Vec<String>) -> Result<Self, AgentError> {
        let subtasks: Vec<String> = subtasks
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if subtasks.is_empty() {
            return Err(AgentError::Planning {
                message: "plan contains no subtasks".to_string(),
            });
        }
        Ok(Self { subtasks })
    }

    /// Subtask descriptions in execution order.
    #[must_use]
    pub fn subtasks(&self) -> &[String] {
        &self.subtasks
    }

    /// Number of subtasks (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }
}

/// Wire shape of a plan returned by the model.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPlan {
    pub(crate) subtasks: Vec<String>,
}

/// Verdict on one candidate answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionResult {
    /// What to change on the next attempt; empty only when completed.
    pub advice: String,
    /// Whether the answer resolves the subtask.
    pub is_completed: bool,
}

/// Advice recorded when the evaluator could not produce a verdict.
pub const NO_GUIDANCE_ADVICE: &str = "retry with no specific guidance available";

impl ReflectionResult {
    /// Degraded verdict used when evaluation fails.
    #[must_use]
    pub fn no_guidance() -> Self {
        Self {
            advice: NO_GUIDANCE_ADVICE.to_string(),
            is_completed: false,
        }
    }
}

/// How a subtask's retry loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskOutcome {
    /// A reflection accepted the answer.
    Completed,
    /// The attempt budget ran out (or the run was cancelled).
    BudgetExhausted,
}

/// Record of one subtask's retry loop.
#[derive(Debug, Clone, Serialize)]
pub struct Subtask {
    /// Subtask description from the plan.
    pub description: String,
    /// Tool results per attempt.
    pub attempt_batches: Vec<AttemptBatch>,
    /// Reflection verdict per attempt.
    pub reflections: Vec<ReflectionResult>,
    /// Attempts taken.
    pub challenge_count: usize,
    /// Whether the last reflection accepted the answer.
    pub is_completed: bool,
    /// Terminal state of the loop.
    pub outcome: SubtaskOutcome,
    /// Answer of the last attempt (or the configured failure marker).
    pub final_answer: String,
    /// Tokens consumed by this subtask.
    pub usage: TokenUsage,
}

/// Complete output of one run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    /// The user's question.
    pub question: String,
    /// The decomposition used for the run.
    pub plan: Plan,
    /// Finished subtasks in plan order.
    pub subtasks: Vec<Subtask>,
    /// Composed final answer.
    pub final_answer: String,
    /// Subtask that was running when the run was cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<Subtask>,
    /// Whether the run was cancelled before finishing the plan.
    pub cancelled: bool,
    /// Tokens consumed by the whole run.
    pub usage: TokenUsage,
    /// Wall-clock time of the run.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl AgentResult {
    /// Subtasks that ended without an accepted answer.
    pub fn incomplete_subtasks(&self) -> impl Iterator<Item = &Subtask> {
        self.subtasks.iter().filter(|s| !s.is_completed)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_drops_blank_entries() {
        let plan = Plan::new(vec![
            " two-factor setup ".to_string(),
            String::new(),
            "backup notifications".to_string(),
        ])
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(plan.subtasks(), ["two-factor setup", "backup notifications"]);
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_plan_rejects_empty() {
        assert!(matches!(
            Plan::new(vec!["  ".to_string()]),
            Err(AgentError::Planning { .. })
        ));
    }

    #[test]
    fn test_plan_trims_descriptions() {
        let plan = Plan::new(vec!["  password reset  ".to_string(), String::new()])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(plan.subtasks(), ["password reset"]);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_reflection_deserialization() {
        let json = r#"{"advice": "", "is_completed": true}"#;
        let verdict: ReflectionResult =
            serde_json::from_str(json).unwrap_or_else(|_| unreachable!());
        assert!(verdict.is_completed);
    }

    #[test]
    fn test_no_guidance_is_incomplete_with_advice() {
        let verdict = ReflectionResult::no_guidance();
        assert!(!verdict.is_completed);
        assert!(!verdict.advice.is_empty());
    }

    #[test]
    fn test_agent_result_serializes_elapsed_as_seconds() {
        let result = AgentResult {
            question: "q".to_string(),
            plan: Plan::new(vec!["q".to_string()]).unwrap_or_else(|_| unreachable!()),
            subtasks: Vec::new(),
            final_answer: "a".to_string(),
            interrupted: None,
            cancelled: false,
            usage: TokenUsage::default(),
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&result).unwrap_or_default();
        assert_eq!(json["elapsed"], 1.5);
        assert_eq!(json["plan"]["subtasks"][0], "q");
        assert!(json.get("interrupted").is_none());
    }
}
