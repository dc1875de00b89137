//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::Serialize;

use crate::agent::result::{AgentResult, Plan, Subtask};
use crate::agent::tool::SearchOutput;
use crate::error::{CommandError, Result};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name, defaulting to text for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::OutputFormat`] if `value` cannot be serialized.
    pub fn to_json<T: Serialize>(self, value: &T) -> Result<String> {
        serde_json::to_string_pretty(value)
            .map(|s| format!("{s}\n"))
            .map_err(|e| CommandError::OutputFormat(e.to_string()).into())
    }
}

/// Renders a finished run as text: the reply, then a status footer.
#[must_use]
pub fn format_agent_result(result: &AgentResult) -> String {
    let mut output = result.final_answer.trim_end().to_string();
    output.push_str("\n\n---\n");

    for (idx, subtask) in result.subtasks.iter().enumerate() {
        write_subtask_line(&mut output, idx + 1, subtask, status_label(subtask));
    }
    if let Some(subtask) = &result.interrupted {
        write_subtask_line(&mut output, result.subtasks.len() + 1, subtask, "interrupted");
    }
    let skipped = result
        .plan
        .len()
        .saturating_sub(result.subtasks.len() + usize::from(result.interrupted.is_some()));
    if skipped > 0 {
        let _ = writeln!(output, "({skipped} subtask(s) not started)");
    }

    let _ = writeln!(
        output,
        "Tokens: {} | Time: {:.1}s{}",
        result.usage.total_tokens,
        result.elapsed.as_secs_f64(),
        if result.cancelled { " | cancelled" } else { "" }
    );
    output
}

/// Renders a plan as a numbered list.
#[must_use]
pub fn format_plan(plan: &Plan) -> String {
    let mut output = String::new();
    for (idx, subtask) in plan.subtasks().iter().enumerate() {
        let _ = writeln!(output, "{}. {subtask}", idx + 1);
    }
    output
}

/// Renders search hits with their source names.
#[must_use]
pub fn format_search_results(tool: &str, hits: &[SearchOutput]) -> String {
    if hits.is_empty() {
        return format!("No results from {tool}.\n");
    }
    let mut output = format!("{} result(s) from {tool}:\n", hits.len());
    for hit in hits {
        let _ = write!(output, "\n[{}]\n{}\n", hit.source_name, hit.content.trim());
    }
    output
}

const fn status_label(subtask: &Subtask) -> &'static str {
    if subtask.is_completed {
        "done"
    } else {
        "incomplete"
    }
}

fn write_subtask_line(output: &mut String, number: usize, subtask: &Subtask, status: &str) {
    let _ = writeln!(
        output,
        "[{status}] {number}. {} (attempts: {})",
        subtask.description, subtask.challenge_count
    );
}
