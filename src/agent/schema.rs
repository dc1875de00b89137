//! Structured-output schemas and typed decoding.
//!
//! A [`ResponseSchema`] travels on the request so the provider can enforce
//! it; [`decode`] validates the returned text into a concrete type and
//! reports mismatches as [`AgentError::SchemaMismatch`].

use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::AgentError;

/// JSON schema a model response must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    /// Schema name (sent to the provider).
    pub name: String,
    /// What the structured object represents.
    pub description: String,
    /// JSON Schema object.
    pub schema: serde_json::Value,
}

/// Schema for a decomposition plan: `{"subtasks": [string]}`.
#[must_use]
pub fn plan_schema() -> ResponseSchema {
    ResponseSchema {
        name: "plan".to_string(),
        description: "Ordered subtasks that together answer the question.".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "subtasks": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Subtask list for solving the problem, in execution order."
                }
            },
            "required": ["subtasks"],
            "additionalProperties": false
        }),
    }
}

/// Schema for a reflection verdict: `{"advice": string, "is_completed": bool}`.
#[must_use]
pub fn reflection_schema() -> ResponseSchema {
    ResponseSchema {
        name: "reflection".to_string(),
        description: "Verdict on a subtask answer.".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "advice": {
                    "type": "string",
                    "description": "If the answer is not acceptable, explain why and how to improve \
                                    it (another tool, other keywords). Must not repeat earlier advice \
                                    or other subtasks of the plan. Tool selection restarts from this advice."
                },
                "is_completed": {
                    "type": "boolean",
                    "description": "Whether the tool results and answer correctly resolve the subtask."
                }
            },
            "required": ["advice", "is_completed"],
            "additionalProperties": false
        }),
    }
}

/// Decodes a structured model response into `T`.
///
/// Markdown code fences around the JSON are tolerated.
///
/// # Errors
///
/// Returns [`AgentError::SchemaMismatch`] when the content is not valid JSON
/// for `T`.
pub fn decode<T: DeserializeOwned>(schema: &ResponseSchema, content: &str) -> Result<T, AgentError> {
    let json_str = strip_code_fence(content);
    serde_json::from_str::<T>(json_str).map_err(|e| AgentError::SchemaMismatch {
        schema: schema.name.clone(),
        message: e.to_string(),
        content: content.to_string(),
    })
}

/// Strips a surrounding markdown code block, if any.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    }
}
