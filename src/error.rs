//! Error types for the help desk agent.
//!
//! [`AgentError`] covers the orchestration core. Its variants follow the
//! failure taxonomy of a run: configuration and planning failures are fatal,
//! everything else is localized to one attempt (or one tool) and degraded
//! by the orchestrator. [`CommandError`] wraps failures at the CLI boundary.

use thiserror::Error;

/// Result alias used by CLI commands.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the agent core.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was supplied through the builder or the environment.
    #[error("API key missing: set OPENAI_API_KEY or pass one to the config builder")]
    ApiKeyMissing,

    /// The configured provider name has no implementation.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name that was requested.
        name: String,
    },

    /// Any other invalid or missing setting.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The question could not be decomposed into a plan.
    #[error("planning failed: {message}")]
    Planning {
        /// Description of the failure.
        message: String,
    },

    /// The model's tool selection could not be used.
    #[error("tool selection failed: {message}")]
    Selection {
        /// Description of the failure.
        message: String,
    },

    /// The model failed to draft a subtask answer.
    #[error("answer synthesis failed: {message}")]
    Synthesis {
        /// Description of the failure.
        message: String,
    },

    /// The reflection step failed to produce a verdict.
    #[error("evaluation failed: {message}")]
    Evaluation {
        /// Description of the failure.
        message: String,
    },

    /// A single tool invocation failed.
    #[error("tool '{name}' failed: {message}")]
    ToolInvocation {
        /// Tool name.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// Transport-level failure talking to the language model.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error text.
        message: String,
        /// HTTP status, when the provider exposes one.
        status: Option<u16>,
    },

    /// A structured response did not match the requested schema.
    #[error("response does not match schema '{schema}': {message}")]
    SchemaMismatch {
        /// Name of the expected schema.
        schema: String,
        /// Decoder error text.
        message: String,
        /// Raw model output.
        content: String,
    },

    /// The run was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,
}

impl AgentError {
    /// Returns `true` for failures that abort a whole run.
    ///
    /// Everything else stays inside the attempt (or tool) that produced it.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ApiKeyMissing
                | Self::UnsupportedProvider { .. }
                | Self::Configuration { .. }
                | Self::Planning { .. }
        )
    }

    /// Builds a [`AgentError::Configuration`] from any message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors raised by CLI command handlers.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered in the requested format.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),

    /// Argument values were rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Top-level error for the binary and command layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Failure from the agent core.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Failure from a command handler.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// SQLite failure in the document store.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(AgentError::ApiKeyMissing.is_fatal());
        assert!(
            AgentError::Planning {
                message: "empty".to_string()
            }
            .is_fatal()
        );
        assert!(AgentError::configuration("bad").is_fatal());
    }

    #[test]
    fn test_localized_kinds() {
        let localized = [
            AgentError::Selection {
                message: String::new(),
            },
            AgentError::Synthesis {
                message: String::new(),
            },
            AgentError::Evaluation {
                message: String::new(),
            },
            AgentError::ToolInvocation {
                name: "manual-search".to_string(),
                message: String::new(),
            },
        ];
        for err in &localized {
            assert!(!err.is_fatal(), "{err} should not be fatal");
        }
    }

    #[test]
    fn test_display_includes_tool_name() {
        let err = AgentError::ToolInvocation {
            name: "qa-search".to_string(),
            message: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "tool 'qa-search' failed: timeout");
    }

    #[test]
    fn test_error_from_agent_error() {
        let err: Error = AgentError::Cancelled.into();
        assert!(matches!(err, Error::Agent(AgentError::Cancelled)));
    }
}
