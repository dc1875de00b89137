//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default OpenAI-compatible endpoint.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default model identifier.
const DEFAULT_MODEL: &str = "gpt-4o";
/// Default attempts per subtask.
const DEFAULT_MAX_CHALLENGES: usize = 3;
/// Default max tokens per model call.
const DEFAULT_MAX_TOKENS: u32 = 4096;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default retries after a failed model call ("one retry").
const DEFAULT_MAX_CALL_RETRIES: u32 = 1;
/// Default concurrent tool invocations within one attempt.
const DEFAULT_MAX_TOOL_CONCURRENCY: usize = 8;

/// What a subtask reports when its retry budget runs out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BudgetPolicy {
    /// Keep the last drafted answer and flag the subtask incomplete.
    #[default]
    RetainLastAnswer,
    /// Replace the answer with an explicit failure marker.
    FailureMarker(String),
}

impl BudgetPolicy {
    /// Resolves the final answer for a subtask that exhausted its budget.
    #[must_use]
    pub fn resolve(&self, last_answer: &str) -> String {
        match self {
            Self::RetainLastAnswer => last_answer.to_string(),
            Self::FailureMarker(marker) => marker.clone(),
        }
    }
}

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Model identifier used by every agent role.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    /// Request timeout enforced by the provider.
    pub timeout: Duration,
    /// Attempts allowed per subtask before it is finalized incomplete.
    pub max_challenges: usize,
    /// Retries after a failed model call in planning, selection,
    /// synthesis and evaluation.
    pub max_call_retries: u32,
    /// Maximum tools invoked concurrently in one attempt.
    pub max_tool_concurrency: usize,
    /// Policy applied when a subtask exhausts its retry budget.
    pub budget_policy: BudgetPolicy,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout: Option<Duration>,
    max_challenges: Option<usize>,
    max_call_retries: Option<u32>,
    max_tool_concurrency: Option<usize>,
    budget_policy: Option<BudgetPolicy>,
    prompt_dir: Option<PathBuf>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("HELPDESK_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_API_BASE")
                .or_else(|_| std::env::var("OPENAI_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("OPENAI_MODEL").ok();
        }
        if self.max_challenges.is_none() {
            self.max_challenges = std::env::var("HELPDESK_MAX_CHALLENGES")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.max_tool_concurrency.is_none() {
            self.max_tool_concurrency = std::env::var("HELPDESK_MAX_TOOL_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("HELPDESK_PROMPT_DIR")
                .ok()
                .map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the max tokens per response.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the per-subtask attempt budget.
    #[must_use]
    pub const fn max_challenges(mut self, n: usize) -> Self {
        self.max_challenges = Some(n);
        self
    }

    /// Sets the retries after a failed model call.
    #[must_use]
    pub const fn max_call_retries(mut self, n: u32) -> Self {
        self.max_call_retries = Some(n);
        self
    }

    /// Sets the concurrent tool invocation limit.
    #[must_use]
    pub const fn max_tool_concurrency(mut self, n: usize) -> Self {
        self.max_tool_concurrency = Some(n);
        self
    }

    /// Sets the budget exhaustion policy.
    #[must_use]
    pub fn budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.budget_policy = Some(policy);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::Configuration`] for a zero attempt budget.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let max_challenges = self.max_challenges.unwrap_or(DEFAULT_MAX_CHALLENGES);
        if max_challenges == 0 {
            return Err(AgentError::configuration(
                "max_challenges must be at least 1",
            ));
        }

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(0.0),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_challenges,
            max_call_retries: self.max_call_retries.unwrap_or(DEFAULT_MAX_CALL_RETRIES),
            max_tool_concurrency: self
                .max_tool_concurrency
                .unwrap_or(DEFAULT_MAX_TOOL_CONCURRENCY)
                .max(1),
            budget_policy: self.budget_policy.unwrap_or_default(),
            prompt_dir: self.prompt_dir,
        })
    }
}
