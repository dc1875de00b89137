//! Language model backend selection.
//!
//! The coordinator shares one provider across the planner and every
//! subtask, so the factory hands out an [`Arc`] directly.

use std::sync::Arc;

use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Provider names accepted by [`create_provider`].
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai"];

/// Builds the shared [`LlmProvider`] named by [`AgentConfig::provider`].
///
/// Names are matched case-insensitively. `"openai"` covers any
/// OpenAI-compatible endpoint reachable at [`AgentConfig::base_url`].
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for names outside
/// [`SUPPORTED_PROVIDERS`].
pub fn create_provider(config: &AgentConfig) -> Result<Arc<dyn LlmProvider>, AgentError> {
    let provider: Arc<dyn LlmProvider> = match config.provider.trim().to_lowercase().as_str() {
        "openai" => Arc::new(OpenAiProvider::new(config)),
        _ => {
            return Err(AgentError::UnsupportedProvider {
                name: config.provider.clone(),
            });
        }
    };
    debug!(provider = provider.name(), model = %config.model, "language model backend ready");
    Ok(provider)
}
