//! Tool executor that fans one attempt's invocations out to registered tools.
//!
//! Invocations run concurrently (bounded by a semaphore) and are collected
//! back in invocation order. A failing tool yields an empty [`ToolResult`]
//! and never affects its siblings.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::message::{ChatMessage, tool_message};
use super::tool::{AttemptBatch, SearchOutput, ToolInvocation, ToolRegistry, ToolResult, render_results};
use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the model.
const MAX_TOOL_ARGS_LEN: usize = 10_000;

/// Output of one execution round.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRound {
    /// One result per invocation, in invocation order.
    pub batch: AttemptBatch,
    /// Tool messages answering each invocation, for the conversation log.
    pub messages: Vec<ChatMessage>,
}

/// Dispatches tool invocations by name through a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
    max_concurrency: usize,
}

impl ToolExecutor {
    /// Creates an executor over `registry` running at most `max_concurrency`
    /// tools at once.
    #[must_use]
    pub fn new(registry: ToolRegistry, max_concurrency: usize) -> Self {
        Self {
            registry,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Tools available to this executor.
    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs every invocation and collects an [`ExecutionRound`].
    ///
    /// Never fails: unknown tools, bad arguments and tool errors are logged
    /// and produce a result with no snippets.
    pub async fn execute(&self, invocations: &[ToolInvocation]) -> ExecutionRound {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let tasks = invocations.iter().map(|call| {
            let sem = Arc::clone(&semaphore);
            async move {
                let _permit = sem.acquire().await.ok();
                self.invoke_one(call).await
            }
        });

        let outcomes = join_all(tasks).await;

        let mut round = ExecutionRound::default();
        for (call, outcome) in invocations.iter().zip(outcomes) {
            let results = outcome.unwrap_or_else(|e| {
                warn!(tool = %call.tool_name, error = %e, "tool invocation failed");
                Vec::new()
            });
            round
                .messages
                .push(tool_message(&call.id, &render_results(&results)));
            round.batch.push(ToolResult {
                tool_name: call.tool_name.clone(),
                arguments: call.arguments.clone(),
                results,
            });
        }

        debug!(
            invocations = invocations.len(),
            snippets = round.batch.iter().map(|r| r.results.len()).sum::<usize>(),
            "tool round finished"
        );
        round
    }

    async fn invoke_one(&self, call: &ToolInvocation) -> Result<Vec<SearchOutput>, AgentError> {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return Err(AgentError::ToolInvocation {
                name: call.tool_name.clone(),
                message: format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
            });
        }

        let tool = self
            .registry
            .get(&call.tool_name)
            .ok_or_else(|| AgentError::ToolInvocation {
                name: call.tool_name.clone(),
                message: "unknown tool".to_string(),
            })?;

        let keywords = call.keywords()?;
        debug!(tool = %call.tool_name, keywords = %keywords, "invoking tool");
        tool.invoke(&keywords).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::agent::testing::BrokenTool;
    use crate::agent::tool::ToolPort;

    struct FixedTool {
        name: &'static str,
        delay_ms: u64,
        snippet: &'static str,
    }

    #[async_trait]
    impl ToolPort for FixedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "returns one fixed snippet"
        }

        async fn invoke(&self, keywords: &str) -> Result<Vec<SearchOutput>, AgentError> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Ok(vec![SearchOutput {
                source_name: format!("{}.txt", self.name),
                content: format!("{} ({keywords})", self.snippet),
            }])
        }
    }

    fn call(id: &str, tool: &str, keywords: &str) -> ToolInvocation {
        ToolInvocation {
            id: id.to_string(),
            tool_name: tool.to_string(),
            arguments: serde_json::json!({ "keywords": keywords }).to_string(),
        }
    }

    fn executor(registry: ToolRegistry) -> ToolExecutor {
        ToolExecutor::new(registry, 4)
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_both_entries() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(FixedTool {
                name: "manual-search",
                delay_ms: 0,
                snippet: "Open Settings > Security.",
            }))
            .with_tool(Arc::new(BrokenTool { name: "qa-search" }));
        let round = executor(registry)
            .execute(&[
                call("c1", "manual-search", "two-factor"),
                call("c2", "qa-search", "two-factor"),
            ])
            .await;

        assert_eq!(round.batch.len(), 2);
        assert_eq!(round.batch[0].results.len(), 1);
        assert!(round.batch[1].results.is_empty());
        assert_eq!(round.messages.len(), 2);
        assert_eq!(round.messages[1].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(round.messages[1].content, "(no results)");
    }

    #[tokio::test]
    async fn test_order_follows_invocations_not_completion() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(FixedTool {
                name: "slow",
                delay_ms: 40,
                snippet: "slow",
            }))
            .with_tool(Arc::new(FixedTool {
                name: "fast",
                delay_ms: 0,
                snippet: "fast",
            }));
        let exec = executor(registry);
        let calls = [call("c1", "slow", "a"), call("c2", "fast", "b")];

        let first = exec.execute(&calls).await;
        let second = exec.execute(&calls).await;

        assert_eq!(first.batch[0].tool_name, "slow");
        assert_eq!(first.batch[1].tool_name, "fast");
        assert_eq!(first.batch, second.batch);
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments_yield_empty_results() {
        let exec = executor(ToolRegistry::new().with_tool(Arc::new(FixedTool {
            name: "manual-search",
            delay_ms: 0,
            snippet: "x",
        })));
        let bad_args = ToolInvocation {
            id: "c2".to_string(),
            tool_name: "manual-search".to_string(),
            arguments: "{}".to_string(),
        };
        let round = exec
            .execute(&[call("c1", "sql", "users"), bad_args])
            .await;
        assert_eq!(round.batch.len(), 2);
        assert!(round.batch.iter().all(|r| r.results.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_invocations() {
        let round = executor(ToolRegistry::new()).execute(&[]).await;
        assert!(round.batch.is_empty());
        assert!(round.messages.is_empty());
    }
}
