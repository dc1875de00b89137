//! Scripted providers and tools shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use super::tool::{SearchOutput, ToolInvocation, ToolPort};
use crate::error::AgentError;

type Scripted = Mutex<VecDeque<Result<ChatResponse, AgentError>>>;

pub fn usage() -> TokenUsage {
    TokenUsage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

pub fn text(content: &str) -> Result<ChatResponse, AgentError> {
    Ok(ChatResponse {
        content: content.to_string(),
        usage: usage(),
        finish_reason: Some("stop".to_string()),
        ..ChatResponse::default()
    })
}

pub fn tool_calls(calls: &[(&str, &str)]) -> Result<ChatResponse, AgentError> {
    Ok(ChatResponse {
        content: String::new(),
        usage: usage(),
        tool_calls: calls
            .iter()
            .enumerate()
            .map(|(i, (tool, keywords))| ToolInvocation {
                id: format!("call_{i}"),
                tool_name: (*tool).to_string(),
                arguments: serde_json::json!({ "keywords": keywords }).to_string(),
            })
            .collect(),
        finish_reason: Some("tool_calls".to_string()),
    })
}

pub fn verdict(is_completed: bool, advice: &str) -> Result<ChatResponse, AgentError> {
    text(&serde_json::json!({ "advice": advice, "is_completed": is_completed }).to_string())
}

pub fn failure() -> Result<ChatResponse, AgentError> {
    Err(AgentError::ApiRequest {
        message: "connection reset".to_string(),
        status: None,
    })
}

/// Agent role a request belongs to, inferred from its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    Plan,
    Select,
    Answer,
    Reflect,
    Final,
}

fn role_of(request: &ChatRequest) -> CallRole {
    match request.response_schema.as_ref().map(|s| s.name.as_str()) {
        Some("plan") => CallRole::Plan,
        Some(_) => CallRole::Reflect,
        None if !request.tools.is_empty() => CallRole::Select,
        None if request
            .messages
            .iter()
            .any(|m| m.content.contains("<subtask_answers>")) =>
        {
            CallRole::Final
        }
        None => CallRole::Answer,
    }
}

/// Provider with one response queue per agent role.
///
/// Empty queues fall back to: no tool selected, a numbered answer, an
/// incomplete verdict with numbered advice, and a fixed final answer.
#[derive(Default)]
pub struct RoutedProvider {
    plans: Scripted,
    selections: Scripted,
    answers: Scripted,
    verdicts: Scripted,
    finals: Scripted,
    answer_calls: AtomicUsize,
    verdict_calls: AtomicUsize,
    cancel_on: Option<(CallRole, usize, CancellationToken)>,
    pub requests: Mutex<Vec<(CallRole, ChatRequest)>>,
}

impl RoutedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(queue: &Scripted, response: Result<ChatResponse, AgentError>) {
        if let Ok(mut q) = queue.lock() {
            q.push_back(response);
        }
    }

    pub fn plan(self, response: Result<ChatResponse, AgentError>) -> Self {
        Self::push(&self.plans, response);
        self
    }

    pub fn select(self, response: Result<ChatResponse, AgentError>) -> Self {
        Self::push(&self.selections, response);
        self
    }

    pub fn answer(self, response: Result<ChatResponse, AgentError>) -> Self {
        Self::push(&self.answers, response);
        self
    }

    pub fn reflect(self, response: Result<ChatResponse, AgentError>) -> Self {
        Self::push(&self.verdicts, response);
        self
    }

    pub fn finish(self, response: Result<ChatResponse, AgentError>) -> Self {
        Self::push(&self.finals, response);
        self
    }

    /// Cancels `token` on the `n`-th answer call (one-based) and never
    /// responds to it.
    pub fn cancel_on_answer(self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on(CallRole::Answer, n, token)
    }

    /// Same as [`Self::cancel_on_answer`], for review calls.
    pub fn cancel_on_reflect(self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on(CallRole::Reflect, n, token)
    }

    fn cancel_on(mut self, role: CallRole, n: usize, token: CancellationToken) -> Self {
        self.cancel_on = Some((role, n, token));
        self
    }

    async fn hang_if_cancelling(&self, role: CallRole, n: usize) {
        if let Some((at_role, at, token)) = &self.cancel_on {
            if *at_role == role && *at == n {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn calls(&self, role: CallRole) -> usize {
        self.requests
            .lock()
            .map_or(0, |r| r.iter().filter(|(r, _)| *r == role).count())
    }

    pub fn requests_for(&self, role: CallRole) -> Vec<ChatRequest> {
        self.requests.lock().map_or_else(
            |_| Vec::new(),
            |r| {
                r.iter()
                    .filter(|(r, _)| *r == role)
                    .map(|(_, req)| req.clone())
                    .collect()
            },
        )
    }

    fn pop(queue: &Scripted) -> Option<Result<ChatResponse, AgentError>> {
        queue.lock().ok().and_then(|mut q| q.pop_front())
    }
}

#[async_trait]
impl LlmProvider for RoutedProvider {
    fn name(&self) -> &'static str {
        "routed"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let role = role_of(request);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((role, request.clone()));
        }
        match role {
            CallRole::Plan => Self::pop(&self.plans).unwrap_or_else(failure),
            CallRole::Select => {
                Self::pop(&self.selections).unwrap_or_else(|| text("no tool needed"))
            }
            CallRole::Answer => {
                let n = self.answer_calls.fetch_add(1, Ordering::SeqCst) + 1;
                self.hang_if_cancelling(role, n).await;
                Self::pop(&self.answers).unwrap_or_else(|| text(&format!("answer {n}")))
            }
            CallRole::Reflect => {
                let n = self.verdict_calls.fetch_add(1, Ordering::SeqCst) + 1;
                self.hang_if_cancelling(role, n).await;
                Self::pop(&self.verdicts)
                    .unwrap_or_else(|| verdict(false, &format!("advice {n}")))
            }
            CallRole::Final => Self::pop(&self.finals).unwrap_or_else(|| text("final answer")),
        }
    }
}

/// Tool that always reports its backend as unavailable.
pub struct BrokenTool {
    pub name: &'static str,
}

#[async_trait]
impl ToolPort for BrokenTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "always unavailable"
    }

    async fn invoke(&self, _keywords: &str) -> Result<Vec<SearchOutput>, AgentError> {
        Err(AgentError::ToolInvocation {
            name: self.name.to_string(),
            message: "index offline".to_string(),
        })
    }
}

/// Tool returning one fixed snippet per call.
pub struct StaticTool {
    pub name: &'static str,
    pub snippet: &'static str,
}

#[async_trait]
impl ToolPort for StaticTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "returns a fixed snippet"
    }

    async fn invoke(&self, _keywords: &str) -> Result<Vec<SearchOutput>, AgentError> {
        Ok(vec![SearchOutput {
            source_name: format!("{}.txt", self.name),
            content: self.snippet.to_string(),
        }])
    }
}
