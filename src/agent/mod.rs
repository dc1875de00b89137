//! Help desk orchestration core.
//!
//! Answers a user inquiry by planning subtasks and resolving each one with a
//! bounded select → execute → answer → reflect loop. Language models are
//! reached through the pluggable [`LlmProvider`] abstraction; retrieval goes
//! through [`ToolPort`] implementations registered by name.
//!
//! # Architecture
//!
//! ```text
//! Question → AgentCoordinator
//!   ├── PlanGenerator (question → ordered subtasks)
//!   ├── for each subtask, in order: SubtaskOrchestrator
//!   │   ├── ToolSelector        (which tools, which keywords)
//!   │   ├── ToolExecutor        (concurrent fan-out → AttemptBatch)
//!   │   ├── AnswerSynthesizer   (draft from every batch so far)
//!   │   └── ReflectionEvaluator (accept, or advise the next attempt)
//!   └── FinalAnswerAgent → AgentResult
//! ```

pub mod client;
pub mod config;
pub mod conversation;
pub mod coordinator;
pub mod executor;
pub mod message;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod reflection;
pub mod result;
pub mod schema;
pub mod selector;
pub mod subtask;
pub mod synthesizer;
#[cfg(test)]
pub(crate) mod testing;
pub mod tool;
pub mod traits;

// Re-export key types
pub use client::create_provider;
pub use config::{AgentConfig, BudgetPolicy};
pub use conversation::ConversationLog;
pub use coordinator::AgentCoordinator;
pub use executor::ToolExecutor;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use planner::PlanGenerator;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use reflection::ReflectionEvaluator;
pub use result::{AgentResult, Plan, ReflectionResult, Subtask, SubtaskOutcome};
pub use selector::ToolSelector;
pub use subtask::{SubtaskOrchestrator, SubtaskState};
pub use synthesizer::{AnswerSynthesizer, FinalAnswerAgent};
pub use tool::{
    AttemptBatch, SearchOutput, ToolDefinition, ToolInvocation, ToolPort, ToolRegistry, ToolResult,
};
pub use traits::Agent;
