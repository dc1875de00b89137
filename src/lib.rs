//! # helpdesk-agent
//!
//! A plan-and-reflect help desk agent. An inquiry is split into subtasks;
//! each subtask is researched with retrieval tools and its draft answer is
//! reviewed, with the review's advice driving a bounded number of retries.
//! The subtask answers are then merged into one reply.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use helpdesk_agent::agent::{AgentConfig, AgentCoordinator, ToolRegistry, create_provider};
//! use helpdesk_agent::tools::{DocumentSearchTool, DocumentStore};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env()?;
//! let store = DocumentStore::new(".helpdesk/documents.db");
//! let tools = ToolRegistry::new()
//!     .with_tool(Arc::new(DocumentSearchTool::manual(store.clone())))
//!     .with_tool(Arc::new(DocumentSearchTool::qa(store)));
//!
//! let provider = create_provider(&config)?;
//! let coordinator = AgentCoordinator::new(provider, &config, tools);
//! let result = coordinator
//!     .run("How do I reset my password?", &CancellationToken::new())
//!     .await?;
//! println!("{}", result.final_answer);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod tools;

pub use agent::{AgentConfig, AgentCoordinator, AgentResult};
pub use error::{AgentError, CommandError, Error, Result};
