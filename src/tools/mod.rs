//! Retrieval tools available to the agent.
//!
//! Each tool implements [`ToolPort`](crate::agent::tool::ToolPort) and is
//! registered by name in a [`ToolRegistry`](crate::agent::tool::ToolRegistry).

pub mod document;

pub use document::{DEFAULT_TOP_K, DocumentSearchTool, DocumentStore};
