//! CLI layer for the help desk agent.
//!
//! Provides the command-line interface using clap, with commands for
//! answering inquiries, planning, and managing the document index.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{AgentOptions, Cli, Commands};
