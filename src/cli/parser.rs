//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default document database path, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".helpdesk/documents.db";

/// Help desk agent: answers product inquiries from a manual and a Q&A
/// archive.
///
/// Splits an inquiry into subtasks, researches each one with retrieval
/// tools under a bounded retry loop, and composes a single reply.
#[derive(Parser, Debug)]
#[command(name = "helpdesk-agent")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the document database.
    ///
    /// Defaults to `.helpdesk/documents.db` in the current directory.
    #[arg(short, long, env = "HELPDESK_DB_PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that call the language model.
///
/// Unset options fall back to environment variables, then defaults.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AgentOptions {
    /// Attempts allowed per subtask.
    #[arg(long)]
    pub max_challenges: Option<usize>,

    /// Model identifier for every agent role.
    #[arg(long)]
    pub model: Option<String>,

    /// Directory containing prompt template files.
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer an inquiry.
    ///
    /// Plans subtasks, researches each with `manual-search` and
    /// `qa-search`, and prints the composed reply. Press Ctrl+C to stop
    /// early and keep the subtasks finished so far. Requires an
    /// OpenAI-compatible API key.
    #[command(after_help = r#"Examples:
  helpdesk-agent ask "How do I reset my password?"
  helpdesk-agent ask "Two-factor setup fails and backup mails stopped" --max-challenges 5
  helpdesk-agent --format json ask "How do I export invoices?" | jq '.subtasks[].is_completed'
  OPENAI_API_KEY=sk-... helpdesk-agent ask "..." --model gpt-4o-mini
"#)]
    Ask {
        /// The inquiry to answer.
        question: String,

        /// Agent options.
        #[command(flatten)]
        options: AgentOptions,
    },

    /// Show how an inquiry would be split into subtasks.
    Plan {
        /// The inquiry to plan.
        question: String,

        /// Agent options.
        #[command(flatten)]
        options: AgentOptions,
    },

    /// Index a directory of text files into a tool's collection.
    #[command(after_help = r#"Examples:
  helpdesk-agent index --name manual-search ./docs/manual
  helpdesk-agent index --name qa-search ./docs/qa
  helpdesk-agent --db ./kb.db index --name manual-search ./manual
"#)]
    Index {
        /// Directory to index (`.txt`, `.md` files, recursively).
        dir: PathBuf,

        /// Tool (collection) name: `manual-search` or `qa-search`.
        #[arg(short, long)]
        name: String,
    },

    /// Run one retrieval tool directly.
    Search {
        /// Search keywords.
        keywords: String,

        /// Tool (collection) name: `manual-search` or `qa-search`.
        #[arg(short, long)]
        name: String,

        /// Maximum number of snippets.
        #[arg(short = 'k', long, default_value_t = crate::tools::DEFAULT_TOP_K)]
        top_k: usize,
    },

    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched. Defaults to
    /// `~/.config/helpdesk-agent/prompts`.
    InitPrompts {
        /// Target directory.
        dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }
}
