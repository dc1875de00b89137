//! Command implementations.
//!
//! Each command returns its rendered output; printing is left to the
//! binary. Async work runs on a runtime created per command.

use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::agent::client::create_provider;
use crate::agent::config::AgentConfig;
use crate::agent::coordinator::AgentCoordinator;
use crate::agent::prompt::PromptSet;
use crate::agent::tool::ToolRegistry;
use crate::cli::output::{OutputFormat, format_agent_result, format_plan, format_search_results};
use crate::cli::parser::{AgentOptions, Cli, Commands};
use crate::error::{CommandError, Result};
use crate::tools::{DocumentSearchTool, DocumentStore};

/// Tool names accepted by `index` and `search`.
const KNOWN_TOOLS: &[&str] = &["manual-search", "qa-search"];

/// Executes the parsed command and returns its output.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Ask { question, options } => cmd_ask(&db_path, question, options, format),
        Commands::Plan { question, options } => cmd_plan(&db_path, question, options, format),
        Commands::Index { dir, name } => cmd_index(&db_path, name, dir, format),
        Commands::Search {
            keywords,
            name,
            top_k,
        } => cmd_search(&db_path, name, keywords, *top_k, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

/// Builds agent configuration from CLI options, then environment, then
/// defaults.
fn build_config(options: &AgentOptions) -> Result<AgentConfig> {
    let mut builder = AgentConfig::builder();
    if let Some(n) = options.max_challenges {
        builder = builder.max_challenges(n);
    }
    if let Some(model) = &options.model {
        builder = builder.model(model);
    }
    if let Some(dir) = &options.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    Ok(builder.from_env().build()?)
}

fn build_coordinator(db_path: &Path, options: &AgentOptions) -> Result<AgentCoordinator> {
    let config = build_config(options)?;
    let provider = create_provider(&config)?;

    let store = DocumentStore::new(db_path);
    store.open()?;
    let tools = ToolRegistry::new()
        .with_tool(Arc::new(DocumentSearchTool::manual(store.clone())))
        .with_tool(Arc::new(DocumentSearchTool::qa(store)));

    Ok(AgentCoordinator::new(provider, &config, tools))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn cmd_ask(
    db_path: &Path,
    question: &str,
    options: &AgentOptions,
    format: OutputFormat,
) -> Result<String> {
    let coordinator = build_coordinator(db_path, options)?;
    let rt = runtime()?;
    let cancel = CancellationToken::new();

    let result = rt.block_on(async {
        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current step");
                watcher.cancel();
            }
        });
        coordinator.run(question, &cancel).await
    })?;

    Ok(match format {
        OutputFormat::Text => format_agent_result(&result),
        OutputFormat::Json => format.to_json(&result)?,
    })
}

fn cmd_plan(
    db_path: &Path,
    question: &str,
    options: &AgentOptions,
    format: OutputFormat,
) -> Result<String> {
    let coordinator = build_coordinator(db_path, options)?;
    let rt = runtime()?;
    let (plan, usage) = rt.block_on(coordinator.plan(question))?;

    Ok(match format {
        OutputFormat::Text => format_plan(&plan),
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "question": question,
            "subtasks": plan.subtasks(),
            "usage": usage,
        }))?,
    })
}

fn check_tool_name(name: &str) -> Result<()> {
    if KNOWN_TOOLS.contains(&name) {
        Ok(())
    } else {
        Err(CommandError::InvalidArgument(format!(
            "unknown tool '{name}' (expected one of: {})",
            KNOWN_TOOLS.join(", ")
        ))
        .into())
    }
}

fn cmd_index(db_path: &Path, name: &str, dir: &Path, format: OutputFormat) -> Result<String> {
    check_tool_name(name)?;
    if !dir.is_dir() {
        return Err(
            CommandError::InvalidArgument(format!("not a directory: {}", dir.display())).into(),
        );
    }

    let store = DocumentStore::new(db_path);
    let added = store.index_directory(name, dir)?;
    let total = store.count(name)?;

    Ok(match format {
        OutputFormat::Text => format!(
            "Indexed {added} chunk(s) from {} into {name} ({total} total)\n",
            dir.display()
        ),
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "tool": name,
            "directory": dir.to_string_lossy(),
            "added": added,
            "total": total,
        }))?,
    })
}

fn cmd_search(
    db_path: &Path,
    name: &str,
    keywords: &str,
    top_k: usize,
    format: OutputFormat,
) -> Result<String> {
    check_tool_name(name)?;
    if !db_path.exists() {
        return Err(CommandError::ExecutionFailed(format!(
            "database not found: {} (run `helpdesk-agent index` first)",
            db_path.display()
        ))
        .into());
    }

    let hits = DocumentStore::new(db_path).search(name, keywords, top_k)?;

    Ok(match format {
        OutputFormat::Text => format_search_results(name, &hits),
        OutputFormat::Json => format.to_json(&hits)?,
    })
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(std::path::PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let _ = writeln!(
                    output,
                    "  {}",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                );
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "directory": target_dir.to_string_lossy(),
            "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
            "count": written.len(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_check_tool_name() {
        assert!(check_tool_name("manual-search").is_ok());
        assert!(matches!(
            check_tool_name("sql"),
            Err(Error::Command(CommandError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn test_index_then_search() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let docs = dir.path().join("manual");
        std::fs::create_dir_all(&docs).unwrap_or_else(|_| unreachable!());
        std::fs::write(
            docs.join("security.md"),
            "Two-factor authentication is enabled under Settings > Security.",
        )
        .unwrap_or_else(|_| unreachable!());
        let db = dir.path().join("kb.db");

        let indexed = cmd_index(&db, "manual-search", &docs, OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(indexed.starts_with("Indexed 1 chunk(s)"));

        let found = cmd_search(&db, "manual-search", "two-factor", 5, OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(found.contains("[security.md]"));
    }

    #[test]
    fn test_search_without_database() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let result = cmd_search(
            &dir.path().join("missing.db"),
            "qa-search",
            "backup",
            5,
            OutputFormat::Text,
        );
        assert!(matches!(
            result,
            Err(Error::Command(CommandError::ExecutionFailed(_)))
        ));
    }

    #[test]
    fn test_init_prompts_json() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let output = cmd_init_prompts(Some(dir.path()), OutputFormat::Json)
            .unwrap_or_else(|_| unreachable!());
        let json: serde_json::Value =
            serde_json::from_str(&output).unwrap_or_else(|_| unreachable!());
        assert_eq!(json["count"], 5);
    }
}
