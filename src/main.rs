//! `helpdesk-agent` binary entry point.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use helpdesk_agent::cli::{Cli, execute};

#[allow(clippy::print_stdout)]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = execute(&cli).context("command failed")?;
    print!("{output}");
    Ok(())
}

/// Logs go to stderr so command output stays pipeable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helpdesk_agent={default_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
