//! Topica CLI
//!
//! Main entry point for the topica command-line tool.
//! Ingests a topic knowledge base and answers questions from it.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, StatsCommand};
use std::path::PathBuf;
use topica_core::{config::AppConfig, logging, AppResult};

/// Topica - answers questions from a local topic knowledge base
#[derive(Parser, Debug)]
#[command(name = "topica")]
#[command(about = "Answers questions from a local topic knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "TOPICA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "TOPICA_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question and cite the topics used
    Ask(AskCommand),

    /// Replace the knowledge base with a topics file
    Ingest(IngestCommand),

    /// Show knowledge base statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Workspace and config file flags decide which YAML file is read
    let workspace = cli.workspace.clone();
    let config_file = cli.config.clone();
    let config = AppConfig::load_with(|key| match key {
        "TOPICA_WORKSPACE" => workspace
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| std::env::var(key).ok()),
        "TOPICA_CONFIG" => config_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .or_else(|| std::env::var(key).ok()),
        _ => std::env::var(key).ok(),
    })?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Topica CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("LLM model: {}", config.llm.model);
    tracing::debug!(
        "Embedding: {} ({})",
        config.embedding.provider,
        config.embedding.model
    );

    config.validate()?;

    // Ensure .topica directory exists
    config.ensure_topica_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Ingest(_) => "ingest",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_with_top_k() {
        let cli = Cli::try_parse_from(["topica", "ask", "How long is leave?", "-k", "3", "--json"])
            .unwrap();
        match cli.command {
            Commands::Ask(cmd) => {
                assert_eq!(cmd.question, "How long is leave?");
                assert_eq!(cmd.top_k, Some(3));
                assert!(cmd.json);
            }
            other => panic!("expected ask, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ingest_with_global_flags() {
        let cli = Cli::try_parse_from(["topica", "ingest", "topics.json", "--workspace", "/tmp/ws"])
            .unwrap();
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert!(matches!(cli.command, Commands::Ingest(_)));
    }
}
