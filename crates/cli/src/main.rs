//! AskDoc CLI
//!
//! Main entry point for the `askdoc` command-line tool.
//! Manages document collections and retrieves passages from their local indexes.

mod commands;

use anyhow::Context;
use askdoc_core::{config::AppConfig, logging};
use clap::{Parser, Subcommand};
use commands::{AskCommand, CollectionsCommand, HealthCommand, RebuildCommand, UploadCommand};
use std::path::PathBuf;

/// AskDoc - question answering over local document collections
#[derive(Parser, Debug)]
#[command(name = "askdoc")]
#[command(about = "Retrieve passages from local document collections", long_about = None)]
#[command(version)]
struct Cli {
    /// Root directory holding one subdirectory of raw files per collection
    #[arg(long, global = true, env = "ASKDOC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Root directory holding one persisted index per collection
    #[arg(long, global = true, env = "ASKDOC_INDEX_DIR")]
    index_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Embedding provider (hash, ollama, gemini)
    #[arg(short, long, global = true, env = "ASKDOC_EMBEDDING_PROVIDER")]
    provider: Option<String>,

    /// Embedding model identifier
    #[arg(short, long, global = true, env = "ASKDOC_EMBEDDING_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List or create collections
    Collections(CollectionsCommand),

    /// Add a document to a collection and reindex it
    Upload(UploadCommand),

    /// Rebuild a collection's index from its raw files
    Rebuild(RebuildCommand),

    /// Retrieve the passages most relevant to a question
    Ask(AskCommand),

    /// Show provider settings and collection status
    Health(HealthCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Collections(_) => "collections",
            Commands::Upload(_) => "upload",
            Commands::Rebuild(_) => "rebuild",
            Commands::Ask(_) => "ask",
            Commands::Health(_) => "health",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()
        .context("failed to load configuration")?
        .with_overrides(
            cli.data_dir,
            cli.index_dir,
            cli.provider,
            cli.model,
            cli.log_level,
            cli.verbose,
            cli.no_color,
        );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;
    config.validate()?;

    tracing::info!("AskDoc CLI starting");
    tracing::debug!("Data root: {:?}", config.data_root);
    tracing::debug!("Index root: {:?}", config.index_root);
    tracing::debug!(
        "Embeddings: {} / {} ({} dims)",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.dimensions
    );

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Collections(cmd) => cmd.execute(&config).await,
        Commands::Upload(cmd) => cmd.execute(&config).await,
        Commands::Rebuild(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Health(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
