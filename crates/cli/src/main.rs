//! Mentora CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize config & workspace
//! - `serve`   — Start the HTTP API server
//! - `migrate` — Apply database migrations
//! - `doctor`  — Diagnose configuration and database health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "mentora",
    about = "Mentora — AI tutoring backend",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ~/.mentora/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and workspace
    Onboard,

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply database migrations
    Migrate,

    /// Diagnose configuration and database health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run(cli.config.as_deref()).await?,
        Commands::Serve { port } => commands::serve::run(cli.config.as_deref(), port).await?,
        Commands::Migrate => commands::migrate::run(cli.config.as_deref()).await?,
        Commands::Doctor => commands::doctor::run(cli.config.as_deref()).await?,
    }

    Ok(())
}
