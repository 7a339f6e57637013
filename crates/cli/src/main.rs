//! Resequencer CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Reorder a JSON-lines item stream from a file or stdin
//! - `config`  — Show or initialize configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use resequencer_core::ReleasePolicy;

mod commands;

#[derive(Parser)]
#[command(
    name = "reseq",
    about = "Resequencer — reorder keyed item streams into position order",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.resequencer/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read items as JSON lines and print released runs as JSON lines
    Run {
        /// Read items from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Override the release policy (partial | complete-only)
        #[arg(long)]
        policy: Option<ReleasePolicy>,

        /// Flush leftover groups at end of input instead of applying `on_timeout`
        #[arg(long)]
        flush_on_exit: bool,

        /// Echo engine events to stderr as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: commands::config_cmd::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Stdout carries released runs, so logs go to stderr
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            input,
            policy,
            flush_on_exit,
            events,
        } => {
            let options = commands::run::RunOptions {
                input,
                policy,
                flush_on_exit,
                events,
            };
            commands::run::run(config, options).await?
        }
        Commands::Config { action } => {
            commands::config_cmd::run(action, &config, cli.config.as_deref()).await?
        }
    }

    Ok(())
}
