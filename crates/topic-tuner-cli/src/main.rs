//! Topic Tuner CLI
//!
//! Runs a UMAP/HDBSCAN hyperparameter search over an embedding matrix or a
//! plain-text corpus and writes the outcome as JSON.
//!
//! # Commands
//!
//! - `search`: Tune on `--embeddings` (JSON rows) or `--docs` (one document per line)
//! - `default-config`: Print the default TOML configuration
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: The search ran but failed (optimizer failure, cancellation, I/O)
//! - 2: Invalid configuration or input

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod error;

pub use error::{exit_code_for_error, CliExitCode};

/// Topic Tuner - joint UMAP/HDBSCAN hyperparameter search
#[derive(Parser)]
#[command(name = "topic-tuner")]
#[command(version)]
#[command(about = "Search UMAP/HDBSCAN hyperparameters for a target topic count")]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search and write a JSON report
    Search(commands::search::SearchArgs),
    /// Print the default configuration as TOML
    DefaultConfig(commands::default_config::DefaultConfigArgs),
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Search(args) => commands::search::search_command(args),
        Commands::DefaultConfig(args) => commands::default_config::default_config_command(args),
    };

    std::process::exit(exit_code);
}
