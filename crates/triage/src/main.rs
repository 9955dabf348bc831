//! Triage CLI - Resilient requirements-to-epic pipeline.
//!
//! Triage drains a spool of requirement mails, folds each project's mails
//! into one Markdown epic through an LLM with retry and circuit-breaker
//! protection, commits the epic to the store once per project, and
//! acknowledges the processed mails.
//!
//! # Usage
//!
//! ```bash
//! # Process all unread mails once (typically from cron)
//! triage run
//!
//! # View configuration
//! triage config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Triage - Resilient requirements-to-epic pipeline.
#[derive(Parser, Debug)]
#[command(name = "triage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Process all unread requirement mails once
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match triage_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `triage config path`."
            );
            triage_core::Config::default()
        }
    };
    logging::init(&config.logging, cli.verbose, cli.json_logs);

    tracing::debug!("Triage v{}", triage_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
