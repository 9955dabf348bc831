//! The `triage config` command for configuration management.

use clap::{Args, Subcommand};
use triage_core::Config;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration and resolved directories
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load()?;
            println!("{}", config.to_toml()?);
            println!("# Resolved directories");
            println!("# spool:  {}", config.spool_dir().display());
            println!("# outbox: {}", config.outbox_dir().display());
            println!("# store:  {}", config.storage_root().display());
            println!("# rules:  {}", config.rules_dir().display());
        }

        ConfigCommand::Path => {
            println!("{}", Config::default_path().display());
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let config = Config::default();
            std::fs::write(&path, config.to_toml()?)?;

            println!("Configuration written to: {}", path.display());
            println!(
                "Set CHATGPT_API_KEY (and a [chatgpt] endpoint) or GITHUB_TOKEN, \
                 drop requirement mails into {}, then run `triage run`.",
                config.spool_dir().display()
            );
        }
    }

    Ok(())
}
