//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod run;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Settings, Transport};

#[derive(Parser)]
#[command(name = "rentwatch")]
#[command(about = "Rental listing watcher with Telegram notifications")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./rentwatch.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape once, store new ads and send notifications
    Run,

    /// Run the daily scheduler and the chat bot
    Serve {
        /// How updates reach the bot (overrides config)
        #[arg(long, value_enum)]
        transport: Option<Transport>,
        /// Port for the webhook server (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration and list the pages each seed resolves to
    Check,
}

/// Parse arguments, load settings and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply_env(|key| std::env::var(key).ok());

    match cli.command {
        Commands::Run => run::cmd_run(&settings).await,
        Commands::Serve { transport, port } => {
            if let Some(transport) = transport {
                settings.bot.transport = transport;
            }
            if let Some(port) = port {
                settings.bot.port = port;
            }
            serve::cmd_serve(&settings).await
        }
        Commands::Check => check::cmd_check(&settings).await,
    }
}
