//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod control;
mod init;
mod logs;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "crawlgov")]
#[command(about = "Crawl governance service and operator console")]
#[command(version)]
pub struct Cli {
    /// Target directory or database file (overrides config file).
    /// Can be a directory containing crawlgov.db or a .db file directly.
    #[arg(long, short = 't', global = true)]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Talk to a running service instead of the local database
    #[arg(long, global = true, env = "CRAWLGOV_REMOTE")]
    remote: Option<String>,

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
    /// Initialize the data directory and database
    Init,

    /// Start the governance HTTP service
    Serve {
        /// Address to bind: a port, a host, or host:port
        bind: Option<String>,
    },

    /// Show per-group crawl status
    Status {
        /// Only groups whose path starts with this prefix
        #[arg(short, long)]
        spider: Option<String>,
    },

    /// Show recent crawl attempts, newest first
    Logs {
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only this status (name or code)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Suspend every worker wait loop
    Pause,

    /// Resume after a pause
    Resume,

    /// Cut the next worker wait short
    Trigger,

    /// Show the current control signal
    Signal,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        target: cli.target,
    };
    let (settings, _config) = load_settings_with_options(options).await;
    let remote = cli.remote.as_deref();

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Serve { bind } => serve::cmd_serve(&settings, bind.as_deref()).await,
        Commands::Status { spider } => status::cmd_status(&settings, remote, spider.as_deref()).await,
        Commands::Logs { limit, status } => {
            logs::cmd_logs(&settings, remote, limit, status.as_deref()).await
        }
        Commands::Pause => control::cmd_control(&settings, remote, control::Action::Pause).await,
        Commands::Resume => control::cmd_control(&settings, remote, control::Action::Resume).await,
        Commands::Trigger => {
            control::cmd_control(&settings, remote, control::Action::Immediate).await
        }
        Commands::Signal => control::cmd_control(&settings, remote, control::Action::Show).await,
    }
}
