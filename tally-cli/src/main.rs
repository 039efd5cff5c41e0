//! Tally CLI - drive the notification pipeline from a terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{capture, cleanup, listen, log, pending, prune, remind, sources, status, sync};

/// Tally - notification-driven expense capture
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Data directory (default: ~/.tally)
    #[arg(long, global = true, env = "TALLY_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed notification events (JSON object or array) through the background handler
    Capture {
        /// Read events from a file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read one JSON event per line from stdin as if the app were open
    Listen,

    /// Push unsynced pending transactions to the ledger
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove duplicate rows from the ledger
    Cleanup {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the notification log
    Log {
        /// Only notifications from monitored sources
        #[arg(long)]
        monitored: bool,
        /// Only entries captured at or after this RFC 3339 time
        #[arg(long)]
        since: Option<String>,
        /// Only entries captured at or before this RFC 3339 time
        #[arg(long)]
        until: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the pending transaction queue
    Pending {
        /// Hide entries that are already synced
        #[arg(long)]
        unsynced: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop expired log entries and queue entries
    Prune {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a rate-limited reminder
    Remind {
        #[command(subcommand)]
        command: remind::RemindCommands,
    },

    /// Manage monitored notification sources
    Sources {
        #[command(subcommand)]
        command: sources::SourcesCommands,
    },

    /// Show a summary of local state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let data_dir = commands::resolve_data_dir(cli.data_dir)?;

    match cli.command {
        Commands::Capture { file, json } => capture::run(&data_dir, file.as_deref(), json),
        Commands::Listen => listen::run(&data_dir).await,
        Commands::Sync { json } => sync::run(&data_dir, json).await,
        Commands::Cleanup { json } => cleanup::run(&data_dir, json).await,
        Commands::Log {
            monitored,
            since,
            until,
            json,
        } => log::run(&data_dir, monitored, since.as_deref(), until.as_deref(), json),
        Commands::Pending { unsynced, json } => pending::run(&data_dir, unsynced, json),
        Commands::Prune { json } => prune::run(&data_dir, json),
        Commands::Remind { command } => remind::run(&data_dir, command),
        Commands::Sources { command } => sources::run(&data_dir, command),
        Commands::Status { json } => status::run(&data_dir, json),
    }
}
