//! CLI command implementations

pub mod capture;
pub mod cleanup;
pub mod listen;
pub mod log;
pub mod pending;
pub mod prune;
pub mod remind;
pub mod sources;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tally_core::domain::{Reminder, ReminderKind};
use tally_core::ports::ReminderDispatcher;
use tally_core::TallyContext;

/// Data directory from `--data-dir`/`TALLY_DIR`, or `~/.tally`
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => dirs::home_dir()
            .map(|home| home.join(".tally"))
            .context("Could not find home directory; set TALLY_DIR"),
    }
}

/// Open a context that prints reminders to the terminal
pub fn get_context(data_dir: &Path) -> Result<TallyContext> {
    TallyContext::new(data_dir, Arc::new(ConsoleDispatcher))
        .context("Failed to initialize tally context")
}

/// Shows reminders on stderr so JSON output stays clean
pub struct ConsoleDispatcher;

impl ReminderDispatcher for ConsoleDispatcher {
    fn schedule(&self, reminder: &Reminder) -> tally_core::domain::result::Result<()> {
        let tag = match reminder.kind {
            ReminderKind::Transaction {
                interactive: true, ..
            } => "categorize now",
            ReminderKind::Transaction { .. } => "reminder",
            ReminderKind::Bulk { .. } => "pending",
            ReminderKind::Weekly { .. } => "weekly",
        };
        eprintln!(
            "{} {} - {}",
            format!("[{}]", tag).magenta(),
            reminder.title.bold(),
            reminder.body
        );
        Ok(())
    }
}
