//! Remind command - trigger the periodic reminders

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use tally_core::services::ReminderOutcome;

use super::get_context;

#[derive(Subcommand)]
pub enum RemindCommands {
    /// Nudge about every transaction still waiting (at most hourly)
    Bulk,
    /// Weekly review nudge (at most once per 7 days)
    Weekly,
}

pub fn run(data_dir: &Path, command: RemindCommands) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let pending = ctx.queue.unsynced().len();

    let outcome = match command {
        RemindCommands::Bulk => ctx.reminders.remind_bulk(pending),
        RemindCommands::Weekly => ctx.reminders.remind_weekly(pending),
    };

    match outcome {
        ReminderOutcome::Sent => println!("{}", "Reminder sent".green()),
        ReminderOutcome::Suppressed => println!("{}", "Sent recently, skipped".dimmed()),
        ReminderOutcome::NothingPending => println!("{}", "Nothing pending".dimmed()),
        ReminderOutcome::Disabled => println!("{}", "Reminders are disabled".yellow()),
        ReminderOutcome::Failed => println!("{}", "Reminder failed".red()),
    }
    Ok(())
}
