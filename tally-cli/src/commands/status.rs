//! Status command - summary of local capture state

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output;

pub fn run(data_dir: &Path, json: bool) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let status = ctx.status.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Tally Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec![
        "Logged notifications".to_string(),
        status.logged_notifications.to_string(),
    ]);
    table.add_row(vec![
        "From monitored sources".to_string(),
        status.monitored_notifications.to_string(),
    ]);
    table.add_row(vec![
        "Pending transactions".to_string(),
        status.pending_total.to_string(),
    ]);
    table.add_row(vec![
        "Waiting to sync".to_string(),
        status.pending_unsynced.to_string(),
    ]);
    if let Some(age) = status.oldest_unsynced_age_secs {
        table.add_row(vec![
            "Oldest unsynced".to_string(),
            output::format_age(age),
        ]);
    }
    table.add_row(vec![
        "Last bulk reminder".to_string(),
        output::format_time(status.last_bulk_reminder_at),
    ]);
    table.add_row(vec![
        "Last weekly reminder".to_string(),
        output::format_time(status.last_weekly_reminder_at),
    ]);

    println!("{}", table);
    println!();
    println!("Data directory: {}", ctx.data_dir.display());
    match &ctx.config.user_id {
        Some(user) => println!("Syncing as: {}", user),
        None => println!("{}", "No user configured; sync is disabled".yellow()),
    }

    Ok(())
}
