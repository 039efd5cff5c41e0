//! Sync command - push pending transactions to the ledger

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::get_context;

pub async fn run(data_dir: &Path, json: bool) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let report = ctx.sync.sync().await;
    // Cleanup and pruning run after the report; let them finish before exit
    ctx.sync.wait_for_followups().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if ctx.config.user_id.is_none() {
        println!(
            "{}",
            "No user configured. Set sync.userId in settings.json or TALLY_USER_ID.".yellow()
        );
        return Ok(());
    }

    println!("{}", "Sync complete".green());
    println!("  Processed: {}", report.processed);
    println!("  Inserted: {}", report.inserted);
    println!("  Skipped: {} (already in ledger)", report.skipped_duplicates);
    if report.awaiting_category > 0 {
        println!("  Awaiting category: {}", report.awaiting_category);
    }
    if report.errors > 0 {
        println!("  {} {}", "Errors:".red(), report.errors);
    }

    Ok(())
}
