//! Cleanup command - remove duplicate ledger rows

use std::path::Path;

use anyhow::{bail, Result};
use colored::Colorize;

use super::get_context;

pub async fn run(data_dir: &Path, json: bool) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let Some(user_id) = ctx.config.user_id.as_deref() else {
        bail!("No user configured. Set sync.userId in settings.json or TALLY_USER_ID.");
    };

    let report = ctx.cleanup.run(user_id).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.total() == 0 {
        println!("{}", "No duplicates found".green());
    } else {
        println!("{} {} duplicates", "Removed".green(), report.total());
        println!("  Recent (last 24h): {}", report.temporal_removed);
        println!("  History: {}", report.exact_removed);
    }
    Ok(())
}
