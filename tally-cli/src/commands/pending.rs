//! Pending command - show the local transaction queue

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(data_dir: &Path, unsynced: bool, json: bool) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let queue = if unsynced {
        ctx.queue.unsynced()
    } else {
        ctx.queue.all()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&queue)?);
        return Ok(());
    }

    if queue.is_empty() {
        println!("{}", "Queue is empty".green());
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Merchant", "Amount", "Kind", "Synced"]);
    for tx in &queue {
        table.add_row(vec![
            tx.date.to_string(),
            tx.merchant.clone(),
            format!("{} {}", tx.amount, tx.currency),
            tx.kind.as_str().to_string(),
            if tx.synced { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}
