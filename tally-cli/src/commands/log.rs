//! Log command - show captured notifications

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(
    data_dir: &Path,
    monitored: bool,
    since: Option<&str>,
    until: Option<&str>,
    json: bool,
) -> Result<()> {
    let from = since.map(parse_time).transpose()?;
    let to = until.map(parse_time).transpose()?;

    let ctx = get_context(data_dir)?;
    let entries: Vec<_> = ctx
        .log
        .between(from, to)
        .into_iter()
        .filter(|e| !monitored || e.is_monitored_source)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "No notifications logged".yellow());
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Captured", "Source", "Title", "Text", "Monitored"]);
    for entry in &entries {
        table.add_row(vec![
            entry
                .captured_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            entry.source_app.clone(),
            entry.title.clone(),
            output::truncate(&entry.text, 60),
            if entry.is_monitored_source { "yes" } else { "" }.to_string(),
        ]);
    }
    println!("{}", table);
    println!("{} entries", entries.len());
    Ok(())
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid time '{}', expected RFC 3339", s))
}
