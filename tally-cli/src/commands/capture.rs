//! Capture command - run events through the background handler

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tally_core::services::CaptureOutcome;
use tally_core::NotificationEvent;

use super::get_context;

pub fn run(data_dir: &Path, file: Option<&Path>, json: bool) -> Result<()> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read events from stdin")?;
            buf
        }
    };
    let events = parse_events(&input)?;

    let ctx = get_context(data_dir)?;
    let capture = ctx.headless();
    let outcomes: Vec<CaptureOutcome> = events.iter().map(|ev| capture.handle(ev)).collect();
    capture.flush();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(());
    }

    for outcome in &outcomes {
        match outcome {
            CaptureOutcome::Queued {
                transaction_id,
                reminder,
            } => println!(
                "{} {} (reminder: {:?})",
                "Queued".green(),
                transaction_id,
                reminder
            ),
            CaptureOutcome::Duplicate => println!("{}", "Duplicate, ignored".dimmed()),
            CaptureOutcome::Unmonitored => println!("{}", "Logged (unmonitored source)".dimmed()),
            CaptureOutcome::Rejected { reason } => {
                println!("{} {}", "Logged, not a transaction:".yellow(), reason)
            }
            CaptureOutcome::QueueFailed => println!("{}", "Logged, failed to queue".red()),
        }
    }

    Ok(())
}

/// A single event object or an array of them
fn parse_events(input: &str) -> Result<Vec<NotificationEvent>> {
    let value: serde_json::Value =
        serde_json::from_str(input.trim()).context("Events must be JSON")?;
    let events = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(events)
}
