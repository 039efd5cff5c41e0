//! Listen command - simulate the app being open
//!
//! Each stdin line is one event. It goes through the background handler
//! first and is then forwarded to the in-app listener, the same order the
//! two paths see it on a device.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use tally_core::NotificationEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use super::get_context;

pub async fn run(data_dir: &Path) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let capture = ctx.headless();
    let foreground = ctx.foreground();
    let (tx, rx) = mpsc::channel::<NotificationEvent>(64);

    let reader = async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut handled = 0usize;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: NotificationEvent = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed event line");
                    continue;
                }
            };
            capture.handle(&event);
            handled += 1;
            if tx.send(event).await.is_err() {
                break;
            }
        }
        capture.flush();
        Ok::<usize, std::io::Error>(handled)
    };

    let (handled, prompted) = tokio::join!(reader, foreground.run(rx));
    let handled = handled?;

    println!(
        "{} {} events, {} prompts",
        "Done:".green(),
        handled,
        prompted
    );
    Ok(())
}
