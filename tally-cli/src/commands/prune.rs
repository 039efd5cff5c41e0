//! Prune command - apply retention to local documents

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::get_context;
use crate::output;

#[derive(Serialize)]
struct PruneResult {
    log_removed: usize,
    queue_removed: usize,
}

pub fn run(data_dir: &Path, json: bool) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let result = PruneResult {
        log_removed: ctx.log.purge_expired()?,
        queue_removed: ctx.queue.prune_expired()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        output::success(&format!(
            "Removed {} log entries and {} queued transactions",
            result.log_removed, result.queue_removed
        ));
    }
    Ok(())
}
