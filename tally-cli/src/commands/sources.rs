//! Sources command - list and toggle monitored notification sources

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tally_core::config::Config;

use crate::output;

#[derive(Subcommand)]
pub enum SourcesCommands {
    /// List built-in and custom sources
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start monitoring a built-in source
    Enable {
        /// Source id (see `tally sources list`)
        id: String,
    },
    /// Stop monitoring a built-in source
    Disable {
        /// Source id
        id: String,
    },
}

pub fn run(data_dir: &Path, command: SourcesCommands) -> Result<()> {
    // Toggling must not overwrite a settings file we could not read
    let mut config = Config::load(data_dir).context("Failed to load settings")?;

    match command {
        SourcesCommands::List { json } => {
            let catalog = config.catalog();
            if json {
                let rows: Vec<_> = catalog
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "id": s.id,
                            "displayName": s.display_name,
                            "enabled": config.is_enabled(&s.id),
                            "identifiers": s.identifiers,
                            "keywords": s.keywords,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Id", "Name", "Identifiers", "Enabled"]);
            for source in &catalog {
                table.add_row(vec![
                    source.id.clone(),
                    source.display_name.clone(),
                    source.identifiers.join(", "),
                    if config.is_enabled(&source.id) { "yes" } else { "" }.to_string(),
                ]);
            }
            println!("{}", table);
            println!(
                "{}",
                "The primary wallet and any app with 'wallet' in its id are always monitored."
                    .dimmed()
            );
        }
        SourcesCommands::Enable { id } => {
            if config.enable_source(&id)? {
                config.save(data_dir)?;
                output::success(&format!("Enabled {}", id));
            } else {
                output::info(&format!("{} is already enabled", id));
            }
        }
        SourcesCommands::Disable { id } => {
            if config.disable_source(&id) {
                config.save(data_dir)?;
                output::success(&format!("Disabled {}", id));
            } else {
                output::warning(&format!("{} was not enabled", id));
            }
        }
    }
    Ok(())
}
