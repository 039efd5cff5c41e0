//! Configuration management
//!
//! Reads the app's settings.json format:
//! ```json
//! {
//!   "notifications": { "monitoredSources": ["revolut"], "customSources": [ ... ] },
//!   "sync": { "userId": "..." },
//!   "reminders": { "enabled": true }
//! }
//! ```
//! Fields this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::source::builtin_sources;
use crate::domain::MonitoredSource;

const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    notifications: NotificationSettings,
    #[serde(default)]
    sync: SyncSettings,
    #[serde(default)]
    reminders: ReminderSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationSettings {
    #[serde(default)]
    monitored_sources: Vec<String>,
    #[serde(default)]
    custom_sources: Vec<MonitoredSource>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReminderSettings {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            other: HashMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Tally configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Ids of enabled sources, in the user's order
    pub monitored_sources: Vec<String>,
    /// User-defined sources; always enabled
    pub custom_sources: Vec<MonitoredSource>,
    /// Owner of the remote ledger rows
    pub user_id: Option<String>,
    pub reminders_enabled: bool,
    /// `user_id` as loaded, so an unchanged override is not saved
    loaded_user_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitored_sources: Vec::new(),
            custom_sources: Vec::new(),
            user_id: None,
            reminders_enabled: true,
            loaded_user_id: None,
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// A missing file is the default config. A file that exists but cannot
    /// be parsed is an error, so callers can decide how to degrade.
    /// `TALLY_USER_ID` overrides the stored user id.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let user_override = std::env::var("TALLY_USER_ID")
            .ok()
            .filter(|s| !s.trim().is_empty());
        Self::load_with_user(data_dir, user_override)
    }

    fn load_with_user(data_dir: &Path, user_override: Option<String>) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        let user_id = user_override.or(raw.sync.user_id);

        Ok(Self {
            monitored_sources: dedup_ids(raw.notifications.monitored_sources),
            custom_sources: raw.notifications.custom_sources,
            loaded_user_id: user_id.clone(),
            user_id,
            reminders_enabled: raw.reminders.enabled,
        })
    }

    /// Save config to the data directory, preserving unmanaged settings.
    /// The stored user id changes only if `user_id` was changed after loading.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir).unwrap_or_default();

        settings.notifications.monitored_sources = self.monitored_sources.clone();
        settings.notifications.custom_sources = self.custom_sources.clone();
        if self.user_id != self.loaded_user_id {
            settings.sync.user_id = self.user_id.clone();
        }
        settings.reminders.enabled = self.reminders_enabled;

        std::fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    /// Built-in and custom sources, custom ones last
    pub fn catalog(&self) -> Vec<MonitoredSource> {
        let mut sources = builtin_sources();
        sources.extend(self.custom_sources.iter().cloned());
        sources
    }

    /// Sources the matcher should consult: enabled built-ins plus every custom source
    pub fn enabled_sources(&self) -> Vec<MonitoredSource> {
        let mut enabled: Vec<MonitoredSource> = self
            .monitored_sources
            .iter()
            .filter_map(|id| builtin_sources().into_iter().find(|s| &s.id == id))
            .collect();
        enabled.extend(self.custom_sources.iter().cloned());
        enabled
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.monitored_sources.iter().any(|s| s == id)
            || self.custom_sources.iter().any(|s| s.id == id)
    }

    /// Enable a catalog source. Returns false if it was already enabled.
    pub fn enable_source(&mut self, id: &str) -> Result<bool> {
        if !self.catalog().iter().any(|s| s.id == id) {
            return Err(Error::not_found(format!("Unknown source: {}", id)));
        }
        if self.monitored_sources.iter().any(|s| s == id) {
            return Ok(false);
        }
        self.monitored_sources.push(id.to_string());
        Ok(true)
    }

    /// Disable a source. Returns false if it was not enabled.
    pub fn disable_source(&mut self, id: &str) -> bool {
        let before = self.monitored_sources.len() + self.custom_sources.len();
        self.monitored_sources.retain(|s| s != id);
        self.custom_sources.retain(|s| s.id != id);
        before != self.monitored_sources.len() + self.custom_sources.len()
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }

    let content = std::fs::read_to_string(&settings_path)?;
    if content.trim().is_empty() {
        return Ok(SettingsFile::default());
    }
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", settings_path.display(), e)))
}

/// Keep the first occurrence of each id
fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert!(config.monitored_sources.is_empty());
        assert!(config.reminders_enabled);
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ nope").unwrap();

        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_reads_sources_in_order_without_duplicates() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"notifications": {"monitoredSources": ["revolut", "paypal", "revolut"]},
                "reminders": {"enabled": false}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.monitored_sources, vec!["revolut", "paypal"]);
        assert!(!config.reminders_enabled);
    }

    #[test]
    fn test_save_preserves_unmanaged_fields() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"theme": "dark", "notifications": {"sound": true}}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.enable_source("satispay").unwrap();
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["notifications"]["sound"], true);
        assert_eq!(raw["notifications"]["monitoredSources"][0], "satispay");
    }

    #[test]
    fn test_save_does_not_persist_user_override() {
        let dir = TempDir::new().unwrap();
        let settings = dir.path().join(SETTINGS_FILE);
        std::fs::write(&settings, r#"{"sync": {"userId": "stored"}}"#).unwrap();

        let mut config =
            Config::load_with_user(dir.path(), Some("override".to_string())).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("override"));
        config.enable_source("paypal").unwrap();
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&settings).unwrap()).unwrap();
        assert_eq!(raw["sync"]["userId"], "stored");

        // An explicit change is saved
        config.user_id = Some("new-user".to_string());
        config.save(dir.path()).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&settings).unwrap()).unwrap();
        assert_eq!(raw["sync"]["userId"], "new-user");
    }

    #[test]
    fn test_enable_and_disable_sources() {
        let mut config = Config::default();

        assert!(config.enable_source("paypal").unwrap());
        assert!(!config.enable_source("paypal").unwrap());
        assert!(config.enable_source("no_such_app").is_err());
        assert!(config.is_enabled("paypal"));
        assert_eq!(config.enabled_sources().len(), 1);

        assert!(config.disable_source("paypal"));
        assert!(!config.disable_source("paypal"));
        assert!(config.enabled_sources().is_empty());
    }
}
