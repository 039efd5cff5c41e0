//! Tally Core - notification capture and ledger sync for personal finance
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (NotificationEvent, PendingTransaction, etc.)
//! - **ports**: Trait definitions for external collaborators (DocumentStore, RemoteStore)
//! - **services**: Pipeline stages (capture, classification, sync, reminders)
//! - **adapters**: Concrete implementations (JSON files, DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use adapters::duckdb::DuckDbRemoteStore;
use adapters::file_store::FileDocumentStore;
use config::Config;
use ports::{DocumentStore, ReminderDispatcher, RemoteStore};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    CapturedNotification, NotificationEvent, ParsedTransactionCandidate, PendingTransaction,
    RemoteTransaction,
};

/// Remote ledger file inside the data directory
pub const LEDGER_FILE: &str = "ledger.duckdb";

/// Main context for Tally operations
///
/// Holds the stores, the loaded configuration and every service. Several
/// contexts may share one data directory; all shared documents are guarded
/// by file locks.
pub struct TallyContext {
    pub data_dir: PathBuf,
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub log: NotificationLog,
    pub queue: PendingQueue,
    pub matcher: SourceMatcher,
    pub reminders: Arc<ReminderGate>,
    pub cleanup: Arc<DuplicateCleanup>,
    pub sync: SyncEngine,
    pub status: StatusService,
}

impl TallyContext {
    /// Open a context on a data directory
    ///
    /// An unreadable settings file does not fail construction: matching falls
    /// back to wallet-only and the default settings are used.
    pub fn new(data_dir: &Path, dispatcher: Arc<dyn ReminderDispatcher>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let store = Arc::new(
            FileDocumentStore::new(data_dir).context("Failed to open local document store")?,
        );
        let remote = Arc::new(
            DuckDbRemoteStore::new(&data_dir.join(LEDGER_FILE))
                .context("Failed to open ledger database")?,
        );

        let loaded = Config::load(data_dir);
        let matcher = SourceMatcher::from_config(loaded.as_ref());
        let config = loaded.unwrap_or_else(|e| {
            warn!(error = %e, "Using default settings");
            Config::default()
        });

        Ok(Self::with_parts(
            data_dir.to_path_buf(),
            config,
            matcher,
            store,
            remote,
            dispatcher,
        ))
    }

    /// Assemble a context from explicit parts
    pub fn with_parts(
        data_dir: PathBuf,
        config: Config,
        matcher: SourceMatcher,
        store: Arc<dyn DocumentStore>,
        remote: Arc<dyn RemoteStore>,
        dispatcher: Arc<dyn ReminderDispatcher>,
    ) -> Self {
        let log = NotificationLog::new(Arc::clone(&store));
        let queue = PendingQueue::new(Arc::clone(&store));
        let reminders = Arc::new(ReminderGate::new(
            Arc::clone(&store),
            dispatcher,
            config.reminders_enabled,
        ));
        let cleanup = Arc::new(DuplicateCleanup::new(Arc::clone(&remote)));
        let sync = SyncEngine::new(
            queue.clone(),
            Arc::clone(&remote),
            Arc::clone(&cleanup),
            Arc::clone(&reminders),
            config.user_id.clone(),
        );
        let status = StatusService::new(log.clone(), queue.clone(), Arc::clone(&reminders));

        Self {
            data_dir,
            config,
            store,
            remote,
            log,
            queue,
            matcher,
            reminders,
            cleanup,
            sync,
            status,
        }
    }

    /// Background capture handler sharing this context's stores
    pub fn headless(&self) -> HeadlessCapture {
        HeadlessCapture::new(
            self.matcher.clone(),
            self.log.clone(),
            self.queue.clone(),
            Arc::clone(&self.reminders),
        )
    }

    /// In-app listener sharing this context's reminder state
    pub fn foreground(&self) -> ForegroundListener {
        ForegroundListener::new(self.matcher.clone(), Arc::clone(&self.reminders))
    }
}
