//! Sync engine - drains the pending queue into the remote ledger
//!
//! One sync runs at a time per engine; a call made while another is in
//! flight returns immediately. For each unsynced entry the engine:
//! 1. skips it if the remote already holds a row with the same
//!    (amount, merchant, date) created within 2 seconds of it
//! 2. resolves a category (own, then merchant memory, then fallback)
//! 3. inserts it
//!
//! Synced flags are written once at the end of the batch. The hourly bulk
//! reminder then covers whatever is still unsynced or went to the fallback
//! category. Duplicate cleanup and queue pruning run in the background.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::result::Result;
use crate::domain::{NewRemoteTransaction, PendingTransaction};
use crate::ports::RemoteStore;
use crate::services::cleanup::DuplicateCleanup;
use crate::services::pending_queue::PendingQueue;
use crate::services::reminder::ReminderGate;

/// Category created and used when nothing better is known
pub const FALLBACK_CATEGORY: &str = "Miscellaneous";

/// A remote row created this close to a pending entry is that entry
pub fn remote_duplicate_window() -> Duration {
    Duration::seconds(2)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub processed: usize,
    pub inserted: usize,
    pub skipped_duplicates: usize,
    pub errors: usize,
    /// Inserted without a category the user chose
    pub awaiting_category: usize,
    /// Another sync was in flight; nothing was done
    pub already_running: bool,
}

/// Clears the running flag when the sync ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    queue: PendingQueue,
    remote: Arc<dyn RemoteStore>,
    cleanup: Arc<DuplicateCleanup>,
    reminders: Arc<ReminderGate>,
    user_id: Option<String>,
    running: AtomicBool,
    followup: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(
        queue: PendingQueue,
        remote: Arc<dyn RemoteStore>,
        cleanup: Arc<DuplicateCleanup>,
        reminders: Arc<ReminderGate>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            queue,
            remote,
            cleanup,
            reminders,
            user_id,
            running: AtomicBool::new(false),
            followup: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Push every unsynced entry to the remote ledger
    pub async fn sync(&self) -> SyncReport {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            debug!("Sync already running");
            return SyncReport {
                already_running: true,
                ..Default::default()
            };
        };

        let Some(user_id) = self.user_id.as_deref() else {
            warn!("No user configured, skipping sync");
            return SyncReport::default();
        };

        let unsynced = self.queue.unsynced();
        let mut report = SyncReport::default();
        let mut synced_ids = Vec::new();
        let mut categories = CategoryResolver::new(&*self.remote, user_id);

        for tx in unsynced {
            report.processed += 1;

            match self.has_remote_duplicate(user_id, &tx).await {
                Ok(true) => {
                    debug!(id = %tx.id, "Already in remote ledger");
                    report.skipped_duplicates += 1;
                    synced_ids.push(tx.id);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %tx.id, error = %e, "Duplicate lookup failed");
                    report.errors += 1;
                    continue;
                }
            }

            let (category_id, chosen) = categories.resolve(&tx).await;
            let row = NewRemoteTransaction::from_pending(user_id, &tx, category_id);
            match self.remote.insert_transaction(&row).await {
                Ok(inserted) => {
                    debug!(id = %tx.id, remote_id = %inserted.id, "Inserted transaction");
                    report.inserted += 1;
                    if !chosen {
                        report.awaiting_category += 1;
                    }
                    synced_ids.push(tx.id);
                }
                Err(e) => {
                    warn!(id = %tx.id, error = %e, "Insert failed, will retry next sync");
                    report.errors += 1;
                }
            }
        }

        if let Err(e) = self.queue.mark_synced(&synced_ids) {
            warn!(error = %e, "Failed to record synced flags");
        }

        let waiting = self.queue.unsynced().len() + report.awaiting_category;
        let bulk = self.reminders.remind_bulk(waiting);
        debug!(waiting, outcome = ?bulk, "Bulk reminder");

        info!(
            processed = report.processed,
            inserted = report.inserted,
            skipped = report.skipped_duplicates,
            errors = report.errors,
            "Sync finished"
        );

        self.spawn_followup(user_id.to_string());
        report
    }

    async fn has_remote_duplicate(&self, user_id: &str, tx: &PendingTransaction) -> Result<bool> {
        let rows = self
            .remote
            .find_transactions(user_id, tx.amount, &tx.merchant, tx.date)
            .await?;
        Ok(rows
            .iter()
            .any(|row| row.created_close_to(tx.created_at, remote_duplicate_window())))
    }

    /// Fire-and-forget duplicate cleanup and queue pruning
    fn spawn_followup(&self, user_id: String) {
        let cleanup = Arc::clone(&self.cleanup);
        let queue = self.queue.clone();
        let handle = tokio::spawn(async move {
            cleanup.run(&user_id).await;
            if let Err(e) = queue.prune_expired() {
                warn!(error = %e, "Failed to prune pending queue");
            }
        });

        let mut followup = self.followup.lock().unwrap_or_else(|e| e.into_inner());
        *followup = Some(handle);
    }

    /// Wait for the background work of the last sync
    pub async fn wait_for_followups(&self) {
        let handle = self
            .followup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Sync follow-up task failed");
            }
        }
    }
}

/// Per-batch category lookup with merchant memoization
struct CategoryResolver<'a> {
    remote: &'a dyn RemoteStore,
    user_id: &'a str,
    by_merchant: HashMap<String, Option<String>>,
    fallback: Option<Option<String>>,
}

impl<'a> CategoryResolver<'a> {
    fn new(remote: &'a dyn RemoteStore, user_id: &'a str) -> Self {
        Self {
            remote,
            user_id,
            by_merchant: HashMap::new(),
            fallback: None,
        }
    }

    /// The category to insert with, and whether the user chose it
    /// (directly or through an earlier row for the same merchant)
    async fn resolve(&mut self, tx: &PendingTransaction) -> (Option<String>, bool) {
        if let Some(id) = &tx.category_id {
            return (Some(id.clone()), true);
        }

        if let Some(id) = self.from_merchant_memory(&tx.merchant).await {
            return (Some(id), true);
        }

        (self.fallback().await, false)
    }

    async fn from_merchant_memory(&mut self, merchant: &str) -> Option<String> {
        if let Some(known) = self.by_merchant.get(merchant) {
            return known.clone();
        }

        let found = match self
            .remote
            .latest_category_for_merchant(self.user_id, merchant)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Merchant category lookup failed");
                None
            }
        };
        self.by_merchant.insert(merchant.to_string(), found.clone());
        found
    }

    async fn fallback(&mut self) -> Option<String> {
        if let Some(resolved) = &self.fallback {
            return resolved.clone();
        }

        let resolved = self.resolve_fallback().await;
        self.fallback = Some(resolved.clone());
        resolved
    }

    async fn resolve_fallback(&self) -> Option<String> {
        match self
            .remote
            .find_category_by_name(self.user_id, FALLBACK_CATEGORY)
            .await
        {
            Ok(Some(category)) => return Some(category.id),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Fallback category lookup failed"),
        }

        match self
            .remote
            .create_category(self.user_id, FALLBACK_CATEGORY)
            .await
        {
            Ok(category) => return Some(category.id),
            Err(e) => warn!(error = %e, "Could not create fallback category"),
        }

        match self.remote.list_categories(self.user_id).await {
            Ok(categories) => categories.into_iter().next().map(|c| c.id),
            Err(e) => {
                warn!(error = %e, "Category listing failed, leaving uncategorized");
                None
            }
        }
    }
}
