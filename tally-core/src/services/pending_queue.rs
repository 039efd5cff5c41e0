//! Pending transaction queue - durable local queue drained by sync
//!
//! Producers only append unsynced entries. The only mutations after that are
//! flipping `synced` to true and age-based pruning. Every change is a locked
//! read-modify-write of the whole document.
//!
//! Entries are decoded one at a time. An entry that does not decode is
//! skipped on read but kept verbatim on every write, so one bad entry never
//! costs the others.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::PendingTransaction;
use crate::ports::{load_document, names, update_document, DocumentStore};

/// Entries older than this are pruned whether synced or not
pub fn max_age() -> Duration {
    Duration::days(15)
}

fn decode_entry(value: &JsonValue) -> Option<PendingTransaction> {
    PendingTransaction::deserialize(value).ok()
}

#[derive(Clone)]
pub struct PendingQueue {
    store: Arc<dyn DocumentStore>,
}

impl PendingQueue {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Append an entry as unsynced
    pub fn enqueue(&self, mut tx: PendingTransaction) -> Result<()> {
        tx.synced = false;
        let id = tx.id;
        let entry = serde_json::to_value(&tx)?;
        update_document::<Vec<JsonValue>, _>(&*self.store, names::PENDING_TRANSACTIONS, |queue| {
            queue.push(entry)
        })?;
        debug!(id = %id, "Queued pending transaction");
        Ok(())
    }

    /// Every readable entry, oldest first. A missing or unreadable queue is empty.
    pub fn all(&self) -> Vec<PendingTransaction> {
        let raw: Vec<JsonValue> = load_document(&*self.store, names::PENDING_TRANSACTIONS);
        let total = raw.len();
        let entries: Vec<PendingTransaction> = raw.iter().filter_map(decode_entry).collect();
        if entries.len() < total {
            warn!(
                skipped = total - entries.len(),
                "Skipping unreadable pending transactions"
            );
        }
        entries
    }

    pub fn unsynced(&self) -> Vec<PendingTransaction> {
        self.all().into_iter().filter(|tx| !tx.synced).collect()
    }

    /// Mark entries synced in one write. Already-synced entries are untouched.
    pub fn mark_synced(&self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let wanted: HashSet<&Uuid> = ids.iter().collect();
        let mut marked = 0;
        update_document::<Vec<JsonValue>, _>(&*self.store, names::PENDING_TRANSACTIONS, |queue| {
            for entry in queue.iter_mut() {
                let Some(tx) = decode_entry(entry) else {
                    continue;
                };
                if tx.synced || !wanted.contains(&tx.id) {
                    continue;
                }
                if let Some(fields) = entry.as_object_mut() {
                    fields.insert("synced".to_string(), JsonValue::Bool(true));
                    marked += 1;
                }
            }
        })?;
        Ok(marked)
    }

    /// Drop entries older than fifteen days. Returns how many were removed.
    pub fn prune_expired(&self) -> Result<usize> {
        self.prune_expired_at(Utc::now())
    }

    pub fn prune_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        update_document::<Vec<JsonValue>, _>(&*self.store, names::PENDING_TRANSACTIONS, |queue| {
            let before = queue.len();
            queue.retain(|entry| {
                !decode_entry(entry).is_some_and(|tx| tx.is_expired(now, max_age()))
            });
            removed = before - queue.len();
        })?;
        if removed > 0 {
            debug!(removed, "Pruned expired pending transactions");
        }
        Ok(removed)
    }
}
