//! Notification log - capped, deduplicated audit trail of captured notifications
//!
//! Entries are kept newest-first, at most `LOG_CAPACITY` of them, for at most
//! fifteen days. Appends are cheap: they update an in-memory copy and
//! (re)arm a trailing-edge timer so a burst of appends produces a single
//! physical write. The write merges with whatever another process stored in
//! the meantime, under the document lock.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::result::Result;
use crate::domain::CapturedNotification;
use crate::ports::{load_document, names, update_document_or_reset, DocumentStore};

/// Maximum number of entries kept
pub const LOG_CAPACITY: usize = 100;

/// Trailing window in which appends collapse into one write
pub const WRITE_DEBOUNCE: std::time::Duration = std::time::Duration::from_millis(250);

/// Same-content events closer than this are one event delivered twice
pub fn dedup_window() -> Duration {
    Duration::seconds(3)
}

/// Entries older than this are purged
pub fn retention() -> Duration {
    Duration::days(15)
}

#[derive(Clone)]
pub struct NotificationLog {
    inner: Arc<LogInner>,
}

struct LogInner {
    store: Arc<dyn DocumentStore>,
    state: Mutex<LogState>,
}

#[derive(Default)]
struct LogState {
    entries: Vec<CapturedNotification>,
    /// In-memory entries not yet written
    dirty: bool,
    /// Clock reading of the latest append, used when the write happens
    last_now: Option<DateTime<Utc>>,
    pending_write: Option<JoinHandle<()>>,
    /// Bumped on every re-arm so a superseded timer stands down
    generation: u64,
}

impl NotificationLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: Arc::new(LogInner {
                store,
                state: Mutex::new(LogState::default()),
            }),
        }
    }

    /// Append an entry. Returns false if it duplicates a recent entry.
    pub fn append(&self, entry: CapturedNotification) -> bool {
        self.append_at(entry, Utc::now())
    }

    pub fn append_at(&self, entry: CapturedNotification, now: DateTime<Utc>) -> bool {
        let mut state = self.inner.lock_state();

        // Nothing buffered: pick up entries other processes wrote
        if !state.dirty {
            state.entries = self.inner.load();
        }

        purge(&mut state.entries, now);

        if state.entries.iter().any(|e| is_duplicate(e, &entry)) {
            debug!(source = %entry.source_app, "Duplicate notification ignored");
            return false;
        }

        state.entries.push(entry);
        sort_newest_first(&mut state.entries);
        state.entries.truncate(LOG_CAPACITY);
        state.dirty = true;
        state.last_now = Some(now);

        self.schedule_write(&mut state);
        true
    }

    fn schedule_write(&self, state: &mut LogState) {
        if let Some(previous) = state.pending_write.take() {
            previous.abort();
        }

        state.generation += 1;
        let generation = state.generation;

        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                state.pending_write = Some(handle.spawn(async move {
                    tokio::time::sleep(WRITE_DEBOUNCE).await;
                    let mut state = inner.lock_state();
                    if state.generation != generation {
                        return;
                    }
                    state.pending_write = None;
                    if let Err(e) = inner.persist(&mut state) {
                        warn!(error = %e, "Failed to write notification log");
                    }
                }));
            }
            Err(_) => {
                // No runtime to defer on
                if let Err(e) = self.inner.persist(state) {
                    warn!(error = %e, "Failed to write notification log");
                }
            }
        }
    }

    /// Write buffered entries now
    pub fn flush(&self) -> Result<()> {
        let mut state = self.inner.lock_state();
        if let Some(pending) = state.pending_write.take() {
            pending.abort();
        }
        self.inner.persist(&mut state)
    }

    /// Whether appends are waiting for the debounce timer
    pub fn has_pending_write(&self) -> bool {
        self.inner.lock_state().dirty
    }

    /// Full log, newest first
    pub fn entries(&self) -> Vec<CapturedNotification> {
        let state = self.inner.lock_state();
        let mut entries = if state.dirty {
            state.entries.clone()
        } else {
            self.inner.load()
        };
        sort_newest_first(&mut entries);
        entries
    }

    /// Entries from monitored sources only
    pub fn monitored_only(&self) -> Vec<CapturedNotification> {
        self.entries()
            .into_iter()
            .filter(|e| e.is_monitored_source)
            .collect()
    }

    /// Entries captured within `[from, to]`; open bounds are unbounded.
    /// Entries without a timestamp never match a bounded range.
    pub fn between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<CapturedNotification> {
        self.entries()
            .into_iter()
            .filter(|e| match e.captured_at {
                Some(at) => from.map_or(true, |f| at >= f) && to.map_or(true, |t| at <= t),
                None => from.is_none() && to.is_none(),
            })
            .collect()
    }

    /// Drop entries past retention. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Utc::now())
    }

    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.inner.lock_state();
        let mut removed = 0;

        let stored = update_document_or_reset::<Vec<CapturedNotification>, _>(
            &*self.inner.store,
            names::NOTIFICATION_LOG,
            |entries| removed = purge(entries, now),
        )?;

        if state.dirty {
            purge(&mut state.entries, now);
        } else {
            state.entries = stored;
        }
        Ok(removed)
    }
}

impl LogInner {
    fn lock_state(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> Vec<CapturedNotification> {
        load_document(&*self.store, names::NOTIFICATION_LOG)
    }

    /// Merge buffered entries into the stored log
    fn persist(&self, state: &mut LogState) -> Result<()> {
        if !state.dirty {
            return Ok(());
        }

        let ours = state.entries.clone();
        let now = state.last_now.unwrap_or_else(Utc::now);
        let merged = update_document_or_reset::<Vec<CapturedNotification>, _>(
            &*self.store,
            names::NOTIFICATION_LOG,
            |stored| merge_entries(stored, ours, now),
        )?;

        debug!(entries = merged.len(), "Notification log written");
        state.entries = merged;
        state.dirty = false;
        Ok(())
    }
}

/// Same content, emitted within the dedup window
fn is_duplicate(existing: &CapturedNotification, candidate: &CapturedNotification) -> bool {
    if !existing.same_content(candidate) {
        return false;
    }
    match (existing.captured_at, candidate.captured_at) {
        (Some(a), Some(b)) => (a - b).num_milliseconds().abs() <= dedup_window().num_milliseconds(),
        _ => false,
    }
}

fn merge_entries(
    stored: &mut Vec<CapturedNotification>,
    ours: Vec<CapturedNotification>,
    now: DateTime<Utc>,
) {
    for entry in ours {
        let known = stored
            .iter()
            .any(|e| e.id == entry.id || is_duplicate(e, &entry));
        if !known {
            stored.push(entry);
        }
    }
    purge(stored, now);
    sort_newest_first(stored);
    stored.truncate(LOG_CAPACITY);
}

fn purge(entries: &mut Vec<CapturedNotification>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|e| now - e.sort_timestamp() <= retention());
    before - entries.len()
}

/// Missing timestamps sort last
fn sort_newest_first(entries: &mut [CapturedNotification]) {
    entries.sort_by_key(|e| std::cmp::Reverse(e.sort_timestamp()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryDocumentStore;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_717_000_000 + secs, 0).unwrap()
    }

    fn entry(id: &str, text: &str, captured_at: DateTime<Utc>) -> CapturedNotification {
        CapturedNotification {
            id: id.to_string(),
            source_app: "com.revolut.revolut".to_string(),
            title: "Revolut".to_string(),
            text: text.to_string(),
            captured_at: Some(captured_at),
            is_monitored_source: true,
            dedup_key: String::new(),
        }
    }

    fn setup() -> (Arc<MemoryDocumentStore>, NotificationLog) {
        let store = Arc::new(MemoryDocumentStore::new());
        let log = NotificationLog::new(store.clone());
        (store, log)
    }

    #[test]
    fn test_duplicate_within_window_is_rejected() {
        let (_, log) = setup();

        assert!(log.append_at(entry("a", "Paid 5 €", at(0)), at(0)));
        assert!(!log.append_at(entry("b", "Paid 5 €", at(3)), at(3)));
        assert!(log.append_at(entry("c", "Paid 5 €", at(4)), at(4)));
        assert!(log.append_at(entry("d", "Paid 6 €", at(4)), at(4)));

        assert_eq!(log.entries().len(), 3);
    }

    #[test]
    fn test_without_runtime_writes_immediately() {
        let (store, log) = setup();

        log.append_at(entry("a", "one", at(0)), at(0));
        log.append_at(entry("b", "two", at(1)), at(1));

        assert_eq!(store.write_count(), 2);
        assert!(!log.has_pending_write());
    }

    #[test]
    fn test_other_process_entries_are_seen() {
        let store = Arc::new(MemoryDocumentStore::new());
        let headless = NotificationLog::new(store.clone());
        let foreground = NotificationLog::new(store.clone());

        assert!(headless.append_at(entry("a", "Paid 5 €", at(0)), at(0)));
        assert!(!foreground.append_at(entry("b", "Paid 5 €", at(1)), at(1)));
        assert_eq!(foreground.entries().len(), 1);
    }

    #[test]
    fn test_capacity_keeps_newest() {
        let (_, log) = setup();
        for i in 0..(LOG_CAPACITY as i64 + 5) {
            log.append_at(entry(&i.to_string(), &format!("tx {}", i), at(i * 10)), at(i * 10));
        }

        let entries = log.entries();
        assert_eq!(entries.len(), LOG_CAPACITY);
        assert_eq!(entries[0].id, (LOG_CAPACITY + 4).to_string());
        assert_eq!(entries.last().unwrap().id, "5");
    }

    #[test]
    fn test_purge_expired() {
        let (_, log) = setup();
        let now = at(0) + Duration::days(30);

        log.append_at(entry("old", "old", now - Duration::days(16)), now - Duration::days(16));
        log.append_at(
            entry("edge", "edge", now - Duration::days(14) - Duration::hours(23)),
            now - Duration::days(14) - Duration::hours(23),
        );
        log.append_at(entry("new", "new", now), now - Duration::days(14) - Duration::hours(23));

        let removed = log.purge_expired_at(now).unwrap();
        assert_eq!(removed, 1);

        let ids: Vec<_> = log.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["new", "edge"]);
    }

    #[test]
    fn test_filters() {
        let (_, log) = setup();
        let mut unmonitored = entry("u", "chat message", at(10));
        unmonitored.is_monitored_source = false;
        unmonitored.source_app = "com.whatsapp".to_string();

        log.append_at(entry("m", "Paid 5 €", at(0)), at(0));
        log.append_at(unmonitored, at(10));

        assert_eq!(log.monitored_only().len(), 1);
        assert_eq!(log.between(Some(at(5)), None).len(), 1);
        assert_eq!(log.between(None, Some(at(5)))[0].id, "m");
        assert_eq!(log.between(None, None).len(), 2);
    }

    #[test]
    fn test_missing_timestamps_sort_last() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .write(
                names::NOTIFICATION_LOG,
                &serde_json::json!([
                    {"id": "broken", "sourceApp": "a", "title": "t", "text": "x", "capturedAt": "??"},
                    {"id": "ok", "sourceApp": "a", "title": "t", "text": "y",
                     "capturedAt": "2024-05-29T16:26:40Z"}
                ]),
            )
            .unwrap();
        let log = NotificationLog::new(store);

        let ids: Vec<_> = log.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["ok", "broken"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_write() {
        let (store, log) = setup();

        log.append_at(entry("a", "one", at(0)), at(0));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        log.append_at(entry("b", "two", at(1)), at(1));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        log.append_at(entry("c", "three", at(2)), at(2));

        assert_eq!(store.write_count(), 0);
        assert!(log.has_pending_write());

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        assert_eq!(store.write_count(), 1);
        let stored: Vec<CapturedNotification> = load_document(&*store, names::NOTIFICATION_LOG);
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].id, "c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_without_waiting() {
        let (store, log) = setup();

        log.append_at(entry("a", "one", at(0)), at(0));
        log.flush().unwrap();
        assert_eq!(store.write_count(), 1);

        // The aborted timer must not write again
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_is_retried_on_next_flush() {
        let (store, log) = setup();
        store.set_fail_writes(true);

        log.append_at(entry("a", "one", at(0)), at(0));
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert!(log.has_pending_write());

        store.set_fail_writes(false);
        log.flush().unwrap();
        assert_eq!(log.entries().len(), 1);
        assert!(!log.has_pending_write());
    }
}
