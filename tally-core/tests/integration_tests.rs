//! Integration tests for tally-core
//!
//! These run the whole pipeline against a real data directory: JSON
//! documents on disk and a DuckDB ledger file. Only reminder delivery is
//! replaced, by a recording dispatcher.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tempfile::TempDir;

use tally_core::adapters::memory::RecordingDispatcher;
use tally_core::domain::{EmittedAt, ReminderKind};
use tally_core::services::sync::FALLBACK_CATEGORY;
use tally_core::services::CaptureOutcome;
use tally_core::{NotificationEvent, TallyContext};

// ============================================================================
// Test Helpers
// ============================================================================

const USER: &str = "user-1";

fn write_settings(dir: &Path, body: &str) {
    std::fs::write(dir.join("settings.json"), body).unwrap();
}

fn open(dir: &Path, dispatcher: &Arc<RecordingDispatcher>) -> TallyContext {
    TallyContext::new(dir, dispatcher.clone()).expect("Failed to open context")
}

fn event(source: &str, title: &str, text: &str) -> NotificationEvent {
    NotificationEvent {
        source_app: Some(source.to_string()),
        title: Some(title.to_string()),
        text: Some(text.to_string()),
        big_text: None,
        emitted_at: Some(EmittedAt::Epoch(Utc::now().timestamp_millis())),
    }
}

fn wallet(title: &str, text: &str) -> NotificationEvent {
    event("com.google.android.apps.walletnfcrel", title, text)
}

// ============================================================================
// Pipeline
// ============================================================================

#[tokio::test]
async fn test_capture_sync_and_reopen() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(
        temp_dir.path(),
        r#"{"sync": {"userId": "user-1"}, "theme": "dark"}"#,
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());

    {
        let ctx = open(temp_dir.path(), &dispatcher);
        let capture = ctx.headless();

        let queued = capture.handle(&wallet("AKATHOR: dettagli", "Pagamento di 7,00 €"));
        assert!(matches!(queued, CaptureOutcome::Queued { .. }));
        assert_eq!(
            capture.handle(&event("com.whatsapp", "Mario", "a dopo")),
            CaptureOutcome::Unmonitored
        );
        capture.flush();

        let report = ctx.sync.sync().await;
        ctx.sync.wait_for_followups().await;
        assert_eq!(report.inserted, 1);
        assert_eq!(report.errors, 0);

        let rows = ctx.remote.list_transactions(USER, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].merchant, "AKATHOR");
        assert_eq!(rows[0].amount, Decimal::new(700, 2));

        let fallback = ctx
            .remote
            .find_category_by_name(USER, FALLBACK_CATEGORY)
            .await
            .unwrap()
            .expect("fallback category created");
        assert_eq!(rows[0].category_id.as_deref(), Some(fallback.id.as_str()));
    }

    // A fresh context sees everything the first one persisted
    let ctx = open(temp_dir.path(), &dispatcher);
    assert!(ctx.queue.unsynced().is_empty());
    assert_eq!(ctx.queue.all().len(), 1);
    assert_eq!(ctx.log.entries().len(), 2);
    assert_eq!(ctx.log.monitored_only().len(), 1);

    let again = ctx.sync.sync().await;
    ctx.sync.wait_for_followups().await;
    assert_eq!(again.processed, 0);
    assert_eq!(ctx.remote.list_transactions(USER, None).await.unwrap().len(), 1);

    // One prompt for the purchase, one bulk nudge for its fallback category
    let kinds: Vec<_> = dispatcher.reminders().into_iter().map(|r| r.kind).collect();
    assert_eq!(kinds.len(), 2);
    assert!(matches!(kinds[0], ReminderKind::Transaction { .. }));
    assert!(matches!(kinds[1], ReminderKind::Bulk { pending: 1 }));
}

#[tokio::test]
async fn test_merchant_category_is_remembered() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path(), r#"{"sync": {"userId": "user-1"}}"#);
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let ctx = open(temp_dir.path(), &dispatcher);

    let groceries = ctx.remote.create_category(USER, "Groceries").await.unwrap();
    let capture = ctx.headless();
    capture.handle(&wallet("Coop: dettagli", "Pagamento di 12,30 €"));
    capture.flush();

    // The user categorizes the first one in the ledger
    ctx.sync.sync().await;
    ctx.sync.wait_for_followups().await;
    let first = ctx.remote.list_transactions(USER, None).await.unwrap();
    assert_eq!(first.len(), 1);
    ctx.remote.delete_transactions(&[first[0].id.clone()]).await.unwrap();
    let categorized = tally_core::domain::NewRemoteTransaction {
        user_id: USER.to_string(),
        amount: first[0].amount,
        currency: first[0].currency.clone(),
        merchant: first[0].merchant.clone(),
        description: None,
        date: first[0].date,
        category_id: Some(groceries.id.clone()),
        kind: first[0].kind,
        created_at: first[0].created_at,
    };
    ctx.remote.insert_transaction(&categorized).await.unwrap();

    capture.handle(&wallet("Coop: dettagli", "Pagamento di 4,10 €"));
    capture.flush();
    let report = ctx.sync.sync().await;
    ctx.sync.wait_for_followups().await;
    assert_eq!(report.inserted, 1);

    let rows = ctx.remote.list_transactions(USER, None).await.unwrap();
    let second = rows
        .iter()
        .find(|r| r.amount == Decimal::new(410, 2))
        .expect("second purchase synced");
    assert_eq!(second.category_id.as_deref(), Some(groceries.id.as_str()));
}

#[tokio::test]
async fn test_enabled_source_is_captured() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(
        temp_dir.path(),
        r#"{"notifications": {"monitoredSources": ["revolut"]}}"#,
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let ctx = open(temp_dir.path(), &dispatcher);
    let capture = ctx.headless();

    let outcome = capture.handle(&event(
        "com.revolut.revolut",
        "Esselunga: pagamento",
        "Hai pagato 23,45 € con la carta",
    ));
    capture.flush();

    assert!(matches!(outcome, CaptureOutcome::Queued { .. }));
    assert_eq!(ctx.queue.unsynced()[0].merchant, "Esselunga");
}

// ============================================================================
// Degraded operation
// ============================================================================

#[tokio::test]
async fn test_corrupt_settings_fall_back_to_wallet_only() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path(), "{ not json");
    let dispatcher = Arc::new(RecordingDispatcher::new());

    let ctx = open(temp_dir.path(), &dispatcher);
    let capture = ctx.headless();

    assert_eq!(
        capture.handle(&event(
            "com.revolut.revolut",
            "Esselunga: pagamento",
            "Hai pagato 23,45 €"
        )),
        CaptureOutcome::Unmonitored
    );
    assert!(matches!(
        capture.handle(&wallet("Bar: dettagli", "Pagamento di 1,20 €")),
        CaptureOutcome::Queued { .. }
    ));
    capture.flush();

    // No user id: sync does nothing and keeps the queue intact
    let report = ctx.sync.sync().await;
    assert_eq!(report.processed, 0);
    assert_eq!(ctx.queue.unsynced().len(), 1);
}

#[test]
fn test_corrupt_queue_reads_as_empty() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("pending_transactions.json"), "[{]").unwrap();
    let dispatcher = Arc::new(RecordingDispatcher::new());

    let ctx = open(temp_dir.path(), &dispatcher);
    assert!(ctx.queue.all().is_empty());

    // Capture still works; the unreadable file is kept next to the new queue
    let capture = ctx.headless();
    capture.handle(&wallet("Bar: dettagli", "Pagamento di 1,20 €"));
    capture.flush();
    assert_eq!(ctx.queue.all().len(), 1);

    let aside: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("pending_transactions.corrupt-"))
        })
        .collect();
    assert_eq!(aside.len(), 1);
    assert_eq!(std::fs::read_to_string(&aside[0]).unwrap(), "[{]");
}

#[tokio::test]
async fn test_unreadable_queue_entry_survives_capture_and_sync() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path(), r#"{"sync": {"userId": "user-1"}}"#);
    let dispatcher = Arc::new(RecordingDispatcher::new());

    // A queued purchase from an earlier capture, next to an entry nobody can read
    {
        let ctx = open(temp_dir.path(), &dispatcher);
        let capture = ctx.headless();
        capture.handle(&wallet("Coop: dettagli", "Pagamento di 12,30 €"));
        capture.flush();
    }
    let queue_path = temp_dir.path().join("pending_transactions.json");
    let mut stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&queue_path).unwrap()).unwrap();
    stored
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({"id": "not-a-uuid"}));
    std::fs::write(&queue_path, stored.to_string()).unwrap();

    let ctx = open(temp_dir.path(), &dispatcher);
    assert_eq!(ctx.queue.unsynced().len(), 1);

    let capture = ctx.headless();
    capture.handle(&wallet("Bar: dettagli", "Pagamento di 1,20 €"));
    capture.flush();
    assert_eq!(ctx.queue.unsynced().len(), 2);

    let report = ctx.sync.sync().await;
    ctx.sync.wait_for_followups().await;
    assert_eq!(report.inserted, 2);

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&queue_path).unwrap()).unwrap();
    let stored = stored.as_array().unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.contains(&serde_json::json!({"id": "not-a-uuid"})));
}

#[test]
fn test_status_reflects_captured_state() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let ctx = open(temp_dir.path(), &dispatcher);

    let capture = ctx.headless();
    capture.handle(&wallet("Bar: dettagli", "Pagamento di 1,20 €"));
    capture.handle(&event("com.whatsapp", "Mario", "ciao"));
    capture.flush();

    let status = ctx.status.summary();
    assert_eq!(status.logged_notifications, 2);
    assert_eq!(status.monitored_notifications, 1);
    assert_eq!(status.pending_unsynced, 1);
    assert!(status.oldest_unsynced_age_secs.is_some());
}
