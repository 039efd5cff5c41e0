//! Notification capture - headless and foreground entry points
//!
//! The headless path runs with nothing but durable storage: it logs every
//! event, queues transactions from monitored sources and sends a simple
//! per-transaction reminder. The foreground path runs while the app is open,
//! listens on an in-process channel and only shows the interactive
//! "categorize now" prompt; it never writes the log or the queue.
//!
//! Both key per-transaction reminders by the notification's content hash
//! plus its emission time, so the same notification seen by both paths
//! prompts at most once while a repeat purchase gets its own prompt.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{
    CapturedNotification, NormalizedEvent, NotificationEvent, PendingTransaction, Rejection,
};
use crate::services::classifier::classify_at;
use crate::services::matcher::SourceMatcher;
use crate::services::notification_log::NotificationLog;
use crate::services::pending_queue::PendingQueue;
use crate::services::reminder::{ReminderGate, ReminderOutcome};

/// What the headless handler did with an event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// Same notification already logged moments ago
    Duplicate,
    /// Logged; the source is not monitored
    Unmonitored,
    /// Logged; not a transaction
    Rejected { reason: Rejection },
    /// Logged and queued for sync
    Queued {
        transaction_id: Uuid,
        reminder: ReminderOutcome,
    },
    /// Logged, but the queue could not be written
    QueueFailed,
}

/// Background notification handler
pub struct HeadlessCapture {
    matcher: SourceMatcher,
    log: NotificationLog,
    queue: PendingQueue,
    reminders: Arc<ReminderGate>,
}

impl HeadlessCapture {
    pub fn new(
        matcher: SourceMatcher,
        log: NotificationLog,
        queue: PendingQueue,
        reminders: Arc<ReminderGate>,
    ) -> Self {
        Self {
            matcher,
            log,
            queue,
            reminders,
        }
    }

    /// Handle one OS event. Never fails; storage problems are logged.
    pub fn handle(&self, event: &NotificationEvent) -> CaptureOutcome {
        self.handle_at(event, Utc::now())
    }

    pub fn handle_at(&self, event: &NotificationEvent, now: DateTime<Utc>) -> CaptureOutcome {
        let event = NormalizedEvent::from_event(event, now);
        let monitored = self.matcher.is_monitored(&event.source_app);

        let entry = CapturedNotification::from_event(&event, monitored);
        if !self.log.append_at(entry, now) {
            return CaptureOutcome::Duplicate;
        }

        if !monitored {
            return CaptureOutcome::Unmonitored;
        }

        let today = now.with_timezone(&Local).date_naive();
        let candidate = match classify_at(&event.title, &event.text, monitored, today) {
            Ok(candidate) => candidate,
            Err(reason) => {
                debug!(source = %event.source_app, reason = %reason, "Not a transaction");
                return CaptureOutcome::Rejected { reason };
            }
        };

        let dedup_key = event.dedup_key();
        let pending =
            PendingTransaction::from_candidate(&candidate, &event.source_app, &dedup_key, now);
        let transaction_id = pending.id;

        if let Err(e) = self.queue.enqueue(pending) {
            warn!(error = %e, "Failed to queue transaction");
            return CaptureOutcome::QueueFailed;
        }

        let reminder = self
            .reminders
            .remind_transaction_at(&event.transaction_key(), &candidate, false, now);

        CaptureOutcome::Queued {
            transaction_id,
            reminder,
        }
    }

    /// Write any buffered log entries
    pub fn flush(&self) {
        if let Err(e) = self.log.flush() {
            warn!(error = %e, "Failed to flush notification log");
        }
    }
}

/// In-app listener for the interactive categorize prompt
pub struct ForegroundListener {
    matcher: SourceMatcher,
    reminders: Arc<ReminderGate>,
}

impl ForegroundListener {
    pub fn new(matcher: SourceMatcher, reminders: Arc<ReminderGate>) -> Self {
        Self { matcher, reminders }
    }

    /// Prompt for a monitored transaction. `None` when there is nothing to prompt for.
    pub fn on_event(&self, event: &NotificationEvent) -> Option<ReminderOutcome> {
        self.on_event_at(event, Utc::now())
    }

    pub fn on_event_at(
        &self,
        event: &NotificationEvent,
        now: DateTime<Utc>,
    ) -> Option<ReminderOutcome> {
        let event = NormalizedEvent::from_event(event, now);
        if !self.matcher.is_monitored(&event.source_app) {
            return None;
        }

        let today = now.with_timezone(&Local).date_naive();
        let candidate = classify_at(&event.title, &event.text, true, today).ok()?;

        Some(
            self.reminders
                .remind_transaction_at(&event.transaction_key(), &candidate, true, now),
        )
    }

    /// Consume events until every sender is dropped. Returns prompts sent.
    pub async fn run(&self, mut events: mpsc::Receiver<NotificationEvent>) -> usize {
        let mut prompted = 0;
        while let Some(event) = events.recv().await {
            if self.on_event(&event).is_some_and(|outcome| outcome.is_sent()) {
                prompted += 1;
            }
        }
        prompted
    }
}
