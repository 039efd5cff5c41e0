//! Status service - summary of local capture state

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::notification_log::NotificationLog;
use crate::services::pending_queue::PendingQueue;
use crate::services::reminder::ReminderGate;
use std::sync::Arc;

pub struct StatusService {
    log: NotificationLog,
    queue: PendingQueue,
    reminders: Arc<ReminderGate>,
}

impl StatusService {
    pub fn new(log: NotificationLog, queue: PendingQueue, reminders: Arc<ReminderGate>) -> Self {
        Self {
            log,
            queue,
            reminders,
        }
    }

    pub fn summary(&self) -> StatusSummary {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> StatusSummary {
        let entries = self.log.entries();
        let pending = self.queue.all();
        let oldest_unsynced = pending
            .iter()
            .filter(|tx| !tx.synced)
            .map(|tx| tx.created_at)
            .min();
        let tracking = self.reminders.state();

        StatusSummary {
            logged_notifications: entries.len(),
            monitored_notifications: entries.iter().filter(|e| e.is_monitored_source).count(),
            pending_total: pending.len(),
            pending_unsynced: pending.iter().filter(|tx| !tx.synced).count(),
            oldest_unsynced_age_secs: oldest_unsynced.map(|at| (now - at).num_seconds().max(0)),
            last_bulk_reminder_at: tracking.last_bulk_reminder_at,
            last_weekly_reminder_at: tracking.last_weekly_reminder_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub logged_notifications: usize,
    pub monitored_notifications: usize,
    pub pending_total: usize,
    pub pending_unsynced: usize,
    pub oldest_unsynced_age_secs: Option<i64>,
    pub last_bulk_reminder_at: Option<DateTime<Utc>>,
    pub last_weekly_reminder_at: Option<DateTime<Utc>>,
}
