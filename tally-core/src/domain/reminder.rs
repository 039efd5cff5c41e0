//! Reminder tracking state and reminder payloads

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Persisted rate-limiting state for user-facing reminders
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTrackingState {
    #[serde(default)]
    pub last_bulk_reminder_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_weekly_reminder_at: Option<DateTime<Utc>>,
    /// Transaction id -> when its reminder was last sent
    #[serde(default)]
    pub transaction_reminders: HashMap<String, DateTime<Utc>>,
}

impl ReminderTrackingState {
    /// Drop per-transaction entries older than `max_age`
    pub fn prune(&mut self, now: DateTime<Utc>, max_age: Duration) {
        self.transaction_reminders
            .retain(|_, sent_at| now - *sent_at <= max_age);
    }

    /// Whether a reminder for `id` went out within `window` of `now`
    pub fn sent_within(&self, id: &str, now: DateTime<Utc>, window: Duration) -> bool {
        self.transaction_reminders
            .get(id)
            .is_some_and(|sent_at| within(*sent_at, now, window))
    }
}

/// True when `at` lies within `window` before `now`
pub fn within(at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now - at < window
}

/// What a reminder is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderKind {
    /// Categorize a single transaction
    Transaction {
        transaction_id: String,
        /// Foreground prompts open the categorize screen directly
        interactive: bool,
    },
    /// Several transactions are waiting
    Bulk { pending: usize },
    /// Weekly digest nudge
    Weekly { pending: usize },
}

/// A reminder handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub title: String,
    pub body: String,
    pub kind: ReminderKind,
}
