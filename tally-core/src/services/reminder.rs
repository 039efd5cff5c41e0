//! Reminder gate - rate limits user-facing "please categorize" prompts
//!
//! - per transaction: one reminder per 5 minutes
//! - bulk: one per rolling hour, only while something is pending
//! - weekly: one per rolling 7 days
//!
//! The check, the dispatch and the record happen inside one locked update of
//! the tracking document, so the headless and foreground paths cannot both
//! pass the gate for the same reminder. State is recorded only when the
//! dispatcher accepts the reminder.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::reminder::within;
use crate::domain::result::Result;
use crate::domain::{ParsedTransactionCandidate, Reminder, ReminderKind, ReminderTrackingState};
use crate::ports::{
    load_document, names, update_document_or_reset, DocumentStore, ReminderDispatcher,
};

pub fn transaction_window() -> Duration {
    Duration::minutes(5)
}

pub fn bulk_window() -> Duration {
    Duration::hours(1)
}

pub fn weekly_window() -> Duration {
    Duration::days(7)
}

/// Per-transaction entries older than this are dropped
pub fn tracking_retention() -> Duration {
    Duration::hours(24)
}

/// What the gate did with a reminder request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderOutcome {
    Sent,
    /// An equivalent reminder went out inside the window
    Suppressed,
    NothingPending,
    Disabled,
    /// The dispatcher refused it
    Failed,
}

impl ReminderOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ReminderOutcome::Sent)
    }
}

pub struct ReminderGate {
    store: Arc<dyn DocumentStore>,
    dispatcher: Arc<dyn ReminderDispatcher>,
    enabled: bool,
}

impl ReminderGate {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dispatcher: Arc<dyn ReminderDispatcher>,
        enabled: bool,
    ) -> Self {
        Self {
            store,
            dispatcher,
            enabled,
        }
    }

    /// Current tracking state
    pub fn state(&self) -> ReminderTrackingState {
        load_document(&*self.store, names::REMINDER_TRACKING)
    }

    /// Remind the user to categorize one transaction
    pub fn remind_transaction(
        &self,
        id: &str,
        candidate: &ParsedTransactionCandidate,
        interactive: bool,
    ) -> ReminderOutcome {
        self.remind_transaction_at(id, candidate, interactive, Utc::now())
    }

    pub fn remind_transaction_at(
        &self,
        id: &str,
        candidate: &ParsedTransactionCandidate,
        interactive: bool,
        now: DateTime<Utc>,
    ) -> ReminderOutcome {
        if !self.enabled {
            return ReminderOutcome::Disabled;
        }

        let reminder = Reminder {
            title: format!("{} {}", candidate.amount, candidate.currency),
            body: if interactive {
                format!("{}: choose a category now", candidate.merchant)
            } else {
                format!("{}: tap to categorize", candidate.merchant)
            },
            kind: ReminderKind::Transaction {
                transaction_id: id.to_string(),
                interactive,
            },
        };

        self.gate(
            &reminder,
            now,
            |state| !state.sent_within(id, now, transaction_window()),
            |state| {
                state.transaction_reminders.insert(id.to_string(), now);
            },
        )
    }

    /// Hourly nudge about everything still waiting
    pub fn remind_bulk(&self, pending: usize) -> ReminderOutcome {
        self.remind_bulk_at(pending, Utc::now())
    }

    pub fn remind_bulk_at(&self, pending: usize, now: DateTime<Utc>) -> ReminderOutcome {
        if !self.enabled {
            return ReminderOutcome::Disabled;
        }
        if pending == 0 {
            return ReminderOutcome::NothingPending;
        }

        let reminder = Reminder {
            title: "Transactions to categorize".to_string(),
            body: format!("{} transactions are waiting for a category", pending),
            kind: ReminderKind::Bulk { pending },
        };

        self.gate(
            &reminder,
            now,
            |state| {
                !state
                    .last_bulk_reminder_at
                    .is_some_and(|at| within(at, now, bulk_window()))
            },
            |state| state.last_bulk_reminder_at = Some(now),
        )
    }

    /// Weekly digest nudge
    pub fn remind_weekly(&self, pending: usize) -> ReminderOutcome {
        self.remind_weekly_at(pending, Utc::now())
    }

    pub fn remind_weekly_at(&self, pending: usize, now: DateTime<Utc>) -> ReminderOutcome {
        if !self.enabled {
            return ReminderOutcome::Disabled;
        }

        let body = if pending == 0 {
            "Take a minute to review this week's spending".to_string()
        } else {
            format!("Review this week's spending: {} transactions uncategorized", pending)
        };
        let reminder = Reminder {
            title: "Weekly review".to_string(),
            body,
            kind: ReminderKind::Weekly { pending },
        };

        self.gate(
            &reminder,
            now,
            |state| {
                !state
                    .last_weekly_reminder_at
                    .is_some_and(|at| within(at, now, weekly_window()))
            },
            |state| state.last_weekly_reminder_at = Some(now),
        )
    }

    /// Check, dispatch and record under the tracking document lock
    fn gate(
        &self,
        reminder: &Reminder,
        now: DateTime<Utc>,
        allowed: impl FnOnce(&ReminderTrackingState) -> bool,
        record: impl FnOnce(&mut ReminderTrackingState),
    ) -> ReminderOutcome {
        let mut outcome = ReminderOutcome::Suppressed;

        let result: Result<ReminderTrackingState> = update_document_or_reset(
            &*self.store,
            names::REMINDER_TRACKING,
            |state: &mut ReminderTrackingState| {
                if allowed(state) {
                    match self.dispatcher.schedule(reminder) {
                        Ok(()) => {
                            record(state);
                            outcome = ReminderOutcome::Sent;
                        }
                        Err(e) => {
                            warn!(error = %e, "Reminder dispatch failed");
                            outcome = ReminderOutcome::Failed;
                        }
                    }
                }
                state.prune(now, tracking_retention());
            },
        );

        match result {
            Ok(_) => {
                debug!(outcome = ?outcome, "Reminder gate");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "Failed to record reminder state");
                // The dispatcher may already have shown it
                if outcome.is_sent() {
                    outcome
                } else {
                    ReminderOutcome::Failed
                }
            }
        }
    }
}
