//! Core domain entities
//!
//! All pipeline entities are defined here. These are pure data structures
//! with small helpers - no I/O or external dependencies.

pub mod candidate;
pub mod notification;
pub mod reminder;
pub mod remote;
pub mod result;
pub mod source;
mod transaction;

pub use candidate::{ParsedTransactionCandidate, Rejection, Sign};
pub use notification::{CapturedNotification, EmittedAt, NormalizedEvent, NotificationEvent};
pub use reminder::{Reminder, ReminderKind, ReminderTrackingState};
pub use remote::{Category, NewRemoteTransaction, RemoteTransaction};
pub use source::MonitoredSource;
pub use transaction::{PendingTransaction, TransactionKind};
