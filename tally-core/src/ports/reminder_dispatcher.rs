//! Reminder dispatch port
//!
//! Wraps the platform's notification-scheduling API. The core only decides
//! whether to call it and with what content.

use crate::domain::result::Result;
use crate::domain::Reminder;

pub trait ReminderDispatcher: Send + Sync {
    /// Schedule a user-facing reminder for immediate display
    fn schedule(&self, reminder: &Reminder) -> Result<()>;
}
