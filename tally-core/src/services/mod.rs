//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one stage of the capture-to-ledger pipeline.

pub mod capture;
pub mod classifier;
pub mod cleanup;
pub mod matcher;
pub mod migration;
pub mod notification_log;
pub mod pending_queue;
pub mod reminder;
mod status;
pub mod sync;

pub use capture::{CaptureOutcome, ForegroundListener, HeadlessCapture};
pub use cleanup::{CleanupReport, DuplicateCleanup};
pub use matcher::{SourceMatch, SourceMatcher};
pub use migration::{MigrationResult, MigrationService};
pub use notification_log::NotificationLog;
pub use pending_queue::PendingQueue;
pub use reminder::{ReminderGate, ReminderOutcome};
pub use status::{StatusService, StatusSummary};
pub use sync::{SyncEngine, SyncReport};
