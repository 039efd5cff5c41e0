//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. The pipeline
//! depends only on these traits, not on concrete implementations.

pub mod document_store;
mod reminder_dispatcher;
mod remote_store;

pub use document_store::{
    load_document, names, update_document, update_document_or_reset, DocumentStore,
};
pub use reminder_dispatcher::ReminderDispatcher;
pub use remote_store::RemoteStore;
