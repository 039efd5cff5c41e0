//! Local durable storage port
//!
//! A whole-document JSON store addressed by logical name. The headless and
//! foreground contexts share nothing but this storage, so every
//! read-modify-write goes through `update`, which implementations must make
//! atomic across processes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::domain::result::{Error, Result};

/// Logical document names
pub mod names {
    pub const PENDING_TRANSACTIONS: &str = "pending_transactions";
    pub const NOTIFICATION_LOG: &str = "notification_log";
    pub const REMINDER_TRACKING: &str = "reminder_tracking";
}

/// JSON document storage abstraction
pub trait DocumentStore: Send + Sync {
    /// Read a document. `Ok(None)` when it was never written.
    fn read(&self, name: &str) -> Result<Option<JsonValue>>;

    /// Replace a document
    fn write(&self, name: &str, value: &JsonValue) -> Result<()>;

    /// Whether the document has been written
    fn exists(&self, name: &str) -> Result<bool>;

    /// Atomically read, transform and write back a document.
    ///
    /// `apply` receives the current document (`None` if missing or unreadable)
    /// and returns the replacement.
    fn update(
        &self,
        name: &str,
        apply: &mut dyn FnMut(Option<JsonValue>) -> Result<JsonValue>,
    ) -> Result<()>;
}

/// Decode a raw document, treating absent or malformed content as empty
fn decode_or_default<T: DeserializeOwned + Default>(name: &str, value: Option<JsonValue>) -> T {
    match value {
        None | Some(JsonValue::Null) => T::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(document = name, error = %e, "Unreadable document, treating as empty");
            T::default()
        }),
    }
}

/// Load a typed document. Missing or unreadable documents yield `T::default()`.
pub fn load_document<T>(store: &dyn DocumentStore, name: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.read(name) {
        Ok(value) => decode_or_default(name, value),
        Err(e) => {
            warn!(document = name, error = %e, "Failed to read document, treating as empty");
            T::default()
        }
    }
}

/// Atomically transform a typed document and return the stored result.
///
/// A stored document that does not decode as `T` is left untouched and the
/// update fails with `Error::Storage`.
pub fn update_document<T, F>(store: &dyn DocumentStore, name: &str, f: F) -> Result<T>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T),
{
    transform(store, name, f, |current| match current {
        None | Some(JsonValue::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| {
            Error::storage(format!(
                "'{}' does not decode, refusing to overwrite: {}",
                name, e
            ))
        }),
    })
}

/// Like `update_document`, but a document that does not decode is replaced
/// with `T::default()`. Only for state that is safe to lose.
pub fn update_document_or_reset<T, F>(store: &dyn DocumentStore, name: &str, f: F) -> Result<T>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T),
{
    transform(store, name, f, |current| Ok(decode_or_default(name, current)))
}

fn transform<T, F, D>(store: &dyn DocumentStore, name: &str, f: F, decode: D) -> Result<T>
where
    T: Serialize,
    F: FnOnce(&mut T),
    D: Fn(Option<JsonValue>) -> Result<T>,
{
    let mut f = Some(f);
    let mut updated: Option<T> = None;

    store.update(name, &mut |current| {
        let mut doc = decode(current)?;
        if let Some(f) = f.take() {
            f(&mut doc);
        }
        let json = serde_json::to_value(&doc)?;
        updated = Some(doc);
        Ok(json)
    })?;

    updated.ok_or_else(|| Error::storage(format!("update of '{}' did not run", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryDocumentStore;
    use serde_json::json;

    #[test]
    fn test_update_refuses_undecodable_document() {
        let store = MemoryDocumentStore::new();
        store.write("counter", &json!({"not": "a number"})).unwrap();

        let result = update_document::<u64, _>(&store, "counter", |n| *n += 1);

        assert!(matches!(result, Err(Error::Storage(_))));
        assert_eq!(store.read("counter").unwrap(), Some(json!({"not": "a number"})));
    }

    #[test]
    fn test_update_or_reset_replaces_undecodable_document() {
        let store = MemoryDocumentStore::new();
        store.write("counter", &json!({"not": "a number"})).unwrap();

        let n = update_document_or_reset::<u64, _>(&store, "counter", |n| *n += 1).unwrap();

        assert_eq!(n, 1);
        assert_eq!(store.read("counter").unwrap(), Some(json!(1)));
    }
}
