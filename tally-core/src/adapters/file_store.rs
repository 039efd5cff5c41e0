//! File-backed document store
//!
//! Each document lives in `<dir>/<name>.json`. Writes go through a temp file
//! in the same directory and are renamed into place, so readers never see a
//! half-written document. `update` holds an exclusive OS lock on
//! `<dir>/.<name>.lock` for the whole read-modify-write, which serializes the
//! headless and foreground processes against each other. A document that is
//! not valid JSON is moved aside to `<name>.corrupt-<millis>.json` before an
//! update replaces it.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::ports::DocumentStore;

pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn document_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{}.json", name)))
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!(".{}.lock", name))
    }

    /// Acquire the exclusive lock for a document. Released when the file drops.
    fn lock(&self, name: &str) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.lock_path(name))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn read_path(path: &Path) -> Result<Option<JsonValue>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::storage(format!("{} is not valid JSON: {}", path.display(), e)))
    }

    /// Move an unreadable document out of the way, keeping its bytes
    fn quarantine(&self, name: &str, path: &Path) -> Result<PathBuf> {
        let aside = self.dir.join(format!(
            "{}.corrupt-{}.json",
            name,
            Utc::now().timestamp_millis()
        ));
        fs::rename(path, &aside)?;
        Ok(aside)
    }

    fn write_path(&self, path: &Path, value: &JsonValue) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut temp, value)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Document names become file names, so keep them to a safe alphabet
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid document name: {:?}", name)))
    }
}

impl DocumentStore for FileDocumentStore {
    fn read(&self, name: &str) -> Result<Option<JsonValue>> {
        let path = self.document_path(name)?;
        Self::read_path(&path)
    }

    fn write(&self, name: &str, value: &JsonValue) -> Result<()> {
        let path = self.document_path(name)?;
        let _lock = self.lock(name)?;
        self.write_path(&path, value)?;
        debug!(document = name, "Document written");
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.document_path(name)?.exists())
    }

    fn update(
        &self,
        name: &str,
        apply: &mut dyn FnMut(Option<JsonValue>) -> Result<JsonValue>,
    ) -> Result<()> {
        let path = self.document_path(name)?;
        let _lock = self.lock(name)?;

        let current = match Self::read_path(&path) {
            Ok(value) => value,
            Err(Error::Storage(msg)) => {
                let aside = self.quarantine(name, &path)?;
                warn!(
                    document = name,
                    error = %msg,
                    moved_to = %aside.display(),
                    "Moved unreadable document aside"
                );
                None
            }
            Err(e) => return Err(e),
        };

        let next = apply(current)?;
        self.write_path(&path, &next)?;
        debug!(document = name, "Document updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_document_reads_as_none() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();

        assert!(store.read("pending_transactions").unwrap().is_none());
        assert!(!store.exists("pending_transactions").unwrap());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();

        store.write("notification_log", &json!([{"id": "a"}])).unwrap();

        assert!(store.exists("notification_log").unwrap());
        assert_eq!(
            store.read("notification_log").unwrap(),
            Some(json!([{"id": "a"}]))
        );
    }

    #[test]
    fn test_update_moves_corrupt_document_aside() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("reminder_tracking.json"), "{not json").unwrap();

        assert!(store.read("reminder_tracking").is_err());

        store
            .update("reminder_tracking", &mut |current| {
                assert!(current.is_none());
                Ok(json!({"lastBulkReminderAt": null}))
            })
            .unwrap();

        assert!(store.read("reminder_tracking").unwrap().is_some());

        let aside: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("reminder_tracking.corrupt-"))
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join(&aside[0])).unwrap(),
            "{not json"
        );
    }

    #[test]
    fn test_failed_update_leaves_document_alone() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();
        store.write("pending_transactions", &json!([{"id": "a"}])).unwrap();

        let result = store.update("pending_transactions", &mut |_| {
            Err(Error::storage("does not decode"))
        });

        assert!(result.is_err());
        assert_eq!(
            store.read("pending_transactions").unwrap(),
            Some(json!([{"id": "a"}]))
        );
    }

    #[test]
    fn test_rejects_path_like_names() {
        let dir = tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();

        assert!(store.read("../escape").is_err());
        assert!(store.write("a/b", &json!(1)).is_err());
        assert!(store.read("").is_err());
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    // Separate store instances, like separate processes
                    let store = FileDocumentStore::new(&path).unwrap();
                    for _ in 0..10 {
                        store
                            .update("counter", &mut |current| {
                                let n = current.and_then(|v| v.as_u64()).unwrap_or(0);
                                Ok(json!(n + 1))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let store = FileDocumentStore::new(&path).unwrap();
        assert_eq!(store.read("counter").unwrap(), Some(json!(40)));
    }
}
