//! In-process adapters
//!
//! `MemoryDocumentStore` and `RecordingDispatcher` back unit and integration
//! tests, and let a host embed the pipeline without touching the filesystem.
//! `FlakyRemoteStore` wraps a real remote store and fails chosen calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};
use crate::domain::{Category, NewRemoteTransaction, Reminder, RemoteTransaction};
use crate::ports::{DocumentStore, ReminderDispatcher, RemoteStore};

/// Document store held in memory. Counts physical writes.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, JsonValue>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes (including updates) performed so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn documents(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, JsonValue>>> {
        self.documents
            .lock()
            .map_err(|e| Error::storage(format!("Lock poisoned: {}", e)))
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage("simulated write failure"));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn read(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.documents()?.get(name).cloned())
    }

    fn write(&self, name: &str, value: &JsonValue) -> Result<()> {
        self.check_writable()?;
        self.documents()?.insert(name.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.documents()?.contains_key(name))
    }

    fn update(
        &self,
        name: &str,
        apply: &mut dyn FnMut(Option<JsonValue>) -> Result<JsonValue>,
    ) -> Result<()> {
        self.check_writable()?;
        let mut documents = self.documents()?;
        let next = apply(documents.get(name).cloned())?;
        documents.insert(name.to_string(), next);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Dispatcher that records reminders instead of showing them
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Reminder>>,
    fail: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders scheduled so far
    pub fn reminders(&self) -> Vec<Reminder> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Make every subsequent schedule call fail
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ReminderDispatcher for RecordingDispatcher {
    fn schedule(&self, reminder: &Reminder) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Other("notification permission denied".to_string()));
        }
        self.sent
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?
            .push(reminder.clone());
        Ok(())
    }
}

/// Remote store that delegates to another one, failing on demand
pub struct FlakyRemoteStore {
    inner: Arc<dyn RemoteStore>,
    failing_merchant: Mutex<Option<String>>,
    fail_listing: AtomicBool,
}

impl FlakyRemoteStore {
    pub fn new(inner: Arc<dyn RemoteStore>) -> Self {
        Self {
            inner,
            failing_merchant: Mutex::new(None),
            fail_listing: AtomicBool::new(false),
        }
    }

    /// Make inserts for this merchant fail
    pub fn fail_inserts_for(&self, merchant: &str) {
        if let Ok(mut failing) = self.failing_merchant.lock() {
            *failing = Some(merchant.to_string());
        }
    }

    /// Make `list_transactions` fail
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Stop failing anything
    pub fn recover(&self) {
        if let Ok(mut failing) = self.failing_merchant.lock() {
            *failing = None;
        }
        self.set_fail_listing(false);
    }

    fn insert_fails_for(&self, merchant: &str) -> bool {
        self.failing_merchant
            .lock()
            .map(|failing| failing.as_deref() == Some(merchant))
            .unwrap_or(false)
    }
}

#[async_trait]
impl RemoteStore for FlakyRemoteStore {
    async fn find_transactions(
        &self,
        user_id: &str,
        amount: Decimal,
        merchant: &str,
        date: NaiveDate,
    ) -> Result<Vec<RemoteTransaction>> {
        self.inner.find_transactions(user_id, amount, merchant, date).await
    }

    async fn insert_transaction(&self, tx: &NewRemoteTransaction) -> Result<RemoteTransaction> {
        if self.insert_fails_for(&tx.merchant) {
            return Err(Error::remote(format!("simulated insert failure for {}", tx.merchant)));
        }
        self.inner.insert_transaction(tx).await
    }

    async fn delete_transactions(&self, ids: &[String]) -> Result<usize> {
        self.inner.delete_transactions(ids).await
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        created_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteTransaction>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::remote("simulated listing failure"));
        }
        self.inner.list_transactions(user_id, created_since).await
    }

    async fn latest_category_for_merchant(
        &self,
        user_id: &str,
        merchant: &str,
    ) -> Result<Option<String>> {
        self.inner.latest_category_for_merchant(user_id, merchant).await
    }

    async fn find_category_by_name(&self, user_id: &str, name: &str) -> Result<Option<Category>> {
        self.inner.find_category_by_name(user_id, name).await
    }

    async fn create_category(&self, user_id: &str, name: &str) -> Result<Category> {
        self.inner.create_category(user_id, name).await
    }

    async fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        self.inner.list_categories(user_id).await
    }
}
