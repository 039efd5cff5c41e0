//! Remote store port - the user's ledger database

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::result::Result;
use crate::domain::{Category, NewRemoteTransaction, RemoteTransaction};

/// Remote ledger abstraction
///
/// This is the minimal contract the pipeline consumes. Implementations
/// (adapters) provide the actual access logic; timeouts are left to the
/// underlying transport.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // === Transactions ===

    /// Rows matching (user, amount, merchant, date) exactly
    async fn find_transactions(
        &self,
        user_id: &str,
        amount: Decimal,
        merchant: &str,
        date: NaiveDate,
    ) -> Result<Vec<RemoteTransaction>>;

    /// Insert a row and return it with its assigned id
    async fn insert_transaction(&self, tx: &NewRemoteTransaction) -> Result<RemoteTransaction>;

    /// Delete rows by id, returning how many were removed
    async fn delete_transactions(&self, ids: &[String]) -> Result<usize>;

    /// All of a user's rows, optionally only those created at or after `created_since`
    async fn list_transactions(
        &self,
        user_id: &str,
        created_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteTransaction>>;

    /// Category of the most recent categorized row with this exact merchant
    async fn latest_category_for_merchant(
        &self,
        user_id: &str,
        merchant: &str,
    ) -> Result<Option<String>>;

    // === Categories ===

    /// Look up a category by exact name
    async fn find_category_by_name(&self, user_id: &str, name: &str) -> Result<Option<Category>>;

    /// Create a category at the end of the user's sort order
    async fn create_category(&self, user_id: &str, name: &str) -> Result<Category>;

    /// A user's categories ordered by sort order
    async fn list_categories(&self, user_id: &str) -> Result<Vec<Category>>;
}
