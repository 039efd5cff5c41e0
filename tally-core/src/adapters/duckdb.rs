//! DuckDB remote store implementation
//!
//! The ledger lives in a single DuckDB file (or in memory for tests).
//! Amounts are bound as strings and cast to DECIMAL so no precision is lost
//! going through f64; dates and timestamps come back as VARCHAR and are
//! parsed on the Rust side.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Category, NewRemoteTransaction, RemoteTransaction, TransactionKind};
use crate::ports::RemoteStore;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const TRANSACTION_COLUMNS: &str = "id, user_id, amount::VARCHAR, currency, merchant, description,
     date::VARCHAR, category_id, kind, created_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock")
        || lower.contains("file is already open")
}

/// DuckDB-backed ledger
pub struct DuckDbRemoteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRemoteStore {
    /// Open (or create) a ledger file and bring its schema up to date
    ///
    /// Retries with exponential backoff when another process holds the file,
    /// which happens when the headless capture path and the foreground app
    /// sync at the same moment.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut attempt = 0;
        let conn = loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => break conn,
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "Ledger database busy, retrying"
                        );
                        thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        };

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Ledger held entirely in memory
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Extension autoloading stays off; JSON is linked statically
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run pending schema migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            debug!(applied = ?result.applied, "Ledger schema updated");
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    fn query_transactions(
        conn: &Connection,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<RemoteTransaction>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(TransactionRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                amount: row.get(2)?,
                currency: row.get(3)?,
                merchant: row.get(4)?,
                description: row.get(5)?,
                date: row.get(6)?,
                category_id: row.get(7)?,
                kind: row.get(8)?,
                created_at: row.get(9)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_transaction()?);
        }
        Ok(result)
    }

    fn query_categories(
        conn: &Connection,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<Category>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(Category {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                sort_order: row.get(3)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

/// Raw column values of a transactions row
struct TransactionRow {
    id: String,
    user_id: String,
    amount: String,
    currency: String,
    merchant: String,
    description: Option<String>,
    date: String,
    category_id: Option<String>,
    kind: String,
    created_at: String,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<RemoteTransaction> {
        let amount = Decimal::from_str(&self.amount)
            .map_err(|e| Error::database(format!("bad amount {:?}: {}", self.amount, e)))?;
        Ok(RemoteTransaction {
            id: self.id,
            user_id: self.user_id,
            amount,
            currency: self.currency,
            merchant: self.merchant,
            description: self.description,
            date: parse_date(&self.date)?,
            category_id: self.category_id,
            kind: TransactionKind::parse(&self.kind),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[async_trait]
impl RemoteStore for DuckDbRemoteStore {
    async fn find_transactions(
        &self,
        user_id: &str,
        amount: Decimal,
        merchant: &str,
        date: NaiveDate,
    ) -> Result<Vec<RemoteTransaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions
             WHERE user_id = ? AND amount = CAST(? AS DECIMAL(18, 2))
               AND merchant = ? AND date = CAST(? AS DATE)
             ORDER BY created_at",
            TRANSACTION_COLUMNS
        );
        Self::query_transactions(
            &conn,
            &sql,
            params![user_id, amount.to_string(), merchant, format_date(date)],
        )
    }

    async fn insert_transaction(&self, tx: &NewRemoteTransaction) -> Result<RemoteTransaction> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();

        conn.execute(
            "INSERT INTO transactions (id, user_id, amount, currency, merchant, description,
                                       date, category_id, kind, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 2)), ?, ?, ?, CAST(? AS DATE), ?, ?, ?)",
            params![
                id,
                tx.user_id,
                tx.amount.to_string(),
                tx.currency,
                tx.merchant,
                tx.description,
                format_date(tx.date),
                tx.category_id,
                tx.kind.as_str(),
                format_timestamp(tx.created_at),
            ],
        )?;

        Ok(RemoteTransaction {
            id,
            user_id: tx.user_id.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            merchant: tx.merchant.clone(),
            description: tx.description.clone(),
            date: tx.date,
            category_id: tx.category_id.clone(),
            kind: tx.kind,
            created_at: tx.created_at,
        })
    }

    async fn delete_transactions(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self.conn()?;
        let mut deleted = 0;
        for id in ids {
            deleted += conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        }
        Ok(deleted)
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        created_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteTransaction>> {
        let conn = self.conn()?;
        match created_since {
            Some(since) => {
                let sql = format!(
                    "SELECT {} FROM transactions
                     WHERE user_id = ? AND created_at >= ?
                     ORDER BY created_at",
                    TRANSACTION_COLUMNS
                );
                Self::query_transactions(&conn, &sql, params![user_id, format_timestamp(since)])
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM transactions WHERE user_id = ? ORDER BY created_at",
                    TRANSACTION_COLUMNS
                );
                Self::query_transactions(&conn, &sql, params![user_id])
            }
        }
    }

    async fn latest_category_for_merchant(
        &self,
        user_id: &str,
        merchant: &str,
    ) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT category_id FROM transactions
             WHERE user_id = ? AND merchant = ? AND category_id IS NOT NULL
             ORDER BY created_at DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![user_id, merchant], |row| row.get::<_, String>(0))?;
        Ok(rows.next().transpose()?)
    }

    async fn find_category_by_name(&self, user_id: &str, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let categories = Self::query_categories(
            &conn,
            "SELECT id, user_id, name, sort_order FROM categories
             WHERE user_id = ? AND name = ?
             ORDER BY sort_order
             LIMIT 1",
            params![user_id, name],
        )?;
        Ok(categories.into_iter().next())
    }

    async fn create_category(&self, user_id: &str, name: &str) -> Result<Category> {
        let conn = self.conn()?;
        let next_order: i32 = conn.query_row(
            "SELECT CAST(COALESCE(MAX(sort_order) + 1, 0) AS INTEGER)
             FROM categories WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;

        let category = Category {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            sort_order: next_order,
        };

        conn.execute(
            "INSERT INTO categories (id, user_id, name, sort_order, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                category.id,
                category.user_id,
                category.name,
                category.sort_order,
                format_timestamp(Utc::now()),
            ],
        )?;

        Ok(category)
    }

    async fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        Self::query_categories(
            &conn,
            "SELECT id, user_id, name, sort_order FROM categories
             WHERE user_id = ?
             ORDER BY sort_order, name",
            params![user_id],
        )
    }
}

// Helper functions

/// Fixed-width UTC timestamp so VARCHAR comparison orders chronologically
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::database(format!("bad timestamp {:?}: {}", s, e)))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::database(format!("bad date {:?}: {}", s, e)))
}
