//! Pending transaction domain model

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::ParsedTransactionCandidate;

/// Direction of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expense,
    Income,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Expense => "expense",
            TransactionKind::Income => "income",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "income" => TransactionKind::Income,
            _ => TransactionKind::Expense,
        }
    }
}

/// A parsed candidate waiting in the local queue for remote sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub merchant: String,
    pub date: NaiveDate,
    pub raw_text: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub kind: TransactionKind,
    /// Flips false -> true once, never back
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub source_app: String,
    /// Content hash of the notification this came from
    #[serde(default)]
    pub dedup_key: String,
}

impl PendingTransaction {
    /// Build an unsynced pending transaction from a parsed candidate
    pub fn from_candidate(
        candidate: &ParsedTransactionCandidate,
        source_app: &str,
        dedup_key: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount: candidate.amount,
            currency: candidate.currency.clone(),
            merchant: candidate.merchant.clone(),
            date: candidate.date,
            raw_text: candidate.source_text.clone(),
            category_id: None,
            created_at,
            kind: candidate.kind,
            synced: false,
            source_app: source_app.to_string(),
            dedup_key: dedup_key.to_string(),
        }
    }

    /// True when the entry is strictly older than `max_age` at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.created_at > max_age
    }
}
