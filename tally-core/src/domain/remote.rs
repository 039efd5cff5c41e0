//! Rows of the remote ledger store

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transaction::{PendingTransaction, TransactionKind};

/// A transaction row as stored remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTransaction {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub merchant: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub category_id: Option<String>,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl RemoteTransaction {
    /// Creation timestamps no more than `window` apart
    pub fn created_close_to(&self, at: DateTime<Utc>, window: Duration) -> bool {
        (self.created_at - at).num_milliseconds().abs() <= window.num_milliseconds()
    }
}

/// Insert payload for a remote transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRemoteTransaction {
    pub user_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub merchant: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub category_id: Option<String>,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl NewRemoteTransaction {
    pub fn from_pending(
        user_id: &str,
        pending: &PendingTransaction,
        category_id: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            amount: pending.amount,
            currency: pending.currency.clone(),
            merchant: pending.merchant.clone(),
            description: Some(pending.raw_text.clone()).filter(|s| !s.is_empty()),
            date: pending.date,
            category_id,
            kind: pending.kind,
            created_at: pending.created_at,
        }
    }
}

/// A user's spending category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub sort_order: i32,
}
