//! Parsed transaction candidates

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transaction::TransactionKind;

/// Sign token found next to the amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Plus,
    Minus,
    None,
}

impl Sign {
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "+" => Sign::Plus,
            "-" | "\u{2212}" => Sign::Minus,
            _ => Sign::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sign::Plus => "+",
            Sign::Minus => "-",
            Sign::None => "",
        }
    }
}

/// A transaction parsed out of a notification, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransactionCandidate {
    /// Unsigned magnitude; direction lives in `sign` and `kind`
    pub amount: Decimal,
    pub currency: String,
    pub sign: Sign,
    pub merchant: String,
    pub date: NaiveDate,
    pub source_text: String,
    pub kind: TransactionKind,
    pub is_promotional: bool,
    pub is_monitored: bool,
}

/// Why a notification did not produce a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Promotional,
    Unmonitored,
    UnparseableAmount,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Promotional => "promotional",
            Rejection::Unmonitored => "unmonitored",
            Rejection::UnparseableAmount => "unparseable_amount",
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
