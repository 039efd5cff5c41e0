//! Remote duplicate cleanup - reconciles double inserts in the remote ledger
//!
//! Two passes, both idempotent:
//! - temporal: rows created in the last 24 hours with the same
//!   (amount, merchant, date) whose creation times fall within 2 seconds of
//!   their cluster's most recent row; the most recent row is kept
//! - exact: the user's full history grouped the same way and sorted by
//!   creation time; of each adjacent pair within 2 seconds the older goes

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::result::Result;
use crate::domain::RemoteTransaction;
use crate::ports::RemoteStore;

/// Creation times this close together mean one transaction inserted twice
pub fn duplicate_window() -> Duration {
    Duration::seconds(2)
}

/// How far back the temporal pass looks
pub fn temporal_lookback() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub temporal_removed: usize,
    pub exact_removed: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.temporal_removed + self.exact_removed
    }
}

type GroupKey = (Decimal, String, NaiveDate);

pub struct DuplicateCleanup {
    remote: Arc<dyn RemoteStore>,
}

impl DuplicateCleanup {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Run both passes. Failures are logged and reported as nothing removed.
    pub async fn run(&self, user_id: &str) -> CleanupReport {
        self.run_at(user_id, Utc::now()).await
    }

    pub async fn run_at(&self, user_id: &str, now: DateTime<Utc>) -> CleanupReport {
        match self.try_run(user_id, now).await {
            Ok(report) => {
                if report.total() > 0 {
                    info!(
                        temporal = report.temporal_removed,
                        exact = report.exact_removed,
                        "Removed duplicate remote transactions"
                    );
                }
                report
            }
            Err(e) => {
                warn!(error = %e, "Duplicate cleanup failed");
                CleanupReport::default()
            }
        }
    }

    async fn try_run(&self, user_id: &str, now: DateTime<Utc>) -> Result<CleanupReport> {
        let recent = self
            .remote
            .list_transactions(user_id, Some(now - temporal_lookback()))
            .await?;
        let temporal = temporal_duplicates(recent);
        let temporal_removed = self.remote.delete_transactions(&temporal).await?;

        let history = self.remote.list_transactions(user_id, None).await?;
        let exact = exact_duplicates(history);
        let exact_removed = self.remote.delete_transactions(&exact).await?;

        Ok(CleanupReport {
            temporal_removed,
            exact_removed,
        })
    }
}

fn group(rows: Vec<RemoteTransaction>) -> HashMap<GroupKey, Vec<RemoteTransaction>> {
    let mut groups: HashMap<GroupKey, Vec<RemoteTransaction>> = HashMap::new();
    for row in rows {
        let key = (row.amount.normalize(), row.merchant.clone(), row.date);
        groups.entry(key).or_default().push(row);
    }
    groups
}

/// Ids to delete so each 2-second cluster keeps only its most recent row
fn temporal_duplicates(rows: Vec<RemoteTransaction>) -> Vec<String> {
    let mut doomed = Vec::new();
    for (_, mut rows) in group(rows) {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut keeper: Option<DateTime<Utc>> = None;
        for row in rows {
            match keeper {
                Some(kept) if row.created_close_to(kept, duplicate_window()) => doomed.push(row.id),
                _ => keeper = Some(row.created_at),
            }
        }
    }
    doomed
}

/// Ids to delete: the older of every adjacent pair within 2 seconds
fn exact_duplicates(rows: Vec<RemoteTransaction>) -> Vec<String> {
    let mut doomed = Vec::new();
    for (_, mut rows) in group(rows) {
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        for pair in rows.windows(2) {
            if pair[1].created_close_to(pair[0].created_at, duplicate_window()) {
                doomed.push(pair[0].id.clone());
            }
        }
    }
    doomed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRemoteStore;
    use crate::adapters::memory::FlakyRemoteStore;
    use crate::domain::{NewRemoteTransaction, TransactionKind};
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_717_000_000_000 + millis).unwrap()
    }

    fn row(id: &str, merchant: &str, created_at: DateTime<Utc>) -> RemoteTransaction {
        RemoteTransaction {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            amount: Decimal::new(700, 2),
            currency: "€".to_string(),
            merchant: merchant.to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 12).unwrap(),
            category_id: None,
            kind: TransactionKind::Expense,
            created_at,
        }
    }

    #[test]
    fn test_temporal_keeps_most_recent_of_cluster() {
        let rows = vec![
            row("a", "Coop", at(0)),
            row("b", "Coop", at(1_500)),
            row("c", "Coop", at(10_000)),
            row("d", "Esselunga", at(500)),
        ];

        let mut doomed = temporal_duplicates(rows);
        doomed.sort();
        assert_eq!(doomed, vec!["a"]);
    }

    #[test]
    fn test_exact_removes_older_of_adjacent_pairs() {
        let rows = vec![
            row("a", "Coop", at(0)),
            row("b", "Coop", at(1_000)),
            row("c", "Coop", at(2_500)),
            row("d", "Coop", at(60_000)),
        ];

        let mut doomed = exact_duplicates(rows);
        doomed.sort();
        assert_eq!(doomed, vec!["a", "b"]);
    }

    #[test]
    fn test_amount_scale_does_not_split_groups() {
        let mut a = row("a", "Coop", at(0));
        a.amount = Decimal::new(7, 0);
        let b = row("b", "Coop", at(500));

        assert_eq!(exact_duplicates(vec![a, b]), vec!["a"]);
    }

    async fn insert(store: &DuckDbRemoteStore, merchant: &str, created_at: DateTime<Utc>) {
        store
            .insert_transaction(&NewRemoteTransaction {
                user_id: "user-1".to_string(),
                amount: Decimal::new(700, 2),
                currency: "€".to_string(),
                merchant: merchant.to_string(),
                description: None,
                date: NaiveDate::from_ymd_opt(2024, 5, 12).unwrap(),
                category_id: None,
                kind: TransactionKind::Expense,
                created_at,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failure_reports_nothing_removed() {
        let inner = Arc::new(DuckDbRemoteStore::open_in_memory().unwrap());
        insert(&inner, "Coop", at(0)).await;
        insert(&inner, "Coop", at(800)).await;
        let remote = Arc::new(FlakyRemoteStore::new(inner.clone()));
        remote.set_fail_listing(true);

        let report = DuplicateCleanup::new(remote).run_at("user-1", at(0)).await;

        assert_eq!(report, CleanupReport::default());
        assert_eq!(inner.list_transactions("user-1", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let store = Arc::new(DuckDbRemoteStore::open_in_memory().unwrap());
        let now = at(0) + Duration::hours(1);
        insert(&store, "Coop", at(0)).await;
        insert(&store, "Coop", at(800)).await;
        insert(&store, "Coop", at(30_000)).await;
        // Old pair only the exact pass sees
        insert(&store, "Bar", at(0) - Duration::days(3)).await;
        insert(&store, "Bar", at(1_000) - Duration::days(3)).await;

        let cleanup = DuplicateCleanup::new(store.clone());
        let report = cleanup.run_at("user-1", now).await;
        assert_eq!(report.temporal_removed, 1);
        assert_eq!(report.exact_removed, 1);

        let again = cleanup.run_at("user-1", now).await;
        assert_eq!(again.total(), 0);
        assert_eq!(store.list_transactions("user-1", None).await.unwrap().len(), 3);
    }
}
