use std::sync::Arc;

use chrono::{Duration, Utc};

use tidemark_application::{
    CleanupRunOptions, CleanupService, CleanupTarget, RecordSelection, RecordStore, SortDirection,
    StorageMaintenance, TransactionScope,
};
use tidemark_domain::{RetentionPolicy, RetentionPolicyInput};

use super::{InMemoryCleanupSession, InMemoryRecordStore};

async fn daily_store(table: &str, row_count: u32) -> InMemoryRecordStore {
    let store = InMemoryRecordStore::new(table, Some("logged_at".to_owned()));
    let now = Utc::now();
    for age_days in 0..row_count {
        store
            .insert_row(now - Duration::days(i64::from(age_days)))
            .await;
    }
    store
}

#[tokio::test]
async fn count_reflects_filters_and_limit() {
    let store = daily_store("app_logs", 30).await;

    let mut selection = RecordSelection::ordered_by("logged_at");
    let unfiltered = store.count(&selection).await;
    assert_eq!(unfiltered.unwrap_or_default(), 30);

    selection.older_than_days = Some(Utc::now() - Duration::days(10));
    let filtered = store.count(&selection).await;
    assert_eq!(filtered.unwrap_or_default(), 20);

    selection.limit = Some(5);
    let limited = store.count(&selection).await;
    assert_eq!(limited.unwrap_or_default(), 5);
}

#[tokio::test]
async fn boundary_timestamps_use_explicit_direction() {
    let store = daily_store("app_logs", 10).await;

    let mut selection = RecordSelection::ordered_by("logged_at");
    selection.limit = Some(3);

    let oldest = store
        .boundary_timestamp(&selection, SortDirection::Ascending)
        .await;
    let newest = store
        .boundary_timestamp(&selection, SortDirection::Descending)
        .await;

    assert!(oldest.is_ok() && newest.is_ok());
    let oldest = oldest.unwrap_or_default();
    let newest = newest.unwrap_or_default();
    assert!(oldest.is_some() && newest.is_some());
    // The limit keeps the three oldest rows, so both boundaries fall inside
    // that prefix.
    assert!(oldest <= newest);
    let rows = store.ordered_rows().await;
    assert_eq!(oldest, rows.first().copied());
    assert_eq!(newest, rows.get(2).copied());
}

#[tokio::test]
async fn delete_removes_the_oldest_prefix_only() {
    let store = daily_store("app_logs", 10).await;

    let mut selection = RecordSelection::ordered_by("logged_at");
    selection.limit = Some(4);

    let removed = store.delete(&selection).await;
    assert_eq!(removed.unwrap_or_default(), 4);
    assert_eq!(store.row_count().await, 6);

    // The four oldest rows are gone.
    let survivor_cutoff = Utc::now() - Duration::days(6);
    let survivors = store.ordered_rows().await;
    assert!(survivors.iter().all(|row| *row > survivor_cutoff));
}

#[tokio::test]
async fn delete_on_an_empty_selection_is_safe() {
    let store = InMemoryRecordStore::new("app_logs", None);
    let selection = RecordSelection::ordered_by("logged_at");
    let removed = store.delete(&selection).await;
    assert_eq!(removed.unwrap_or_default(), 0);
}

#[tokio::test]
async fn session_enforces_transaction_bracketing() {
    let session = InMemoryCleanupSession::new();

    assert!(session.commit().await.is_err());
    assert!(session.begin().await.is_ok());
    assert!(session.begin().await.is_err());
    assert!(session.commit().await.is_ok());

    assert!(session.begin().await.is_ok());
    assert!(session.rollback().await.is_ok());
    assert!(session.rollback().await.is_err());

    assert!(!session.supports_vacuum());
}

#[tokio::test]
async fn cleanup_service_runs_end_to_end_over_in_memory_adapters() {
    let session = Arc::new(InMemoryCleanupSession::new());
    let store = Arc::new(daily_store("app_logs", 50).await);

    let policy = RetentionPolicy::new(RetentionPolicyInput {
        table_identifier: "app_logs".to_owned(),
        ordering_field: None,
        keep_records: 10,
        keep_since_days: 5,
        keep_since_hours: 0,
    });
    assert!(policy.is_ok());

    let service = CleanupService::new(
        Arc::clone(&session) as Arc<dyn TransactionScope>,
        Arc::clone(&session) as Arc<dyn StorageMaintenance>,
    );
    let targets = [CleanupTarget {
        policy: policy.unwrap_or_else(|_| unreachable!()),
        store: Arc::clone(&store) as Arc<dyn RecordStore>,
    }];

    // The 5-day window alone would keep 5 rows; the count floor of 10 wins
    // and spares the newest candidates.
    let outcomes = service
        .run(
            &targets,
            CleanupRunOptions {
                dry_run: false,
                vacuum: true,
            },
        )
        .await;

    assert!(outcomes.is_ok());
    let outcomes = outcomes.unwrap_or_default();
    assert_eq!(outcomes[0].records_removed(), 40);
    assert!(outcomes[0].error().is_none());
    assert_eq!(store.row_count().await, 10);
}
