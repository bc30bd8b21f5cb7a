use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use tidemark_application::{
    CleanupRunOptions, CleanupService, CleanupTarget, RecordSelection, RecordStore, SortDirection,
    StorageMaintenance, TransactionScope,
};
use tidemark_domain::{RetentionPolicy, RetentionPolicyInput};

use super::{PostgresRecordStore, PostgresTableBinding};
use crate::PostgresCleanupSession;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    Some(pool)
}

async fn prepare_probe_table(pool: &PgPool, table: &str, row_count: u32) {
    let create = sqlx::query(
        format!(
            "CREATE TABLE IF NOT EXISTS {table} \
             (id BIGSERIAL PRIMARY KEY, logged_at TIMESTAMPTZ NOT NULL)"
        )
        .as_str(),
    )
    .execute(pool)
    .await;
    assert!(create.is_ok());

    let truncate = sqlx::query(format!("TRUNCATE {table}").as_str())
        .execute(pool)
        .await;
    assert!(truncate.is_ok());

    let now = Utc::now();
    for age_days in 0..row_count {
        let insert = sqlx::query(format!("INSERT INTO {table} (logged_at) VALUES ($1)").as_str())
            .bind(now - Duration::days(i64::from(age_days)))
            .execute(pool)
            .await;
        assert!(insert.is_ok());
    }
}

fn probe_binding(table: &str) -> PostgresTableBinding {
    let binding = PostgresTableBinding::new(table, None, Some("logged_at".to_owned()));
    assert!(binding.is_ok());
    binding.unwrap_or_else(|_| unreachable!())
}

#[test]
fn binding_rejects_invalid_identifiers() {
    assert!(PostgresTableBinding::new("app_logs; DROP TABLE users", None, None).is_err());
    assert!(PostgresTableBinding::new("1starts_with_digit", None, None).is_err());
    assert!(PostgresTableBinding::new("", None, None).is_err());
    assert!(PostgresTableBinding::new("app_logs", Some("bad column".to_owned()), None).is_err());
    assert!(PostgresTableBinding::new("app_logs", None, Some("-logged_at".to_owned())).is_ok());
}

#[tokio::test]
async fn store_calls_require_an_open_transaction() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let session = Arc::new(PostgresCleanupSession::new(pool));
    let store = PostgresRecordStore::new(session, probe_binding("tidemark_probe_no_tx"));

    let selection = RecordSelection::ordered_by("logged_at");
    assert!(store.count(&selection).await.is_err());
    assert!(store.delete(&selection).await.is_err());
}

#[tokio::test]
async fn count_and_delete_respect_the_selection() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let table = "tidemark_probe_selection";
    prepare_probe_table(&pool, table, 30).await;

    let session = Arc::new(PostgresCleanupSession::new(pool));
    let store = PostgresRecordStore::new(Arc::clone(&session), probe_binding(table));

    assert!(session.begin().await.is_ok());

    let mut selection = RecordSelection::ordered_by("logged_at");
    assert_eq!(store.count(&selection).await.unwrap_or_default(), 30);

    selection.older_than_days = Some(Utc::now() - Duration::days(10));
    assert_eq!(store.count(&selection).await.unwrap_or_default(), 20);

    selection.limit = Some(5);
    assert_eq!(store.count(&selection).await.unwrap_or_default(), 5);

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
    assert!(oldest <= newest);

    assert_eq!(store.delete(&selection).await.unwrap_or_default(), 5);
    selection.limit = None;
    assert_eq!(store.count(&selection).await.unwrap_or_default(), 15);

    // Roll back so the probe table is left as seeded.
    assert!(session.rollback().await.is_ok());
}

#[tokio::test]
async fn cleanup_service_prunes_a_postgres_table() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let table = "tidemark_probe_service";
    prepare_probe_table(&pool, table, 100).await;

    let session = Arc::new(PostgresCleanupSession::new(pool.clone()));
    let store: Arc<dyn RecordStore> = Arc::new(PostgresRecordStore::new(
        Arc::clone(&session),
        probe_binding(table),
    ));

    let policy = RetentionPolicy::new(RetentionPolicyInput {
        table_identifier: table.to_owned(),
        ordering_field: None,
        keep_records: 10,
        keep_since_days: 10,
        keep_since_hours: 0,
    });
    assert!(policy.is_ok());
    let targets = [CleanupTarget {
        policy: policy.unwrap_or_else(|_| unreachable!()),
        store,
    }];

    let service = CleanupService::new(
        Arc::clone(&session) as Arc<dyn TransactionScope>,
        Arc::clone(&session) as Arc<dyn StorageMaintenance>,
    );

    let dry = service
        .run(
            &targets,
            CleanupRunOptions {
                dry_run: true,
                vacuum: false,
            },
        )
        .await;
    assert!(dry.is_ok());
    let dry = dry.unwrap_or_default();
    assert_eq!(dry[0].records_removed(), 90);

    let remaining: Result<i64, _> = sqlx::query_scalar(format!("SELECT COUNT(*) FROM {table}").as_str())
        .fetch_one(&pool)
        .await;
    assert_eq!(remaining.unwrap_or_default(), 100);

    let real = service
        .run(
            &targets,
            CleanupRunOptions {
                dry_run: false,
                vacuum: false,
            },
        )
        .await;
    assert!(real.is_ok());
    let real = real.unwrap_or_default();
    assert_eq!(real[0].records_removed(), 90);

    let remaining: Result<i64, _> = sqlx::query_scalar(format!("SELECT COUNT(*) FROM {table}").as_str())
        .fetch_one(&pool)
        .await;
    assert_eq!(remaining.unwrap_or_default(), 10);
}
