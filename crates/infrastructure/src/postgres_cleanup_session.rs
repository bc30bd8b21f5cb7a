use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use tidemark_application::{StorageMaintenance, TransactionScope};
use tidemark_core::{AppError, AppResult};

/// One cleanup run's connection state: the batch transaction every
/// [`crate::PostgresRecordStore`] executes through, plus post-run vacuum.
///
/// The whole multi-table batch shares this single transaction, so either all
/// intended deletions commit together or none do.
pub struct PostgresCleanupSession {
    pool: PgPool,
    transaction: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PostgresCleanupSession {
    /// Creates a session with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            transaction: Mutex::new(None),
        }
    }

    pub(crate) async fn lock_transaction(
        &self,
    ) -> MutexGuard<'_, Option<Transaction<'static, Postgres>>> {
        self.transaction.lock().await
    }
}

#[async_trait]
impl TransactionScope for PostgresCleanupSession {
    async fn begin(&self) -> AppResult<()> {
        let mut guard = self.transaction.lock().await;
        if guard.is_some() {
            return Err(AppError::Transaction(
                "batch transaction is already open".to_owned(),
            ));
        }

        let transaction = self.pool.begin().await.map_err(|error| {
            AppError::Transaction(format!("failed to open batch transaction: {error}"))
        })?;
        *guard = Some(transaction);

        Ok(())
    }

    async fn commit(&self) -> AppResult<()> {
        let transaction = self.transaction.lock().await.take().ok_or_else(|| {
            AppError::Transaction("no open batch transaction to commit".to_owned())
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Transaction(format!("failed to commit batch transaction: {error}"))
        })
    }

    async fn rollback(&self) -> AppResult<()> {
        let transaction = self.transaction.lock().await.take().ok_or_else(|| {
            AppError::Transaction("no open batch transaction to roll back".to_owned())
        })?;

        transaction.rollback().await.map_err(|error| {
            AppError::Transaction(format!("failed to roll back batch transaction: {error}"))
        })
    }
}

#[async_trait]
impl StorageMaintenance for PostgresCleanupSession {
    fn supports_vacuum(&self) -> bool {
        true
    }

    async fn vacuum(&self) -> AppResult<()> {
        // VACUUM cannot run inside a transaction block, so it executes on
        // the pool after the batch transaction has committed.
        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Backend(format!("failed to run VACUUM: {error}")))?;

        Ok(())
    }
}
