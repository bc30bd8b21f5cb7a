use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use tidemark_application::{
    RecordSelection, RecordStore, SortDirection, StorageMaintenance, TransactionScope,
};
use tidemark_core::{AppError, AppResult};

/// In-memory record collection adapter over a set of timestamped rows.
///
/// Useful for exercising cleanup behavior without a database. Deletions are
/// applied immediately; the paired [`InMemoryCleanupSession`] tracks
/// transaction bracketing but does not defer writes.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    table: String,
    default_ordering_field: Option<String>,
    rows: RwLock<Vec<DateTime<Utc>>>,
}

impl InMemoryRecordStore {
    /// Creates an empty store for the named table.
    #[must_use]
    pub fn new(table: impl Into<String>, default_ordering_field: Option<String>) -> Self {
        Self {
            table: table.into(),
            default_ordering_field,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Inserts a row with the given ordering timestamp.
    pub async fn insert_row(&self, timestamp: DateTime<Utc>) {
        self.rows.write().await.push(timestamp);
    }

    /// Returns the current number of stored rows.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns all stored ordering timestamps, oldest first.
    pub async fn ordered_rows(&self) -> Vec<DateTime<Utc>> {
        let mut rows = self.rows.read().await.clone();
        rows.sort();
        rows
    }

    async fn candidates(&self, selection: &RecordSelection) -> Vec<DateTime<Utc>> {
        let mut candidates: Vec<DateTime<Utc>> = self
            .rows
            .read()
            .await
            .iter()
            .copied()
            .filter(|row| {
                selection.older_than_hours.is_none_or(|cutoff| *row < cutoff)
                    && selection.older_than_days.is_none_or(|cutoff| *row < cutoff)
            })
            .collect();
        candidates.sort();

        if let Some(limit) = selection.limit {
            candidates.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        candidates
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn table_identifier(&self) -> &str {
        self.table.as_str()
    }

    fn default_ordering_field(&self) -> Option<&str> {
        self.default_ordering_field.as_deref()
    }

    async fn count(&self, selection: &RecordSelection) -> AppResult<u64> {
        Ok(self.candidates(selection).await.len() as u64)
    }

    async fn boundary_timestamp(
        &self,
        selection: &RecordSelection,
        direction: SortDirection,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let candidates = self.candidates(selection).await;
        Ok(match direction {
            SortDirection::Ascending => candidates.first().copied(),
            SortDirection::Descending => candidates.last().copied(),
        })
    }

    fn selection_query(&self, selection: &RecordSelection) -> String {
        format!(
            "scan {} where {field} < {:?} and {field} < {:?} order by {field} asc limit {:?}",
            self.table,
            selection.older_than_hours,
            selection.older_than_days,
            selection.limit,
            field = selection.ordering_field,
        )
    }

    async fn delete(&self, selection: &RecordSelection) -> AppResult<u64> {
        let candidates = self.candidates(selection).await;

        let mut removed = 0_u64;
        let mut rows = self.rows.write().await;
        for candidate in candidates {
            if let Some(position) = rows.iter().position(|row| *row == candidate) {
                rows.remove(position);
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// In-memory stand-in for the batch transaction and maintenance ports.
///
/// Enforces begin/commit bracketing but offers no rollback of applied
/// deletions and reports no vacuum support.
#[derive(Debug, Default)]
pub struct InMemoryCleanupSession {
    open: Mutex<bool>,
}

impl InMemoryCleanupSession {
    /// Creates a session with no open transaction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Mutex::new(false),
        }
    }
}

#[async_trait]
impl TransactionScope for InMemoryCleanupSession {
    async fn begin(&self) -> AppResult<()> {
        let mut open = self.open.lock().await;
        if *open {
            return Err(AppError::Transaction(
                "batch transaction is already open".to_owned(),
            ));
        }
        *open = true;
        Ok(())
    }

    async fn commit(&self) -> AppResult<()> {
        let mut open = self.open.lock().await;
        if !*open {
            return Err(AppError::Transaction(
                "no open batch transaction to commit".to_owned(),
            ));
        }
        *open = false;
        Ok(())
    }

    async fn rollback(&self) -> AppResult<()> {
        let mut open = self.open.lock().await;
        if !*open {
            return Err(AppError::Transaction(
                "no open batch transaction to roll back".to_owned(),
            ));
        }
        *open = false;
        Ok(())
    }
}

#[async_trait]
impl StorageMaintenance for InMemoryCleanupSession {
    fn supports_vacuum(&self) -> bool {
        false
    }

    async fn vacuum(&self) -> AppResult<()> {
        Err(AppError::Backend(
            "in-memory store has no vacuum".to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests;
