use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tidemark_core::AppResult;
use tidemark_domain::{RetentionPolicy, TimeThresholds};

/// Explicit ordering used when materializing a boundary row of a candidate
/// set. Adapters re-query with this direction instead of reversing an
/// already-sliced view, which some backends cannot do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Oldest ordering value first.
    Ascending,
    /// Newest ordering value first.
    Descending,
}

/// An ordered, bounded view over one table's rows: the materialized deletion
/// plan.
///
/// The view is always ordered oldest-first by `ordering_field`. The two age
/// cutoffs compose as an AND (`field < hours AND field < days`), and `limit`
/// truncates the result to its oldest prefix. `count` on any adapter must
/// reflect every component set here, including the limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSelection {
    /// Field used to order rows and compare against the age cutoffs.
    pub ordering_field: String,
    /// Hour-granularity cutoff: only rows strictly older remain candidates.
    pub older_than_hours: Option<DateTime<Utc>>,
    /// Day-granularity cutoff, AND-composed with the hour cutoff.
    pub older_than_days: Option<DateTime<Utc>>,
    /// Bound on the oldest-first prefix of the candidate set.
    pub limit: Option<u64>,
}

impl RecordSelection {
    /// Creates an unfiltered selection of all rows, ordered oldest-first.
    #[must_use]
    pub fn ordered_by(ordering_field: impl Into<String>) -> Self {
        Self {
            ordering_field: ordering_field.into(),
            older_than_hours: None,
            older_than_days: None,
            limit: None,
        }
    }

    /// Restricts the selection to rows older than the policy cutoffs.
    pub fn apply_time_thresholds(&mut self, thresholds: TimeThresholds) {
        self.older_than_hours = thresholds.hours;
        self.older_than_days = thresholds.days;
    }
}

/// Record collection adapter over one table of the storage backend.
///
/// Implementations run inside the batch transaction opened by the enclosing
/// [`TransactionScope`]; none of these calls commit on their own.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Returns the identifier of the table this store addresses.
    fn table_identifier(&self) -> &str;

    /// Returns the ordering field the table itself declares, if any.
    fn default_ordering_field(&self) -> Option<&str>;

    /// Counts the rows matched by the selection, limit included.
    async fn count(&self, selection: &RecordSelection) -> AppResult<u64>;

    /// Returns the ordering value of the first candidate row in the given
    /// direction, or `None` for an empty selection.
    async fn boundary_timestamp(
        &self,
        selection: &RecordSelection,
        direction: SortDirection,
    ) -> AppResult<Option<DateTime<Utc>>>;

    /// Renders the backend query the selection translates to, for debug
    /// diagnostics only.
    fn selection_query(&self, selection: &RecordSelection) -> String;

    /// Deletes every selected row, one row at a time, oldest first. Must be
    /// safe to call on an empty selection. Returns the number of rows
    /// removed.
    async fn delete(&self, selection: &RecordSelection) -> AppResult<u64>;
}

/// Batch transaction port scoped to a single backend connection.
#[async_trait]
pub trait TransactionScope: Send + Sync {
    /// Opens the batch transaction. Failure is fatal to the whole run.
    async fn begin(&self) -> AppResult<()>;

    /// Commits every deletion performed since `begin`.
    async fn commit(&self) -> AppResult<()>;

    /// Discards every deletion performed since `begin`.
    async fn rollback(&self) -> AppResult<()>;
}

/// Optional storage-engine maintenance run after a committed cleanup.
#[async_trait]
pub trait StorageMaintenance: Send + Sync {
    /// Returns whether the backend supports vacuum-style maintenance.
    fn supports_vacuum(&self) -> bool;

    /// Reclaims storage released by deleted rows. Runs outside the batch
    /// transaction.
    async fn vacuum(&self) -> AppResult<()>;
}

/// One table scheduled for cleanup: a policy bound to its resolved adapter.
///
/// Targets are resolved from configuration before the batch transaction
/// opens, so an unknown table identifier fails fast instead of mid-run.
#[derive(Clone)]
pub struct CleanupTarget {
    /// Retention rules for the table.
    pub policy: RetentionPolicy,
    /// Adapter the rules are applied through.
    pub store: Arc<dyn RecordStore>,
}

/// Batch-level options for one cleanup run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupRunOptions {
    /// Compute and report deletion counts without deleting.
    pub dry_run: bool,
    /// Run storage maintenance after a real, committed cleanup.
    pub vacuum: bool,
}
