use std::sync::Arc;

use chrono::Utc;
use tidemark_core::AppResult;
use tidemark_domain::{RetentionPolicy, TableCleanupOutcome};
use tracing::{debug, error, info, warn};

use crate::cleanup_ports::{
    CleanupRunOptions, CleanupTarget, RecordSelection, RecordStore, SortDirection,
    StorageMaintenance, TransactionScope,
};

/// Batch cleanup service: prunes each target table according to its
/// retention policy inside one atomic transaction.
#[derive(Clone)]
pub struct CleanupService {
    transaction: Arc<dyn TransactionScope>,
    maintenance: Arc<dyn StorageMaintenance>,
}

impl CleanupService {
    /// Creates a cleanup service bound to one backend connection.
    #[must_use]
    pub fn new(
        transaction: Arc<dyn TransactionScope>,
        maintenance: Arc<dyn StorageMaintenance>,
    ) -> Self {
        Self {
            transaction,
            maintenance,
        }
    }

    /// Runs the whole batch: every target is pruned sequentially inside a
    /// single transaction, per-table failures are recorded and skipped, and
    /// maintenance optionally runs after a committed non-dry-run cleanup.
    ///
    /// Only transaction-level failures escape this method; they abort the
    /// batch with nothing deleted.
    pub async fn run(
        &self,
        targets: &[CleanupTarget],
        options: CleanupRunOptions,
    ) -> AppResult<Vec<TableCleanupOutcome>> {
        self.transaction.begin().await?;

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let table = target.policy.table_identifier();
            info!(table = %table, "cleaning table");

            match self
                .prune_table(&target.policy, target.store.as_ref(), options.dry_run)
                .await
            {
                Ok(removed) => {
                    if options.dry_run {
                        info!("DRY-RUN: {removed} records would be removed from \"{table}\"");
                    } else {
                        info!("{removed} records removed from \"{table}\"");
                    }
                    outcomes.push(TableCleanupOutcome::succeeded(
                        table,
                        removed,
                        options.dry_run,
                    ));
                }
                Err(cleanup_error) => {
                    error!(table = %table, "{cleanup_error}");
                    debug!(table = %table, error = ?cleanup_error, "table cleanup failure detail");
                    outcomes.push(TableCleanupOutcome::failed(
                        table,
                        options.dry_run,
                        cleanup_error.to_string(),
                    ));
                }
            }
        }

        self.transaction.commit().await?;

        if options.vacuum && !options.dry_run {
            self.run_maintenance().await;
        }

        Ok(outcomes)
    }

    /// Applies one policy to one table and returns the removed row count,
    /// or the would-remove count in dry-run mode.
    async fn prune_table(
        &self,
        policy: &RetentionPolicy,
        store: &dyn RecordStore,
        dry_run: bool,
    ) -> AppResult<u64> {
        let ordering_field = policy.resolve_ordering_field(store.default_ordering_field())?;
        let table = policy.table_identifier();

        let mut selection = RecordSelection::ordered_by(ordering_field);
        let total_count = store.count(&selection).await?;
        debug!(table = %table, total_count, "records count before cleaning");

        selection.apply_time_thresholds(policy.time_thresholds(Utc::now())?);
        let candidate_count = store.count(&selection).await?;

        if let Some(limit) = policy.removal_limit(total_count, candidate_count) {
            selection.limit = Some(limit);
        }
        let removal_count = store.count(&selection).await?;

        debug!(table = %table, query = %store.selection_query(&selection));
        debug!(
            table = %table,
            records_to_keep = total_count.saturating_sub(removal_count),
            records_to_remove = removal_count,
        );
        self.dump_candidate_boundaries(store, &selection, removal_count)
            .await;

        if dry_run {
            return Ok(removal_count);
        }

        store.delete(&selection).await
    }

    /// Logs the candidate count with its oldest and newest ordering values.
    async fn dump_candidate_boundaries(
        &self,
        store: &dyn RecordStore,
        selection: &RecordSelection,
        removal_count: u64,
    ) {
        let oldest = store
            .boundary_timestamp(selection, SortDirection::Ascending)
            .await;
        let newest = store
            .boundary_timestamp(selection, SortDirection::Descending)
            .await;

        match (oldest, newest) {
            (Ok(oldest), Ok(newest)) => {
                let render = |value: Option<chrono::DateTime<Utc>>| {
                    value.map(|value| value.to_rfc3339()).unwrap_or_default()
                };
                debug!(
                    "records: {removal_count} [{} ... {}]",
                    render(oldest),
                    render(newest)
                );
            }
            (Err(boundary_error), _) | (_, Err(boundary_error)) => {
                debug!(error = %boundary_error, "candidate boundary lookup failed");
            }
        }
    }

    async fn run_maintenance(&self) {
        if !self.maintenance.supports_vacuum() {
            warn!("vacuum not supported by this backend, skipped");
            return;
        }

        info!("executing vacuum");
        if let Err(vacuum_error) = self.maintenance.vacuum().await {
            warn!(error = %vacuum_error, "vacuum failed");
        }
    }
}
