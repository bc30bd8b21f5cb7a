/// Outcome of one table's cleanup within a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCleanupOutcome {
    table_identifier: String,
    records_removed: u64,
    dry_run: bool,
    error: Option<String>,
}

impl TableCleanupOutcome {
    /// Creates an outcome for a table pruned without error.
    #[must_use]
    pub fn succeeded(
        table_identifier: impl Into<String>,
        records_removed: u64,
        dry_run: bool,
    ) -> Self {
        Self {
            table_identifier: table_identifier.into(),
            records_removed,
            dry_run,
            error: None,
        }
    }

    /// Creates an outcome for a table whose cleanup failed.
    #[must_use]
    pub fn failed(table_identifier: impl Into<String>, dry_run: bool, error: String) -> Self {
        Self {
            table_identifier: table_identifier.into(),
            records_removed: 0,
            dry_run,
            error: Some(error),
        }
    }

    /// Returns the table this outcome describes.
    #[must_use]
    pub fn table_identifier(&self) -> &str {
        self.table_identifier.as_str()
    }

    /// Returns the removed row count, or the would-remove count in dry-run
    /// mode.
    #[must_use]
    pub fn records_removed(&self) -> u64 {
        self.records_removed
    }

    /// Returns whether this outcome was produced by a dry run.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns the captured error message, if cleanup failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
