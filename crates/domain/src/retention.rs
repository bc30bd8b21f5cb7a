use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tidemark_core::{AppError, AppResult, NonEmptyString};

/// Input payload for retention policy creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicyInput {
    /// Target table identifier.
    pub table_identifier: String,
    /// Optional ordering field override. A leading `-` descending marker is
    /// accepted and stripped during resolution.
    pub ordering_field: Option<String>,
    /// Minimum number of most-recent rows to always retain. Zero disables
    /// the count floor.
    pub keep_records: u64,
    /// Rows newer than `now - keep_since_days` days are retained. Zero
    /// disables this floor.
    pub keep_since_days: u32,
    /// Rows newer than `now - keep_since_hours` hours are retained. Zero
    /// disables this floor.
    pub keep_since_hours: u32,
}

/// Time thresholds derived from a policy at a fixed instant.
///
/// Both thresholds apply as an AND: a row is a removal candidate only when
/// its ordering field is strictly older than every present threshold. When
/// both are set, the threshold that keeps more rows dominates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeThresholds {
    /// Hour-granularity cutoff, present when `keep_since_hours > 0`.
    pub hours: Option<DateTime<Utc>>,
    /// Day-granularity cutoff, present when `keep_since_days > 0`.
    pub days: Option<DateTime<Utc>>,
}

/// Per-table retention rules, read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    table_identifier: NonEmptyString,
    ordering_field: Option<String>,
    keep_records: u64,
    keep_since_days: u32,
    keep_since_hours: u32,
}

impl RetentionPolicy {
    /// Creates a validated retention policy.
    pub fn new(input: RetentionPolicyInput) -> AppResult<Self> {
        let table_identifier = NonEmptyString::new(input.table_identifier).map_err(|_| {
            AppError::Validation("table_identifier must not be empty".to_owned())
        })?;

        if let Some(ordering_field) = input.ordering_field.as_deref()
            && ordering_field.trim_start_matches('-').trim().is_empty()
        {
            return Err(AppError::Validation(format!(
                "\"{table_identifier}\": ordering_field must not be empty when set"
            )));
        }

        Ok(Self {
            table_identifier,
            ordering_field: input.ordering_field,
            keep_records: input.keep_records,
            keep_since_days: input.keep_since_days,
            keep_since_hours: input.keep_since_hours,
        })
    }

    /// Returns the target table identifier.
    #[must_use]
    pub fn table_identifier(&self) -> &str {
        self.table_identifier.as_str()
    }

    /// Returns the minimum retained row count.
    #[must_use]
    pub fn keep_records(&self) -> u64 {
        self.keep_records
    }

    /// Returns the day-granularity retention window.
    #[must_use]
    pub fn keep_since_days(&self) -> u32 {
        self.keep_since_days
    }

    /// Returns the hour-granularity retention window.
    #[must_use]
    pub fn keep_since_hours(&self) -> u32 {
        self.keep_since_hours
    }

    /// Resolves the ordering field used to sequence and threshold rows.
    ///
    /// The policy override wins over the table's declared default. A leading
    /// `-` descending marker is stripped since candidate selection always
    /// orders oldest-first. A missing field on both sides is a configuration
    /// error, not a transient failure.
    pub fn resolve_ordering_field(&self, declared_default: Option<&str>) -> AppResult<String> {
        let configured = self.ordering_field.as_deref().or(declared_default);

        let Some(field) = configured else {
            return Err(AppError::Configuration(format!(
                "\"{}\": missing required ordering field, neither configured nor declared by the table",
                self.table_identifier
            )));
        };

        let field = field.strip_prefix('-').unwrap_or(field);
        if field.trim().is_empty() {
            return Err(AppError::Configuration(format!(
                "\"{}\": ordering field resolves to an empty name",
                self.table_identifier
            )));
        }

        Ok(field.to_owned())
    }

    /// Computes the age cutoffs for this policy at `now`.
    pub fn time_thresholds(&self, now: DateTime<Utc>) -> AppResult<TimeThresholds> {
        let hours = if self.keep_since_hours > 0 {
            Some(self.cutoff(now, Duration::hours(i64::from(self.keep_since_hours)))?)
        } else {
            None
        };

        let days = if self.keep_since_days > 0 {
            Some(self.cutoff(now, Duration::days(i64::from(self.keep_since_days)))?)
        } else {
            None
        };

        Ok(TimeThresholds { hours, days })
    }

    /// Computes the bound on how many of the oldest time-filtered candidates
    /// may be removed while honoring the `keep_records` floor.
    ///
    /// `total_count` is the table size before filtering and
    /// `candidate_count` the number of rows passing the time thresholds.
    /// `None` means the candidate set is removed in full; `Some(n)` truncates
    /// it to its oldest `n` rows, sparing the newest candidates first.
    #[must_use]
    pub fn removal_limit(&self, total_count: u64, candidate_count: u64) -> Option<u64> {
        if self.keep_records == 0 {
            return None;
        }

        let records_left = total_count.saturating_sub(candidate_count);
        if records_left >= self.keep_records {
            return None;
        }

        Some(candidate_count.saturating_sub(self.keep_records - records_left))
    }

    fn cutoff(&self, now: DateTime<Utc>, window: Duration) -> AppResult<DateTime<Utc>> {
        now.checked_sub_signed(window).ok_or_else(|| {
            AppError::Validation(format!(
                "\"{}\": retention window of {window} underflows the timeline",
                self.table_identifier
            ))
        })
    }
}
