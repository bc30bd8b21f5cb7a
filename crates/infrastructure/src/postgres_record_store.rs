use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tidemark_application::{RecordSelection, RecordStore, SortDirection};
use tidemark_core::{AppError, AppResult};

use crate::postgres_cleanup_session::PostgresCleanupSession;

/// Typed binding from a table identifier to the columns the cleaner needs,
/// resolved and validated at configuration-load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresTableBinding {
    table_name: String,
    primary_key_column: String,
    default_ordering_column: Option<String>,
}

impl PostgresTableBinding {
    /// Creates a validated binding. The primary key column defaults to `id`.
    pub fn new(
        table_name: impl Into<String>,
        primary_key_column: Option<String>,
        default_ordering_column: Option<String>,
    ) -> AppResult<Self> {
        let table_name = table_name.into();
        validate_identifier(&table_name)?;

        let primary_key_column = primary_key_column.unwrap_or_else(|| "id".to_owned());
        validate_identifier(&primary_key_column)?;

        if let Some(column) = default_ordering_column.as_deref() {
            validate_identifier(column.strip_prefix('-').unwrap_or(column))?;
        }

        Ok(Self {
            table_name,
            primary_key_column,
            default_ordering_column,
        })
    }

    /// Returns the bound table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.table_name.as_str()
    }
}

/// PostgreSQL-backed record collection adapter over one table.
///
/// Every query executes through the session's open batch transaction; the
/// adapter never commits on its own.
pub struct PostgresRecordStore {
    session: Arc<PostgresCleanupSession>,
    binding: PostgresTableBinding,
}

impl PostgresRecordStore {
    /// Creates a store bound to a table within a cleanup session.
    #[must_use]
    pub fn new(session: Arc<PostgresCleanupSession>, binding: PostgresTableBinding) -> Self {
        Self { session, binding }
    }

    /// Candidate subquery: time filters AND-composed, ordered oldest-first,
    /// bounded by the optional limit. `LIMIT NULL` means no limit, matching
    /// an unbounded selection.
    fn candidate_sql(&self, selection: &RecordSelection, projection: &str) -> AppResult<String> {
        let table = quote_identifier(&self.binding.table_name)?;
        let field = quote_identifier(&selection.ordering_field)?;

        Ok(format!(
            "SELECT {projection} FROM {table} \
             WHERE ($1::TIMESTAMPTZ IS NULL OR {field} < $1) \
             AND ($2::TIMESTAMPTZ IS NULL OR {field} < $2) \
             ORDER BY {field} ASC \
             LIMIT $3"
        ))
    }

    fn bound_limit(selection: &RecordSelection) -> Option<i64> {
        selection
            .limit
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    fn table_identifier(&self) -> &str {
        self.binding.table_name.as_str()
    }

    fn default_ordering_field(&self) -> Option<&str> {
        self.binding.default_ordering_column.as_deref()
    }

    async fn count(&self, selection: &RecordSelection) -> AppResult<u64> {
        let inner = self.candidate_sql(selection, "1")?;
        let sql = format!("SELECT COUNT(*) FROM ({inner}) AS candidate_rows");

        let mut guard = self.session.lock_transaction().await;
        let Some(transaction) = guard.as_mut() else {
            return Err(AppError::Backend("no open batch transaction".to_owned()));
        };

        let count: i64 = sqlx::query_scalar(sql.as_str())
            .bind(selection.older_than_hours)
            .bind(selection.older_than_days)
            .bind(Self::bound_limit(selection))
            .fetch_one(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Backend(format!(
                    "failed to count candidate rows in \"{}\": {error}",
                    self.binding.table_name
                ))
            })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn boundary_timestamp(
        &self,
        selection: &RecordSelection,
        direction: SortDirection,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let field = quote_identifier(&selection.ordering_field)?;
        let inner = self.candidate_sql(selection, field.as_str())?;
        let order = match direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        let sql = format!(
            "SELECT {field} FROM ({inner}) AS candidate_rows ORDER BY {field} {order} LIMIT 1"
        );

        let mut guard = self.session.lock_transaction().await;
        let Some(transaction) = guard.as_mut() else {
            return Err(AppError::Backend("no open batch transaction".to_owned()));
        };

        sqlx::query_scalar::<_, DateTime<Utc>>(sql.as_str())
            .bind(selection.older_than_hours)
            .bind(selection.older_than_days)
            .bind(Self::bound_limit(selection))
            .fetch_optional(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Backend(format!(
                    "failed to read candidate boundary in \"{}\": {error}",
                    self.binding.table_name
                ))
            })
    }

    fn selection_query(&self, selection: &RecordSelection) -> String {
        match self.candidate_sql(selection, "*") {
            Ok(sql) => format!(
                "{sql} -- $1 = {:?}, $2 = {:?}, $3 = {:?}",
                selection.older_than_hours, selection.older_than_days, selection.limit
            ),
            Err(error) => format!("<unrenderable selection: {error}>"),
        }
    }

    async fn delete(&self, selection: &RecordSelection) -> AppResult<u64> {
        let key_projection = format!(
            "{}::TEXT AS row_key",
            quote_identifier(&self.binding.primary_key_column)?
        );
        let keys_sql = self.candidate_sql(selection, key_projection.as_str())?;
        let delete_sql = format!(
            "DELETE FROM {} WHERE {}::TEXT = $1",
            quote_identifier(&self.binding.table_name)?,
            quote_identifier(&self.binding.primary_key_column)?
        );

        let mut guard = self.session.lock_transaction().await;
        let Some(transaction) = guard.as_mut() else {
            return Err(AppError::Backend("no open batch transaction".to_owned()));
        };

        let row_keys: Vec<String> = sqlx::query_scalar(keys_sql.as_str())
            .bind(selection.older_than_hours)
            .bind(selection.older_than_days)
            .bind(Self::bound_limit(selection))
            .fetch_all(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Backend(format!(
                    "failed to list candidate rows in \"{}\": {error}",
                    self.binding.table_name
                ))
            })?;

        let mut removed = 0_u64;
        for row_key in row_keys {
            let result = sqlx::query(delete_sql.as_str())
                .bind(row_key.as_str())
                .execute(&mut **transaction)
                .await
                .map_err(|error| {
                    AppError::Backend(format!(
                        "failed to delete row '{row_key}' from \"{}\": {error}",
                        self.binding.table_name
                    ))
                })?;
            removed += result.rows_affected();
        }

        Ok(removed)
    }
}

fn validate_identifier(raw: &str) -> AppResult<()> {
    let mut characters = raw.chars();
    let starts_well = characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_');
    let continues_well =
        characters.all(|character| character.is_ascii_alphanumeric() || character == '_');

    if starts_well && continues_well && raw.len() <= 63 {
        Ok(())
    } else {
        Err(AppError::Configuration(format!(
            "'{raw}' is not a valid SQL identifier"
        )))
    }
}

fn quote_identifier(raw: &str) -> AppResult<String> {
    validate_identifier(raw)?;
    Ok(format!("\"{raw}\""))
}

#[cfg(test)]
mod tests;
