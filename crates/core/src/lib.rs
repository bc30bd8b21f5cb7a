//! Shared primitives for all Tidemark crates.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Tidemark crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or unresolvable per-table configuration, such as an ordering
    /// field that is neither configured nor declared by the table.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Query or deletion failure raised by the storage adapter.
    #[error("backend error: {0}")]
    Backend(String),

    /// The enclosing batch transaction could not be opened or committed.
    /// Never downgraded to a per-table failure.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the error must terminate the whole batch rather than
    /// a single table's cleanup.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }
}
