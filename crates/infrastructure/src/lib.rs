//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_record_store;
mod postgres_cleanup_session;
mod postgres_record_store;

pub use in_memory_record_store::{InMemoryCleanupSession, InMemoryRecordStore};
pub use postgres_cleanup_session::PostgresCleanupSession;
pub use postgres_record_store::{PostgresRecordStore, PostgresTableBinding};
