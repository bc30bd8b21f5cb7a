//! Application services and storage ports for table cleanup.

#![forbid(unsafe_code)]

mod cleanup_ports;
mod cleanup_service;

pub use cleanup_ports::{
    CleanupRunOptions, CleanupTarget, RecordSelection, RecordStore, SortDirection,
    StorageMaintenance, TransactionScope,
};
pub use cleanup_service::CleanupService;
