//! Domain entities and retention invariants.

#![forbid(unsafe_code)]

mod outcome;
mod retention;

pub use outcome::TableCleanupOutcome;
pub use retention::{RetentionPolicy, RetentionPolicyInput, TimeThresholds};
