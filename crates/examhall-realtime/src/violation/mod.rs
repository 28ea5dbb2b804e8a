//! Violation ingestion, deduplication, and attempt budgets.

pub mod record;
pub mod tracker;

pub use record::{Severity, ViolationRecord, ViolationReport};
pub use tracker::{Ingest, ViolationTracker};
