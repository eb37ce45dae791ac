//! Persistence module for listings, decisions and run logs.
//!
//! This module handles:
//! - Write contracts for the decision log and the run log
//! - A listing source for evaluation passes
//! - SQLite and in-memory backends

pub mod memory;
pub mod sqlite;

use crate::decision::{Decision, RunReport};
use crate::error::StoreError;
use crate::listing::RawListing;

pub use memory::MemoryStore;
pub use sqlite::{format_timestamp, parse_timestamp, ProductRecord, SqliteHistory, SqliteStore};

/// Provides the listings to evaluate.
pub trait ListingSource {
    /// Current listings, newest first.
    fn fetch_listings(&self) -> Result<Vec<RawListing>, StoreError>;
}

/// Append-only decision log.
pub trait DecisionSink {
    /// Append a batch of decisions. All or nothing.
    fn append(&mut self, decisions: &[Decision]) -> Result<(), StoreError>;
}

/// Run log with one entry per evaluation pass.
pub trait RunLog {
    /// Record a pass outcome.
    fn record_run(&mut self, report: &RunReport) -> Result<(), StoreError>;
}
