//! Decision module for classifying opportunities and running evaluation passes.
//!
//! This module handles:
//! - Acceptance rules and confidence scoring
//! - Append-only decision records
//! - The batch pass and its run report

pub mod classifier;
pub mod engine;

pub use classifier::{accepts, classify, Decision, DecisionStatus, Strategy};
pub use engine::{
    fetch_for_run, persist_outcome, DecisionEngine, RunOutcome, RunReport, RunStatus,
    SkippedListing, ENGINE_NAME,
};
