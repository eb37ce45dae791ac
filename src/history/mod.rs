//! Historical price module.
//!
//! This module handles:
//! - Read contracts for the component index and the historical oracle
//! - An in-memory oracle over price history points
//! - Mock collaborators for testing

pub mod mock;
pub mod oracle;

pub use mock::{MockConfig, MockOracle};
pub use oracle::{
    average, window_cutoff, ComponentIndex, InMemoryHistory, PriceHistoryPoint, PriceOracle,
    NEW_BASELINE_WINDOW_DAYS, RECENT_AVERAGE_WINDOW_DAYS,
};
