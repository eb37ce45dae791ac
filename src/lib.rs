//! Laptop listing valuation and arbitrage decision engine.
//!
//! Listings of the same laptop from several retailers are valued against
//! their recoverable component value and historical price signals, then
//! classified as inventory buys (hold and resell near intrinsic value) or
//! dropship pairs (buy on one retailer, resell on another).
//!
//! # Strategy
//!
//! A dropship pair qualifies when the triangulated margin beats 10% and the
//! projected sell price is plausible against the market reference:
//!
//! ```text
//! Buy at A:           $300.00
//! Cheapest at B:      $500.00  -> sell at 95%  = $475.00
//! After fees (85%):   $403.75
//! Shipping:           -$25.00
//! ─────────────────────────────
//! Net profit:         $78.75  (26.25% of buy) ✅
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`listing`]: Listings, component keys and product identity
//! - [`history`]: Component index and historical price oracle contracts
//! - [`valuation`]: Total Economic Value
//! - [`arbitrage`]: Margins, grouping and opportunity detection
//! - [`decision`]: Classification, decision records and the batch pass
//! - [`store`]: SQLite and in-memory persistence
//! - [`api`]: HTTP API for health/status/opportunities/metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod config;
pub mod decision;
pub mod error;
pub mod history;
pub mod listing;
pub mod metrics;
pub mod store;
pub mod utils;
pub mod valuation;

pub use config::Config;
pub use error::{EngineError, Result};
