//! Arbitrage module for detecting cross-retailer and inventory opportunities.
//!
//! This module handles:
//! - Triangulated margin calculations
//! - Grouping listings by product across retailers
//! - Opportunity detection and ranking

pub mod calculator;
pub mod detector;
pub mod grouper;

pub use calculator::{compute_triangulated_margin, MarginResult};
pub use detector::{
    best_target, evaluate_dropship_pairs, evaluate_inventory, top_dropship, top_inventory,
    DropshipOpportunity, InventoryOpportunity,
};
pub use grouper::{
    group_by_product, top_spreads, ProductGroup, ProductSpread, MIN_SPREAD_PCT,
};
