//! Valuation module: Total Economic Value per listing.

pub mod tev;

pub use tev::{
    chassis_base, compute_tev, harvest_total, ValuationMethod, ValuationResult,
    RAM_FALLBACK_PRICE, SSD_FALLBACK_PRICE,
};
