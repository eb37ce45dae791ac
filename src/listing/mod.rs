//! Listing module for observed retail offers.
//!
//! This module handles:
//! - Raw listing ingestion and validation
//! - Condition tiers and their markdown multipliers
//! - Product identity derivation
//! - Typed component keys and the component price snapshot

pub mod component;
pub mod identity;
pub mod types;

pub use component::{Capacity, ComponentKey, ComponentKind, ComponentPriceSnapshot, RamType, SsdInterface};
pub use identity::ProductIdentity;
pub use types::{
    is_valid_price, ConditionTier, HardwareSpec, Listing, MemorySpec, RawListing, StorageSpec,
    MAX_PRICE, MIN_PRICE,
};
