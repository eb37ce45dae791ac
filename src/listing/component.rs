//! Typed component keys and the component price snapshot.
//!
//! Keys render and parse as `RAM_DDR4_16GB` / `SSD_NVMe_512GB`, the form the
//! component scraper writes into the daily average table.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use super::types::is_valid_price;
use crate::error::ComponentKeyError;

static CAPACITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+)\s*(GB|TB)\s*$").expect("static regex"));

/// Memory technology of a RAM module.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum RamType {
    /// DDR3 SODIMM.
    #[strum(to_string = "DDR3")]
    Ddr3,
    /// DDR4 SODIMM.
    #[strum(to_string = "DDR4")]
    Ddr4,
    /// DDR5 SODIMM.
    #[strum(to_string = "DDR5")]
    Ddr5,
    /// LPDDR4.
    #[strum(to_string = "LPDDR4")]
    Lpddr4,
    /// LPDDR4X.
    #[strum(to_string = "LPDDR4X")]
    Lpddr4x,
    /// LPDDR5.
    #[strum(to_string = "LPDDR5")]
    Lpddr5,
    /// LPDDR5X.
    #[strum(to_string = "LPDDR5X")]
    Lpddr5x,
    /// Apple unified memory.
    #[strum(to_string = "Unified")]
    Unified,
}

impl Default for RamType {
    fn default() -> Self {
        RamType::Ddr4
    }
}

/// Storage interface of an SSD.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum SsdInterface {
    /// M.2 NVMe.
    #[strum(to_string = "NVMe", serialize = "M.2", serialize = "PCIe")]
    Nvme,
    /// 2.5" or M.2 SATA.
    #[strum(to_string = "SATA")]
    Sata,
}

impl Default for SsdInterface {
    fn default() -> Self {
        SsdInterface::Nvme
    }
}

/// Capacity in gigabytes. `1TB` is stored as 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capacity {
    gb: u32,
}

impl Capacity {
    /// Capacity of `gb` gigabytes.
    pub const fn gb(gb: u32) -> Self {
        Self { gb }
    }

    /// Capacity of `tb` terabytes.
    pub const fn tb(tb: u32) -> Self {
        Self { gb: tb * 1024 }
    }

    /// Size in gigabytes.
    pub fn as_gb(&self) -> u32 {
        self.gb
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.gb >= 1024 && self.gb % 1024 == 0 {
            write!(f, "{}TB", self.gb / 1024)
        } else {
            write!(f, "{}GB", self.gb)
        }
    }
}

impl FromStr for Capacity {
    type Err = ComponentKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = CAPACITY_RE
            .captures(s)
            .ok_or_else(|| ComponentKeyError::Capacity(s.to_string()))?;
        let amount: u32 = caps[1]
            .parse()
            .map_err(|_| ComponentKeyError::Capacity(s.to_string()))?;
        if amount == 0 {
            return Err(ComponentKeyError::Capacity(s.to_string()));
        }

        if caps[2].eq_ignore_ascii_case("TB") {
            amount
                .checked_mul(1024)
                .map(Capacity::gb)
                .ok_or_else(|| ComponentKeyError::Capacity(s.to_string()))
        } else {
            Ok(Capacity::gb(amount))
        }
    }
}

/// Harvestable component family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Memory module.
    Ram(RamType),
    /// Solid-state drive.
    Ssd(SsdInterface),
}

/// Typed key into the component price snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentKey {
    /// Component family and subtype.
    pub kind: ComponentKind,
    /// Module or drive capacity.
    pub capacity: Capacity,
}

impl ComponentKey {
    /// RAM key, e.g. `RAM_DDR4_16GB`.
    pub fn ram(ram_type: RamType, capacity: Capacity) -> Self {
        Self {
            kind: ComponentKind::Ram(ram_type),
            capacity,
        }
    }

    /// SSD key, e.g. `SSD_NVMe_512GB`.
    pub fn ssd(interface: SsdInterface, capacity: Capacity) -> Self {
        Self {
            kind: ComponentKind::Ssd(interface),
            capacity,
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ComponentKind::Ram(t) => write!(f, "RAM_{}_{}", t, self.capacity),
            ComponentKind::Ssd(i) => write!(f, "SSD_{}_{}", i, self.capacity),
        }
    }
}

impl FromStr for ComponentKey {
    type Err = ComponentKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '_');
        let (kind, subtype, capacity) = match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(t), Some(c)) if !k.is_empty() && !t.is_empty() => (k, t, c),
            _ => return Err(ComponentKeyError::Malformed(s.to_string())),
        };

        let capacity: Capacity = capacity.parse()?;
        let kind = if kind.eq_ignore_ascii_case("RAM") {
            ComponentKind::Ram(parse_ram_type(subtype)?)
        } else if kind.eq_ignore_ascii_case("SSD") {
            ComponentKind::Ssd(parse_ssd_interface(subtype)?)
        } else {
            return Err(ComponentKeyError::UnknownKind(kind.to_string()));
        };

        Ok(Self { kind, capacity })
    }
}

/// Parse a free-form RAM type label ("DDR4", "lpddr5x", " DDR5 ").
pub fn parse_ram_type(s: &str) -> Result<RamType, ComponentKeyError> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    RamType::from_str(&compact).map_err(|_| ComponentKeyError::UnknownSubtype(s.to_string()))
}

/// Parse a free-form SSD interface label ("NVMe", "sata").
pub fn parse_ssd_interface(s: &str) -> Result<SsdInterface, ComponentKeyError> {
    SsdInterface::from_str(s.trim())
        .map_err(|_| ComponentKeyError::UnknownSubtype(s.to_string()))
}

/// Latest observed average price per component key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentPriceSnapshot {
    prices: HashMap<ComponentKey, Decimal>,
    rejected_keys: Vec<String>,
}

impl ComponentPriceSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from raw `(key, price)` rows.
    ///
    /// Malformed keys and non-positive prices are dropped and remembered in
    /// [`rejected_keys`](Self::rejected_keys).
    pub fn from_raw<I, K>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: AsRef<str>,
    {
        let mut snapshot = Self::new();
        for (raw_key, price) in rows {
            let raw_key = raw_key.as_ref();
            match raw_key.parse::<ComponentKey>() {
                Ok(key) if is_valid_price(price) => {
                    snapshot.prices.insert(key, price);
                }
                Ok(_) => {
                    warn!(key = raw_key, price = %price, "Dropping out-of-range component price");
                    snapshot.rejected_keys.push(raw_key.to_string());
                }
                Err(e) => {
                    warn!(key = raw_key, error = %e, "Dropping malformed component key");
                    snapshot.rejected_keys.push(raw_key.to_string());
                }
            }
        }
        snapshot
    }

    /// Set the price for a key.
    pub fn insert(&mut self, key: ComponentKey, price: Decimal) {
        self.prices.insert(key, price);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: ComponentKey, price: Decimal) -> Self {
        self.insert(key, price);
        self
    }

    /// Price for a key, if tracked.
    pub fn get(&self, key: &ComponentKey) -> Option<Decimal> {
        self.prices.get(key).copied()
    }

    /// Price for a key, or `fallback` when untracked.
    pub fn price_or(&self, key: &ComponentKey, fallback: Decimal) -> Decimal {
        self.get(key).unwrap_or(fallback)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Raw keys dropped while building the snapshot.
    pub fn rejected_keys(&self) -> &[String] {
        &self.rejected_keys
    }
}
