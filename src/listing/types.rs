//! Listing types: condition tiers, hardware attributes, raw and validated listings.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use time::OffsetDateTime;

use super::component::{
    parse_ram_type, parse_ssd_interface, Capacity, ComponentKey, RamType, SsdInterface,
};
use super::identity::ProductIdentity;
use crate::error::ListingError;

/// Smallest price the engine evaluates.
pub const MIN_PRICE: Decimal = dec!(0.01);

/// Largest price the engine evaluates. Every margin and ratio over prices in
/// `MIN_PRICE..=MAX_PRICE` stays inside `Decimal` range.
pub const MAX_PRICE: Decimal = dec!(100000000);

/// Whether `price` lies in the evaluable range.
pub fn is_valid_price(price: Decimal) -> bool {
    (MIN_PRICE..=MAX_PRICE).contains(&price)
}

/// Condition tier of a listing, each carrying a markdown multiplier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    Default,
)]
#[strum(ascii_case_insensitive)]
pub enum ConditionTier {
    /// Sealed, new.
    #[default]
    #[strum(to_string = "New", serialize = "Brand New")]
    #[serde(rename = "New")]
    New,
    /// Opened but unused.
    #[strum(to_string = "OpenBox", serialize = "Open Box", serialize = "Open-Box")]
    #[serde(rename = "OpenBox", alias = "Open Box")]
    OpenBox,
    /// Refurbished, excellent.
    #[strum(to_string = "Refurbished Excellent", serialize = "RefurbishedExcellent")]
    #[serde(rename = "Refurbished Excellent", alias = "RefurbishedExcellent")]
    RefurbishedExcellent,
    /// Refurbished, good.
    #[strum(to_string = "Refurbished Good", serialize = "RefurbishedGood")]
    #[serde(rename = "Refurbished Good", alias = "RefurbishedGood")]
    RefurbishedGood,
    /// Refurbished, fair.
    #[strum(to_string = "Refurbished Fair", serialize = "RefurbishedFair")]
    #[serde(rename = "Refurbished Fair", alias = "RefurbishedFair")]
    RefurbishedFair,
    /// Refurbished, unspecified grade.
    #[strum(to_string = "Refurbished Other", serialize = "RefurbishedOther", serialize = "Refurbished")]
    #[serde(rename = "Refurbished Other", alias = "RefurbishedOther")]
    RefurbishedOther,
}

impl ConditionTier {
    /// Fraction of new-condition value this tier retains.
    pub fn markdown(&self) -> Decimal {
        match self {
            ConditionTier::New => dec!(1.0),
            ConditionTier::OpenBox => dec!(0.9),
            ConditionTier::RefurbishedExcellent => dec!(0.85),
            ConditionTier::RefurbishedGood => dec!(0.75),
            ConditionTier::RefurbishedFair => dec!(0.6),
            ConditionTier::RefurbishedOther => dec!(0.5),
        }
    }

    /// Parse a stored tier label. Missing labels mean `New`; unrecognised ones
    /// fall into `RefurbishedOther`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            None => ConditionTier::New,
            Some(l) => ConditionTier::from_str(l).unwrap_or(ConditionTier::RefurbishedOther),
        }
    }
}

/// RAM configuration of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySpec {
    /// Memory technology.
    pub ram_type: RamType,
    /// Installed capacity.
    pub capacity: Capacity,
}

impl Default for MemorySpec {
    fn default() -> Self {
        Self {
            ram_type: RamType::Ddr4,
            capacity: Capacity::gb(8),
        }
    }
}

/// SSD configuration of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    /// Drive interface.
    pub interface: SsdInterface,
    /// Drive capacity.
    pub capacity: Capacity,
}

impl Default for StorageSpec {
    fn default() -> Self {
        Self {
            interface: SsdInterface::Nvme,
            capacity: Capacity::gb(256),
        }
    }
}

/// Structured hardware attributes relevant to valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareSpec {
    /// CPU model string as extracted, e.g. "i7-1185G7".
    pub cpu_model: String,
    /// RAM configuration.
    pub ram: MemorySpec,
    /// SSD configuration.
    pub ssd: StorageSpec,
    /// Whether RAM can be removed and resold.
    pub ram_upgradeable: bool,
    /// Whether the SSD can be removed and resold.
    pub ssd_upgradeable: bool,
}

impl HardwareSpec {
    /// Snapshot key for the installed RAM.
    pub fn ram_key(&self) -> ComponentKey {
        ComponentKey::ram(self.ram.ram_type, self.ram.capacity)
    }

    /// Snapshot key for the installed SSD.
    pub fn ssd_key(&self) -> ComponentKey {
        ComponentKey::ssd(self.ssd.interface, self.ssd.capacity)
    }
}

impl Default for HardwareSpec {
    fn default() -> Self {
        Self {
            cpu_model: String::new(),
            ram: MemorySpec::default(),
            ssd: StorageSpec::default(),
            ram_upgradeable: true,
            ssd_upgradeable: true,
        }
    }
}

/// One observed, validated offer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing reference.
    pub id: i64,
    /// Product identity shared across retailers.
    pub product_id: ProductIdentity,
    /// Retailer / source identifier, e.g. "BestBuy.ca".
    pub retailer: String,
    /// Condition tier.
    pub condition: ConditionTier,
    /// Observed price, always > 0.
    pub price: Decimal,
    /// Hardware attributes.
    pub hardware: HardwareSpec,
    /// Listing title.
    pub title: Option<String>,
    /// Source URL.
    pub url: Option<String>,
    /// Observation time.
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

/// Listing as delivered by the acquisition side: a stored listing row joined
/// with its product row. Every field except id and price may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    /// Listing reference.
    pub id: i64,
    /// Stored product hash, if already derived.
    #[serde(default)]
    pub product_hash: Option<String>,
    /// Brand.
    #[serde(default)]
    pub brand: Option<String>,
    /// CPU model.
    #[serde(default)]
    pub cpu_model: Option<String>,
    /// Screen size, e.g. `13.4"`.
    #[serde(default)]
    pub screen_size: Option<String>,
    /// Retailer / source.
    pub source: String,
    /// Condition label.
    #[serde(default)]
    pub condition_tier: Option<String>,
    /// Observed price.
    pub listing_price: Decimal,
    /// RAM capacity label, e.g. "16GB".
    #[serde(default)]
    pub ram_spec_capacity: Option<String>,
    /// RAM type label, e.g. "DDR4".
    #[serde(default)]
    pub ram_spec_type: Option<String>,
    /// SSD capacity label.
    #[serde(default)]
    pub ssd_spec_capacity: Option<String>,
    /// SSD interface label.
    #[serde(default)]
    pub ssd_architecture: Option<String>,
    /// RAM upgradeability; missing means upgradeable.
    #[serde(default)]
    pub is_ram_upgradeable: Option<bool>,
    /// SSD upgradeability; missing means upgradeable.
    #[serde(default)]
    pub is_ssd_upgradeable: Option<bool>,
    /// Listing title.
    #[serde(default)]
    pub listing_title: Option<String>,
    /// Source URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Observation time; missing means "now" at conversion.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scraped_at: Option<OffsetDateTime>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl TryFrom<RawListing> for Listing {
    type Error = ListingError;

    fn try_from(raw: RawListing) -> Result<Self, Self::Error> {
        let listing_id = raw.id;
        if raw.listing_price <= Decimal::ZERO {
            return Err(ListingError::NonPositivePrice {
                listing_id,
                price: raw.listing_price,
            });
        }
        if !is_valid_price(raw.listing_price) {
            return Err(ListingError::PriceOutOfRange {
                listing_id,
                price: raw.listing_price,
            });
        }

        let product_id = match present(&raw.product_hash) {
            Some(hash) => ProductIdentity::from_stored(hash),
            None => match (
                present(&raw.brand),
                present(&raw.cpu_model),
                present(&raw.screen_size),
            ) {
                (Some(brand), Some(cpu), Some(screen)) => {
                    ProductIdentity::derive(brand, cpu, screen)
                }
                _ => return Err(ListingError::MissingIdentity { listing_id }),
            },
        };

        let malformed = |source| ListingError::MalformedComponentSpec { listing_id, source };
        let defaults = HardwareSpec::default();

        let ram = MemorySpec {
            ram_type: present(&raw.ram_spec_type)
                .map(parse_ram_type)
                .transpose()
                .map_err(malformed)?
                .unwrap_or(defaults.ram.ram_type),
            capacity: present(&raw.ram_spec_capacity)
                .map(Capacity::from_str)
                .transpose()
                .map_err(malformed)?
                .unwrap_or(defaults.ram.capacity),
        };

        let ssd = StorageSpec {
            interface: present(&raw.ssd_architecture)
                .map(parse_ssd_interface)
                .transpose()
                .map_err(malformed)?
                .unwrap_or(defaults.ssd.interface),
            capacity: present(&raw.ssd_spec_capacity)
                .map(Capacity::from_str)
                .transpose()
                .map_err(malformed)?
                .unwrap_or(defaults.ssd.capacity),
        };

        Ok(Listing {
            id: listing_id,
            product_id,
            retailer: raw.source.trim().to_string(),
            condition: ConditionTier::from_label(raw.condition_tier.as_deref()),
            price: raw.listing_price,
            hardware: HardwareSpec {
                cpu_model: raw.cpu_model.unwrap_or_default(),
                ram,
                ssd,
                ram_upgradeable: raw.is_ram_upgradeable.unwrap_or(true),
                ssd_upgradeable: raw.is_ssd_upgradeable.unwrap_or(true),
            },
            title: raw.listing_title,
            url: raw.url,
            observed_at: raw.scraped_at.unwrap_or_else(OffsetDateTime::now_utc),
        })
    }
}
