//! Total Economic Value: the larger of component-harvest value and
//! condition-adjusted chassis value.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::listing::{ComponentPriceSnapshot, ConditionTier, Listing};

/// RAM price used when the snapshot does not track the listing's key.
pub const RAM_FALLBACK_PRICE: Decimal = dec!(40.0);

/// SSD price used when the snapshot does not track the listing's key.
pub const SSD_FALLBACK_PRICE: Decimal = dec!(50.0);

/// Chassis base for premium CPUs.
pub const PREMIUM_CHASSIS_BASE: Decimal = dec!(150.0);

/// Chassis base for everything else.
pub const STANDARD_CHASSIS_BASE: Decimal = dec!(100.0);

/// CPU model fragments (lowercase) that mark a premium chassis.
const PREMIUM_CPU_MARKERS: &[&str] = &["i7"];

/// Which signal backed the chassis value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValuationMethod {
    /// A historical new-condition baseline was available.
    Chassis,
    /// No baseline; the estimate rests on component harvest value.
    Component,
}

impl ValuationMethod {
    /// Confidence attached to decisions made with this method.
    pub fn confidence(&self) -> Decimal {
        match self {
            ValuationMethod::Chassis => dec!(1.0),
            ValuationMethod::Component => dec!(0.5),
        }
    }
}

/// Valuation of one listing at one point in time. Recomputed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    /// max(harvest_total, chassis_value).
    pub tev: Decimal,
    /// RAM + SSD contributions plus the chassis base.
    pub harvest_total: Decimal,
    /// Condition-adjusted historical value, or its fallback.
    pub chassis_value: Decimal,
    /// Signal the chassis value came from.
    pub method: ValuationMethod,
}

/// Chassis base constant for a CPU model string.
pub fn chassis_base(cpu_model: &str) -> Decimal {
    let cpu = cpu_model.to_lowercase();
    if PREMIUM_CPU_MARKERS.iter().any(|m| cpu.contains(m)) {
        PREMIUM_CHASSIS_BASE
    } else {
        STANDARD_CHASSIS_BASE
    }
}

/// Sum of harvestable component prices plus the chassis base.
///
/// Non-upgradeable components contribute nothing.
pub fn harvest_total(listing: &Listing, components: &ComponentPriceSnapshot) -> Decimal {
    let hw = &listing.hardware;
    let ram = if hw.ram_upgradeable {
        components.price_or(&hw.ram_key(), RAM_FALLBACK_PRICE)
    } else {
        Decimal::ZERO
    };
    let ssd = if hw.ssd_upgradeable {
        components.price_or(&hw.ssd_key(), SSD_FALLBACK_PRICE)
    } else {
        Decimal::ZERO
    };

    ram + ssd + chassis_base(&hw.cpu_model)
}

/// Compute the TEV of a listing.
///
/// Without a baseline, a New listing is valued at its own price and anything
/// else falls back to the harvest total, so the chassis value is always defined.
pub fn compute_tev(
    listing: &Listing,
    components: &ComponentPriceSnapshot,
    historical_new_baseline: Option<Decimal>,
) -> ValuationResult {
    let harvest_total = harvest_total(listing, components);

    let (chassis_value, method) = match historical_new_baseline {
        Some(baseline) => (
            baseline * listing.condition.markdown(),
            ValuationMethod::Chassis,
        ),
        None if listing.condition == ConditionTier::New => {
            (listing.price, ValuationMethod::Component)
        }
        None => (harvest_total, ValuationMethod::Component),
    };

    ValuationResult {
        tev: harvest_total.max(chassis_value),
        harvest_total,
        chassis_value,
        method,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{
        Capacity, ComponentKey, HardwareSpec, MemorySpec, ProductIdentity, RamType, SsdInterface,
        StorageSpec,
    };
    use time::OffsetDateTime;

    fn listing(condition: ConditionTier, price: Decimal, cpu: &str) -> Listing {
        Listing {
            id: 1,
            product_id: ProductIdentity::from_stored("p1"),
            retailer: "BestBuy.ca".to_string(),
            condition,
            price,
            hardware: HardwareSpec {
                cpu_model: cpu.to_string(),
                ram: MemorySpec {
                    ram_type: RamType::Ddr4,
                    capacity: Capacity::gb(16),
                },
                ssd: StorageSpec {
                    interface: SsdInterface::Nvme,
                    capacity: Capacity::gb(512),
                },
                ram_upgradeable: true,
                ssd_upgradeable: true,
            },
            title: None,
            url: None,
            observed_at: OffsetDateTime::now_utc(),
        }
    }

    fn components() -> ComponentPriceSnapshot {
        ComponentPriceSnapshot::new()
            .with(ComponentKey::ram(RamType::Ddr4, Capacity::gb(16)), dec!(40.0))
            .with(ComponentKey::ssd(SsdInterface::Nvme, Capacity::gb(512)), dec!(50.0))
    }

    #[test]
    fn harvest_total_for_premium_cpu() {
        let l = listing(ConditionTier::New, dec!(800), "Intel Core i7-1185G7");
        assert_eq!(harvest_total(&l, &components()), dec!(240.0));
    }

    #[test]
    fn chassis_base_is_case_insensitive() {
        assert_eq!(chassis_base("I7-8550U"), PREMIUM_CHASSIS_BASE);
        assert_eq!(chassis_base("Ryzen 7 5800U"), STANDARD_CHASSIS_BASE);
        assert_eq!(chassis_base(""), STANDARD_CHASSIS_BASE);
    }

    #[test]
    fn non_upgradeable_components_contribute_nothing() {
        let mut l = listing(ConditionTier::New, dec!(800), "i5-1135G7");
        l.hardware.ram_upgradeable = false;
        assert_eq!(harvest_total(&l, &components()), dec!(150.0));

        l.hardware.ssd_upgradeable = false;
        assert_eq!(harvest_total(&l, &components()), STANDARD_CHASSIS_BASE);
    }

    #[test]
    fn untracked_keys_use_fallbacks() {
        let mut l = listing(ConditionTier::New, dec!(800), "i5");
        l.hardware.ram.ram_type = RamType::Ddr5;
        l.hardware.ssd.capacity = Capacity::tb(2);
        assert_eq!(
            harvest_total(&l, &components()),
            RAM_FALLBACK_PRICE + SSD_FALLBACK_PRICE + STANDARD_CHASSIS_BASE
        );
    }

    #[test]
    fn baseline_is_marked_down_by_condition() {
        let l = listing(ConditionTier::OpenBox, dec!(700), "i7-1185G7");
        let v = compute_tev(&l, &components(), Some(dec!(1000.0)));

        assert_eq!(v.chassis_value, dec!(900.0));
        assert_eq!(v.harvest_total, dec!(240.0));
        assert_eq!(v.tev, dec!(900.0));
        assert_eq!(v.method, ValuationMethod::Chassis);
    }

    #[test]
    fn new_listing_without_baseline_uses_own_price() {
        let l = listing(ConditionTier::New, dec!(812.34), "i7");
        let v = compute_tev(&l, &components(), None);

        assert_eq!(v.chassis_value, dec!(812.34));
        assert_eq!(v.tev, dec!(812.34));
        assert_eq!(v.method, ValuationMethod::Component);
    }

    #[test]
    fn used_listing_without_baseline_floors_at_harvest() {
        for condition in [
            ConditionTier::OpenBox,
            ConditionTier::RefurbishedExcellent,
            ConditionTier::RefurbishedGood,
            ConditionTier::RefurbishedFair,
            ConditionTier::RefurbishedOther,
        ] {
            let l = listing(condition, dec!(300), "i7");
            let v = compute_tev(&l, &components(), None);
            assert_eq!(v.chassis_value, v.harvest_total);
            assert_eq!(v.tev, v.harvest_total);
        }
    }

    #[test]
    fn tev_is_never_below_either_signal() {
        let snapshot = components();
        for baseline in [None, Some(dec!(50)), Some(dec!(240)), Some(dec!(5000))] {
            for condition in [ConditionTier::New, ConditionTier::RefurbishedFair] {
                let l = listing(condition, dec!(450), "i5");
                let v = compute_tev(&l, &snapshot, baseline);
                assert!(v.tev >= v.harvest_total);
                assert!(v.tev >= v.chassis_value);
            }
        }
    }

    #[test]
    fn confidence_follows_method() {
        assert_eq!(ValuationMethod::Chassis.confidence(), dec!(1.0));
        assert_eq!(ValuationMethod::Component.confidence(), dec!(0.5));
        assert_eq!(ValuationMethod::Chassis.to_string(), "chassis");
    }
}
