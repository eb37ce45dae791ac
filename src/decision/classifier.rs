//! Acceptance rules, confidence scoring and decision records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::arbitrage::calculator::MarginResult;
use crate::arbitrage::{DropshipOpportunity, InventoryOpportunity};
use crate::config::Thresholds;
use crate::listing::ProductIdentity;
use crate::valuation::ValuationMethod;

/// Decimal places kept on a recorded margin.
const RECORDED_MARGIN_DP: u32 = 2;

/// Arbitrage strategy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Strategy {
    /// Buy low, hold, resell near intrinsic value.
    Inventory,
    /// Buy on one retailer, resell on another.
    Dropship,
}

/// Status of a decision. Listings that fail the thresholds stay `Evaluated`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DecisionStatus {
    /// Evaluated; thresholds not met.
    #[default]
    Evaluated,
    /// Thresholds met and not flagged unrealistic.
    Accepted,
}

/// Whether a margin clears the strategy's acceptance rule.
///
/// Inventory accepts at or above its floor; dropship needs strictly more than
/// its floor. An unrealistic sell price never qualifies.
pub fn accepts(strategy: Strategy, margin: &MarginResult, thresholds: &Thresholds) -> bool {
    if margin.is_unrealistic {
        return false;
    }
    match strategy {
        Strategy::Inventory => margin.margin_pct >= thresholds.inventory_min_margin_pct,
        Strategy::Dropship => margin.margin_pct > thresholds.dropship_min_margin_pct,
    }
}

/// Map an acceptance outcome onto a status.
pub fn classify(strategy: Strategy, margin: &MarginResult, thresholds: &Thresholds) -> DecisionStatus {
    if accepts(strategy, margin, thresholds) {
        DecisionStatus::Accepted
    } else {
        DecisionStatus::Evaluated
    }
}

/// Persisted, append-only decision record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Evaluation run that produced the decision.
    pub run_id: Uuid,
    /// Strategy evaluated.
    pub strategy: Strategy,
    /// Product identity.
    pub product_id: ProductIdentity,
    /// Listing the decision refers to (the buy side for dropship).
    pub listing_id: i64,
    /// Target retailer of a dropship pair.
    pub counterparty: Option<String>,
    /// Valuation method in effect.
    pub valuation_method: ValuationMethod,
    /// Margin percentage, rounded to 2 places.
    pub margin_pct: Decimal,
    /// 1.0 with a historical baseline, 0.5 without.
    pub confidence: Decimal,
    /// Outcome.
    pub status: DecisionStatus,
    /// When the decision was made.
    #[serde(with = "time::serde::rfc3339")]
    pub decided_at: OffsetDateTime,
}

impl Decision {
    /// Decision for an inventory evaluation.
    pub fn for_inventory(
        run_id: Uuid,
        opportunity: &InventoryOpportunity,
        thresholds: &Thresholds,
        decided_at: OffsetDateTime,
    ) -> Self {
        let method = opportunity.valuation.method;
        let margin = MarginResult {
            net_profit: opportunity.margin,
            margin_pct: opportunity.margin_pct,
            is_unrealistic: false,
        };
        Self {
            run_id,
            strategy: Strategy::Inventory,
            product_id: opportunity.product_id.clone(),
            listing_id: opportunity.listing_id,
            counterparty: None,
            valuation_method: method,
            margin_pct: opportunity.margin_pct.round_dp(RECORDED_MARGIN_DP),
            confidence: method.confidence(),
            status: classify(Strategy::Inventory, &margin, thresholds),
            decided_at,
        }
    }

    /// Decision for a dropship pair; the method reflects the product's baseline.
    pub fn for_dropship(
        run_id: Uuid,
        opportunity: &DropshipOpportunity,
        method: ValuationMethod,
        thresholds: &Thresholds,
        decided_at: OffsetDateTime,
    ) -> Self {
        Self {
            run_id,
            strategy: Strategy::Dropship,
            product_id: opportunity.product_id.clone(),
            listing_id: opportunity.source_listing_id,
            counterparty: Some(opportunity.target_retailer.clone()),
            valuation_method: method,
            margin_pct: opportunity.margin.margin_pct.round_dp(RECORDED_MARGIN_DP),
            confidence: method.confidence(),
            status: classify(Strategy::Dropship, &opportunity.margin, thresholds),
            decided_at,
        }
    }

    /// Whether the decision was accepted.
    pub fn is_accepted(&self) -> bool {
        self.status == DecisionStatus::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn margin(pct: Decimal, unrealistic: bool) -> MarginResult {
        MarginResult {
            net_profit: Decimal::ZERO,
            margin_pct: pct,
            is_unrealistic: unrealistic,
        }
    }

    #[test]
    fn inventory_floor_is_inclusive() {
        let t = Thresholds::default();
        assert_eq!(classify(Strategy::Inventory, &margin(dec!(10), false), &t), DecisionStatus::Accepted);
        assert_eq!(classify(Strategy::Inventory, &margin(dec!(9.99), false), &t), DecisionStatus::Evaluated);
    }

    #[test]
    fn dropship_floor_is_strict() {
        let t = Thresholds::default();
        assert_eq!(classify(Strategy::Dropship, &margin(dec!(10), false), &t), DecisionStatus::Evaluated);
        assert_eq!(classify(Strategy::Dropship, &margin(dec!(10.01), false), &t), DecisionStatus::Accepted);
    }

    #[test]
    fn unrealistic_never_accepted() {
        let t = Thresholds::default();
        assert_eq!(classify(Strategy::Dropship, &margin(dec!(80), true), &t), DecisionStatus::Evaluated);
        assert_eq!(classify(Strategy::Inventory, &margin(dec!(80), true), &t), DecisionStatus::Evaluated);
    }

    #[test]
    fn labels_match_storage() {
        assert_eq!(Strategy::Dropship.to_string(), "dropship");
        assert_eq!("Inventory".parse::<Strategy>().unwrap(), Strategy::Inventory);
        assert_eq!(DecisionStatus::Accepted.to_string(), "accepted");
        assert_eq!(DecisionStatus::default(), DecisionStatus::Evaluated);
    }
}
