//! Opportunity detection for both strategies.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::calculator::{
    compute_triangulated_margin, discount_ratio, inventory_margin, target_price_strategy,
    MarginResult,
};
use super::grouper::ProductGroup;
use crate::config::Thresholds;
use crate::decision::{accepts, Strategy};
use crate::listing::{Listing, ProductIdentity};
use crate::valuation::ValuationResult;

/// A directed (source -> target) retailer pair for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DropshipOpportunity {
    /// Product shared by both sides.
    pub product_id: ProductIdentity,
    /// Retailer bought from.
    pub source_retailer: String,
    /// Retailer resold on.
    pub target_retailer: String,
    /// Listing carrying the buy price.
    pub source_listing_id: i64,
    /// Highest price among source-retailer listings.
    pub buy_price: Decimal,
    /// Lowest price among target-retailer listings.
    pub target_price: Decimal,
    /// 95% of the target price.
    pub projected_sell_price: Decimal,
    /// Recent average if known, else the target price.
    pub market_ref_price: Decimal,
    /// Triangulated margin of the pair.
    pub margin: MarginResult,
    /// Cross-retailer spread of the product.
    pub spread_pct: Decimal,
    /// Cheapest target for this source (earliest retailer on ties).
    pub best_target: bool,
    /// Margin clears the dropship floor and the sell price is realistic.
    pub qualifies: bool,
}

/// One listing evaluated as an inventory acquisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryOpportunity {
    /// Listing reference.
    pub listing_id: i64,
    /// Product identity.
    pub product_id: ProductIdentity,
    /// Retailer.
    pub retailer: String,
    /// Asking price.
    pub price: Decimal,
    /// Valuation behind the margin.
    pub valuation: ValuationResult,
    /// TEV - price.
    pub margin: Decimal,
    /// margin / price * 100.
    pub margin_pct: Decimal,
    /// Price sits at least the outlier discount below the recent average.
    pub outlier: bool,
    /// Margin clears the inventory floor.
    pub qualifies: bool,
}

/// Evaluate every ordered retailer pair of a group for dropshipping.
///
/// The buy side takes the highest source price (availability is only
/// guaranteed at the top of the visible range) and the sell side undercuts
/// the cheapest target listing.
#[instrument(skip(group, thresholds), fields(product = %group.product_id))]
pub fn evaluate_dropship_pairs(
    group: &ProductGroup<'_>,
    recent_average: Option<Decimal>,
    thresholds: &Thresholds,
) -> Vec<DropshipOpportunity> {
    let mut opportunities = Vec::new();
    let spread_pct = group.spread_pct();

    for (source, target) in group.retailer_pairs() {
        let (Some(buy), Some(cheapest)) = (group.max_priced_at(source), group.min_priced_at(target))
        else {
            continue;
        };

        let target_price = cheapest.price;
        let projected_sell_price = target_price_strategy(target_price);
        let market_ref_price = recent_average.unwrap_or(target_price);
        let margin = compute_triangulated_margin(
            buy.price,
            projected_sell_price,
            market_ref_price,
            thresholds.shipping_estimate,
        );
        let qualifies = accepts(Strategy::Dropship, &margin, thresholds);

        if qualifies {
            info!(
                source,
                target,
                buy_price = %buy.price,
                sell_price = %projected_sell_price,
                margin_pct = %margin.margin_pct.round_dp(2),
                "Dropship opportunity detected"
            );
        } else {
            debug!(
                source,
                target,
                margin_pct = %margin.margin_pct.round_dp(2),
                unrealistic = margin.is_unrealistic,
                "Dropship pair below threshold"
            );
        }

        opportunities.push(DropshipOpportunity {
            product_id: group.product_id.clone(),
            source_retailer: source.to_string(),
            target_retailer: target.to_string(),
            source_listing_id: buy.id,
            buy_price: buy.price,
            target_price,
            projected_sell_price,
            market_ref_price,
            margin,
            spread_pct,
            best_target: false,
            qualifies,
        });
    }

    let best: Vec<bool> = opportunities
        .iter()
        .map(|o| {
            best_target(&opportunities, &o.product_id, &o.source_retailer)
                .is_some_and(|b| b.target_retailer == o.target_retailer)
        })
        .collect();
    for (opportunity, is_best) in opportunities.iter_mut().zip(best) {
        opportunity.best_target = is_best;
    }

    opportunities
}

/// Evaluate one listing as an inventory acquisition against its TEV.
pub fn evaluate_inventory(
    listing: &Listing,
    valuation: &ValuationResult,
    recent_average: Option<Decimal>,
    thresholds: &Thresholds,
) -> InventoryOpportunity {
    let (margin, margin_pct) = inventory_margin(valuation.tev, listing.price);
    let outlier = recent_average
        .and_then(|avg| discount_ratio(listing.price, avg))
        .is_some_and(|discount| discount >= thresholds.outlier_discount);
    let result = MarginResult {
        net_profit: margin,
        margin_pct,
        is_unrealistic: false,
    };
    let qualifies = accepts(Strategy::Inventory, &result, thresholds);

    if qualifies || outlier {
        info!(
            listing_id = listing.id,
            price = %listing.price,
            tev = %valuation.tev,
            margin_pct = %margin_pct.round_dp(2),
            outlier,
            "Inventory opportunity detected"
        );
    }

    InventoryOpportunity {
        listing_id: listing.id,
        product_id: listing.product_id.clone(),
        retailer: listing.retailer.clone(),
        price: listing.price,
        valuation: *valuation,
        margin,
        margin_pct,
        outlier,
        qualifies,
    }
}

/// Best target for a source retailer: lowest target price, earliest on ties.
pub fn best_target<'o>(
    opportunities: &'o [DropshipOpportunity],
    product: &ProductIdentity,
    source_retailer: &str,
) -> Option<&'o DropshipOpportunity> {
    opportunities
        .iter()
        .filter(|o| &o.product_id == product && o.source_retailer == source_retailer)
        .fold(None, |best: Option<&'o DropshipOpportunity>, o| match best {
            Some(b) if b.target_price <= o.target_price => Some(b),
            _ => Some(o),
        })
}

/// Qualifying dropship pairs, highest margin first (stable on ties), at most `n`.
pub fn top_dropship(opportunities: &[DropshipOpportunity], n: usize) -> Vec<&DropshipOpportunity> {
    let mut ranked: Vec<_> = opportunities.iter().filter(|o| o.qualifies).collect();
    ranked.sort_by(|a, b| b.margin.margin_pct.cmp(&a.margin.margin_pct));
    ranked.truncate(n);
    ranked
}

/// Qualifying inventory listings, highest margin first (stable on ties), at most `n`.
pub fn top_inventory(opportunities: &[InventoryOpportunity], n: usize) -> Vec<&InventoryOpportunity> {
    let mut ranked: Vec<_> = opportunities.iter().filter(|o| o.qualifies).collect();
    ranked.sort_by(|a, b| b.margin_pct.cmp(&a.margin_pct));
    ranked.truncate(n);
    ranked
}
