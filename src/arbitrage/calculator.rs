//! Profit and margin calculations for resale opportunities.
//!
//! Prices reaching these functions are bounded to `MIN_PRICE..=MAX_PRICE` at
//! ingestion, which keeps every product and quotient here in `Decimal` range.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default shipping estimate per resale.
pub const DEFAULT_SHIPPING_ESTIMATE: Decimal = dec!(25.0);

/// Share of the sell price kept after marketplace take-rate and payment fees.
pub const SELL_SIDE_RETENTION: Decimal = dec!(0.85);

/// A sell price above `market_ref * UNREALISTIC_MARKUP` is not achievable.
pub const UNREALISTIC_MARKUP: Decimal = dec!(1.3);

/// Projected resale price as a fraction of the cheapest competing listing.
pub const TARGET_PRICE_UNDERCUT: Decimal = dec!(0.95);

/// Outcome of one buy/sell/reference triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginResult {
    /// sell * 0.85 - buy - shipping.
    pub net_profit: Decimal,
    /// net_profit / buy * 100, or 0 when buy <= 0.
    pub margin_pct: Decimal,
    /// Sell price exceeds 130% of the market reference.
    pub is_unrealistic: bool,
}

/// Triangulated margin: sell-side deductions, shipping, and a sanity check of
/// the sell price against an independent market reference.
pub fn compute_triangulated_margin(
    buy_price: Decimal,
    sell_price: Decimal,
    market_ref_price: Decimal,
    shipping_estimate: Decimal,
) -> MarginResult {
    let is_unrealistic = sell_price > market_ref_price * UNREALISTIC_MARKUP;
    let net_profit = sell_price * SELL_SIDE_RETENTION - buy_price - shipping_estimate;

    MarginResult {
        net_profit,
        margin_pct: percent_of(net_profit, buy_price),
        is_unrealistic,
    }
}

/// Target price strategy: undercut the cheapest competing listing by 5%.
pub fn target_price_strategy(target_price: Decimal) -> Decimal {
    target_price * TARGET_PRICE_UNDERCUT
}

/// Inventory margin: TEV against the asking price, as (margin, margin_pct).
pub fn inventory_margin(tev: Decimal, listing_price: Decimal) -> (Decimal, Decimal) {
    let margin = tev - listing_price;
    (margin, percent_of(margin, listing_price))
}

/// Spread between the lowest and highest price, relative to the lowest.
pub fn spread_pct(min_price: Decimal, max_price: Decimal) -> Decimal {
    percent_of(max_price - min_price, min_price)
}

/// Discount of `price` relative to `reference` as a ratio (0.20 = 20% below).
pub fn discount_ratio(price: Decimal, reference: Decimal) -> Option<Decimal> {
    if reference > Decimal::ZERO {
        Some((reference - price) / reference)
    } else {
        None
    }
}

fn percent_of(amount: Decimal, base: Decimal) -> Decimal {
    if base > Decimal::ZERO {
        amount / base * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}
