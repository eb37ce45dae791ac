//! Read contracts for the component index and the historical price oracle.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::warn;

use crate::error::OracleError;
use crate::listing::{is_valid_price, ComponentPriceSnapshot, ConditionTier, ProductIdentity};

/// Default window for the new-condition baseline.
pub const NEW_BASELINE_WINDOW_DAYS: u32 = 60;

/// Default window for the any-condition recent average.
pub const RECENT_AVERAGE_WINDOW_DAYS: u32 = 30;

/// Source of the latest component price snapshot.
pub trait ComponentIndex {
    /// Latest snapshot. An error means the index is unreachable for the run.
    fn latest_snapshot(&self) -> Result<ComponentPriceSnapshot, OracleError>;
}

/// Historical price queries per product identity.
///
/// `Ok(None)` is the explicit "unknown" signal for an empty window; it is
/// never reported as zero.
pub trait PriceOracle {
    /// Average of New-condition observations within the window.
    fn new_baseline(
        &self,
        product: &ProductIdentity,
        window_days: u32,
    ) -> Result<Option<Decimal>, OracleError>;

    /// Average of all observations within the window, any condition.
    fn recent_average(
        &self,
        product: &ProductIdentity,
        window_days: u32,
    ) -> Result<Option<Decimal>, OracleError>;
}

/// One append-only historical observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryPoint {
    /// Product identity.
    pub product_id: ProductIdentity,
    /// Observed price.
    pub price: Decimal,
    /// Condition of the observed offer.
    pub condition: ConditionTier,
    /// Observation time.
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// Start of a window: observations must be strictly newer than this.
pub fn window_cutoff(as_of: OffsetDateTime, window_days: u32) -> OffsetDateTime {
    as_of - Duration::days(i64::from(window_days))
}

/// Arithmetic mean, `None` for an empty input.
pub fn average<I>(prices: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let (sum, count) = prices
        .into_iter()
        .fold((Decimal::ZERO, 0u32), |(sum, n), p| (sum + p, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / Decimal::from(count))
    }
}

/// Oracle over an in-memory price history, evaluated as of a fixed instant.
#[derive(Debug, Clone)]
pub struct InMemoryHistory {
    points: Vec<PriceHistoryPoint>,
    as_of: OffsetDateTime,
}

impl InMemoryHistory {
    /// Create an oracle evaluated at `as_of`. Points priced outside the
    /// evaluable range are dropped.
    pub fn new(points: Vec<PriceHistoryPoint>, as_of: OffsetDateTime) -> Self {
        let points = points
            .into_iter()
            .filter(|p| {
                let keep = is_valid_price(p.price);
                if !keep {
                    warn!(product = %p.product_id, price = %p.price, "Dropping out-of-range history point");
                }
                keep
            })
            .collect();
        Self { points, as_of }
    }

    /// Number of stored observations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no observations are stored.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn window<'a>(
        &'a self,
        product: &'a ProductIdentity,
        window_days: u32,
    ) -> impl Iterator<Item = &'a PriceHistoryPoint> + 'a {
        let cutoff = window_cutoff(self.as_of, window_days);
        let as_of = self.as_of;
        self.points.iter().filter(move |p| {
            &p.product_id == product && p.recorded_at > cutoff && p.recorded_at <= as_of
        })
    }
}

impl PriceOracle for InMemoryHistory {
    fn new_baseline(
        &self,
        product: &ProductIdentity,
        window_days: u32,
    ) -> Result<Option<Decimal>, OracleError> {
        Ok(average(
            self.window(product, window_days)
                .filter(|p| p.condition == ConditionTier::New)
                .map(|p| p.price),
        ))
    }

    fn recent_average(
        &self,
        product: &ProductIdentity,
        window_days: u32,
    ) -> Result<Option<Decimal>, OracleError> {
        Ok(average(self.window(product, window_days).map(|p| p.price)))
    }
}

impl ComponentIndex for ComponentPriceSnapshot {
    fn latest_snapshot(&self) -> Result<ComponentPriceSnapshot, OracleError> {
        Ok(self.clone())
    }
}
