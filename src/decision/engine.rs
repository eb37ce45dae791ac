//! Batch evaluation pass: listings in, decisions and a run report out.
//!
//! Per-listing input errors are isolated and counted. An unreachable
//! component index or oracle aborts the whole pass with zero items processed.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::classifier::{Decision, Strategy};
use crate::arbitrage::{
    evaluate_dropship_pairs, evaluate_inventory, group_by_product, DropshipOpportunity,
    InventoryOpportunity, ProductSpread,
};
use crate::config::Thresholds;
use crate::error::{OracleError, StoreError};
use crate::history::{ComponentIndex, PriceOracle};
use crate::listing::{is_valid_price, Listing, ProductIdentity, RawListing};
use crate::metrics;
use crate::store::{DecisionSink, ListingSource, RunLog};
use crate::valuation::{compute_tev, ValuationMethod};

/// Name the engine records in the run log.
pub const ENGINE_NAME: &str = "decision_engine";

/// Outcome of a run as a whole.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    /// Pass completed (possibly with skipped listings).
    Success,
    /// Pass aborted.
    Failure,
}

/// A listing left out of the pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedListing {
    /// Listing reference.
    pub listing_id: i64,
    /// Why it was skipped.
    pub reason: String,
}

/// Run-log entry for one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Engine name.
    pub engine: String,
    /// Success or failure.
    pub status: RunStatus,
    /// Listings evaluated.
    pub items_processed: usize,
    /// Listings skipped for invalid input.
    pub items_skipped: usize,
    /// Accepted inventory decisions.
    pub inventory_accepted: usize,
    /// Accepted dropship decisions.
    pub dropship_accepted: usize,
    /// Component snapshot rows dropped for a malformed key or price.
    #[serde(default)]
    pub rejected_component_keys: usize,
    /// Why the run failed, or a note for an empty run.
    pub message: Option<String>,
    /// Pass start.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Pass end.
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
}

impl RunReport {
    /// Report for a pass that aborted before evaluating anything.
    pub fn failure(run_id: Uuid, started_at: OffsetDateTime, message: impl Into<String>) -> Self {
        Self {
            run_id,
            engine: ENGINE_NAME.to_string(),
            status: RunStatus::Failure,
            items_processed: 0,
            items_skipped: 0,
            inventory_accepted: 0,
            dropship_accepted: 0,
            rejected_component_keys: 0,
            message: Some(message.into()),
            started_at,
            finished_at: OffsetDateTime::now_utc(),
        }
    }

    /// Whether the run completed.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

/// Everything one pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Run-log entry.
    pub report: RunReport,
    /// Decisions to append, in evaluation order.
    pub decisions: Vec<Decision>,
    /// Inventory evaluations, one per valid listing.
    pub inventory: Vec<InventoryOpportunity>,
    /// Dropship evaluations, one per retailer pair.
    pub dropship: Vec<DropshipOpportunity>,
    /// Price spread per product sold by two or more retailers.
    pub spreads: Vec<ProductSpread>,
    /// Listings skipped for invalid input.
    pub skipped: Vec<SkippedListing>,
}

impl RunOutcome {
    fn empty(report: RunReport) -> Self {
        Self {
            report,
            decisions: Vec::new(),
            inventory: Vec::new(),
            dropship: Vec::new(),
            spreads: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Historical signals for one product, fetched once per pass.
#[derive(Debug, Clone, Copy, Default)]
struct HistorySignals {
    new_baseline: Option<Decimal>,
    recent_average: Option<Decimal>,
}

impl HistorySignals {
    fn method(&self) -> ValuationMethod {
        if self.new_baseline.is_some() {
            ValuationMethod::Chassis
        } else {
            ValuationMethod::Component
        }
    }
}

/// Evaluates listings against the component index and historical oracle.
pub struct DecisionEngine<'a> {
    components: &'a dyn ComponentIndex,
    oracle: &'a dyn PriceOracle,
    thresholds: Thresholds,
}

impl<'a> DecisionEngine<'a> {
    /// Create an engine over the given collaborators.
    pub fn new(
        components: &'a dyn ComponentIndex,
        oracle: &'a dyn PriceOracle,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            components,
            oracle,
            thresholds,
        }
    }

    /// Thresholds in effect.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Run one pass. Never panics on bad input; failures land in the report.
    #[instrument(skip(self, raw), fields(run_id = %run_id, listings = raw.len()))]
    pub fn run(&self, raw: Vec<RawListing>, run_id: Uuid, as_of: OffsetDateTime) -> RunOutcome {
        let _timer = metrics::timer_run();

        if raw.is_empty() {
            info!("No listings found to evaluate");
            metrics::inc_runs(RunStatus::Success);
            return RunOutcome::empty(RunReport {
                run_id,
                engine: ENGINE_NAME.to_string(),
                status: RunStatus::Success,
                items_processed: 0,
                items_skipped: 0,
                inventory_accepted: 0,
                dropship_accepted: 0,
                rejected_component_keys: 0,
                message: Some("No listings found".to_string()),
                started_at: as_of,
                finished_at: OffsetDateTime::now_utc(),
            });
        }

        match self.evaluate(raw, run_id, as_of) {
            Ok(outcome) => {
                info!(
                    processed = outcome.report.items_processed,
                    skipped = outcome.report.items_skipped,
                    inventory_accepted = outcome.report.inventory_accepted,
                    dropship_accepted = outcome.report.dropship_accepted,
                    "Decision engine pass completed"
                );
                metrics::inc_runs(RunStatus::Success);
                outcome
            }
            Err(e) => {
                error!(error = %e, "Decision engine pass aborted");
                metrics::inc_runs(RunStatus::Failure);
                RunOutcome::empty(RunReport::failure(run_id, as_of, e.to_string()))
            }
        }
    }

    fn evaluate(
        &self,
        raw: Vec<RawListing>,
        run_id: Uuid,
        as_of: OffsetDateTime,
    ) -> Result<RunOutcome, OracleError> {
        let components = self.components.latest_snapshot()?;
        if components.is_empty() {
            warn!("Component snapshot is empty; harvest values use fallback prices");
        }
        let rejected_component_keys = components.rejected_keys().len();
        if rejected_component_keys > 0 {
            warn!(
                rejected = rejected_component_keys,
                keys = ?components.rejected_keys(),
                "Component snapshot rows dropped"
            );
        }

        let mut skipped = Vec::new();
        let mut listings = Vec::with_capacity(raw.len());
        for r in raw {
            match Listing::try_from(r) {
                Ok(listing) => listings.push(listing),
                Err(e) => {
                    warn!(listing_id = e.listing_id(), error = %e, "Skipping listing");
                    metrics::inc_listings_skipped();
                    skipped.push(SkippedListing {
                        listing_id: e.listing_id(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut signals: HashMap<ProductIdentity, HistorySignals> = HashMap::new();
        for listing in &listings {
            if !signals.contains_key(&listing.product_id) {
                let fetched = self.fetch_signals(&listing.product_id)?;
                signals.insert(listing.product_id.clone(), fetched);
            }
        }

        let mut decisions = Vec::new();
        let mut inventory = Vec::with_capacity(listings.len());
        for listing in &listings {
            let s = signals.get(&listing.product_id).copied().unwrap_or_default();
            let valuation = compute_tev(listing, &components, s.new_baseline);
            let opportunity =
                evaluate_inventory(listing, &valuation, s.recent_average, &self.thresholds);
            decisions.push(Decision::for_inventory(run_id, &opportunity, &self.thresholds, as_of));
            inventory.push(opportunity);
            metrics::inc_listings_evaluated();
        }

        let mut dropship = Vec::new();
        let mut spreads = Vec::new();
        for group in group_by_product(&listings) {
            let s = signals.get(&group.product_id).copied().unwrap_or_default();
            for opportunity in evaluate_dropship_pairs(&group, s.recent_average, &self.thresholds) {
                decisions.push(Decision::for_dropship(
                    run_id,
                    &opportunity,
                    s.method(),
                    &self.thresholds,
                    as_of,
                ));
                dropship.push(opportunity);
            }
            spreads.extend(group.spread());
        }

        let inventory_accepted = count_accepted(&decisions, Strategy::Inventory);
        let dropship_accepted = count_accepted(&decisions, Strategy::Dropship);
        metrics::inc_decisions_accepted(Strategy::Inventory, inventory_accepted);
        metrics::inc_decisions_accepted(Strategy::Dropship, dropship_accepted);

        Ok(RunOutcome {
            report: RunReport {
                run_id,
                engine: ENGINE_NAME.to_string(),
                status: RunStatus::Success,
                items_processed: listings.len(),
                items_skipped: skipped.len(),
                inventory_accepted,
                dropship_accepted,
                rejected_component_keys,
                message: None,
                started_at: as_of,
                finished_at: OffsetDateTime::now_utc(),
            },
            decisions,
            inventory,
            dropship,
            spreads,
            skipped,
        })
    }

    fn fetch_signals(&self, product: &ProductIdentity) -> Result<HistorySignals, OracleError> {
        let new_baseline = self
            .oracle
            .new_baseline(product, self.thresholds.baseline_window_days)?;
        let recent_average = self
            .oracle
            .recent_average(product, self.thresholds.recent_window_days)?;
        Ok(HistorySignals {
            new_baseline: usable_signal(product, "new_baseline", new_baseline),
            recent_average: usable_signal(product, "recent_average", recent_average),
        })
    }
}

/// Out-of-range oracle values are treated as unknown.
fn usable_signal(
    product: &ProductIdentity,
    signal: &'static str,
    value: Option<Decimal>,
) -> Option<Decimal> {
    match value {
        Some(v) if !is_valid_price(v) => {
            warn!(product = %product, signal, value = %v, "Ignoring out-of-range price signal");
            None
        }
        other => other,
    }
}

fn count_accepted(decisions: &[Decision], strategy: Strategy) -> usize {
    decisions
        .iter()
        .filter(|d| d.strategy == strategy && d.is_accepted())
        .count()
}

/// Fetch the listings for a pass. If the source fails, a failure entry is
/// written to the run log before the error is returned.
pub fn fetch_for_run<S>(
    store: &mut S,
    run_id: Uuid,
    started_at: OffsetDateTime,
) -> Result<Vec<RawListing>, StoreError>
where
    S: ListingSource + RunLog + ?Sized,
{
    match store.fetch_listings() {
        Ok(raw) => Ok(raw),
        Err(e) => {
            error!(%run_id, error = %e, "Failed to fetch listings");
            metrics::inc_runs(RunStatus::Failure);
            let report = RunReport::failure(run_id, started_at, format!("listing fetch failed: {e}"));
            store.record_run(&report)?;
            Err(e)
        }
    }
}

/// Append the pass's decisions and its run-log entry.
///
/// A failed run appends no decisions. If the append itself fails, a failure
/// entry is still written to the run log before the error is returned.
pub fn persist_outcome<S>(outcome: &RunOutcome, store: &mut S) -> Result<(), StoreError>
where
    S: DecisionSink + RunLog + ?Sized,
{
    if outcome.report.is_success() && !outcome.decisions.is_empty() {
        if let Err(e) = store.append(&outcome.decisions) {
            error!(error = %e, "Failed to append decisions");
            let failed = RunReport {
                status: RunStatus::Failure,
                items_processed: 0,
                message: Some(format!("decision append failed: {e}")),
                ..outcome.report.clone()
            };
            store.record_run(&failed)?;
            return Err(e);
        }
    }

    store.record_run(&outcome.report)
}
