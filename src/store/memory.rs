//! In-memory store for tests and one-shot evaluations.

use crate::decision::{Decision, RunReport};
use crate::error::StoreError;
use crate::listing::RawListing;

use super::{DecisionSink, ListingSource, RunLog};

/// Vec-backed implementation of every store contract.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    listings: Vec<RawListing>,
    decisions: Vec<Decision>,
    runs: Vec<RunReport>,
    fail_fetches: bool,
    fail_appends: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store serving the given listings.
    pub fn with_listings(listings: Vec<RawListing>) -> Self {
        Self {
            listings,
            ..Self::default()
        }
    }

    /// Create a store whose decision appends always fail.
    #[cfg(test)]
    pub fn failing() -> Self {
        Self {
            fail_appends: true,
            ..Self::default()
        }
    }

    /// Create a store whose listing fetches always fail.
    #[cfg(test)]
    pub fn unreadable() -> Self {
        Self {
            fail_fetches: true,
            ..Self::default()
        }
    }

    /// Appended decisions, oldest first.
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    /// Recorded runs, oldest first.
    pub fn runs(&self) -> &[RunReport] {
        &self.runs
    }
}

impl ListingSource for MemoryStore {
    fn fetch_listings(&self) -> Result<Vec<RawListing>, StoreError> {
        if self.fail_fetches {
            return Err(StoreError::Rejected("listing feed is offline".to_string()));
        }
        Ok(self.listings.clone())
    }
}

impl DecisionSink for MemoryStore {
    fn append(&mut self, decisions: &[Decision]) -> Result<(), StoreError> {
        if self.fail_appends {
            return Err(StoreError::Rejected("decision log is read-only".to_string()));
        }
        self.decisions.extend_from_slice(decisions);
        Ok(())
    }
}

impl RunLog for MemoryStore {
    fn record_run(&mut self, report: &RunReport) -> Result<(), StoreError> {
        self.runs.push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::decision::{fetch_for_run, persist_outcome, DecisionEngine, RunStatus};
    use crate::history::MockOracle;
    use rust_decimal_macros::dec;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn listing(id: i64, source: &str) -> RawListing {
        RawListing {
            id,
            product_hash: Some("p1".to_string()),
            source: source.to_string(),
            listing_price: dec!(400),
            ..RawListing::default()
        }
    }

    #[test]
    fn serves_listings() {
        let store = MemoryStore::with_listings(vec![listing(1, "A"), listing(2, "B")]);
        assert_eq!(store.fetch_listings().unwrap().len(), 2);
    }

    #[test]
    fn failed_fetch_is_logged_as_failure() {
        let mut store = MemoryStore::unreadable();
        let run_id = Uuid::new_v4();

        let err = fetch_for_run(&mut store, run_id, OffsetDateTime::now_utc()).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));

        assert_eq!(store.runs().len(), 1);
        let run = &store.runs()[0];
        assert_eq!(run.run_id, run_id);
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(run.items_processed, 0);
        assert!(run.message.as_deref().unwrap().contains("listing feed is offline"));
    }

    #[test]
    fn fetched_listings_feed_a_persisted_pass() {
        let mut store = MemoryStore::with_listings(vec![listing(1, "A"), listing(2, "B")]);
        let run_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let raw = fetch_for_run(&mut store, run_id, now).unwrap();
        let oracle = MockOracle::new();
        let outcome = DecisionEngine::new(&oracle, &oracle, Thresholds::default()).run(raw, run_id, now);
        persist_outcome(&outcome, &mut store).unwrap();

        assert_eq!(store.runs().len(), 1);
        assert_eq!(store.runs()[0].items_processed, 2);
        assert_eq!(store.decisions().len(), 4);
    }

    #[test]
    fn failed_append_is_logged_as_failure() {
        let oracle = MockOracle::new();
        let engine = DecisionEngine::new(&oracle, &oracle, Thresholds::default());
        let outcome = engine.run(
            vec![listing(1, "A"), listing(2, "B")],
            Uuid::new_v4(),
            OffsetDateTime::now_utc(),
        );

        let mut store = MemoryStore::failing();
        assert!(persist_outcome(&outcome, &mut store).is_err());

        assert!(store.decisions().is_empty());
        assert_eq!(store.runs().len(), 1);
        assert_eq!(store.runs()[0].status, RunStatus::Failure);
        assert_eq!(store.runs()[0].items_processed, 0);
    }
}
