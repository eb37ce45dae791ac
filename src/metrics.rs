//! Prometheus metrics for evaluation passes.
//!
//! This module provides metrics for:
//! - Listings evaluated and skipped
//! - Accepted decisions per strategy
//! - Run outcomes and pass duration
//! - HTTP request latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

use crate::decision::{RunStatus, Strategy};

// === Metric Name Constants ===

/// Listings evaluated counter metric name.
pub const METRIC_LISTINGS_EVALUATED: &str = "listings_evaluated_total";
/// Listings skipped counter metric name.
pub const METRIC_LISTINGS_SKIPPED: &str = "listings_skipped_total";
/// Accepted decisions counter metric name.
pub const METRIC_DECISIONS_ACCEPTED: &str = "decisions_accepted_total";
/// Evaluation runs counter metric name.
pub const METRIC_RUNS: &str = "evaluation_runs_total";
/// Pass duration metric name.
pub const METRIC_RUN_DURATION: &str = "evaluation_run_duration_ms";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_RUN_DURATION,
        "Evaluation pass duration in milliseconds"
    );
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );

    describe_counter!(
        METRIC_LISTINGS_EVALUATED,
        "Total number of listings evaluated"
    );
    describe_counter!(
        METRIC_LISTINGS_SKIPPED,
        "Total number of listings skipped for invalid input"
    );
    describe_counter!(
        METRIC_DECISIONS_ACCEPTED,
        "Total number of accepted decisions by strategy"
    );
    describe_counter!(METRIC_RUNS, "Total number of evaluation runs by status");

    debug!("Metrics initialized");
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint.to_string()).record(latency_ms);
}

/// Increment listings evaluated counter.
pub fn inc_listings_evaluated() {
    counter!(METRIC_LISTINGS_EVALUATED).increment(1);
}

/// Increment listings skipped counter.
pub fn inc_listings_skipped() {
    counter!(METRIC_LISTINGS_SKIPPED).increment(1);
}

/// Add accepted decisions for a strategy.
pub fn inc_decisions_accepted(strategy: Strategy, n: usize) {
    counter!(METRIC_DECISIONS_ACCEPTED, "strategy" => strategy.to_string()).increment(n as u64);
}

/// Increment the run counter for an outcome.
pub fn inc_runs(status: RunStatus) {
    counter!(METRIC_RUNS, "status" => status.to_string()).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for an evaluation pass.
pub fn timer_run() -> LatencyTimer {
    LatencyTimer::new(METRIC_RUN_DURATION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = LatencyTimer::new("test_metric");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 9.0);
    }

    #[test]
    fn counters_without_recorder_are_noops() {
        inc_listings_evaluated();
        inc_decisions_accepted(Strategy::Dropship, 3);
        inc_runs(RunStatus::Failure);
    }
}
