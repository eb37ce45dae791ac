//! HTTP API handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::arbitrage::{
    top_dropship, top_inventory, top_spreads, DropshipOpportunity, InventoryOpportunity,
    ProductSpread, MIN_SPREAD_PCT,
};
use crate::decision::{RunOutcome, RunReport, Strategy};
use crate::metrics;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Whether an evaluation pass has completed.
    pub ready: Arc<AtomicBool>,
    /// Latest pass outcome.
    pub latest: Arc<RwLock<Option<RunOutcome>>>,
    /// Default number of ranked opportunities returned.
    pub top_n: usize,
    /// Prometheus renderer, when an exporter is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(top_n: usize) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(RwLock::new(None)),
            top_n,
            prometheus: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Store a pass outcome and mark the service ready.
    pub async fn publish(&self, outcome: RunOutcome) {
        *self.latest.write().await = Some(outcome);
        self.set_ready(true);
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
    /// Run that produced the served results.
    pub run_id: Option<Uuid>,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Latest run report.
    pub last_run: Option<RunReport>,
}

/// Query parameters for the opportunities endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct OpportunitiesQuery {
    /// Restrict to one strategy.
    pub strategy: Option<Strategy>,
    /// Maximum entries per strategy.
    pub limit: Option<usize>,
}

/// Ranked qualifying opportunities of the latest pass.
#[derive(Debug, Serialize)]
pub struct OpportunitiesResponse {
    /// Run the opportunities belong to.
    pub run_id: Option<Uuid>,
    /// Inventory opportunities, best margin first.
    pub inventory: Vec<InventoryOpportunity>,
    /// Dropship opportunities, best margin first.
    pub dropship: Vec<DropshipOpportunity>,
    /// Cross-retailer spreads of at least 10%, widest first.
    pub spreads: Vec<ProductSpread>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 once a pass has completed, 503 before.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let run_id = state.latest.read().await.as_ref().map(|o| o.report.run_id);

    let response = ReadyResponse {
        ready: is_ready,
        run_id,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns the latest run report.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let last_run = state.latest.read().await.as_ref().map(|o| o.report.clone());
    let status = if state.is_ready() { "ready" } else { "starting" };

    Json(StatusResponse { status, last_run })
}

/// Opportunities handler - ranked qualifying opportunities, optionally filtered.
pub async fn opportunities(
    State(state): State<AppState>,
    Query(query): Query<OpportunitiesQuery>,
) -> impl IntoResponse {
    let start = Instant::now();
    let limit = query.limit.unwrap_or(state.top_n);
    let want = |s: Strategy| query.strategy.map_or(true, |q| q == s);

    let latest = state.latest.read().await;
    let response = match latest.as_ref() {
        Some(outcome) => OpportunitiesResponse {
            run_id: Some(outcome.report.run_id),
            inventory: if want(Strategy::Inventory) {
                top_inventory(&outcome.inventory, limit).into_iter().cloned().collect()
            } else {
                Vec::new()
            },
            dropship: if want(Strategy::Dropship) {
                top_dropship(&outcome.dropship, limit).into_iter().cloned().collect()
            } else {
                Vec::new()
            },
            spreads: if want(Strategy::Dropship) {
                top_spreads(&outcome.spreads, MIN_SPREAD_PCT, limit)
                    .into_iter()
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            },
        },
        None => OpportunitiesResponse {
            run_id: None,
            inventory: Vec::new(),
            dropship: Vec::new(),
            spreads: Vec::new(),
        },
    };

    metrics::record_http_latency(start, "opportunities");
    Json(response)
}

/// Prometheus scrape handler.
pub async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed".to_string()),
    }
}
