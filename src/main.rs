//! Laptop arbitrage decision engine entry point.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use laptop_arb::api::{create_router, AppState};
use laptop_arb::arbitrage::{top_dropship, top_inventory, top_spreads, MIN_SPREAD_PCT};
use laptop_arb::config::Config;
use laptop_arb::decision::{fetch_for_run, persist_outcome, DecisionEngine, RunOutcome};
use laptop_arb::history::{InMemoryHistory, PriceHistoryPoint};
use laptop_arb::listing::{ComponentPriceSnapshot, RawListing};
use laptop_arb::metrics;
use laptop_arb::store::{MemoryStore, SqliteStore};
use laptop_arb::utils::shutdown_signal;
use laptop_arb::EngineError;

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

/// Laptop listing valuation and arbitrage decision engine.
#[derive(Parser, Debug)]
#[command(name = "laptop-arb")]
#[command(about = "Values laptop listings and classifies inventory and dropship opportunities")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema.
    InitDb {
        /// Drop all tables first.
        #[arg(long)]
        reset: bool,
    },

    /// Evaluate every stored listing and append the decisions.
    Run,

    /// Evaluate listings from JSON files without touching the database.
    Evaluate {
        /// JSON array of listings.
        #[arg(long)]
        listings: PathBuf,

        /// JSON object mapping component keys to prices.
        #[arg(long)]
        components: PathBuf,

        /// JSON array of price history points.
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Run one pass over the database, then serve the results over HTTP.
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("laptop_arb=debug,info")
    } else {
        let level = Config::load()
            .map(|c| c.rust_log)
            .unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    // Initialize metrics
    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed");
            None
        }
    };
    metrics::init_metrics();

    // Handle subcommands
    match args.command {
        Command::InitDb { reset } => cmd_init_db(reset),
        Command::Run => cmd_run(),
        Command::Evaluate {
            listings,
            components,
            history,
        } => cmd_evaluate(&listings, &components, history.as_deref()),
        Command::CheckConfig => cmd_check_config(),
        Command::Serve { port } => cmd_serve(port, prometheus).await,
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(EngineError::from)?;
    config.validate().map_err(EngineError::InvalidConfig)?;
    Ok(config)
}

/// Create (or reset) the database schema.
fn cmd_init_db(reset: bool) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;

    if reset {
        store.reset()?;
        println!("Database reset forced.");
    }

    println!("Database initialized at {}", config.database_path);
    for (table, count) in store.table_counts()? {
        println!("  {table:<24} {count} rows");
    }
    Ok(())
}

/// One evaluation pass over the database, persisted.
fn run_pass(config: &Config) -> anyhow::Result<RunOutcome> {
    let mut store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database at {}", config.database_path))?;

    let now = OffsetDateTime::now_utc();
    let run_id = Uuid::new_v4();
    let raw = fetch_for_run(&mut store, run_id, now)?;
    info!(%run_id, listings = raw.len(), "Starting evaluation pass");

    let outcome = {
        let history = store.history(now);
        let engine = DecisionEngine::new(&store, &history, config.thresholds());
        engine.run(raw, run_id, now)
    };

    persist_outcome(&outcome, &mut store)?;
    Ok(outcome)
}

/// Evaluate the database and print the top opportunities.
fn cmd_run() -> anyhow::Result<()> {
    let config = load_config()?;
    let outcome = run_pass(&config)?;
    print_outcome(&outcome, config.top_n);

    if !outcome.report.is_success() {
        return Err(anyhow::anyhow!(
            "Evaluation run failed: {}",
            outcome.report.message.unwrap_or_default()
        ));
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(EngineError::from)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .map_err(EngineError::from)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(value)
}

/// Evaluate JSON inputs with in-memory collaborators and print the outcome.
fn cmd_evaluate(
    listings: &Path,
    components: &Path,
    history: Option<&Path>,
) -> anyhow::Result<()> {
    let config = load_config()?;
    let raw: Vec<RawListing> = read_json(listings)?;
    let prices: HashMap<String, Decimal> = read_json(components)?;
    let points: Vec<PriceHistoryPoint> = match history {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let now = OffsetDateTime::now_utc();
    let run_id = Uuid::new_v4();
    let mut store = MemoryStore::with_listings(raw);
    let snapshot = ComponentPriceSnapshot::from_raw(prices);
    let oracle = InMemoryHistory::new(points, now);
    info!(%run_id, history_points = oracle.len(), "Evaluating JSON inputs");

    let raw = fetch_for_run(&mut store, run_id, now)?;
    let engine = DecisionEngine::new(&snapshot, &oracle, config.thresholds());
    let outcome = engine.run(raw, run_id, now);
    persist_outcome(&outcome, &mut store)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("{RULE}");
    println!("LAPTOP ARB ENGINE - CONFIGURATION CHECK");
    println!("{RULE}");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Show configuration summary
    println!("{THIN_RULE}");
    println!("Configuration Summary:");
    println!("  Database: {}", config.database_path);
    println!("  Shipping Estimate: ${}", config.shipping_estimate);
    println!("  Inventory Min Margin: {}% (inclusive)", config.inventory_min_margin_pct);
    println!("  Dropship Min Margin: {}% (strict)", config.dropship_min_margin_pct);
    println!("  Outlier Discount: {}", config.outlier_discount);
    println!("  Baseline Window: {} days", config.baseline_window_days);
    println!("  Recent Window: {} days", config.recent_window_days);
    println!("  Top N: {}", config.top_n);
    println!("  HTTP Port: {}", config.port);
    println!("{RULE}");
    println!("CONFIGURATION CHECK PASSED");
    println!("{RULE}");

    Ok(())
}

/// Evaluate once, then serve results until shutdown.
async fn cmd_serve(port: Option<u16>, prometheus: Option<PrometheusHandle>) -> anyhow::Result<()> {
    let config = load_config()?;
    let port = port.unwrap_or(config.port);

    let mut app_state = AppState::new(config.top_n);
    if let Some(handle) = prometheus {
        app_state = app_state.with_prometheus(handle);
    }

    match run_pass(&config) {
        Ok(outcome) => {
            print_outcome(&outcome, config.top_n);
            app_state.publish(outcome).await;
        }
        Err(e) => error!(error = %e, "Initial evaluation pass failed; serving without results"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, top_n: usize) {
    let report = &outcome.report;
    println!("{RULE}");
    println!("EVALUATION RUN {}", report.run_id);
    println!("{RULE}");
    println!("  Status: {}", report.status);
    println!("  Processed: {}", report.items_processed);
    println!("  Skipped: {}", report.items_skipped);
    println!("  Rejected component keys: {}", report.rejected_component_keys);
    if let Some(message) = &report.message {
        println!("  Note: {}", message);
    }
    for skipped in &outcome.skipped {
        println!("  - listing {}: {}", skipped.listing_id, skipped.reason);
    }

    println!("{THIN_RULE}");
    println!("Top inventory opportunities ({} accepted):", report.inventory_accepted);
    for o in top_inventory(&outcome.inventory, top_n) {
        println!(
            "  #{:<6} {:<12} ${:<10} TEV ${:<10} margin {}%{}",
            o.listing_id,
            o.retailer,
            o.price,
            o.valuation.tev.round_dp(2),
            o.margin_pct.round_dp(2),
            if o.outlier { "  [outlier]" } else { "" }
        );
    }

    println!("{THIN_RULE}");
    println!("Top dropship opportunities ({} accepted, * = best target):", report.dropship_accepted);
    for o in top_dropship(&outcome.dropship, top_n) {
        println!(
            "  {} -> {}{}  buy ${} sell ${}  profit ${}  margin {}%  spread {}%",
            o.source_retailer,
            o.target_retailer,
            if o.best_target { "*" } else { "" },
            o.buy_price,
            o.projected_sell_price.round_dp(2),
            o.margin.net_profit.round_dp(2),
            o.margin.margin_pct.round_dp(2),
            o.spread_pct.round_dp(2)
        );
    }

    println!("{THIN_RULE}");
    println!("Widest cross-retailer spreads (>= {}%):", MIN_SPREAD_PCT);
    for s in top_spreads(&outcome.spreads, MIN_SPREAD_PCT, top_n) {
        println!(
            "  {:<18} ${} - ${}  spread {}%  [{}]",
            s.product_id,
            s.min_price,
            s.max_price,
            s.spread_pct.round_dp(2),
            s.retailers.join(", ")
        );
    }
    println!("{RULE}");
}
