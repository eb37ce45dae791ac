//! End-to-end tests for the decision engine.
//!
//! Every test runs against in-memory collaborators or a private in-memory
//! SQLite database, so no external services are needed.

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::macros::{date, datetime};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use laptop_arb::arbitrage::{best_target, compute_triangulated_margin, top_dropship, top_inventory};
use laptop_arb::config::{Config, Thresholds};
use laptop_arb::decision::{
    classify, persist_outcome, DecisionEngine, DecisionStatus, RunStatus, Strategy,
};
use laptop_arb::history::{InMemoryHistory, MockConfig, MockOracle, PriceHistoryPoint};
use laptop_arb::listing::{
    ComponentKey, ComponentPriceSnapshot, ConditionTier, Listing, ProductIdentity, RawListing,
};
use laptop_arb::store::{ListingSource, ProductRecord, SqliteStore};
use laptop_arb::valuation::{compute_tev, ValuationMethod};

fn as_of() -> OffsetDateTime {
    datetime!(2026-06-01 12:00 UTC)
}

fn key(s: &str) -> ComponentKey {
    s.parse().unwrap()
}

fn components() -> ComponentPriceSnapshot {
    ComponentPriceSnapshot::new()
        .with(key("RAM_DDR4_16GB"), dec!(40.0))
        .with(key("SSD_NVMe_512GB"), dec!(50.0))
}

fn raw(product: &str, source: &str, condition: &str, price: Decimal) -> RawListing {
    RawListing {
        product_hash: Some(product.to_string()),
        cpu_model: Some("Intel Core i7-1185G7".to_string()),
        source: source.to_string(),
        condition_tier: Some(condition.to_string()),
        listing_price: price,
        ram_spec_capacity: Some("16GB".to_string()),
        ram_spec_type: Some("DDR4".to_string()),
        ssd_spec_capacity: Some("512GB".to_string()),
        ssd_architecture: Some("NVMe".to_string()),
        ..RawListing::default()
    }
}

fn point(product: &str, price: Decimal, condition: ConditionTier, days_ago: i64) -> PriceHistoryPoint {
    PriceHistoryPoint {
        product_id: ProductIdentity::from_stored(product),
        price,
        condition,
        recorded_at: as_of() - Duration::days(days_ago),
    }
}

#[test]
fn scenario_a_and_b_valuation() {
    let listing = Listing::try_from(raw("p1", "A", "OpenBox", dec!(700))).unwrap();

    let without_baseline = compute_tev(&listing, &components(), None);
    assert_eq!(without_baseline.harvest_total, dec!(240.0));
    assert_eq!(without_baseline.method, ValuationMethod::Component);

    let with_baseline = compute_tev(&listing, &components(), Some(dec!(1000.0)));
    assert_eq!(with_baseline.chassis_value, dec!(900.0));
    assert_eq!(with_baseline.tev, dec!(900.0));
    assert_eq!(with_baseline.method, ValuationMethod::Chassis);
}

#[test]
fn scenario_c_and_d_margins() {
    let thresholds = Thresholds::default();

    let c = compute_triangulated_margin(dec!(500), dec!(570), dec!(500), dec!(25));
    assert!(!c.is_unrealistic);
    assert_eq!(c.net_profit, dec!(-40.5));
    assert_eq!(c.margin_pct, dec!(-8.1));
    assert_eq!(classify(Strategy::Dropship, &c, &thresholds), DecisionStatus::Evaluated);

    let d = compute_triangulated_margin(dec!(300), dec!(475), dec!(450), dec!(25));
    assert!(!d.is_unrealistic);
    assert_eq!(d.net_profit, dec!(78.75));
    assert_eq!(d.margin_pct, dec!(26.25));
    assert_eq!(classify(Strategy::Dropship, &d, &thresholds), DecisionStatus::Accepted);
}

#[test]
fn scenario_e_through_the_engine() {
    let listings = vec![
        RawListing { id: 1, ..raw("p1", "A", "New", dec!(300)) },
        RawListing { id: 2, ..raw("p1", "B", "New", dec!(500)) },
        RawListing { id: 3, ..raw("p1", "B", "New", dec!(520)) },
    ];
    let history = InMemoryHistory::new(
        vec![
            point("p1", dec!(400), ConditionTier::RefurbishedGood, 5),
            point("p1", dec!(500), ConditionTier::RefurbishedGood, 10),
        ],
        as_of(),
    );
    let snapshot = components();
    let engine = DecisionEngine::new(&snapshot, &history, Thresholds::default());

    let outcome = engine.run(listings, Uuid::new_v4(), as_of());
    assert_eq!(outcome.report.status, RunStatus::Success);
    assert_eq!(outcome.report.items_processed, 3);
    assert_eq!(outcome.dropship.len(), 2);

    let top = top_dropship(&outcome.dropship, 10);
    assert_eq!(top.len(), 1);
    let pair = top[0];
    assert_eq!(pair.source_retailer, "A");
    assert_eq!(pair.target_retailer, "B");
    assert_eq!(pair.buy_price, dec!(300));
    assert_eq!(pair.target_price, dec!(500));
    assert_eq!(pair.projected_sell_price, dec!(475));
    assert_eq!(pair.market_ref_price, dec!(450));
    assert_eq!(pair.margin.net_profit, dec!(78.75));

    let best = best_target(&outcome.dropship, &ProductIdentity::from_stored("p1"), "A").unwrap();
    assert_eq!(best.target_retailer, "B");
    assert!(pair.best_target);

    assert_eq!(outcome.spreads.len(), 1);
    assert_eq!(outcome.spreads[0].min_price, dec!(300));
    assert_eq!(outcome.spreads[0].max_price, dec!(520));

    let accepted: Vec<_> = outcome.decisions.iter().filter(|d| d.is_accepted()).collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].strategy, Strategy::Dropship);
    assert_eq!(accepted[0].listing_id, 1);
    assert_eq!(accepted[0].counterparty.as_deref(), Some("B"));
    assert_eq!(accepted[0].margin_pct, dec!(26.25));
    assert_eq!(accepted[0].confidence, dec!(0.5));
}

#[test]
fn sqlite_round_trip_of_a_full_pass() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    for hash in ["p1", "p2"] {
        store
            .upsert_product(&ProductRecord {
                product_hash: hash.to_string(),
                brand: Some("Dell".to_string()),
                cpu_model: Some("Intel Core i7-1185G7".to_string()),
                is_ram_upgradeable: true,
                is_ssd_upgradeable: true,
                ..ProductRecord::default()
            })
            .unwrap();
    }

    let seed = [
        ("p1", "A", "New", dec!(300), 4),
        ("p1", "B", "New", dec!(500), 3),
        ("p1", "B", "New", dec!(520), 2),
        ("p2", "A", "OpenBox", dec!(700), 1),
    ];
    let mut ids = Vec::new();
    for (product, source, condition, price, hours_ago) in seed {
        let listing = RawListing {
            scraped_at: Some(as_of() - Duration::hours(hours_ago)),
            ..raw(product, source, condition, price)
        };
        ids.push(store.insert_listing(&listing).unwrap());
    }

    for p in [
        point("p1", dec!(400), ConditionTier::RefurbishedGood, 5),
        point("p1", dec!(500), ConditionTier::RefurbishedGood, 10),
        point("p2", dec!(1000), ConditionTier::New, 3),
        point("p2", dec!(1000), ConditionTier::New, 20),
    ] {
        store.record_price_point(&p).unwrap();
    }
    store.record_component_price(date!(2026 - 05 - 31), &key("RAM_DDR4_16GB"), dec!(40)).unwrap();
    store.record_component_price(date!(2026 - 05 - 31), &key("SSD_NVMe_512GB"), dec!(50)).unwrap();

    let fetched = store.fetch_listings().unwrap();
    assert_eq!(fetched.len(), 4);
    assert_eq!(fetched[0].id, ids[3]);

    let run_id = Uuid::new_v4();
    let outcome = {
        let history = store.history(as_of());
        let engine = DecisionEngine::new(&store, &history, Thresholds::default());
        engine.run(fetched, run_id, as_of())
    };
    assert_eq!(outcome.report.inventory_accepted, 1);
    assert_eq!(outcome.report.dropship_accepted, 1);

    let inventory = top_inventory(&outcome.inventory, 10);
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].listing_id, ids[3]);
    assert_eq!(inventory[0].valuation.tev, dec!(900));
    assert!(inventory[0].outlier);

    persist_outcome(&outcome, &mut store).unwrap();

    let stored = store.load_decisions(Some(run_id)).unwrap();
    assert_eq!(stored.len(), 6);
    let chassis = stored
        .iter()
        .find(|d| d.listing_id == ids[3] && d.strategy == Strategy::Inventory)
        .unwrap();
    assert_eq!(chassis.valuation_method, ValuationMethod::Chassis);
    assert_eq!(chassis.confidence, dec!(1));
    assert_eq!(chassis.margin_pct, dec!(28.57));
    assert_eq!(chassis.status, DecisionStatus::Accepted);

    let runs = store.recent_runs(1).unwrap();
    assert_eq!(runs[0].run_id, run_id);
    assert_eq!(runs[0].items_processed, 4);
}

#[test]
fn upstream_failure_aborts_and_is_logged() {
    let oracle = MockOracle::with_config(MockConfig {
        fail_history: true,
        ..MockConfig::default()
    });
    let engine = DecisionEngine::new(&oracle, &oracle, Thresholds::default());
    let outcome = engine.run(vec![raw("p1", "A", "New", dec!(300))], Uuid::new_v4(), as_of());

    let mut store = SqliteStore::open_in_memory().unwrap();
    persist_outcome(&outcome, &mut store).unwrap();

    assert!(store.load_decisions(None).unwrap().is_empty());
    let runs = store.recent_runs(5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failure);
    assert_eq!(runs[0].items_processed, 0);
}

#[test]
fn json_listings_feed_the_engine() {
    let listings: Vec<RawListing> = serde_json::from_str(
        r#"[
            {"id": 10, "brand": "Lenovo", "cpu_model": "i5-1135G7", "screen_size": "14\"",
             "source": "Amazon.ca", "condition_tier": "Refurbished Good", "listing_price": 299.99},
            {"id": 11, "brand": "lenovo", "cpu_model": "I5-1135G7", "screen_size": "14 inch",
             "source": "BestBuy.ca", "listing_price": 420},
            {"id": 12, "source": "Walmart.ca", "listing_price": 0}
        ]"#,
    )
    .unwrap();

    let snapshot = ComponentPriceSnapshot::from_raw(vec![
        ("RAM_DDR4_8GB".to_string(), dec!(25)),
        ("RAM_DDR4_16".to_string(), dec!(40)),
    ]);
    assert_eq!(snapshot.rejected_keys(), &["RAM_DDR4_16".to_string()]);

    let history = InMemoryHistory::new(Vec::new(), as_of());
    let engine = DecisionEngine::new(&snapshot, &history, Thresholds::default());
    let outcome = engine.run(listings, Uuid::new_v4(), as_of());

    assert_eq!(outcome.report.items_processed, 2);
    assert_eq!(outcome.report.items_skipped, 1);
    assert_eq!(outcome.report.rejected_component_keys, 1);
    assert_eq!(outcome.skipped[0].listing_id, 12);
    // Same brand, CPU and screen derive one identity across retailers.
    assert_eq!(outcome.inventory[0].product_id, outcome.inventory[1].product_id);
    assert_eq!(outcome.dropship.len(), 2);
    // Refurbished Good without baseline: TEV = 25 + 50 + 100.
    assert_eq!(outcome.inventory[0].valuation.tev, dec!(175));
}

#[test]
fn default_config_thresholds() {
    let thresholds = Config::default().thresholds();
    assert_eq!(thresholds, Thresholds::default());
    assert_eq!(thresholds.shipping_estimate, dec!(25.0));
    assert_eq!(thresholds.baseline_window_days, 60);
    assert_eq!(thresholds.recent_window_days, 30);
}
