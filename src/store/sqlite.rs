//! SQLite backend.
//!
//! Owns the listing/product catalog, the price history, daily component
//! averages, the append-only decision log and the run log. Timestamps are
//! stored as `YYYY-MM-DD HH:MM:SS` UTC text so that window comparisons work
//! lexically in SQL.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rusqlite::{params, Connection, OptionalExtension};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{DecisionSink, ListingSource, RunLog};
use crate::decision::{Decision, DecisionStatus, RunReport, RunStatus, Strategy};
use crate::error::{OracleError, StoreError};
use crate::history::{window_cutoff, ComponentIndex, PriceHistoryPoint, PriceOracle};
use crate::listing::{ComponentKey, ComponentPriceSnapshot, ProductIdentity, RawListing};
use crate::valuation::ValuationMethod;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS products (
    product_hash TEXT PRIMARY KEY,
    brand TEXT,
    guessed_model TEXT,
    cpu_model TEXT,
    screen_size TEXT,
    is_ram_upgradeable INTEGER DEFAULT 1,
    is_ssd_upgradeable INTEGER DEFAULT 1
);

CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_hash TEXT,
    source TEXT,
    condition_tier TEXT,
    listing_title TEXT,
    listing_price REAL NOT NULL,
    cpu_spec TEXT,
    ram_spec_capacity TEXT,
    ram_spec_type TEXT,
    ssd_spec_capacity TEXT,
    ssd_architecture TEXT,
    url TEXT,
    scraped_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY(product_hash) REFERENCES products(product_hash)
);

CREATE INDEX IF NOT EXISTS idx_listings_product ON listings(product_hash);

CREATE TABLE IF NOT EXISTS listing_price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_hash TEXT,
    price REAL,
    condition_tier TEXT,
    recorded_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY(product_hash) REFERENCES products(product_hash)
);

CREATE INDEX IF NOT EXISTS idx_price_history_product
    ON listing_price_history(product_hash, recorded_at);

CREATE TABLE IF NOT EXISTS component_daily_avg (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    report_date DATE NOT NULL,
    component_key TEXT NOT NULL,
    avg_price REAL NOT NULL,
    UNIQUE(report_date, component_key)
);

CREATE TABLE IF NOT EXISTS arbitrage_decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    run_id TEXT NOT NULL,
    strategy TEXT NOT NULL,
    product_hash TEXT,
    listing_id INTEGER,
    counterparty TEXT,
    chosen_valuation_method TEXT,
    net_margin_pct REAL,
    confidence_score REAL,
    status TEXT DEFAULT 'evaluated',
    FOREIGN KEY(product_hash) REFERENCES products(product_hash),
    FOREIGN KEY(listing_id) REFERENCES listings(id)
);

CREATE TABLE IF NOT EXISTS execution_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    started_at DATETIME,
    run_id TEXT,
    scraper_name TEXT,
    status TEXT,
    error_message TEXT,
    items_found INTEGER,
    items_skipped INTEGER,
    inventory_accepted INTEGER,
    dropship_accepted INTEGER,
    rejected_component_keys INTEGER
);
"#;

const DROP_SQL: &str = r#"
DROP TABLE IF EXISTS arbitrage_decisions;
DROP TABLE IF EXISTS execution_logs;
DROP TABLE IF EXISTS listing_price_history;
DROP TABLE IF EXISTS component_daily_avg;
DROP TABLE IF EXISTS listings;
DROP TABLE IF EXISTS products;
"#;

/// Format a timestamp in the stored `YYYY-MM-DD HH:MM:SS` UTC form.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let utc = at.to_offset(time::UtcOffset::UTC);
    utc.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Parse a stored timestamp as UTC.
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime, StoreError> {
    PrimitiveDateTime::parse(s.trim(), TIMESTAMP_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| StoreError::Decode(format!("timestamp {s:?}: {e}")))
}

fn to_real(value: Decimal) -> Result<f64, StoreError> {
    value
        .to_f64()
        .ok_or_else(|| StoreError::Decode(format!("{value} does not fit a REAL column")))
}

fn from_real(value: f64) -> Result<Decimal, StoreError> {
    Decimal::from_f64(value)
        .map(|d| d.normalize())
        .ok_or_else(|| StoreError::Decode(format!("{value} is not a finite decimal")))
}

fn unavailable(source_name: &'static str, e: impl std::fmt::Display) -> OracleError {
    OracleError::Unavailable {
        source_name,
        reason: e.to_string(),
    }
}

/// Product catalog row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductRecord {
    /// Product hash (primary key).
    pub product_hash: String,
    /// Brand.
    pub brand: Option<String>,
    /// Model name as guessed from titles.
    pub guessed_model: Option<String>,
    /// CPU model.
    pub cpu_model: Option<String>,
    /// Screen size label.
    pub screen_size: Option<String>,
    /// RAM can be removed and sold.
    pub is_ram_upgradeable: bool,
    /// SSD can be removed and sold.
    pub is_ssd_upgradeable: bool,
}

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Rejected(format!("{}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Open a private in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create any missing tables.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Drop every table and recreate the schema.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(DROP_SQL)?;
        self.init_schema()?;
        info!("Database reset");
        Ok(())
    }

    /// Insert a product row, updating it if the hash already exists.
    pub fn upsert_product(&self, product: &ProductRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO products
             (product_hash, brand, guessed_model, cpu_model, screen_size,
              is_ram_upgradeable, is_ssd_upgradeable)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(product_hash) DO UPDATE SET
                brand = excluded.brand,
                guessed_model = excluded.guessed_model,
                cpu_model = excluded.cpu_model,
                screen_size = excluded.screen_size,
                is_ram_upgradeable = excluded.is_ram_upgradeable,
                is_ssd_upgradeable = excluded.is_ssd_upgradeable",
            params![
                product.product_hash,
                product.brand,
                product.guessed_model,
                product.cpu_model,
                product.screen_size,
                product.is_ram_upgradeable,
                product.is_ssd_upgradeable,
            ],
        )?;
        Ok(())
    }

    /// Insert a listing row and return its assigned id.
    ///
    /// The row's product must already exist; `raw.id` is ignored.
    pub fn insert_listing(&self, raw: &RawListing) -> Result<i64, StoreError> {
        let scraped_at = raw
            .scraped_at
            .map(format_timestamp)
            .unwrap_or_else(|| format_timestamp(OffsetDateTime::now_utc()));
        self.conn.execute(
            "INSERT INTO listings
             (product_hash, source, condition_tier, listing_title, listing_price, cpu_spec,
              ram_spec_capacity, ram_spec_type, ssd_spec_capacity, ssd_architecture, url, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                raw.product_hash,
                raw.source,
                raw.condition_tier,
                raw.listing_title,
                to_real(raw.listing_price)?,
                raw.cpu_model,
                raw.ram_spec_capacity,
                raw.ram_spec_type,
                raw.ssd_spec_capacity,
                raw.ssd_architecture,
                raw.url,
                scraped_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Append a price observation.
    pub fn record_price_point(&self, point: &PriceHistoryPoint) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO listing_price_history (product_hash, price, condition_tier, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                point.product_id.as_str(),
                to_real(point.price)?,
                point.condition.to_string(),
                format_timestamp(point.recorded_at),
            ],
        )?;
        Ok(())
    }

    /// Set the daily average price of a component.
    pub fn record_component_price(
        &self,
        report_date: Date,
        key: &ComponentKey,
        price: Decimal,
    ) -> Result<(), StoreError> {
        let date = report_date
            .format(DATE_FORMAT)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO component_daily_avg (report_date, component_key, avg_price)
             VALUES (?1, ?2, ?3)",
            params![date, key.to_string(), to_real(price)?],
        )?;
        Ok(())
    }

    /// Oracle over the stored price history, evaluated at `as_of`.
    pub fn history(&self, as_of: OffsetDateTime) -> SqliteHistory<'_> {
        SqliteHistory {
            conn: &self.conn,
            as_of,
        }
    }

    /// Decisions of one run (or all runs), in append order.
    pub fn load_decisions(&self, run_id: Option<Uuid>) -> Result<Vec<Decision>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, strategy, product_hash, listing_id, counterparty,
                    chosen_valuation_method, net_margin_pct, confidence_score, status, timestamp
             FROM arbitrage_decisions
             WHERE ?1 IS NULL OR run_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![run_id.map(|id| id.to_string())], |row| {
            Ok(DecisionRow {
                run_id: row.get(0)?,
                strategy: row.get(1)?,
                product_hash: row.get(2)?,
                listing_id: row.get(3)?,
                counterparty: row.get(4)?,
                method: row.get(5)?,
                margin_pct: row.get(6)?,
                confidence: row.get(7)?,
                status: row.get(8)?,
                timestamp: row.get(9)?,
            })
        })?;

        let mut decisions = Vec::new();
        for row in rows {
            decisions.push(row?.decode()?);
        }
        Ok(decisions)
    }

    /// Most recent run-log entries, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunReport>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, scraper_name, status, error_message, items_found, items_skipped,
                    inventory_accepted, dropship_accepted, rejected_component_keys,
                    started_at, timestamp
             FROM execution_logs
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunRow {
                run_id: row.get(0)?,
                engine: row.get(1)?,
                status: row.get(2)?,
                message: row.get(3)?,
                items_processed: row.get(4)?,
                items_skipped: row.get(5)?,
                inventory_accepted: row.get(6)?,
                dropship_accepted: row.get(7)?,
                rejected_component_keys: row.get(8)?,
                started_at: row.get(9)?,
                finished_at: row.get(10)?,
            })
        })?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row?.decode()?);
        }
        Ok(runs)
    }

    /// Row counts per table, for status reporting.
    pub fn table_counts(&self) -> Result<Vec<(&'static str, i64)>, StoreError> {
        const TABLES: [&str; 6] = [
            "products",
            "listings",
            "listing_price_history",
            "component_daily_avg",
            "arbitrage_decisions",
            "execution_logs",
        ];
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            counts.push((table, n));
        }
        Ok(counts)
    }
}

impl ListingSource for SqliteStore {
    #[instrument(skip(self))]
    fn fetch_listings(&self) -> Result<Vec<RawListing>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT l.id, l.product_hash, p.brand, COALESCE(p.cpu_model, l.cpu_spec),
                    p.screen_size, l.source, l.condition_tier, l.listing_price,
                    l.ram_spec_capacity, l.ram_spec_type, l.ssd_spec_capacity, l.ssd_architecture,
                    p.is_ram_upgradeable, p.is_ssd_upgradeable, l.listing_title, l.url, l.scraped_at
             FROM listings l
             JOIN products p ON l.product_hash = p.product_hash
             ORDER BY l.scraped_at DESC, l.id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let price: f64 = row.get(7)?;
            let scraped_at: Option<String> = row.get(16)?;
            Ok(RawListing {
                id: row.get(0)?,
                product_hash: row.get(1)?,
                brand: row.get(2)?,
                cpu_model: row.get(3)?,
                screen_size: row.get(4)?,
                source: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                condition_tier: row.get(6)?,
                // Unrepresentable prices become zero and are skipped downstream.
                listing_price: from_real(price).unwrap_or(Decimal::ZERO),
                ram_spec_capacity: row.get(8)?,
                ram_spec_type: row.get(9)?,
                ssd_spec_capacity: row.get(10)?,
                ssd_architecture: row.get(11)?,
                is_ram_upgradeable: row.get(12)?,
                is_ssd_upgradeable: row.get(13)?,
                listing_title: row.get(14)?,
                url: row.get(15)?,
                scraped_at: scraped_at.and_then(|s| parse_timestamp(&s).ok()),
            })
        })?;

        let listings = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(count = listings.len(), "Fetched listings");
        Ok(listings)
    }
}

impl ComponentIndex for SqliteStore {
    fn latest_snapshot(&self) -> Result<ComponentPriceSnapshot, OracleError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT component_key, avg_price FROM component_daily_avg
                 WHERE report_date = (SELECT MAX(report_date) FROM component_daily_avg)",
            )
            .map_err(|e| unavailable("component index", e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))
            .map_err(|e| unavailable("component index", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| unavailable("component index", e))?;

        Ok(ComponentPriceSnapshot::from_raw(rows.into_iter().map(
            |(key, price)| (key, from_real(price).unwrap_or(Decimal::ZERO)),
        )))
    }
}

impl DecisionSink for SqliteStore {
    #[instrument(skip(self, decisions), fields(count = decisions.len()))]
    fn append(&mut self, decisions: &[Decision]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO arbitrage_decisions
                 (timestamp, run_id, strategy, product_hash, listing_id, counterparty,
                  chosen_valuation_method, net_margin_pct, confidence_score, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for d in decisions {
                stmt.execute(params![
                    format_timestamp(d.decided_at),
                    d.run_id.to_string(),
                    d.strategy.to_string(),
                    d.product_id.as_str(),
                    d.listing_id,
                    d.counterparty,
                    d.valuation_method.to_string(),
                    to_real(d.margin_pct)?,
                    to_real(d.confidence)?,
                    d.status.to_string(),
                ])?;
            }
        }
        tx.commit()?;
        debug!("Decisions committed");
        Ok(())
    }
}

impl RunLog for SqliteStore {
    fn record_run(&mut self, report: &RunReport) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO execution_logs
             (timestamp, started_at, run_id, scraper_name, status, error_message, items_found,
              items_skipped, inventory_accepted, dropship_accepted, rejected_component_keys)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                format_timestamp(report.finished_at),
                format_timestamp(report.started_at),
                report.run_id.to_string(),
                report.engine,
                report.status.to_string(),
                report.message,
                report.items_processed as i64,
                report.items_skipped as i64,
                report.inventory_accepted as i64,
                report.dropship_accepted as i64,
                report.rejected_component_keys as i64,
            ],
        )?;
        Ok(())
    }
}

/// Historical oracle over `listing_price_history`.
pub struct SqliteHistory<'a> {
    conn: &'a Connection,
    as_of: OffsetDateTime,
}

impl SqliteHistory<'_> {
    fn average(
        &self,
        sql: &str,
        product: &ProductIdentity,
        window_days: u32,
    ) -> Result<Option<Decimal>, OracleError> {
        let cutoff = format_timestamp(window_cutoff(self.as_of, window_days));
        let as_of = format_timestamp(self.as_of);
        let avg: Option<f64> = self
            .conn
            .query_row(sql, params![product.as_str(), cutoff, as_of], |row| {
                row.get::<_, Option<f64>>(0)
            })
            .optional()
            .map_err(|e| unavailable("price history", e))?
            .flatten();
        avg.map(from_real)
            .transpose()
            .map_err(|e| unavailable("price history", e))
    }
}

impl PriceOracle for SqliteHistory<'_> {
    fn new_baseline(
        &self,
        product: &ProductIdentity,
        window_days: u32,
    ) -> Result<Option<Decimal>, OracleError> {
        self.average(
            "SELECT AVG(price) FROM listing_price_history
             WHERE product_hash = ?1 AND condition_tier = 'New'
               AND recorded_at > ?2 AND recorded_at <= ?3",
            product,
            window_days,
        )
    }

    fn recent_average(
        &self,
        product: &ProductIdentity,
        window_days: u32,
    ) -> Result<Option<Decimal>, OracleError> {
        self.average(
            "SELECT AVG(price) FROM listing_price_history
             WHERE product_hash = ?1 AND recorded_at > ?2 AND recorded_at <= ?3",
            product,
            window_days,
        )
    }
}

struct DecisionRow {
    run_id: String,
    strategy: String,
    product_hash: String,
    listing_id: i64,
    counterparty: Option<String>,
    method: String,
    margin_pct: f64,
    confidence: f64,
    status: String,
    timestamp: String,
}

impl DecisionRow {
    fn decode(self) -> Result<Decision, StoreError> {
        Ok(Decision {
            run_id: Uuid::from_str(&self.run_id).map_err(|e| StoreError::Decode(e.to_string()))?,
            strategy: Strategy::from_str(&self.strategy)
                .map_err(|_| StoreError::Decode(format!("strategy {:?}", self.strategy)))?,
            product_id: ProductIdentity::from_stored(self.product_hash),
            listing_id: self.listing_id,
            counterparty: self.counterparty,
            valuation_method: ValuationMethod::from_str(&self.method)
                .map_err(|_| StoreError::Decode(format!("valuation method {:?}", self.method)))?,
            margin_pct: from_real(self.margin_pct)?,
            confidence: from_real(self.confidence)?,
            status: DecisionStatus::from_str(&self.status)
                .map_err(|_| StoreError::Decode(format!("status {:?}", self.status)))?,
            decided_at: parse_timestamp(&self.timestamp)?,
        })
    }
}

struct RunRow {
    run_id: Option<String>,
    engine: Option<String>,
    status: Option<String>,
    message: Option<String>,
    items_processed: Option<i64>,
    items_skipped: Option<i64>,
    inventory_accepted: Option<i64>,
    dropship_accepted: Option<i64>,
    rejected_component_keys: Option<i64>,
    started_at: Option<String>,
    finished_at: String,
}

impl RunRow {
    fn decode(self) -> Result<RunReport, StoreError> {
        let finished_at = parse_timestamp(&self.finished_at)?;
        let count = |n: Option<i64>| n.and_then(|n| usize::try_from(n).ok()).unwrap_or(0);
        Ok(RunReport {
            run_id: match self.run_id {
                Some(id) => Uuid::from_str(&id).map_err(|e| StoreError::Decode(e.to_string()))?,
                None => Uuid::nil(),
            },
            engine: self.engine.unwrap_or_default(),
            status: match self.status.as_deref() {
                Some(s) => RunStatus::from_str(s)
                    .map_err(|_| StoreError::Decode(format!("run status {s:?}")))?,
                None => RunStatus::Failure,
            },
            items_processed: count(self.items_processed),
            items_skipped: count(self.items_skipped),
            inventory_accepted: count(self.inventory_accepted),
            dropship_accepted: count(self.dropship_accepted),
            rejected_component_keys: count(self.rejected_component_keys),
            message: self.message,
            started_at: match self.started_at {
                Some(s) => parse_timestamp(&s)?,
                None => finished_at,
            },
            finished_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{Capacity, ConditionTier, RamType, SsdInterface};
    use rust_decimal_macros::dec;
    use time::macros::{date, datetime};

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .upsert_product(&ProductRecord {
                product_hash: "p1".to_string(),
                brand: Some("Dell".to_string()),
                cpu_model: Some("i7-1185G7".to_string()),
                screen_size: Some("13.4\"".to_string()),
                is_ram_upgradeable: true,
                is_ssd_upgradeable: false,
                ..ProductRecord::default()
            })
            .unwrap();
        store
    }

    fn point(price: Decimal, condition: ConditionTier, at: OffsetDateTime) -> PriceHistoryPoint {
        PriceHistoryPoint {
            product_id: ProductIdentity::from_stored("p1"),
            price,
            condition,
            recorded_at: at,
        }
    }

    #[test]
    fn timestamps_use_stored_form() {
        let at = datetime!(2026-03-04 05:06:07 UTC);
        assert_eq!(format_timestamp(at), "2026-03-04 05:06:07");
        assert_eq!(parse_timestamp("2026-03-04 05:06:07").unwrap(), at);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn listings_join_products_newest_first() {
        let store = seeded();
        for (price, at) in [
            (dec!(300), datetime!(2026-05-01 10:00 UTC)),
            (dec!(450.5), datetime!(2026-05-02 10:00 UTC)),
        ] {
            store
                .insert_listing(&RawListing {
                    product_hash: Some("p1".to_string()),
                    source: "A".to_string(),
                    listing_price: price,
                    ram_spec_capacity: Some("16GB".to_string()),
                    scraped_at: Some(at),
                    ..RawListing::default()
                })
                .unwrap();
        }

        let listings = store.fetch_listings().unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].listing_price, dec!(450.5));
        assert_eq!(listings[0].brand.as_deref(), Some("Dell"));
        assert_eq!(listings[0].is_ssd_upgradeable, Some(false));
        assert_eq!(listings[1].scraped_at, Some(datetime!(2026-05-01 10:00 UTC)));
    }

    #[test]
    fn snapshot_reads_latest_report_date() {
        let store = seeded();
        let ram = ComponentKey::ram(RamType::Ddr4, Capacity::gb(16));
        let ssd = ComponentKey::ssd(SsdInterface::Nvme, Capacity::gb(512));
        store.record_component_price(date!(2026 - 05 - 01), &ram, dec!(70)).unwrap();
        store.record_component_price(date!(2026 - 05 - 02), &ram, dec!(65)).unwrap();
        store.record_component_price(date!(2026 - 05 - 02), &ssd, dec!(45)).unwrap();

        let snapshot = store.latest_snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&ram), Some(dec!(65)));
    }

    #[test]
    fn history_windows_are_exclusive_at_cutoff() {
        let store = seeded();
        let as_of = datetime!(2026-06-01 00:00 UTC);
        store.record_price_point(&point(dec!(1000), ConditionTier::New, datetime!(2026-05-20 00:00 UTC))).unwrap();
        store.record_price_point(&point(dec!(1200), ConditionTier::New, datetime!(2026-05-10 00:00 UTC))).unwrap();
        store.record_price_point(&point(dec!(600), ConditionTier::RefurbishedGood, datetime!(2026-05-25 00:00 UTC))).unwrap();
        // Exactly 60 days back: excluded.
        store.record_price_point(&point(dec!(5000), ConditionTier::New, datetime!(2026-04-02 00:00 UTC))).unwrap();

        let history = store.history(as_of);
        let id = ProductIdentity::from_stored("p1");
        assert_eq!(history.new_baseline(&id, 60).unwrap(), Some(dec!(1100)));
        assert_eq!(
            history.recent_average(&id, 30).unwrap().map(|d| d.round_dp(2)),
            Some(dec!(933.33))
        );
        assert_eq!(history.new_baseline(&ProductIdentity::from_stored("p2"), 60).unwrap(), None);
    }

    #[test]
    fn empty_window_is_unknown() {
        let store = seeded();
        let history = store.history(datetime!(2026-06-01 00:00 UTC));
        let id = ProductIdentity::from_stored("p1");

        assert_eq!(history.new_baseline(&id, 60).unwrap(), None);
        assert_eq!(history.recent_average(&id, 30).unwrap(), None);
    }

    #[test]
    fn decisions_append_and_reload() {
        let mut store = seeded();
        let listing_id = store
            .insert_listing(&RawListing {
                product_hash: Some("p1".to_string()),
                source: "A".to_string(),
                listing_price: dec!(300),
                ..RawListing::default()
            })
            .unwrap();
        let run_id = Uuid::new_v4();
        let decision = Decision {
            run_id,
            strategy: Strategy::Dropship,
            product_id: ProductIdentity::from_stored("p1"),
            listing_id,
            counterparty: Some("B".to_string()),
            valuation_method: ValuationMethod::Component,
            margin_pct: dec!(26.25),
            confidence: dec!(0.5),
            status: DecisionStatus::Accepted,
            decided_at: datetime!(2026-06-01 12:00 UTC),
        };

        store.append(&[decision.clone()]).unwrap();
        assert_eq!(store.load_decisions(Some(run_id)).unwrap(), vec![decision]);
        assert!(store.load_decisions(Some(Uuid::new_v4())).unwrap().is_empty());
    }

    #[test]
    fn failed_batch_leaves_no_partial_rows() {
        let mut store = seeded();
        let listing_id = store
            .insert_listing(&RawListing {
                product_hash: Some("p1".to_string()),
                source: "A".to_string(),
                listing_price: dec!(800),
                ..RawListing::default()
            })
            .unwrap();
        let good = Decision {
            run_id: Uuid::new_v4(),
            strategy: Strategy::Inventory,
            product_id: ProductIdentity::from_stored("p1"),
            listing_id,
            counterparty: None,
            valuation_method: ValuationMethod::Chassis,
            margin_pct: dec!(12.5),
            confidence: dec!(1.0),
            status: DecisionStatus::Accepted,
            decided_at: datetime!(2026-06-01 12:00 UTC),
        };
        // Unknown product: the foreign key rejects the second row.
        let bad = Decision {
            product_id: ProductIdentity::from_stored("missing"),
            ..good.clone()
        };

        assert!(store.append(&[good, bad]).is_err());
        assert!(store.load_decisions(None).unwrap().is_empty());
    }

    #[test]
    fn run_log_round_trips() {
        let mut store = seeded();
        let report = RunReport {
            run_id: Uuid::new_v4(),
            engine: "decision_engine".to_string(),
            status: RunStatus::Failure,
            items_processed: 0,
            items_skipped: 2,
            inventory_accepted: 0,
            dropship_accepted: 0,
            rejected_component_keys: 3,
            message: Some("price history unavailable".to_string()),
            started_at: datetime!(2026-06-01 12:00 UTC),
            finished_at: datetime!(2026-06-01 12:00:03 UTC),
        };

        store.record_run(&report).unwrap();
        assert_eq!(store.recent_runs(5).unwrap(), vec![report]);
    }

    #[test]
    fn reset_clears_tables() {
        let store = seeded();
        store.reset().unwrap();
        let counts = store.table_counts().unwrap();
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }
}
