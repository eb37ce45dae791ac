//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::listing::MAX_PRICE;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Storage ===
    /// SQLite database holding listings, history and decisions.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    // === Margin Model ===
    /// Flat shipping estimate deducted from every resale.
    #[serde(default = "default_shipping_estimate")]
    pub shipping_estimate: Decimal,

    /// Minimum TEV margin (inclusive) to accept an inventory acquisition.
    #[serde(default = "default_min_margin_pct")]
    pub inventory_min_margin_pct: Decimal,

    /// Minimum triangulated margin (exclusive) to accept a dropship pair.
    #[serde(default = "default_min_margin_pct")]
    pub dropship_min_margin_pct: Decimal,

    /// Discount to the recent average that raises the outlier signal (0.20 = 20%).
    #[serde(default = "default_outlier_discount")]
    pub outlier_discount: Decimal,

    // === Historical Windows ===
    /// Window for the new-condition baseline.
    #[serde(default = "default_baseline_window")]
    pub baseline_window_days: u32,

    /// Window for the any-condition recent average.
    #[serde(default = "default_recent_window")]
    pub recent_window_days: u32,

    // === Presentation ===
    /// Number of opportunities listed per strategy.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log filter used when `--verbose` is not given, e.g. `info` or `laptop_arb=debug`.
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_database_path() -> String {
    "data/arbitrage.db".to_string()
}

fn default_shipping_estimate() -> Decimal {
    dec!(25.0)
}

fn default_min_margin_pct() -> Decimal {
    dec!(10.0)
}

fn default_outlier_discount() -> Decimal {
    dec!(0.20)
}

fn default_baseline_window() -> u32 {
    60
}

fn default_recent_window() -> u32 {
    30
}

fn default_top_n() -> usize {
    10
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            shipping_estimate: default_shipping_estimate(),
            inventory_min_margin_pct: default_min_margin_pct(),
            dropship_min_margin_pct: default_min_margin_pct(),
            outlier_discount: default_outlier_discount(),
            baseline_window_days: default_baseline_window(),
            recent_window_days: default_recent_window(),
            top_n: default_top_n(),
            port: default_port(),
            rust_log: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.trim().is_empty() {
            return Err("DATABASE_PATH must not be empty".to_string());
        }

        if self.shipping_estimate < Decimal::ZERO {
            return Err("SHIPPING_ESTIMATE must not be negative".to_string());
        }

        if self.shipping_estimate > MAX_PRICE {
            return Err(format!("SHIPPING_ESTIMATE must not exceed {MAX_PRICE}"));
        }

        if self.outlier_discount <= Decimal::ZERO || self.outlier_discount >= Decimal::ONE {
            return Err("OUTLIER_DISCOUNT must be between 0 and 1".to_string());
        }

        if self.baseline_window_days == 0 || self.recent_window_days == 0 {
            return Err("history windows must be at least one day".to_string());
        }

        if self.top_n == 0 {
            return Err("TOP_N must be at least 1".to_string());
        }

        Ok(())
    }

    /// Decision thresholds handed to each evaluation run.
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            shipping_estimate: self.shipping_estimate,
            inventory_min_margin_pct: self.inventory_min_margin_pct,
            dropship_min_margin_pct: self.dropship_min_margin_pct,
            outlier_discount: self.outlier_discount,
            baseline_window_days: self.baseline_window_days,
            recent_window_days: self.recent_window_days,
        }
    }
}

/// Request-scoped decision parameters for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thresholds {
    /// Flat shipping estimate.
    pub shipping_estimate: Decimal,
    /// Inventory acceptance floor (inclusive).
    pub inventory_min_margin_pct: Decimal,
    /// Dropship acceptance floor (exclusive).
    pub dropship_min_margin_pct: Decimal,
    /// Outlier discount ratio.
    pub outlier_discount: Decimal,
    /// New-baseline window in days.
    pub baseline_window_days: u32,
    /// Recent-average window in days.
    pub recent_window_days: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Config::default().thresholds()
    }
}
