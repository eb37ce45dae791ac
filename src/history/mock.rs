//! Mock collaborators for unit testing.
//!
//! This module provides a mock oracle and component index that can be used
//! in tests without a database, including failure modes for the run-level
//! error paths.

use std::cell::Cell;
use std::collections::HashMap;

use rust_decimal::Decimal;

use super::oracle::{ComponentIndex, PriceOracle};
use crate::error::OracleError;
use crate::listing::{ComponentKey, ComponentPriceSnapshot, ProductIdentity};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Whether component snapshot requests fail.
    pub fail_components: bool,
    /// Whether historical queries fail.
    pub fail_history: bool,
}

/// Mock component index and price oracle with canned answers.
#[derive(Debug, Default)]
pub struct MockOracle {
    /// Mock configuration.
    config: MockConfig,
    /// Component prices returned by the index.
    components: ComponentPriceSnapshot,
    /// New-condition baselines by product.
    baselines: HashMap<ProductIdentity, Decimal>,
    /// Recent averages by product.
    averages: HashMap<ProductIdentity, Decimal>,
    /// Historical queries served so far.
    queries: Cell<usize>,
}

impl MockOracle {
    /// Create a new mock with no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with custom failure configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set a component price.
    pub fn component(mut self, key: ComponentKey, price: Decimal) -> Self {
        self.components.insert(key, price);
        self
    }

    /// Set the new-condition baseline for a product.
    pub fn baseline(mut self, product: &ProductIdentity, price: Decimal) -> Self {
        self.baselines.insert(product.clone(), price);
        self
    }

    /// Set the recent average for a product.
    pub fn average(mut self, product: &ProductIdentity, price: Decimal) -> Self {
        self.averages.insert(product.clone(), price);
        self
    }

    /// Number of historical queries answered or refused.
    pub fn query_count(&self) -> usize {
        self.queries.get()
    }

    fn answer(
        &self,
        table: &HashMap<ProductIdentity, Decimal>,
        product: &ProductIdentity,
    ) -> Result<Option<Decimal>, OracleError> {
        self.queries.set(self.queries.get() + 1);
        if self.config.fail_history {
            return Err(OracleError::Unavailable {
                source_name: "price history",
                reason: "Mock history failure".to_string(),
            });
        }
        Ok(table.get(product).copied())
    }
}

impl ComponentIndex for MockOracle {
    fn latest_snapshot(&self) -> Result<ComponentPriceSnapshot, OracleError> {
        if self.config.fail_components {
            return Err(OracleError::Unavailable {
                source_name: "component index",
                reason: "Mock component failure".to_string(),
            });
        }
        Ok(self.components.clone())
    }
}

impl PriceOracle for MockOracle {
    fn new_baseline(
        &self,
        product: &ProductIdentity,
        _window_days: u32,
    ) -> Result<Option<Decimal>, OracleError> {
        self.answer(&self.baselines, product)
    }

    fn recent_average(
        &self,
        product: &ProductIdentity,
        _window_days: u32,
    ) -> Result<Option<Decimal>, OracleError> {
        self.answer(&self.averages, product)
    }
}
