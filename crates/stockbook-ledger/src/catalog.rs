//! # Product Catalog
//!
//! The ledger treats product and venue ids as opaque. Anything it needs to
//! know about a product beyond its stock (today: alert thresholds) comes
//! through a [`ProductCatalog`] handed to [`StockLedger`](crate::StockLedger)
//! at construction.
//!
//! ## Fallback
//! A catalog that returns `None` for a product gets the `[alerts]` defaults
//! from [`LedgerConfig`](crate::LedgerConfig). The ledger never goes looking
//! for a catalog on its own.

use std::collections::HashMap;

use stockbook_core::AlertThresholds;

/// Source of per-product settings.
pub trait ProductCatalog: Send + Sync {
    /// Alert thresholds for a product at a venue, if the catalog has them.
    fn thresholds(&self, venue_id: &str, product_id: &str) -> Option<AlertThresholds>;
}

/// A catalog that knows nothing; every product uses the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatalog;

impl ProductCatalog for NoCatalog {
    fn thresholds(&self, _venue_id: &str, _product_id: &str) -> Option<AlertThresholds> {
        None
    }
}

/// An in-memory catalog, for fixed deployments and tests.
///
/// A product entry with venue `"*"` applies at every venue without its own.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<(String, String), AlertThresholds>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        thresholds: AlertThresholds,
    ) -> Self {
        self.insert(venue_id, product_id, thresholds);
        self
    }

    pub fn insert(
        &mut self,
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        thresholds: AlertThresholds,
    ) {
        self.entries
            .insert((venue_id.into(), product_id.into()), thresholds);
    }
}

impl ProductCatalog for StaticCatalog {
    fn thresholds(&self, venue_id: &str, product_id: &str) -> Option<AlertThresholds> {
        self.entries
            .get(&(venue_id.to_string(), product_id.to_string()))
            .or_else(|| self.entries.get(&("*".to_string(), product_id.to_string())))
            .copied()
    }
}
