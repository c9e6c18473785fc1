//! # stockbook-ledger: Ledger Service for Stockbook
//!
//! The write and query surface of the venue stock ledger. Callers record
//! stock movements through [`StockLedger`]; it keeps every month's document,
//! batch and summary consistent.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Ledger Service Architecture                       │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    StockLedger (service)                         │  │
//! │  │                                                                  │  │
//! │  │  record_addition / record_sale / record_expiry / record_damage  │  │
//! │  │  record_return / record_adjustment / ensure_document            │  │
//! │  │  current_balance / monthly_view / history / monthly_summary     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  KeyedLocks    │  │  LedgerBook    │  │  Repositories          │    │
//! │  │                │  │ (stockbook-    │  │  (stockbook-db)        │    │
//! │  │ one writer per │  │  core)         │  │                        │    │
//! │  │ venue+product  │  │ FIFO, recalc,  │  │ versioned documents,   │    │
//! │  │                │  │ carry-forward  │  │ summaries, alerts      │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  LedgerConfig  │  │ ProductCatalog │  │  Clock                 │    │
//! │  │  TOML + env    │  │ alert          │  │  "now" for audit       │    │
//! │  │                │  │ thresholds     │  │  and alert checks      │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`service`] - `StockLedger`, the orchestrator
//! - [`commands`] - Input shapes for the write operations
//! - [`config`] - Ledger configuration (database, policy, alerts)
//! - [`locks`] - Per-(venue, product) async mutexes
//! - [`catalog`] - Per-product alert thresholds
//! - [`clock`] - Time source
//! - [`error`] - Ledger error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stockbook_ledger::{LedgerConfig, NoCatalog, SellStock, StockLedger};
//!
//! let config = LedgerConfig::load_or_default(None);
//! let ledger = StockLedger::open(config, Arc::new(NoCatalog)).await?;
//!
//! let sale = ledger.record_sale(SellStock { /* ... */ }).await?;
//! println!("Balance after sale: {}", sale.balance);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod locks;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{NoCatalog, ProductCatalog, StaticCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use commands::{AddStock, AdjustStock, ReturnStock, SellStock, WriteOff};
pub use config::{AlertSettings, DatabaseSettings, LedgerConfig, LedgerSettings};
pub use error::{LedgerError, LedgerResult};
pub use locks::KeyedLocks;
pub use service::StockLedger;
