//! # stockbook-core: Pure Ledger Logic for Stockbook
//!
//! This crate is the **heart** of Stockbook. It holds the monthly stock
//! ledger, FIFO batch allocation and balance rules as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                stockbook-ledger (StockLedger)                   │   │
//! │  │   record_sale, record_addition, monthly_view, history, ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockbook-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   book    │  │   fifo    │  │  recalc   │  │ aggregate │  │   │
//! │  │   │ LedgerBook│  │ allocate  │  │ balances  │  │  totals   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  ledger   │  │  summary  │  │   alert   │  │   view    │  │   │
//! │  │   │ documents │  │ projection│  │ thresholds│  │ opening   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 stockbook-db (Database Layer)                   │   │
//! │  │        SQLite documents, summaries, alerts, migrations          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`period`] - Calendar months with year rollover
//! - [`types`] - Entries, breakdowns, batches
//! - [`ledger`] - The monthly document and its `finalize()` step
//! - [`recalc`] - Running balance recalculation
//! - [`aggregate`] - Monthly totals
//! - [`fifo`] - Batch allocation
//! - [`book`] - All months of one (venue, product) and the record flow
//! - [`summary`], [`alert`], [`view`] - Read-side projections
//! - [`request`], [`validation`], [`error`] - Input and errors
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output; callers pass `now`
//! 2. **Integer Quantities**: whole units and cents as `i64`
//! 3. **Explicit Finalize**: every writer calls `finalize()` before persisting
//! 4. **Explicit Errors**: typed errors, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{NaiveDate, Utc};
//! use stockbook_core::{BookPolicy, EntryRequest, LedgerBook};
//!
//! let jan = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
//! let mut book = LedgerBook::new("arena-1", "cola-330");
//! let policy = BookPolicy::default();
//!
//! book.record(&EntryRequest::addition("arena-1", "cola-330", 5, 80, "B1", jan(1)), &policy, Utc::now()).unwrap();
//! book.record(&EntryRequest::addition("arena-1", "cola-330", 5, 80, "B2", jan(3)), &policy, Utc::now()).unwrap();
//! let sale = book.record(&EntryRequest::sale("arena-1", "cola-330", 7, jan(5)), &policy, Utc::now()).unwrap();
//!
//! assert_eq!(sale.deductions[0].deducted, 5);
//! assert_eq!(sale.deductions[1].deducted, 2);
//! assert_eq!(book.current_balance(), 3);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod alert;
pub mod book;
pub mod error;
pub mod fifo;
pub mod ledger;
pub mod period;
pub mod recalc;
pub mod request;
pub mod summary;
pub mod types;
pub mod validation;
pub mod view;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use alert::{
    AlertChanges, AlertCondition, AlertKind, AlertSeverity, AlertStatus, AlertThresholds,
    StockAlert,
};
pub use book::{BookPolicy, LedgerBook, UnallocatedPolicy};
pub use error::{CoreError, CoreResult, ValidationError};
pub use fifo::Batch;
pub use ledger::{CarryForwardChange, MonthlyLedger};
pub use period::YearMonth;
pub use request::EntryRequest;
pub use summary::MonthlySummary;
pub use types::*;
pub use view::{MonthlyView, OpeningLine};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest quantity a single entry may move.
///
/// Catches typos such as 10000 for 100 at the point of entry.
pub const MAX_ENTRY_QUANTITY: i64 = 1_000_000;

/// Maximum length of venue and product identifiers.
pub const MAX_ID_LENGTH: usize = 64;

/// Maximum length of a batch number.
pub const MAX_BATCH_NUMBER_LENGTH: usize = 50;

/// Maximum length of an audit note.
pub const MAX_NOTE_LENGTH: usize = 500;

/// Maximum length of an actor name recorded in the audit trail.
pub const MAX_ACTOR_LENGTH: usize = 100;
