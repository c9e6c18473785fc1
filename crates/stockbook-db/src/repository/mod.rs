//! # Repository Module
//!
//! Database repository implementations for Stockbook.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where Each Table Is Touched                          │
//! │                                                                         │
//! │  StockLedger::record_sale(...)                                         │
//! │       │                                                                 │
//! │       │  db.ledgers().list_for_product("v1", "p1")                     │
//! │       ▼                                                                 │
//! │  LedgerRepository                                                      │
//! │  ├── get / list_for_product                                            │
//! │  └── save_all(docs, summaries)  ── one transaction ──┐                 │
//! │                                                      │                 │
//! │  SummaryRepository                                   │                 │
//! │  └── upsert_with(conn, summary) ◄────────────────────┘                 │
//! │                                                                         │
//! │  AlertRepository                                                       │
//! │  ├── active_for / list_for_product                                     │
//! │  ├── apply_changes(changes)                                            │
//! │  └── resolve(id, by)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`LedgerRepository`](ledger::LedgerRepository) - Monthly ledger documents
//! - [`SummaryRepository`](summary::SummaryRepository) - Monthly summary projection
//! - [`AlertRepository`](alert::AlertRepository) - Stock alerts

pub mod alert;
pub mod ledger;
pub mod summary;
