//! # Domain Types
//!
//! Core ledger types used throughout Stockbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  MonthlyLedger (ledger.rs)                                             │
//! │  └── entries: Vec<LedgerEntry>                                         │
//! │        ├── kind         ADDED | SOLD | EXPIRED | DAMAGED | ...         │
//! │        ├── breakdown    DayBreakdown { added, used, expired, damaged } │
//! │        ├── batch        Option<BatchInfo>   (batch-bearing kinds)      │
//! │        └── deductions   Vec<BatchDeduction> (consuming kinds)          │
//! │                                                                         │
//! │  Batch-bearing: ADDED, RETURNED, ADJUSTMENT (+)                        │
//! │  Consuming:     SOLD, EXPIRED, DAMAGED, ADJUSTMENT (-)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Counting Rule
//! A sale's quantity lives on the SOLD entry for audit, but the usage itself
//! is marked on the originating batch entry's `breakdown.used`. SOLD entries
//! keep a zero breakdown, so monthly totals never count a sale twice.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::period::YearMonth;

// =============================================================================
// Entry Kind
// =============================================================================

/// The kind of stock movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Stock received into a new batch.
    Added,
    /// Stock sold; drawn from batches FIFO.
    Sold,
    /// Stock written off past its expiry date.
    Expired,
    /// Stock written off as damaged.
    Damaged,
    /// Stock returned to the shelf; opens a new batch.
    Returned,
    /// Manual correction, positive or negative.
    Adjustment,
}

impl EntryKind {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Added => "ADDED",
            EntryKind::Sold => "SOLD",
            EntryKind::Expired => "EXPIRED",
            EntryKind::Damaged => "DAMAGED",
            EntryKind::Returned => "RETURNED",
            EntryKind::Adjustment => "ADJUSTMENT",
        }
    }

    /// Whether an entry of this kind and signed quantity opens a batch.
    pub fn opens_batch(&self, quantity: i64) -> bool {
        match self {
            EntryKind::Added | EntryKind::Returned => true,
            EntryKind::Adjustment => quantity > 0,
            _ => false,
        }
    }

    /// Whether consumption through this kind is marked on the source batch
    /// entry's `used` column (sales and negative adjustments).
    pub fn marks_usage(&self, quantity: i64) -> bool {
        match self {
            EntryKind::Sold => true,
            EntryKind::Adjustment => quantity < 0,
            _ => false,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADDED" => Ok(EntryKind::Added),
            "SOLD" => Ok(EntryKind::Sold),
            "EXPIRED" => Ok(EntryKind::Expired),
            "DAMAGED" => Ok(EntryKind::Damaged),
            "RETURNED" => Ok(EntryKind::Returned),
            "ADJUSTMENT" => Ok(EntryKind::Adjustment),
            other => Err(ValidationError::InvalidFormat {
                field: "kind".to_string(),
                reason: format!("unknown entry kind '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Day Breakdown
// =============================================================================

/// Non-negative display columns for one entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DayBreakdown {
    pub added: i64,
    pub used: i64,
    pub expired: i64,
    pub damaged: i64,
}

impl DayBreakdown {
    /// Net movement this entry applies to the running balance.
    #[inline]
    pub fn net(&self) -> i64 {
        self.added - self.used - self.expired - self.damaged
    }

    /// True when every column is zero.
    pub fn is_zero(&self) -> bool {
        *self == DayBreakdown::default()
    }
}

// =============================================================================
// Batches
// =============================================================================

/// Batch details carried by a batch-bearing entry.
///
/// Immutable apart from `remaining_quantity`, which only decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchInfo {
    pub batch_number: String,
    #[ts(as = "Option<String>")]
    pub expire_date: Option<NaiveDate>,
    /// Unit cost in minor currency units.
    pub unit_cost_cents: i64,
    pub original_quantity: i64,
    pub remaining_quantity: i64,
}

/// One batch drawn down by a consuming entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeduction {
    pub batch_number: String,
    pub deducted: i64,
    #[ts(as = "Option<String>")]
    pub expire_date: Option<NaiveDate>,
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// One dated stock movement inside a monthly document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    /// Generated UUID v4.
    pub id: String,
    /// Insertion order within the document; breaks same-day ties.
    pub seq: u32,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub kind: EntryKind,
    /// Signed quantity (negative only for downward adjustments).
    pub quantity: i64,
    pub breakdown: DayBreakdown,
    /// Running balance after this entry.
    pub balance: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deductions: Vec<BatchDeduction>,
    /// Quantity no batch could cover (only under the flag-unbacked policy).
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unallocated: i64,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl LedgerEntry {
    /// Sum of all batch deductions.
    pub fn deducted_total(&self) -> i64 {
        self.deductions.iter().map(|d| d.deducted).sum()
    }

    /// Checks that deductions plus any unallocated remainder account for
    /// the consumed quantity.
    pub fn deductions_balance(&self) -> bool {
        match self.kind {
            EntryKind::Sold | EntryKind::Expired | EntryKind::Damaged => {
                self.deducted_total() + self.unallocated == self.quantity
            }
            EntryKind::Adjustment if self.quantity < 0 => {
                self.deducted_total() + self.unallocated == -self.quantity
            }
            _ => self.deductions.is_empty(),
        }
    }
}

// =============================================================================
// Keys and Totals
// =============================================================================

/// Unique key of a monthly document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerKey {
    pub venue_id: String,
    pub product_id: String,
    pub period: YearMonth,
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.venue_id, self.product_id, self.period)
    }
}

/// Monthly aggregates derived from entry breakdowns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyTotals {
    pub total_stock_added: i64,
    pub total_used_stock: i64,
    pub total_expired_stock: i64,
    pub total_damage_stock: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_round_trip_names() {
        assert_eq!("sold".parse::<EntryKind>().unwrap(), EntryKind::Sold);
        assert_eq!(EntryKind::Adjustment.to_string(), "ADJUSTMENT");
        assert!("transfer".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_batch_opening_kinds() {
        assert!(EntryKind::Added.opens_batch(10));
        assert!(EntryKind::Returned.opens_batch(2));
        assert!(EntryKind::Adjustment.opens_batch(3));
        assert!(!EntryKind::Adjustment.opens_batch(-3));
        assert!(!EntryKind::Sold.opens_batch(5));
    }

    #[test]
    fn test_usage_marking_kinds() {
        assert!(EntryKind::Sold.marks_usage(5));
        assert!(EntryKind::Adjustment.marks_usage(-1));
        assert!(!EntryKind::Expired.marks_usage(5));
        assert!(!EntryKind::Damaged.marks_usage(5));
    }

    #[test]
    fn test_breakdown_net() {
        let b = DayBreakdown {
            added: 100,
            used: 30,
            expired: 5,
            damaged: 2,
        };
        assert_eq!(b.net(), 63);
        assert!(DayBreakdown::default().is_zero());
    }

    #[test]
    fn test_entry_kind_serializes_upper_case() {
        let json = serde_json::to_string(&EntryKind::Returned).unwrap();
        assert_eq!(json, "\"RETURNED\"");
    }
}
