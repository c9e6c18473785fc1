//! # Monthly Aggregator
//!
//! Sums entry breakdowns into document totals and derives the closing
//! balance the document invariant expects:
//!
//! ```text
//! closing = max(0, carry_forward + added - used - expired
//!                  - expired_carry_forward_stock - damaged)
//! ```

use crate::types::{LedgerEntry, MonthlyTotals};

/// Sums the display breakdown of every entry.
///
/// Only batch-bearing entries ever carry `used`, so a sale is counted once,
/// against the batch it drew from.
pub fn aggregate(entries: &[LedgerEntry]) -> MonthlyTotals {
    entries.iter().fold(MonthlyTotals::default(), |mut acc, e| {
        acc.total_stock_added += e.breakdown.added;
        acc.total_used_stock += e.breakdown.used;
        acc.total_expired_stock += e.breakdown.expired;
        acc.total_damage_stock += e.breakdown.damaged;
        acc
    })
}

/// Closing balance implied by the totals, floored at zero.
pub fn closing_from_totals(
    carry_forward: i64,
    expired_carry_forward_stock: i64,
    totals: &MonthlyTotals,
) -> i64 {
    let raw = carry_forward + totals.total_stock_added
        - totals.total_used_stock
        - totals.total_expired_stock
        - expired_carry_forward_stock
        - totals.total_damage_stock;
    raw.max(0)
}
