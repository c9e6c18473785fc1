//! # Monthly Summary
//!
//! A read-optimized projection of one monthly document. Rebuilt from the
//! document on every write and never used as a source of truth.
//!
//! ```text
//! current   = closing balance
//! reserved  = remaining stock in batches already past expiry
//! available = max(0, current - reserved)
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::fifo::Batch;
use crate::ledger::MonthlyLedger;
use crate::period::YearMonth;
use crate::types::EntryKind;

/// Per-month stock figures for dashboards and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlySummary {
    pub venue_id: String,
    pub product_id: String,
    pub period: YearMonth,
    pub current_stock: i64,
    /// Held back from sale because the batch has expired.
    pub reserved_stock: i64,
    pub available_stock: i64,
    /// Units received (ADDED).
    pub purchases: i64,
    /// Units sold, including any unbacked quantity.
    pub sales: i64,
    /// Net signed adjustments.
    pub adjustments: i64,
    /// Expired, damaged and expired carry-forward stock.
    pub waste: i64,
    pub returns: i64,
    pub unbacked_sales: i64,
    /// Remaining batch stock at unit cost.
    pub stock_value_cents: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl MonthlySummary {
    /// Derives the summary from a finalized document.
    ///
    /// `batches` is the product's full batch list; only batches entered by
    /// the cut-off (`as_of`, capped at month end) count toward reserved
    /// stock and stock value.
    pub fn derive(
        doc: &MonthlyLedger,
        batches: &[Batch],
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        let cutoff = as_of.min(doc.period.last_day());

        let mut summary = MonthlySummary {
            venue_id: doc.venue_id.clone(),
            product_id: doc.product_id.clone(),
            period: doc.period,
            current_stock: doc.closing_balance,
            reserved_stock: 0,
            available_stock: 0,
            purchases: 0,
            sales: 0,
            adjustments: 0,
            waste: doc.totals.total_expired_stock
                + doc.totals.total_damage_stock
                + doc.expired_carry_forward_stock,
            returns: 0,
            unbacked_sales: 0,
            stock_value_cents: 0,
            updated_at: now,
        };

        for entry in &doc.entries {
            match entry.kind {
                EntryKind::Added => summary.purchases += entry.quantity,
                EntryKind::Sold => summary.sales += entry.quantity,
                EntryKind::Adjustment => summary.adjustments += entry.quantity,
                EntryKind::Returned => summary.returns += entry.quantity,
                EntryKind::Expired | EntryKind::Damaged => {}
            }
            summary.unbacked_sales += entry.unallocated;
        }

        for batch in batches.iter().filter(|b| b.entry_date <= cutoff) {
            if batch.is_expired_on(cutoff) {
                summary.reserved_stock += batch.remaining_quantity;
            }
            summary.stock_value_cents += batch.remaining_quantity * batch.unit_cost_cents;
        }

        summary.available_stock = (summary.current_stock - summary.reserved_stock).max(0);
        summary
    }
}
