//! # Monthly View
//!
//! Read model for one month: entries, aggregates, and a virtual opening
//! line synthesized from the carry-forward. The opening line is never
//! persisted.
//!
//! ```text
//! ┌────────────┬──────────┬───────┬──────┬─────────┬─────────┬─────────┐
//! │ date       │ kind     │ added │ used │ expired │ damaged │ balance │
//! ├────────────┼──────────┼───────┼──────┼─────────┼─────────┼─────────┤
//! │ 2025-01-01 │ OPENING* │     - │    - │       - │       - │      12 │
//! │ 2025-01-04 │ ADDED    │    24 │    6 │       0 │       0 │      30 │
//! │ 2025-01-09 │ SOLD     │     0 │    0 │       0 │       0 │      30 │
//! └────────────┴──────────┴───────┴──────┴─────────┴─────────┴─────────┘
//!   * virtual
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ledger::MonthlyLedger;
use crate::period::YearMonth;
use crate::types::{LedgerEntry, MonthlyTotals};

/// Synthesized opening balance line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OpeningLine {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub balance: i64,
    /// Always true; the line exists only in this view.
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
}

/// One month as shown to a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyView {
    pub venue_id: String,
    pub product_id: String,
    pub period: YearMonth,
    pub opening: Option<OpeningLine>,
    pub entries: Vec<LedgerEntry>,
    pub carry_forward: i64,
    pub expired_carry_forward_stock: i64,
    pub totals: MonthlyTotals,
    pub closing_balance: i64,
    /// False when no document exists yet for the month.
    pub persisted: bool,
}

impl MonthlyView {
    /// View of an existing document.
    pub fn of_document(doc: &MonthlyLedger) -> Self {
        MonthlyView {
            venue_id: doc.venue_id.clone(),
            product_id: doc.product_id.clone(),
            period: doc.period,
            opening: opening_line(doc.period, doc.carry_forward),
            entries: doc.entries.clone(),
            carry_forward: doc.carry_forward,
            expired_carry_forward_stock: doc.expired_carry_forward_stock,
            totals: doc.totals,
            closing_balance: doc.closing_balance,
            persisted: true,
        }
    }

    /// View of a month with no document, opening at the prior closing.
    pub fn empty(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        period: YearMonth,
        previous_closing: i64,
    ) -> Self {
        MonthlyView {
            venue_id: venue_id.into(),
            product_id: product_id.into(),
            period,
            opening: opening_line(period, previous_closing),
            entries: Vec::new(),
            carry_forward: previous_closing,
            expired_carry_forward_stock: 0,
            totals: MonthlyTotals::default(),
            closing_balance: previous_closing.max(0),
            persisted: false,
        }
    }
}

fn opening_line(period: YearMonth, balance: i64) -> Option<OpeningLine> {
    (balance > 0).then(|| OpeningLine {
        date: period.first_day(),
        balance,
        is_virtual: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_opening_line_only_when_positive() {
        let jan = YearMonth::new(2025, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();

        let doc = MonthlyLedger::new("v1", "p1", jan, 12, now);
        let view = MonthlyView::of_document(&doc);
        let opening = view.opening.unwrap();
        assert_eq!(opening.balance, 12);
        assert!(opening.is_virtual);
        assert_eq!(opening.date, jan.first_day());

        let doc = MonthlyLedger::new("v1", "p1", jan, 0, now);
        assert!(MonthlyView::of_document(&doc).opening.is_none());
    }

    #[test]
    fn test_empty_view_is_not_persisted() {
        let feb = YearMonth::new(2025, 2).unwrap();
        let view = MonthlyView::empty("v1", "p1", feb, 7);
        assert!(!view.persisted);
        assert_eq!(view.closing_balance, 7);
        assert!(view.entries.is_empty());
    }

    #[test]
    fn test_opening_serializes_virtual_flag() {
        let line = OpeningLine {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            balance: 3,
            is_virtual: true,
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["virtual"], true);
    }
}
