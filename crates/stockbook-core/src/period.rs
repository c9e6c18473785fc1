//! # Ledger Periods
//!
//! Calendar months as ledger keys, with year rollover.
//!
//! ```text
//! 2024-11 ──► 2024-12 ──► 2025-01 ──► 2025-02
//!                  ▲           │
//!                  └───────────┘
//!             previous() wraps January back to December of year - 1
//! ```

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// A calendar month (year, month 1-12).
///
/// Ordering is chronological: field order is `year` then `month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Creates a period, rejecting months outside 1-12.
    pub fn new(year: i32, month: u32) -> CoreResult<Self> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CoreError::InvalidPeriod { year, month });
        }
        Ok(YearMonth { year, month })
    }

    /// The period a date falls in.
    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The prior month, wrapping January to December of the previous year.
    ///
    /// ## Example
    /// ```rust
    /// use stockbook_core::period::YearMonth;
    ///
    /// let jan = YearMonth::new(2025, 1).unwrap();
    /// assert_eq!(jan.previous(), YearMonth::new(2024, 12).unwrap());
    /// ```
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            YearMonth {
                year: self.year - 1,
                month: 12,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The following month, wrapping December to January of the next year.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            YearMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First calendar day of the month.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last calendar day of the month.
    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whether the date falls inside this month.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Every month from `self` through `end`, inclusive. Empty if `end < self`.
    pub fn through(&self, end: YearMonth) -> Vec<YearMonth> {
        let mut out = Vec::new();
        let mut cursor = *self;
        while cursor <= end {
            out.push(cursor);
            cursor = cursor.next();
        }
        out
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_wraps_year() {
        let jan = YearMonth::new(2025, 1).unwrap();
        assert_eq!(jan.previous(), YearMonth { year: 2024, month: 12 });

        let mar = YearMonth::new(2025, 3).unwrap();
        assert_eq!(mar.previous(), YearMonth { year: 2025, month: 2 });
    }

    #[test]
    fn test_next_wraps_year() {
        let dec = YearMonth::new(2024, 12).unwrap();
        assert_eq!(dec.next(), YearMonth { year: 2025, month: 1 });
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(YearMonth::new(2025, 0).is_err());
        assert!(YearMonth::new(2025, 13).is_err());
    }

    #[test]
    fn test_month_bounds() {
        let feb = YearMonth::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(feb.contains(NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()));
        assert!(!feb.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
    }

    #[test]
    fn test_through_spans_year_boundary() {
        let nov = YearMonth::new(2024, 11).unwrap();
        let feb = YearMonth::new(2025, 2).unwrap();
        let months: Vec<String> = nov.through(feb).iter().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
        assert!(feb.through(nov).is_empty());
    }

    #[test]
    fn test_ordering_is_chronological() {
        let a = YearMonth::new(2024, 12).unwrap();
        let b = YearMonth::new(2025, 1).unwrap();
        assert!(a < b);
    }
}
