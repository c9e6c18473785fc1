//! # Balance Recalculation
//!
//! Recomputes every entry's running balance from a carry-forward anchor.
//!
//! ## Algorithm
//! ```text
//! running = max(0, carry_forward - expired_carry_forward_stock)
//!
//! for entry in entries (date, then seq):
//!     running = running + added - used - expired - damaged
//!     if running < 0 { record clamp; running = 0 }
//!     entry.balance = running
//!
//! closing_balance = running
//! ```
//!
//! A pure function of its inputs: running it twice on the same entries gives
//! the same balances. Clamps are returned rather than hidden so the caller
//! can log and count them.

use serde::{Deserialize, Serialize};

use crate::types::LedgerEntry;

/// Marker used in [`ClampEvent::entry_id`] when the opening anchor clamps.
pub const OPENING_ANCHOR: &str = "opening";

/// One place where the zero floor was engaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClampEvent {
    /// Entry whose balance was floored, or [`OPENING_ANCHOR`].
    pub entry_id: String,
    /// The balance before flooring.
    pub unclamped: i64,
}

/// Result of one recalculation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcOutcome {
    pub closing_balance: i64,
    pub clamps: Vec<ClampEvent>,
}

impl RecalcOutcome {
    /// True if the zero floor was engaged anywhere.
    pub fn clamped(&self) -> bool {
        !self.clamps.is_empty()
    }
}

/// Recomputes running balances in place.
///
/// `entries` must already be in ledger order; see
/// [`MonthlyLedger::finalize`](crate::ledger::MonthlyLedger::finalize).
pub fn recalculate(
    carry_forward: i64,
    expired_carry_forward_stock: i64,
    entries: &mut [LedgerEntry],
) -> RecalcOutcome {
    let mut clamps = Vec::new();

    let mut running = carry_forward - expired_carry_forward_stock;
    if running < 0 {
        clamps.push(ClampEvent {
            entry_id: OPENING_ANCHOR.to_string(),
            unclamped: running,
        });
        running = 0;
    }

    for entry in entries.iter_mut() {
        running += entry.breakdown.net();
        if running < 0 {
            clamps.push(ClampEvent {
                entry_id: entry.id.clone(),
                unclamped: running,
            });
            running = 0;
        }
        entry.balance = running;
    }

    RecalcOutcome {
        closing_balance: running,
        clamps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayBreakdown, EntryKind};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn entry(id: &str, day: u32, breakdown: DayBreakdown) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            seq: day,
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            kind: EntryKind::Added,
            quantity: breakdown.added,
            breakdown,
            balance: -1,
            batch: None,
            deductions: Vec::new(),
            unallocated: 0,
            actor: None,
            note: None,
            recorded_at: Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_running_balance() {
        let mut entries = vec![
            entry("a", 1, DayBreakdown { added: 100, used: 30, ..Default::default() }),
            entry("b", 15, DayBreakdown { added: 50, ..Default::default() }),
            entry("c", 20, DayBreakdown { expired: 20, ..Default::default() }),
        ];

        let outcome = recalculate(0, 0, &mut entries);

        assert_eq!(entries[0].balance, 70);
        assert_eq!(entries[1].balance, 120);
        assert_eq!(entries[2].balance, 100);
        assert_eq!(outcome.closing_balance, 100);
        assert!(!outcome.clamped());
    }

    #[test]
    fn test_clamp_is_reported() {
        let mut entries = vec![
            entry("a", 1, DayBreakdown { damaged: 8, ..Default::default() }),
            entry("b", 2, DayBreakdown { added: 10, ..Default::default() }),
        ];

        let outcome = recalculate(5, 0, &mut entries);

        assert_eq!(entries[0].balance, 0);
        assert_eq!(entries[1].balance, 10);
        assert_eq!(outcome.closing_balance, 10);
        assert_eq!(
            outcome.clamps,
            vec![ClampEvent {
                entry_id: "a".to_string(),
                unclamped: -3
            }]
        );
    }

    #[test]
    fn test_expired_carry_forward_reduces_anchor() {
        let mut entries = vec![entry("a", 3, DayBreakdown { added: 4, ..Default::default() })];
        let outcome = recalculate(10, 6, &mut entries);
        assert_eq!(entries[0].balance, 8);
        assert_eq!(outcome.closing_balance, 8);

        let outcome = recalculate(2, 6, &mut entries);
        assert_eq!(outcome.clamps[0].entry_id, OPENING_ANCHOR);
        assert_eq!(outcome.closing_balance, 4);
    }

    #[test]
    fn test_rerun_is_stable() {
        let mut entries = vec![
            entry("a", 1, DayBreakdown { added: 7, used: 2, ..Default::default() }),
            entry("b", 2, DayBreakdown { damaged: 1, ..Default::default() }),
        ];
        let first = recalculate(3, 0, &mut entries);
        let snapshot = entries.clone();
        let second = recalculate(3, 0, &mut entries);
        assert_eq!(first, second);
        assert_eq!(snapshot, entries);
    }
}
