//! # FIFO Batch Allocation
//!
//! Plans which batches a consuming entry draws from. Planning is pure: it
//! reads a snapshot of outstanding batches and returns deductions. The
//! [`LedgerBook`](crate::book::LedgerBook) applies the plan only once the
//! whole quantity is accounted for.
//!
//! ## Allocation Walk
//! ```text
//! batches (entry date, period, seq) ──► filter ──► order ──► take until covered
//!                                        │          │
//!                                        │          └── ExpiredFirst puts
//!                                        │              expired lots in front
//!                                        ├── remaining > 0
//!                                        ├── entered on or before the event
//!                                        └── not expired (when skipping)
//!
//! B1 (5) ─┐
//! B2 (5) ─┼─► sell 7 ─► B1 -5, B2 -2 ─► B1 0 left, B2 3 left
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::ledger::MonthlyLedger;
use crate::period::YearMonth;
use crate::types::BatchDeduction;

/// Where a batch lives: its document and originating entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchLocation {
    pub period: YearMonth,
    pub entry_id: String,
}

/// A batch with its current remaining quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_number: String,
    pub entry_date: NaiveDate,
    pub expire_date: Option<NaiveDate>,
    pub unit_cost_cents: i64,
    pub original_quantity: i64,
    pub remaining_quantity: i64,
    pub location: BatchLocation,
    pub seq: u32,
}

impl Batch {
    /// Expired strictly before `date`.
    #[inline]
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expire_date.map_or(false, |e| e < date)
    }

    /// Still good on `today` but expires on or before `horizon`.
    pub fn expires_by(&self, today: NaiveDate, horizon: NaiveDate) -> bool {
        self.expire_date.map_or(false, |e| e >= today && e <= horizon)
    }

    fn sort_key(&self) -> (NaiveDate, YearMonth, u32) {
        (self.entry_date, self.location.period, self.seq)
    }
}

/// Collects every batch in the given documents, oldest first.
pub fn collect_batches<'a, I>(ledgers: I) -> Vec<Batch>
where
    I: IntoIterator<Item = &'a MonthlyLedger>,
{
    let mut batches: Vec<Batch> = ledgers
        .into_iter()
        .flat_map(|doc| {
            doc.entries.iter().filter_map(move |entry| {
                entry.batch.as_ref().map(|info| Batch {
                    batch_number: info.batch_number.clone(),
                    entry_date: entry.date,
                    expire_date: info.expire_date,
                    unit_cost_cents: info.unit_cost_cents,
                    original_quantity: info.original_quantity,
                    remaining_quantity: info.remaining_quantity,
                    location: BatchLocation {
                        period: doc.period,
                        entry_id: entry.id.clone(),
                    },
                    seq: entry.seq,
                })
            })
        })
        .collect();

    batches.sort_by_key(Batch::sort_key);
    batches
}

// =============================================================================
// Allocation Plan
// =============================================================================

/// Batch ordering for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOrder {
    /// Oldest entry date first.
    Fifo,
    /// Already-expired batches first, then FIFO.
    ExpiredFirst,
}

/// Parameters of one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRequest {
    pub quantity: i64,
    /// Event date; batches entered after it are invisible.
    pub as_of: NaiveDate,
    /// Leave batches expired before `as_of` untouched.
    pub skip_expired: bool,
    pub order: DrawOrder,
}

/// One planned deduction against a located batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeduction {
    pub location: BatchLocation,
    pub deduction: BatchDeduction,
}

/// The result of planning a draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub deductions: Vec<PlannedDeduction>,
    /// Quantity no batch could cover.
    pub unallocated: i64,
}

impl Allocation {
    /// Total quantity covered by batches.
    pub fn allocated(&self) -> i64 {
        self.deductions.iter().map(|d| d.deduction.deducted).sum()
    }

    /// True when batches cover the full quantity.
    pub fn is_complete(&self) -> bool {
        self.unallocated == 0
    }

    /// Deductions in entry form.
    pub fn batch_deductions(&self) -> Vec<BatchDeduction> {
        self.deductions.iter().map(|d| d.deduction.clone()).collect()
    }
}

/// Batches a draw may touch, in draw order.
pub fn eligible<'a>(batches: &'a [Batch], req: &DrawRequest) -> Vec<&'a Batch> {
    let mut candidates: Vec<&Batch> = batches
        .iter()
        .filter(|b| b.remaining_quantity > 0)
        .filter(|b| b.entry_date <= req.as_of)
        .filter(|b| !(req.skip_expired && b.is_expired_on(req.as_of)))
        .collect();

    candidates.sort_by_key(|b| b.sort_key());

    if req.order == DrawOrder::ExpiredFirst {
        // Stable: FIFO order is kept inside each group.
        candidates.sort_by_key(|b| !b.is_expired_on(req.as_of));
    }

    candidates
}

/// Quantity a draw could cover right now.
pub fn available(batches: &[Batch], as_of: NaiveDate, skip_expired: bool) -> i64 {
    let req = DrawRequest {
        quantity: 0,
        as_of,
        skip_expired,
        order: DrawOrder::Fifo,
    };
    eligible(batches, &req)
        .iter()
        .map(|b| b.remaining_quantity)
        .sum()
}

/// Plans a draw across eligible batches.
///
/// Never fails: any shortfall is reported in [`Allocation::unallocated`] and
/// the caller decides whether that is acceptable.
pub fn allocate(batches: &[Batch], req: &DrawRequest) -> Allocation {
    let mut deductions = Vec::new();
    let mut remaining = req.quantity;

    for batch in eligible(batches, req) {
        if remaining <= 0 {
            break;
        }

        let take = remaining.min(batch.remaining_quantity);
        deductions.push(PlannedDeduction {
            location: batch.location.clone(),
            deduction: BatchDeduction {
                batch_number: batch.batch_number.clone(),
                deducted: take,
                expire_date: batch.expire_date,
            },
        });
        remaining -= take;
    }

    Allocation {
        deductions,
        unallocated: remaining.max(0),
    }
}

/// Plans a draw from one named batch.
///
/// ## Errors
/// - `BatchNotFound` if no batch entered on or before `as_of` has that number
/// - `BatchExhausted` if it holds less than `quantity`
pub fn allocate_named(
    batches: &[Batch],
    batch_number: &str,
    quantity: i64,
    as_of: NaiveDate,
) -> CoreResult<Allocation> {
    let batch = batches
        .iter()
        .find(|b| b.batch_number == batch_number && b.entry_date <= as_of)
        .ok_or_else(|| CoreError::BatchNotFound(batch_number.to_string()))?;

    if batch.remaining_quantity < quantity {
        return Err(CoreError::BatchExhausted {
            batch_number: batch_number.to_string(),
            remaining: batch.remaining_quantity,
            requested: quantity,
        });
    }

    Ok(Allocation {
        deductions: vec![PlannedDeduction {
            location: batch.location.clone(),
            deduction: BatchDeduction {
                batch_number: batch.batch_number.clone(),
                deducted: quantity,
                expire_date: batch.expire_date,
            },
        }],
        unallocated: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn batch(number: &str, entered: NaiveDate, remaining: i64, expires: Option<NaiveDate>) -> Batch {
        Batch {
            batch_number: number.to_string(),
            entry_date: entered,
            expire_date: expires,
            unit_cost_cents: 100,
            original_quantity: remaining,
            remaining_quantity: remaining,
            location: BatchLocation {
                period: YearMonth::from_date(entered),
                entry_id: format!("entry-{}", number),
            },
            seq: 0,
        }
    }

    fn fifo(quantity: i64, as_of: NaiveDate) -> DrawRequest {
        DrawRequest {
            quantity,
            as_of,
            skip_expired: true,
            order: DrawOrder::Fifo,
        }
    }

    #[test]
    fn test_sell_seven_from_two_batches_of_five() {
        let batches = vec![
            batch("B1", day(1, 2), 5, None),
            batch("B2", day(1, 5), 5, None),
        ];

        let plan = allocate(&batches, &fifo(7, day(1, 10)));

        assert!(plan.is_complete());
        assert_eq!(plan.allocated(), 7);
        let taken: Vec<(&str, i64)> = plan
            .deductions
            .iter()
            .map(|d| (d.deduction.batch_number.as_str(), d.deduction.deducted))
            .collect();
        assert_eq!(taken, vec![("B1", 5), ("B2", 2)]);
    }

    #[test]
    fn test_shortfall_is_reported() {
        let batches = vec![batch("B1", day(1, 2), 4, None)];
        let plan = allocate(&batches, &fifo(6, day(1, 3)));
        assert_eq!(plan.allocated(), 4);
        assert_eq!(plan.unallocated, 2);
    }

    #[test]
    fn test_future_batches_are_invisible() {
        let batches = vec![batch("LATE", day(1, 20), 10, None)];
        let plan = allocate(&batches, &fifo(1, day(1, 10)));
        assert_eq!(plan.unallocated, 1);
        assert_eq!(available(&batches, day(1, 10), true), 0);
    }

    #[test]
    fn test_expired_batches_skipped_for_sales() {
        let batches = vec![
            batch("OLD", day(1, 1), 5, Some(day(1, 5))),
            batch("NEW", day(1, 3), 5, None),
        ];
        let plan = allocate(&batches, &fifo(3, day(1, 10)));
        assert_eq!(plan.deductions[0].deduction.batch_number, "NEW");

        let mut keep = fifo(3, day(1, 10));
        keep.skip_expired = false;
        let plan = allocate(&batches, &keep);
        assert_eq!(plan.deductions[0].deduction.batch_number, "OLD");
    }

    #[test]
    fn test_expired_first_order() {
        let batches = vec![
            batch("FRESH", day(1, 1), 5, Some(day(3, 1))),
            batch("STALE", day(1, 3), 5, Some(day(1, 8))),
        ];
        let req = DrawRequest {
            quantity: 2,
            as_of: day(1, 10),
            skip_expired: false,
            order: DrawOrder::ExpiredFirst,
        };
        let plan = allocate(&batches, &req);
        assert_eq!(plan.deductions[0].deduction.batch_number, "STALE");
    }

    #[test]
    fn test_named_batch() {
        let batches = vec![batch("B1", day(1, 2), 5, None)];
        let plan = allocate_named(&batches, "B1", 3, day(1, 4)).unwrap();
        assert_eq!(plan.allocated(), 3);

        assert!(matches!(
            allocate_named(&batches, "B9", 1, day(1, 4)),
            Err(CoreError::BatchNotFound(_))
        ));
        assert!(matches!(
            allocate_named(&batches, "B1", 6, day(1, 4)),
            Err(CoreError::BatchExhausted { remaining: 5, .. })
        ));
    }
}
