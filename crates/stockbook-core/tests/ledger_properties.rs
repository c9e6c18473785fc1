//! Ledger property tests
//!
//! Random movement sequences against a single (venue, product):
//! - Balance invariant holds for every document after every write
//! - Re-finalizing a document never changes it
//! - Rejected writes leave the book untouched
//! - Batch remaining never goes negative
//! - Months stay contiguous and chained however they are opened

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use stockbook_core::{
    BookPolicy, EntryKind, EntryRequest, LedgerBook, UnallocatedPolicy, YearMonth,
};

const V: &str = "arena-1";
const P: &str = "cola-330";

#[derive(Debug, Clone)]
struct Move {
    kind: EntryKind,
    month: u32,
    day: u32,
    quantity: i64,
    expires_in: Option<i64>,
}

fn kind_strategy() -> impl Strategy<Value = EntryKind> {
    prop_oneof![
        3 => Just(EntryKind::Added),
        3 => Just(EntryKind::Sold),
        1 => Just(EntryKind::Expired),
        1 => Just(EntryKind::Damaged),
        1 => Just(EntryKind::Returned),
        1 => Just(EntryKind::Adjustment),
    ]
}

fn move_strategy() -> impl Strategy<Value = Move> {
    (
        kind_strategy(),
        1u32..=3,
        1u32..=28,
        1i64..=25,
        proptest::option::of(0i64..=40),
        any::<bool>(),
    )
        .prop_map(|(kind, month, day, quantity, expires_in, negative)| Move {
            kind,
            month,
            day,
            quantity: if kind == EntryKind::Adjustment && negative {
                -quantity
            } else {
                quantity
            },
            expires_in,
        })
}

/// A write, or opening a month (possibly past a gap) with its inherited balance.
#[derive(Debug, Clone)]
enum Step {
    Record(Move),
    Ensure(u32),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => move_strategy().prop_map(Step::Record),
        1 => (1u32..=6).prop_map(Step::Ensure),
    ]
}

fn request(m: &Move, n: usize) -> EntryRequest {
    let date = NaiveDate::from_ymd_opt(2025, m.month, m.day).unwrap();
    let mut req = match m.kind {
        EntryKind::Added => {
            EntryRequest::addition(V, P, m.quantity, 90, format!("B{}", n), date)
        }
        EntryKind::Sold => EntryRequest::sale(V, P, m.quantity, date),
        EntryKind::Expired => EntryRequest::expiry(V, P, m.quantity, date),
        EntryKind::Damaged => EntryRequest::damage(V, P, m.quantity, date),
        EntryKind::Returned => EntryRequest::stock_return(V, P, m.quantity, date),
        EntryKind::Adjustment => EntryRequest::adjustment(V, P, m.quantity, "auditor", date),
    };
    if let Some(days) = m.expires_in {
        if m.kind.opens_batch(m.quantity) {
            req = req.with_expiry(date + chrono::Duration::days(days));
        }
    }
    req
}

fn policies() -> impl Strategy<Value = BookPolicy> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(flag, skip, rollover)| BookPolicy {
        unallocated: if flag {
            UnallocatedPolicy::FlagUnbacked
        } else {
            UnallocatedPolicy::Reject
        },
        skip_expired_batches: skip,
        expire_on_rollover: rollover,
    })
}

proptest! {
    #[test]
    fn prop_invariants_hold_after_every_write(
        moves in proptest::collection::vec(move_strategy(), 1..40),
        policy in policies(),
    ) {
        let now = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let mut book = LedgerBook::new(V, P);

        for (n, m) in moves.iter().enumerate() {
            let before = book.clone();
            match book.record(&request(m, n), &policy, now) {
                Ok(_) => {
                    prop_assert!(book.check_invariants().is_ok(), "{:?}", book.check_invariants());
                }
                Err(_) => prop_assert_eq!(&book, &before),
            }

            for batch in book.batches() {
                prop_assert!(batch.remaining_quantity >= 0);
                prop_assert!(batch.remaining_quantity <= batch.original_quantity);
            }
        }

        for doc in book.documents() {
            let mut again = doc.clone();
            again.finalize();
            prop_assert_eq!(&again, doc);
        }

        let latest = book.documents().last().map_or(0, |doc| doc.closing_balance);
        prop_assert_eq!(book.current_balance(), latest);
    }

    #[test]
    fn prop_carry_forward_chain_is_consistent(
        steps in proptest::collection::vec(step_strategy(), 1..30),
        policy in policies(),
    ) {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let mut book = LedgerBook::new(V, P);

        for (n, step) in steps.iter().enumerate() {
            match step {
                Step::Record(m) => {
                    let _ = book.record(&request(m, n), &policy, now);
                }
                Step::Ensure(month) => {
                    let period = YearMonth::new(2025, *month).unwrap();
                    book.ensure_document(period, None, &policy, now);
                    prop_assert!(book.document(period).is_some());
                }
            }
            prop_assert!(book.check_invariants().is_ok(), "{:?}", book.check_invariants());
        }

        let docs: Vec<_> = book.documents().collect();
        for pair in docs.windows(2) {
            prop_assert_eq!(pair[0].period.next(), pair[1].period);
            prop_assert_eq!(pair[1].carry_forward, pair[0].closing_balance);
        }

        let latest = docs.last().map_or(0, |doc| doc.closing_balance);
        prop_assert_eq!(book.current_balance(), latest);
    }
}
