//! # Monthly Ledger Document
//!
//! One document per (venue, product, year, month). The document owns its
//! ordered entries, the carry-forward inherited from the prior month, the
//! monthly totals and the closing balance.
//!
//! ## Write Path
//! ```text
//! mutate entries ──► finalize() ──► persist
//!                     │
//!                     ├── sort entries (date, seq)
//!                     ├── aggregate totals from breakdowns
//!                     ├── recalculate running balances
//!                     └── check closing against the totals
//! ```
//!
//! `finalize()` is called explicitly by every writer; nothing happens
//! implicitly on save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::aggregate::{aggregate, closing_from_totals};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::period::YearMonth;
use crate::recalc::{recalculate, RecalcOutcome};
use crate::types::{LedgerEntry, LedgerKey, MonthlyTotals};

/// What [`MonthlyLedger::apply_carry_forward`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarryForwardChange {
    /// The document did not exist and was created.
    Created,
    /// Same value; nothing written.
    Unchanged,
    /// No entries yet; carry-forward and closing balance overwritten.
    Reset,
    /// Entries present; full recalculation anchored at the new value.
    Recalculated(RecalcOutcome),
}

impl CarryForwardChange {
    /// True if stored state changed.
    pub fn changed(&self) -> bool {
        !matches!(self, CarryForwardChange::Unchanged)
    }
}

/// The monthly ledger document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MonthlyLedger {
    pub venue_id: String,
    pub product_id: String,
    pub period: YearMonth,
    /// Opening balance inherited from the prior month's closing balance.
    pub carry_forward: i64,
    /// Carried-forward stock written off at month open because it had expired.
    pub expired_carry_forward_stock: i64,
    pub totals: MonthlyTotals,
    pub closing_balance: i64,
    /// Ordered by (date, seq) after `finalize()`.
    pub entries: Vec<LedgerEntry>,
    /// Next insertion counter.
    pub next_seq: u32,
    /// Optimistic concurrency version; 0 means never persisted.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl MonthlyLedger {
    /// Creates an empty document seeded with a carry-forward.
    pub fn new(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        period: YearMonth,
        carry_forward: i64,
        now: DateTime<Utc>,
    ) -> Self {
        MonthlyLedger {
            venue_id: venue_id.into(),
            product_id: product_id.into(),
            period,
            carry_forward,
            expired_carry_forward_stock: 0,
            totals: MonthlyTotals::default(),
            closing_balance: carry_forward.max(0),
            entries: Vec::new(),
            next_seq: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The document's unique key.
    pub fn key(&self) -> LedgerKey {
        LedgerKey {
            venue_id: self.venue_id.clone(),
            product_id: self.product_id.clone(),
            period: self.period,
        }
    }

    /// Whether the document has been written to storage at least once.
    #[inline]
    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Re-anchors the document at a new carry-forward.
    ///
    /// Unchanged input is a no-op, which keeps repeated creation calls
    /// idempotent.
    pub fn apply_carry_forward(&mut self, carry_forward: i64) -> CarryForwardChange {
        if carry_forward == self.carry_forward {
            return CarryForwardChange::Unchanged;
        }

        self.carry_forward = carry_forward;

        if self.entries.is_empty() {
            self.closing_balance = (carry_forward - self.expired_carry_forward_stock).max(0);
            return CarryForwardChange::Reset;
        }

        CarryForwardChange::Recalculated(self.finalize())
    }

    /// Appends an entry, assigning its insertion sequence.
    ///
    /// Returns the entry id. Call [`finalize`](Self::finalize) afterwards.
    pub fn push_entry(&mut self, mut entry: LedgerEntry) -> CoreResult<String> {
        if !self.period.contains(entry.date) {
            return Err(ValidationError::InvalidFormat {
                field: "date".to_string(),
                reason: format!("{} is outside {}", entry.date, self.period),
            }
            .into());
        }

        entry.seq = self.next_seq;
        self.next_seq += 1;

        let id = entry.id.clone();
        self.entries.push(entry);
        Ok(id)
    }

    /// Looks up an entry by id.
    pub fn entry(&self, id: &str) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Looks up an entry by id for mutation.
    pub fn entry_mut(&mut self, id: &str) -> CoreResult<&mut LedgerEntry> {
        let period = self.period;
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::EntryNotFound {
                entry_id: id.to_string(),
                period: period.to_string(),
            })
    }

    /// Normalizes the document before it is persisted.
    ///
    /// ## What This Does
    /// 1. Orders entries by event date, then insertion sequence
    /// 2. Recomputes monthly totals from entry breakdowns
    /// 3. Recomputes running balances and the closing balance
    /// 4. Logs every engagement of the zero floor
    pub fn finalize(&mut self) -> RecalcOutcome {
        self.entries.sort_by_key(|e| (e.date, e.seq));
        self.totals = aggregate(&self.entries);

        let outcome = recalculate(
            self.carry_forward,
            self.expired_carry_forward_stock,
            &mut self.entries,
        );
        self.closing_balance = outcome.closing_balance;

        for clamp in &outcome.clamps {
            warn!(
                key = %self.key(),
                entry_id = %clamp.entry_id,
                unclamped = clamp.unclamped,
                "Balance floor engaged; stock went negative"
            );
        }

        if !self.invariant_holds() {
            warn!(
                key = %self.key(),
                closing = self.closing_balance,
                expected = self.expected_closing(),
                "Closing balance diverges from monthly totals"
            );
        }

        outcome
    }

    /// Closing balance implied by carry-forward and totals.
    pub fn expected_closing(&self) -> i64 {
        closing_from_totals(
            self.carry_forward,
            self.expired_carry_forward_stock,
            &self.totals,
        )
    }

    /// Whether the closing balance matches the totals.
    pub fn invariant_holds(&self) -> bool {
        self.closing_balance == self.expected_closing()
    }

    /// Full consistency check: balance invariant, totals and deductions.
    pub fn check_invariant(&self) -> CoreResult<()> {
        if self.totals != aggregate(&self.entries) {
            return Err(self.violation("totals do not match entry breakdowns".to_string()));
        }

        if !self.invariant_holds() {
            return Err(self.violation(format!(
                "closing balance {} != expected {}",
                self.closing_balance,
                self.expected_closing()
            )));
        }

        if let Some(entry) = self.entries.iter().find(|e| !e.deductions_balance()) {
            return Err(self.violation(format!(
                "entry {} deductions {} do not cover quantity {}",
                entry.id,
                entry.deducted_total(),
                entry.quantity
            )));
        }

        Ok(())
    }

    fn violation(&self, detail: String) -> CoreError {
        CoreError::InvariantViolated {
            key: self.key().to_string(),
            detail,
        }
    }
}
