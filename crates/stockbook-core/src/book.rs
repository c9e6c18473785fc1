//! # Ledger Book
//!
//! Every monthly document of one (venue, product), loaded together so that a
//! single operation can see all outstanding batches and keep the
//! carry-forward chain consistent.
//!
//! ## Record Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record(EntryRequest)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate ──► open month (fill gaps, write off expired carry-forward)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  batch-bearing?  ── yes ──► new batch on the entry                      │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  plan draw (FIFO / named batch) ──► shortfall? ──► policy decides       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  apply deductions to source batches (any month)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  push entry ──► propagate from earliest touched month                   │
//! │                   (re-resolve carry-forward, finalize, mark dirty)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On error the book is restored to its state before the call.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::fifo::{allocate, allocate_named, collect_batches, Allocation, Batch, DrawOrder, DrawRequest};
use crate::ledger::{CarryForwardChange, MonthlyLedger};
use crate::period::YearMonth;
use crate::request::EntryRequest;
use crate::summary::MonthlySummary;
use crate::types::{BatchInfo, DayBreakdown, EntryKind, LedgerEntry};
use crate::view::MonthlyView;

// =============================================================================
// Policy
// =============================================================================

/// What happens to sale quantity no batch can cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnallocatedPolicy {
    /// Fail the sale with `InsufficientStock`.
    #[default]
    Reject,
    /// Record the sale, flag the shortfall on the entry.
    FlagUnbacked,
}

impl UnallocatedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnallocatedPolicy::Reject => "reject",
            UnallocatedPolicy::FlagUnbacked => "flag_unbacked",
        }
    }
}

impl fmt::Display for UnallocatedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnallocatedPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(UnallocatedPolicy::Reject),
            "flag_unbacked" | "flag" => Ok(UnallocatedPolicy::FlagUnbacked),
            other => Err(ValidationError::InvalidFormat {
                field: "unallocated_policy".to_string(),
                reason: format!("unknown policy '{}'", other),
            }),
        }
    }
}

/// Ledger rules that vary by deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPolicy {
    pub unallocated: UnallocatedPolicy,
    /// Sales and negative adjustments never draw from expired batches.
    pub skip_expired_batches: bool,
    /// Opening a month writes off prior batches that expired before it.
    pub expire_on_rollover: bool,
}

impl Default for BookPolicy {
    fn default() -> Self {
        BookPolicy {
            unallocated: UnallocatedPolicy::Reject,
            skip_expired_batches: true,
            expire_on_rollover: true,
        }
    }
}

// =============================================================================
// Ledger Book
// =============================================================================

/// All monthly documents of one (venue, product).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBook {
    venue_id: String,
    product_id: String,
    months: BTreeMap<YearMonth, MonthlyLedger>,
    dirty: BTreeSet<YearMonth>,
}

impl LedgerBook {
    /// An empty book.
    pub fn new(venue_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        LedgerBook {
            venue_id: venue_id.into(),
            product_id: product_id.into(),
            months: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// A book over stored documents.
    ///
    /// ## Errors
    /// `InvariantViolated` if a document belongs to another key or a period
    /// appears twice.
    pub fn from_documents(
        venue_id: impl Into<String>,
        product_id: impl Into<String>,
        documents: Vec<MonthlyLedger>,
    ) -> CoreResult<Self> {
        let mut book = Self::new(venue_id, product_id);

        for doc in documents {
            if doc.venue_id != book.venue_id || doc.product_id != book.product_id {
                return Err(CoreError::InvariantViolated {
                    key: doc.key().to_string(),
                    detail: format!(
                        "document does not belong to {}/{}",
                        book.venue_id, book.product_id
                    ),
                });
            }
            let key = doc.key();
            if book.months.insert(doc.period, doc).is_some() {
                return Err(CoreError::InvariantViolated {
                    key: key.to_string(),
                    detail: "duplicate document".to_string(),
                });
            }
        }

        Ok(book)
    }

    pub fn venue_id(&self) -> &str {
        &self.venue_id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn document(&self, period: YearMonth) -> Option<&MonthlyLedger> {
        self.months.get(&period)
    }

    /// Documents in period order.
    pub fn documents(&self) -> impl Iterator<Item = &MonthlyLedger> {
        self.months.values()
    }

    pub fn first_period(&self) -> Option<YearMonth> {
        self.months.keys().next().copied()
    }

    pub fn latest_period(&self) -> Option<YearMonth> {
        self.months.keys().next_back().copied()
    }

    /// Documents changed since load or the last [`mark_persisted`](Self::mark_persisted).
    pub fn dirty_documents(&self) -> Vec<&MonthlyLedger> {
        self.dirty
            .iter()
            .filter_map(|p| self.months.get(p))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Records that dirty documents were stored: versions advance by one.
    pub fn mark_persisted(&mut self) {
        for period in std::mem::take(&mut self.dirty) {
            if let Some(doc) = self.months.get_mut(&period) {
                doc.version += 1;
            }
        }
    }

    // =========================================================================
    // Carry-Forward
    // =========================================================================

    /// Closing balance of the month before `period`, or 0 if there is none.
    ///
    /// January resolves to December of the previous year.
    pub fn previous_month_balance(&self, period: YearMonth) -> i64 {
        self.months
            .get(&period.previous())
            .map_or(0, |doc| doc.closing_balance)
    }

    /// Creates or re-anchors one month's document.
    ///
    /// A missing month is created through [`open_month`](Self::open_month),
    /// so any months between it and the existing ones are filled in and
    /// expired stock is written off at rollover. `carry_forward` then
    /// re-anchors it; `None` keeps the inherited balance.
    ///
    /// For an existing month, `None` re-resolves the prior month's closing
    /// balance. The earliest month has no prior month and keeps its anchor.
    ///
    /// Later months are re-anchored when the closing balance moves. Repeated
    /// calls with the same carry-forward change nothing.
    pub fn ensure_document(
        &mut self,
        period: YearMonth,
        carry_forward: Option<i64>,
        policy: &BookPolicy,
        now: DateTime<Utc>,
    ) -> CarryForwardChange {
        let created = !self.months.contains_key(&period);
        if created {
            self.open_month(period, policy, now);
        }

        let anchor = carry_forward.or_else(|| {
            self.months
                .get(&period.previous())
                .map(|doc| doc.closing_balance)
        });

        let applied = match (self.months.get_mut(&period), anchor) {
            (Some(doc), Some(cf)) => doc.apply_carry_forward(cf),
            _ => CarryForwardChange::Unchanged,
        };
        let change = if created {
            CarryForwardChange::Created
        } else {
            applied
        };

        if change.changed() {
            self.touch(period, now);
            self.propagate_from(period.next(), now);
            debug!(
                venue_id = %self.venue_id,
                product_id = %self.product_id,
                period = %period,
                carry_forward = ?anchor,
                change = ?change,
                "Ensured ledger document"
            );
        }

        change
    }

    /// Makes sure `period` has a document, creating every missing month
    /// between it and the existing ones.
    ///
    /// Each new month inherits the prior month's closing balance. With
    /// `expire_on_rollover`, stock in batches that expired before the new
    /// month's first day is written off into its expired carry-forward.
    ///
    /// Returns the months created, oldest first.
    pub fn open_month(
        &mut self,
        period: YearMonth,
        policy: &BookPolicy,
        now: DateTime<Utc>,
    ) -> Vec<YearMonth> {
        if self.months.contains_key(&period) {
            return Vec::new();
        }

        let lo = self.first_period().map_or(period, |first| first.min(period));
        let hi = self.latest_period().map_or(period, |latest| latest.max(period));

        let mut created = Vec::new();
        for month in lo.through(hi) {
            if self.months.contains_key(&month) {
                continue;
            }

            let carry_forward = self.previous_month_balance(month);
            let mut doc = MonthlyLedger::new(
                self.venue_id.clone(),
                self.product_id.clone(),
                month,
                carry_forward,
                now,
            );

            if policy.expire_on_rollover {
                let written_off = self.write_off_expired_before(month, now);
                if written_off > 0 {
                    doc.expired_carry_forward_stock = written_off;
                    doc.finalize();
                }
            }

            self.months.insert(month, doc);
            self.dirty.insert(month);
            created.push(month);
        }

        if !created.is_empty() {
            info!(
                venue_id = %self.venue_id,
                product_id = %self.product_id,
                months = ?created.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
                "Opened ledger months"
            );
        }

        created
    }

    /// Zeroes remaining stock of batches in months before `month` that
    /// expired before its first day. Returns the quantity written off.
    fn write_off_expired_before(&mut self, month: YearMonth, now: DateTime<Utc>) -> i64 {
        let first_day = month.first_day();
        let mut total = 0;

        for (period, doc) in self.months.range_mut(..month) {
            let mut touched = false;
            for entry in doc.entries.iter_mut() {
                let Some(batch) = entry.batch.as_mut() else {
                    continue;
                };
                let expired = batch.expire_date.map_or(false, |e| e < first_day);
                if expired && batch.remaining_quantity > 0 {
                    debug!(
                        batch_number = %batch.batch_number,
                        quantity = batch.remaining_quantity,
                        into = %month,
                        "Writing off expired carry-forward stock"
                    );
                    total += batch.remaining_quantity;
                    batch.remaining_quantity = 0;
                    touched = true;
                }
            }
            if touched {
                doc.updated_at = now;
                self.dirty.insert(*period);
            }
        }

        total
    }

    /// Re-resolves carry-forward and re-finalizes every document from
    /// `from` onward. Returns how many documents changed.
    ///
    /// The first document of the chain keeps its own carry-forward.
    pub fn propagate_from(&mut self, from: YearMonth, now: DateTime<Utc>) -> usize {
        let periods: Vec<YearMonth> = self.months.range(from..).map(|(p, _)| *p).collect();
        let mut changed = 0;

        for period in periods {
            let inherited = self
                .months
                .get(&period.previous())
                .map(|doc| doc.closing_balance);

            let Some(doc) = self.months.get_mut(&period) else {
                continue;
            };
            let before = doc.clone();

            if let Some(carry_forward) = inherited {
                doc.carry_forward = carry_forward;
            }
            doc.finalize();

            if *doc != before {
                doc.updated_at = now;
                self.dirty.insert(period);
                changed += 1;
            }
        }

        changed
    }

    fn touch(&mut self, period: YearMonth, now: DateTime<Utc>) {
        if let Some(doc) = self.months.get_mut(&period) {
            doc.updated_at = now;
        }
        self.dirty.insert(period);
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Every batch, oldest first.
    pub fn batches(&self) -> Vec<Batch> {
        collect_batches(self.months.values())
    }

    /// Batches with stock left.
    pub fn outstanding_batches(&self) -> Vec<Batch> {
        self.batches()
            .into_iter()
            .filter(|b| b.remaining_quantity > 0)
            .collect()
    }

    fn has_batch(&self, batch_number: &str) -> bool {
        self.months.values().any(|doc| {
            doc.entries
                .iter()
                .filter_map(|e| e.batch.as_ref())
                .any(|b| b.batch_number == batch_number)
        })
    }

    /// `RET-20250114-1`, `ADJ-20250114-2`, ...
    fn generate_batch_number(&self, kind: EntryKind, date: NaiveDate) -> String {
        let prefix = match kind {
            EntryKind::Returned => "RET",
            EntryKind::Adjustment => "ADJ",
            _ => "BAT",
        };
        let stem = format!("{}-{}", prefix, date.format("%Y%m%d"));

        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", stem, n);
            if !self.has_batch(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Records one stock movement and returns the stored entry.
    ///
    /// ## Errors
    /// - `Validation` for malformed requests or a duplicate batch number
    /// - `InsufficientStock` when batches cannot cover a draw (and the
    ///   policy does not allow flagging it)
    /// - `BatchNotFound` / `BatchExhausted` for a named batch draw
    pub fn record(
        &mut self,
        req: &EntryRequest,
        policy: &BookPolicy,
        now: DateTime<Utc>,
    ) -> CoreResult<LedgerEntry> {
        req.validate()?;

        if req.venue_id != self.venue_id || req.product_id != self.product_id {
            return Err(ValidationError::InvalidFormat {
                field: "product_id".to_string(),
                reason: format!(
                    "request for {}/{} applied to ledger of {}/{}",
                    req.venue_id, req.product_id, self.venue_id, self.product_id
                ),
            }
            .into());
        }

        let snapshot = self.clone();
        match self.apply(req, policy, now) {
            Ok(entry) => Ok(entry),
            Err(err) => {
                *self = snapshot;
                Err(err)
            }
        }
    }

    fn apply(
        &mut self,
        req: &EntryRequest,
        policy: &BookPolicy,
        now: DateTime<Utc>,
    ) -> CoreResult<LedgerEntry> {
        let period = YearMonth::from_date(req.date);

        let mut touched: BTreeSet<YearMonth> =
            self.open_month(period, policy, now).into_iter().collect();
        touched.insert(period);

        let mut entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            seq: 0,
            date: req.date,
            kind: req.kind,
            quantity: req.quantity,
            breakdown: DayBreakdown::default(),
            balance: 0,
            batch: None,
            deductions: Vec::new(),
            unallocated: 0,
            actor: req.actor.clone(),
            note: req.note.clone(),
            recorded_at: now,
        };

        if req.kind.opens_batch(req.quantity) {
            let batch_number = match req.batch_number.as_deref().map(str::trim) {
                Some(number) if self.has_batch(number) => {
                    return Err(ValidationError::Duplicate {
                        field: "batch_number".to_string(),
                        value: number.to_string(),
                    }
                    .into());
                }
                Some(number) => number.to_string(),
                None => self.generate_batch_number(req.kind, req.date),
            };

            entry.breakdown.added = req.quantity;
            entry.batch = Some(BatchInfo {
                batch_number,
                expire_date: req.expire_date,
                unit_cost_cents: req.unit_cost_cents.unwrap_or(0),
                original_quantity: req.quantity,
                remaining_quantity: req.quantity,
            });
        } else {
            let quantity = req.draw_quantity();
            let allocation = self.plan_draw(req, policy, quantity)?;

            if !allocation.is_complete() {
                let flag = req.kind == EntryKind::Sold
                    && policy.unallocated == UnallocatedPolicy::FlagUnbacked;
                if !flag {
                    return Err(CoreError::InsufficientStock {
                        venue_id: self.venue_id.clone(),
                        product_id: self.product_id.clone(),
                        available: allocation.allocated(),
                        requested: quantity,
                    });
                }
                warn!(
                    venue_id = %self.venue_id,
                    product_id = %self.product_id,
                    entry_id = %entry.id,
                    requested = quantity,
                    unallocated = allocation.unallocated,
                    "Sale recorded without full batch backing"
                );
            }

            match req.kind {
                EntryKind::Expired => entry.breakdown.expired = quantity,
                EntryKind::Damaged => entry.breakdown.damaged = quantity,
                _ => {}
            }
            entry.unallocated = allocation.unallocated;
            entry.deductions = allocation.batch_deductions();

            let marks_usage = req.kind.marks_usage(req.quantity);
            for planned in &allocation.deductions {
                let location = &planned.location;
                let doc = self.months.get_mut(&location.period).ok_or_else(|| {
                    CoreError::EntryNotFound {
                        entry_id: location.entry_id.clone(),
                        period: location.period.to_string(),
                    }
                })?;
                let source = doc.entry_mut(&location.entry_id)?;
                if let Some(batch) = source.batch.as_mut() {
                    batch.remaining_quantity -= planned.deduction.deducted;
                }
                if marks_usage {
                    source.breakdown.used += planned.deduction.deducted;
                }
                touched.insert(location.period);
            }
        }

        let entry_id = entry.id.clone();
        let doc = self
            .months
            .get_mut(&period)
            .ok_or(CoreError::InvalidPeriod {
                year: period.year,
                month: period.month,
            })?;
        doc.push_entry(entry)?;

        for month in &touched {
            self.touch(*month, now);
        }
        if let Some(earliest) = touched.iter().next().copied() {
            self.propagate_from(earliest, now);
        }

        let recorded = self
            .months
            .get(&period)
            .and_then(|doc| doc.entry(&entry_id))
            .cloned()
            .ok_or_else(|| CoreError::EntryNotFound {
                entry_id: entry_id.clone(),
                period: period.to_string(),
            })?;

        info!(
            venue_id = %self.venue_id,
            product_id = %self.product_id,
            entry_id = %recorded.id,
            kind = %recorded.kind,
            quantity = recorded.quantity,
            balance = recorded.balance,
            "Recorded ledger entry"
        );

        Ok(recorded)
    }

    fn plan_draw(
        &self,
        req: &EntryRequest,
        policy: &BookPolicy,
        quantity: i64,
    ) -> CoreResult<Allocation> {
        let batches = self.batches();

        if let Some(number) = req.batch_number.as_deref() {
            return allocate_named(&batches, number.trim(), quantity, req.date);
        }

        let draw = DrawRequest {
            quantity,
            as_of: req.date,
            skip_expired: policy.skip_expired_batches && req.kind.marks_usage(req.quantity),
            order: if req.kind == EntryKind::Expired {
                DrawOrder::ExpiredFirst
            } else {
                DrawOrder::Fifo
            },
        };

        Ok(allocate(&batches, &draw))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Closing balance of the latest month, or 0 with no documents.
    pub fn current_balance(&self) -> i64 {
        self.months
            .values()
            .next_back()
            .map_or(0, |doc| doc.closing_balance)
    }

    /// Entries dated within `[from, to]`, chronological across months.
    pub fn history(&self, from: NaiveDate, to: NaiveDate) -> Vec<LedgerEntry> {
        if to < from {
            return Vec::new();
        }

        let range = YearMonth::from_date(from)..=YearMonth::from_date(to);
        self.months
            .range(range)
            .flat_map(|(_, doc)| doc.entries.iter())
            .filter(|e| e.date >= from && e.date <= to)
            .cloned()
            .collect()
    }

    /// The month as shown to readers, including the virtual opening line.
    pub fn monthly_view(&self, period: YearMonth) -> MonthlyView {
        match self.months.get(&period) {
            Some(doc) => MonthlyView::of_document(doc),
            None => MonthlyView::empty(
                self.venue_id.clone(),
                self.product_id.clone(),
                period,
                self.previous_month_balance(period),
            ),
        }
    }

    /// Summary of one month, if its document exists.
    pub fn summary(
        &self,
        period: YearMonth,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> Option<MonthlySummary> {
        let batches = self.batches();
        self.months
            .get(&period)
            .map(|doc| MonthlySummary::derive(doc, &batches, as_of, now))
    }

    /// Summaries for every dirty document.
    pub fn dirty_summaries(&self, as_of: NaiveDate, now: DateTime<Utc>) -> Vec<MonthlySummary> {
        let batches = self.batches();
        self.dirty_documents()
            .into_iter()
            .map(|doc| MonthlySummary::derive(doc, &batches, as_of, now))
            .collect()
    }

    /// Checks every document's invariants.
    pub fn check_invariants(&self) -> CoreResult<()> {
        self.months.values().try_for_each(MonthlyLedger::check_invariant)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
