//! # Stock Ledger Service
//!
//! The entry point for recording stock movements and reading stock state.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      record_sale(SellStock)                             │
//! │                                                                         │
//! │  1. validate request ────────────────── reject early, nothing locked    │
//! │  2. lock (venue, product) ───────────── KeyedLocks                      │
//! │  3. ┌─ retry on Conflict (exponential backoff) ───────────────────────┐ │
//! │     │  a. load every monthly document → LedgerBook                    │ │
//! │     │  b. book.record(...)   (gap months, FIFO, finalize, propagate)  │ │
//! │     │  c. one transaction: dirty documents + their summaries          │ │
//! │     │     (UPDATE ... WHERE version = ?)                              │ │
//! │     └─────────────────────────────────────────────────────────────────┘ │
//! │  4. threshold check → open / resolve alerts                            │
//! │  5. unlock                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Alerts are checked after the ledger transaction commits. A failed alert
//! check is logged; the stock movement stands.

use std::future::Future;
use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use stockbook_core::alert::{self, AlertChanges};
use stockbook_core::validation::{validate_actor, validate_id};
use stockbook_core::{
    AlertThresholds, Batch, CarryForwardChange, CoreError, EntryRequest, LedgerBook, LedgerEntry,
    MonthlyLedger, MonthlySummary, MonthlyView, StockAlert, ValidationError, YearMonth,
};
use stockbook_db::Database;

use crate::catalog::ProductCatalog;
use crate::clock::{Clock, SystemClock};
use crate::commands::{AddStock, AdjustStock, ReturnStock, SellStock, WriteOff};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::locks::KeyedLocks;

/// The venue stock ledger.
///
/// Cheap to clone; clones share the pool, the locks and the catalog.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = StockLedger::open(LedgerConfig::load(None)?, Arc::new(NoCatalog)).await?;
///
/// ledger.record_addition(AddStock { /* ... */ }).await?;
/// let sale = ledger.record_sale(SellStock { /* ... */ }).await?;
/// let view = ledger.monthly_view("arena-1", "cola-330", 2025, 1).await?;
/// ```
#[derive(Clone)]
pub struct StockLedger {
    db: Database,
    config: Arc<LedgerConfig>,
    locks: KeyedLocks,
    catalog: Arc<dyn ProductCatalog>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("db", &self.db)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StockLedger {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Opens the database named in `config` and builds the service.
    pub async fn open(config: LedgerConfig, catalog: Arc<dyn ProductCatalog>) -> LedgerResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        Ok(Self::new(db, config, catalog))
    }

    /// Builds the service over an existing database handle.
    pub fn new(db: Database, config: LedgerConfig, catalog: Arc<dyn ProductCatalog>) -> Self {
        info!(
            unallocated_policy = %config.ledger.unallocated_policy,
            skip_expired_batches = config.ledger.skip_expired_batches,
            expire_on_rollover = config.ledger.expire_on_rollover,
            "Stock ledger ready"
        );

        StockLedger {
            db,
            config: Arc::new(config),
            locks: KeyedLocks::new(),
            catalog,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Records stock received into a new batch.
    pub async fn record_addition(&self, cmd: AddStock) -> LedgerResult<LedgerEntry> {
        self.record(cmd.into()).await
    }

    /// Records a sale, drawn from the oldest batches first.
    ///
    /// ## Errors
    /// `InsufficientStock` when batches can't cover the quantity and the
    /// unallocated policy is `reject`. Under `flag_unbacked` the sale is
    /// kept and the shortfall is set on the entry's `unallocated`.
    pub async fn record_sale(&self, cmd: SellStock) -> LedgerResult<LedgerEntry> {
        let entry = self.record(cmd.into()).await?;

        if entry.unallocated > 0 {
            warn!(
                entry_id = %entry.id,
                date = %entry.date,
                unallocated = entry.unallocated,
                "Sale recorded without batch backing"
            );
        }

        Ok(entry)
    }

    /// Records an expiry write-off.
    pub async fn record_expiry(&self, cmd: WriteOff) -> LedgerResult<LedgerEntry> {
        self.record(cmd.into_expiry()).await
    }

    /// Records a damage write-off.
    pub async fn record_damage(&self, cmd: WriteOff) -> LedgerResult<LedgerEntry> {
        self.record(cmd.into_damage()).await
    }

    /// Records returned stock as a new batch.
    pub async fn record_return(&self, cmd: ReturnStock) -> LedgerResult<LedgerEntry> {
        self.record(cmd.into()).await
    }

    /// Records a signed manual correction.
    pub async fn record_adjustment(&self, cmd: AdjustStock) -> LedgerResult<LedgerEntry> {
        self.record(cmd.into()).await
    }

    /// Records any movement.
    pub async fn record(&self, req: EntryRequest) -> LedgerResult<LedgerEntry> {
        req.validate()?;

        let guard = self.locks.lock(&req.venue_id, &req.product_id).await;
        let key = format!("{}/{}", req.venue_id, req.product_id);

        let result = self.with_retry(&key, || self.try_record(&req)).await;
        self.locks.release(guard).await;
        let entry = result?;

        info!(
            venue_id = %req.venue_id,
            product_id = %req.product_id,
            kind = %entry.kind,
            quantity = entry.quantity,
            date = %entry.date,
            balance = entry.balance,
            "Stock movement recorded"
        );

        Ok(entry)
    }

    async fn try_record(&self, req: &EntryRequest) -> LedgerResult<LedgerEntry> {
        let now = self.clock.now();
        let mut book = self.load_book(&req.venue_id, &req.product_id).await?;

        let entry = book.record(req, &self.config.book_policy(), now)?;
        self.persist(&mut book, now).await?;

        Ok(entry)
    }

    // =========================================================================
    // Carry-Forward
    // =========================================================================

    /// Closing balance of the month before (`year`, `month`), or 0.
    ///
    /// January looks at December of the previous year.
    pub async fn previous_month_balance(
        &self,
        venue_id: &str,
        product_id: &str,
        year: i32,
        month: u32,
    ) -> LedgerResult<i64> {
        let period = YearMonth::new(year, month)?;
        let previous = period.previous();

        Ok(self
            .db
            .ledgers()
            .get(venue_id, product_id, previous)
            .await?
            .map_or(0, |doc| doc.closing_balance))
    }

    /// Creates a month's document or re-anchors its carry-forward.
    ///
    /// A new month is opened the way a movement would open it: missing
    /// months in between are created, and with `expire_on_rollover` stock
    /// that expired before the month starts is written off.
    ///
    /// With `carry_forward` of `None` the document is anchored at the prior
    /// month's closing balance. An explicit value corrects the opening
    /// balance; every later month is recalculated from it. Calling again
    /// with the same value changes nothing and writes nothing.
    ///
    /// Returns the stored document and what happened to it.
    pub async fn ensure_document(
        &self,
        venue_id: &str,
        product_id: &str,
        year: i32,
        month: u32,
        carry_forward: Option<i64>,
    ) -> LedgerResult<(MonthlyLedger, CarryForwardChange)> {
        validate_id("venue_id", venue_id)?;
        validate_id("product_id", product_id)?;
        let period = YearMonth::new(year, month)?;

        if let Some(cf) = carry_forward {
            if cf < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "carry_forward".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into());
            }
        }

        let guard = self.locks.lock(venue_id, product_id).await;
        let key = format!("{}/{}", venue_id, product_id);

        let result = self
            .with_retry(&key, || {
                self.try_ensure_document(venue_id, product_id, period, carry_forward)
            })
            .await;
        self.locks.release(guard).await;
        result
    }

    async fn try_ensure_document(
        &self,
        venue_id: &str,
        product_id: &str,
        period: YearMonth,
        carry_forward: Option<i64>,
    ) -> LedgerResult<(MonthlyLedger, CarryForwardChange)> {
        let now = self.clock.now();
        let mut book = self.load_book(venue_id, product_id).await?;

        let change =
            book.ensure_document(period, carry_forward, &self.config.book_policy(), now);
        book.check_invariants()?;
        self.persist(&mut book, now).await?;

        let document = book
            .document(period)
            .cloned()
            .ok_or(CoreError::InvalidPeriod {
                year: period.year,
                month: period.month,
            })?;
        Ok((document, change))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Latest closing balance, or 0 if the product has no documents.
    pub async fn current_balance(&self, venue_id: &str, product_id: &str) -> LedgerResult<i64> {
        Ok(self.load_book(venue_id, product_id).await?.current_balance())
    }

    /// One month with its virtual opening line and aggregates.
    pub async fn monthly_view(
        &self,
        venue_id: &str,
        product_id: &str,
        year: i32,
        month: u32,
    ) -> LedgerResult<MonthlyView> {
        let period = YearMonth::new(year, month)?;
        Ok(self.load_book(venue_id, product_id).await?.monthly_view(period))
    }

    /// Entries dated within `[from, to]`, oldest first, across months.
    pub async fn history(
        &self,
        venue_id: &str,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self.load_book(venue_id, product_id).await?.history(from, to))
    }

    /// The month's summary.
    ///
    /// Served from the summary table; derived from the ledger if the row is
    /// missing. `None` when the month has no document.
    pub async fn monthly_summary(
        &self,
        venue_id: &str,
        product_id: &str,
        year: i32,
        month: u32,
    ) -> LedgerResult<Option<MonthlySummary>> {
        let period = YearMonth::new(year, month)?;

        if let Some(stored) = self.db.summaries().get(venue_id, product_id, period).await? {
            return Ok(Some(stored));
        }

        let now = self.clock.now();
        let book = self.load_book(venue_id, product_id).await?;
        Ok(book.summary(period, now.date_naive(), now))
    }

    /// Batches with stock left, oldest first.
    pub async fn outstanding_batches(
        &self,
        venue_id: &str,
        product_id: &str,
    ) -> LedgerResult<Vec<Batch>> {
        Ok(self
            .load_book(venue_id, product_id)
            .await?
            .outstanding_batches())
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    pub async fn active_alerts(
        &self,
        venue_id: &str,
        product_id: &str,
    ) -> LedgerResult<Vec<StockAlert>> {
        Ok(self.db.alerts().active_for(venue_id, product_id).await?)
    }

    /// Marks an alert resolved by `resolved_by`.
    ///
    /// Resolving an already resolved alert returns it unchanged.
    pub async fn resolve_alert(&self, alert_id: &str, resolved_by: &str) -> LedgerResult<StockAlert> {
        validate_actor("resolved_by", resolved_by)?;
        let alert = self
            .db
            .alerts()
            .resolve(alert_id, resolved_by, self.clock.now())
            .await?;
        Ok(alert)
    }

    /// Re-runs the threshold check without recording anything.
    ///
    /// Expiry conditions change with the date alone, so a scheduler can call
    /// this daily.
    pub async fn check_alerts(&self, venue_id: &str, product_id: &str) -> LedgerResult<AlertChanges> {
        let guard = self.locks.lock(venue_id, product_id).await;
        let result = match self.load_book(venue_id, product_id).await {
            Ok(book) => self.try_refresh_alerts(&book, self.clock.now()).await,
            Err(e) => Err(e),
        };
        self.locks.release(guard).await;
        result
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn load_book(&self, venue_id: &str, product_id: &str) -> LedgerResult<LedgerBook> {
        let docs = self.db.ledgers().list_for_product(venue_id, product_id).await?;
        Ok(LedgerBook::from_documents(venue_id, product_id, docs)?)
    }

    /// Writes the book's dirty documents and summaries, then checks alerts.
    async fn persist(&self, book: &mut LedgerBook, now: DateTime<Utc>) -> LedgerResult<()> {
        if !book.is_dirty() {
            return Ok(());
        }

        let summaries = book.dirty_summaries(now.date_naive(), now);
        self.db
            .ledgers()
            .save_all(&book.dirty_documents(), &summaries)
            .await?;
        book.mark_persisted();

        if let Err(err) = self.try_refresh_alerts(book, now).await {
            warn!(
                venue_id = %book.venue_id(),
                product_id = %book.product_id(),
                error = %err,
                "Alert check failed after ledger write"
            );
        }

        Ok(())
    }

    fn thresholds_for(&self, venue_id: &str, product_id: &str) -> AlertThresholds {
        self.catalog
            .thresholds(venue_id, product_id)
            .unwrap_or_else(|| self.config.default_thresholds())
    }

    async fn try_refresh_alerts(
        &self,
        book: &LedgerBook,
        now: DateTime<Utc>,
    ) -> LedgerResult<AlertChanges> {
        let (venue_id, product_id) = (book.venue_id(), book.product_id());
        let thresholds = self.thresholds_for(venue_id, product_id);

        let conditions = alert::evaluate(
            book.current_balance(),
            &book.batches(),
            now.date_naive(),
            &thresholds,
        );

        let repo = self.db.alerts();
        let active = repo.active_for(venue_id, product_id).await?;
        let changes = alert::reconcile(venue_id, product_id, &active, &conditions, now);

        if !changes.is_empty() {
            repo.apply_changes(&changes, now).await?;
            debug!(
                venue_id = %venue_id,
                product_id = %product_id,
                opened = changes.opened.len(),
                resolved = changes.resolved.len(),
                "Alerts reconciled"
            );
        }

        Ok(changes)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff(),
            max_interval: self.config.max_backoff(),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs `op` until it succeeds, fails for good, or runs out of retries.
    async fn with_retry<T, F, Fut>(&self, key: &str, mut op: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let max_retries = self.config.ledger.max_conflict_retries;
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_retries => {
                    attempt += 1;
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| self.config.max_backoff());
                    warn!(
                        key = %key,
                        attempt,
                        ?delay,
                        error = %err,
                        "Retrying ledger write"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(LedgerError::Conflict { key, .. }) => {
                    return Err(LedgerError::Conflict {
                        key,
                        attempts: attempt,
                    })
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NoCatalog, StaticCatalog};
    use crate::clock::FixedClock;
    use chrono::TimeZone;
    use stockbook_core::{AlertKind, AlertStatus, EntryKind, UnallocatedPolicy};
    use stockbook_db::{DbConfig, DbError};

    const V: &str = "arena-1";
    const P: &str = "cola-330";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 1, 25, 12, 0, 0).unwrap()))
    }

    fn test_config() -> LedgerConfig {
        let mut config = LedgerConfig::default();
        config.ledger.initial_backoff_ms = 1;
        config.ledger.max_backoff_ms = 5;
        config.ledger.max_conflict_retries = 50;
        config
    }

    async fn ledger_with(config: LedgerConfig, catalog: Arc<dyn ProductCatalog>) -> StockLedger {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        StockLedger::new(db, config, catalog).with_clock(clock())
    }

    async fn ledger() -> StockLedger {
        ledger_with(test_config(), Arc::new(NoCatalog)).await
    }

    fn add(qty: i64, batch: &str, date: NaiveDate) -> AddStock {
        AddStock {
            venue_id: V.to_string(),
            product_id: P.to_string(),
            quantity: qty,
            unit_cost_cents: 80,
            batch_number: batch.to_string(),
            expire_date: None,
            date,
            actor: None,
            note: None,
        }
    }

    fn sell(qty: i64, date: NaiveDate) -> SellStock {
        SellStock {
            venue_id: V.to_string(),
            product_id: P.to_string(),
            quantity: qty,
            date,
            actor: Some("till-3".to_string()),
            note: None,
        }
    }

    fn write_off(qty: i64, batch: Option<&str>, date: NaiveDate) -> WriteOff {
        WriteOff {
            venue_id: V.to_string(),
            product_id: P.to_string(),
            quantity: qty,
            batch_number: batch.map(str::to_string),
            date,
            actor: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_january() {
        let ledger = ledger().await;

        ledger.record_addition(add(100, "A", d(2025, 1, 1))).await.unwrap();
        let sale = ledger.record_sale(sell(30, d(2025, 1, 10))).await.unwrap();
        assert_eq!(sale.balance, 70);

        let b = ledger.record_addition(add(50, "B", d(2025, 1, 15))).await.unwrap();
        assert_eq!(b.balance, 120);

        let expired = ledger
            .record_expiry(write_off(20, Some("A"), d(2025, 1, 20)))
            .await
            .unwrap();
        assert_eq!(expired.balance, 100);

        let view = ledger.monthly_view(V, P, 2025, 1).await.unwrap();
        assert!(view.persisted);
        assert!(view.opening.is_none());
        assert_eq!(view.entries.len(), 4);
        assert_eq!(view.totals.total_stock_added, 150);
        assert_eq!(view.totals.total_used_stock, 30);
        assert_eq!(view.totals.total_expired_stock, 20);
        assert_eq!(view.closing_balance, 100);

        let batches = ledger.outstanding_batches(V, P).await.unwrap();
        let remaining: Vec<(&str, i64)> = batches
            .iter()
            .map(|b| (b.batch_number.as_str(), b.remaining_quantity))
            .collect();
        assert_eq!(remaining, vec![("A", 50), ("B", 50)]);

        assert_eq!(ledger.current_balance(V, P).await.unwrap(), 100);

        let summary = ledger.monthly_summary(V, P, 2025, 1).await.unwrap().unwrap();
        assert_eq!(summary.current_stock, 100);
        assert_eq!(summary.purchases, 150);
        assert_eq!(summary.sales, 30);
        assert_eq!(summary.waste, 20);
    }

    #[tokio::test]
    async fn test_sale_across_month_boundary() {
        let ledger = ledger().await;

        ledger.record_addition(add(12, "DEC", d(2024, 12, 5))).await.unwrap();
        let sale = ledger.record_sale(sell(5, d(2025, 1, 3))).await.unwrap();
        assert_eq!(sale.deductions[0].batch_number, "DEC");

        let dec = ledger.monthly_view(V, P, 2024, 12).await.unwrap();
        assert_eq!(dec.totals.total_used_stock, 5);
        assert_eq!(dec.closing_balance, 7);

        let jan = ledger.monthly_view(V, P, 2025, 1).await.unwrap();
        assert_eq!(jan.carry_forward, 7);
        let opening = jan.opening.unwrap();
        assert!(opening.is_virtual);
        assert_eq!(opening.balance, 7);
        assert_eq!(opening.date, d(2025, 1, 1));

        assert_eq!(ledger.previous_month_balance(V, P, 2025, 1).await.unwrap(), 7);

        let history = ledger.history(V, P, d(2024, 12, 1), d(2025, 1, 31)).await.unwrap();
        let kinds: Vec<EntryKind> = history.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::Added, EntryKind::Sold]);
    }

    #[tokio::test]
    async fn test_carry_forward_correction_propagates() {
        let ledger = ledger().await;

        ledger.record_addition(add(12, "DEC", d(2024, 12, 5))).await.unwrap();
        ledger.record_sale(sell(2, d(2025, 1, 4))).await.unwrap();
        assert_eq!(ledger.current_balance(V, P).await.unwrap(), 10);

        // December opened with 8 units nobody recorded
        let (corrected, change) = ledger
            .ensure_document(V, P, 2024, 12, Some(8))
            .await
            .unwrap();
        assert!(change.changed());
        assert_eq!(corrected.carry_forward, 8);

        // The January sale drew from December's batch, so it counts there
        let dec = ledger.monthly_view(V, P, 2024, 12).await.unwrap();
        assert_eq!(dec.closing_balance, 18);
        let jan = ledger.monthly_view(V, P, 2025, 1).await.unwrap();
        assert_eq!(jan.carry_forward, 18);
        assert_eq!(jan.closing_balance, 18);
        assert_eq!(ledger.current_balance(V, P).await.unwrap(), 18);

        // Same value again is a no-op
        let (stored, again) = ledger
            .ensure_document(V, P, 2024, 12, Some(8))
            .await
            .unwrap();
        assert_eq!(again, CarryForwardChange::Unchanged);
        assert_eq!(stored.version, corrected.version);
    }

    #[tokio::test]
    async fn test_ensure_document_rolls_over_year() {
        let ledger = ledger().await;
        ledger.record_addition(add(9, "DEC", d(2024, 12, 5))).await.unwrap();

        let (doc, change) = ledger.ensure_document(V, P, 2025, 1, None).await.unwrap();
        assert_eq!(change, CarryForwardChange::Created);
        assert_eq!(doc.version, 1);
        assert!(doc.entries.is_empty());

        let jan = ledger.monthly_view(V, P, 2025, 1).await.unwrap();
        assert_eq!(jan.carry_forward, 9);

        let err = ledger.ensure_document(V, P, 2025, 13, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::Core(CoreError::InvalidPeriod { .. })));

        let err = ledger.ensure_document(V, P, 2025, 2, Some(-1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ensure_document_fills_gap_months() {
        let ledger = ledger().await;
        ledger.record_addition(add(8, "NOV", d(2024, 11, 20))).await.unwrap();

        let (jan, change) = ledger.ensure_document(V, P, 2025, 1, None).await.unwrap();
        assert_eq!(change, CarryForwardChange::Created);
        assert_eq!(jan.carry_forward, 8);
        assert_eq!(jan.closing_balance, 8);
        assert_eq!(ledger.current_balance(V, P).await.unwrap(), 8);

        let dec = ledger.monthly_view(V, P, 2024, 12).await.unwrap();
        assert!(dec.persisted);
        assert_eq!(dec.carry_forward, 8);
        assert_eq!(dec.closing_balance, 8);

        let sale = ledger.record_sale(sell(5, d(2025, 1, 9))).await.unwrap();
        assert_eq!(sale.balance, 3);
        assert_eq!(ledger.current_balance(V, P).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ensure_document_writes_off_expired_stock() {
        let ledger = ledger().await;
        let mut milk = add(6, "MILK", d(2025, 1, 2));
        milk.expire_date = Some(d(2025, 1, 20));
        ledger.record_addition(milk).await.unwrap();

        let (feb, change) = ledger.ensure_document(V, P, 2025, 2, None).await.unwrap();
        assert_eq!(change, CarryForwardChange::Created);
        assert_eq!(feb.carry_forward, 6);
        assert_eq!(feb.expired_carry_forward_stock, 6);
        assert_eq!(feb.closing_balance, 0);
        assert!(ledger.outstanding_batches(V, P).await.unwrap().is_empty());

        let entry = ledger.record_addition(add(1, "FEB", d(2025, 2, 3))).await.unwrap();
        assert_eq!(entry.balance, 1);

        let view = ledger.monthly_view(V, P, 2025, 2).await.unwrap();
        assert_eq!(view.expired_carry_forward_stock, 6);
        assert_eq!(view.closing_balance, 1);
    }

    #[tokio::test]
    async fn test_idle_product_locks_are_released() {
        let ledger = ledger().await;
        for product in ["cola-330", "chips-150", "water-500"] {
            let mut cmd = add(5, "A", d(2025, 1, 3));
            cmd.product_id = product.to_string();
            ledger.record_addition(cmd).await.unwrap();
        }
        ledger.ensure_document(V, "tea-20", 2025, 1, None).await.unwrap();
        ledger.check_alerts(V, P).await.unwrap();

        // Failed writes release too
        assert!(ledger.record_sale(sell(50, d(2025, 1, 4))).await.is_err());

        assert_eq!(ledger.locks.len().await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_storage_untouched() {
        let ledger = ledger().await;
        ledger.record_addition(add(3, "A", d(2025, 1, 1))).await.unwrap();
        let before = ledger.monthly_view(V, P, 2025, 1).await.unwrap();

        let err = ledger.record_sale(sell(4, d(2025, 1, 2))).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Core(CoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            })
        ));

        let after = ledger.monthly_view(V, P, 2025, 1).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let ledger = ledger().await;
        let err = ledger.record_sale(sell(0, d(2025, 1, 2))).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(ledger.database().ledgers().list_for_product(V, P).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flag_unbacked_policy() {
        let mut config = test_config();
        config.ledger.unallocated_policy = UnallocatedPolicy::FlagUnbacked;
        let ledger = ledger_with(config, Arc::new(NoCatalog)).await;

        ledger.record_addition(add(2, "A", d(2025, 1, 1))).await.unwrap();
        let sale = ledger.record_sale(sell(5, d(2025, 1, 2))).await.unwrap();
        assert_eq!(sale.unallocated, 3);

        let summary = ledger.monthly_summary(V, P, 2025, 1).await.unwrap().unwrap();
        assert_eq!(summary.unbacked_sales, 3);
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let ledger = ledger().await;
        ledger.record_addition(add(10, "A", d(2025, 1, 1))).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..12 {
            let ledger = ledger.clone();
            tasks.push(tokio::spawn(async move {
                ledger.record_sale(sell(1, d(2025, 1, 5))).await
            }));
        }

        let mut sold = 0;
        let mut rejected = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => sold += 1,
                Err(LedgerError::Core(CoreError::InsufficientStock { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!((sold, rejected), (10, 2));
        assert_eq!(ledger.current_balance(V, P).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_writers_without_shared_locks_are_reconciled() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = StockLedger::new(db.clone(), test_config(), Arc::new(NoCatalog))
            .with_clock(clock());
        let second = StockLedger::new(db, test_config(), Arc::new(NoCatalog)).with_clock(clock());

        first.record_addition(add(40, "A", d(2025, 1, 1))).await.unwrap();

        let run = |ledger: StockLedger| async move {
            for day in 2..7 {
                ledger.record_sale(sell(2, d(2025, 1, day))).await.unwrap();
            }
        };
        tokio::join!(run(first.clone()), run(second.clone()));

        assert_eq!(first.current_balance(V, P).await.unwrap(), 20);
        let view = second.monthly_view(V, P, 2025, 1).await.unwrap();
        assert_eq!(view.entries.len(), 11);
        assert_eq!(view.totals.total_used_stock, 20);
    }

    #[tokio::test]
    async fn test_stale_write_is_a_conflict() {
        let ledger = ledger().await;
        ledger.record_addition(add(5, "A", d(2025, 1, 1))).await.unwrap();

        let now = ledger.clock.now();
        let mut stale = ledger.load_book(V, P).await.unwrap();
        stale
            .record(
                &EntryRequest::sale(V, P, 1, d(2025, 1, 2)),
                &ledger.config.book_policy(),
                now,
            )
            .unwrap();

        // Another writer gets in first
        ledger.record_sale(sell(2, d(2025, 1, 3))).await.unwrap();

        let err = ledger.persist(&mut stale, now).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, LedgerError::Conflict { .. }));
        assert_eq!(ledger.current_balance(V, P).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_alerts_follow_stock_level() {
        let catalog = StaticCatalog::new().with(
            V,
            P,
            AlertThresholds {
                reorder_level: 5,
                max_stock: None,
                expiry_warning_days: 7,
            },
        );
        let ledger = ledger_with(test_config(), Arc::new(catalog)).await;

        ledger.record_addition(add(10, "A", d(2025, 1, 1))).await.unwrap();
        assert!(ledger.active_alerts(V, P).await.unwrap().is_empty());

        ledger.record_sale(sell(6, d(2025, 1, 2))).await.unwrap();
        let active = ledger.active_alerts(V, P).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, AlertKind::LowStock);
        assert_eq!(active[0].observed, 4);

        ledger.record_sale(sell(4, d(2025, 1, 3))).await.unwrap();
        let kinds: Vec<AlertKind> = ledger
            .active_alerts(V, P)
            .await
            .unwrap()
            .iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(kinds, vec![AlertKind::OutOfStock]);

        ledger.record_addition(add(20, "B", d(2025, 1, 4))).await.unwrap();
        assert!(ledger.active_alerts(V, P).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_alerts_and_manual_resolve() {
        let ledger = ledger().await;

        // Clock is 2025-01-25; batch expires in three days
        let mut cmd = add(30, "A", d(2025, 1, 2));
        cmd.expire_date = Some(d(2025, 1, 28));
        ledger.record_addition(cmd).await.unwrap();

        let active = ledger.active_alerts(V, P).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, AlertKind::ExpiringSoon);

        let blank = ledger.resolve_alert(&active[0].id, "  ").await.unwrap_err();
        assert!(matches!(blank, LedgerError::Validation(ValidationError::Required { .. })));

        let resolved = ledger.resolve_alert(&active[0].id, "Jane Doe").await.unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("Jane Doe"));
        assert!(ledger.active_alerts(V, P).await.unwrap().is_empty());

        // Still true on the next check, so it comes back
        let changes = ledger.check_alerts(V, P).await.unwrap();
        assert_eq!(changes.opened.len(), 1);

        let missing = ledger.resolve_alert("no-such-alert", "manager-7").await.unwrap_err();
        assert!(matches!(missing, LedgerError::Database(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_return_and_adjustment_round_out_the_month() {
        let ledger = ledger().await;
        ledger.record_addition(add(10, "A", d(2025, 1, 1))).await.unwrap();
        ledger.record_sale(sell(4, d(2025, 1, 2))).await.unwrap();

        let ret = ledger
            .record_return(ReturnStock {
                venue_id: V.to_string(),
                product_id: P.to_string(),
                quantity: 1,
                batch_number: None,
                expire_date: None,
                unit_cost_cents: None,
                date: d(2025, 1, 3),
                actor: None,
                note: Some("unopened".to_string()),
            })
            .await
            .unwrap();
        assert!(ret.batch.as_ref().unwrap().batch_number.starts_with("RET-20250103"));

        let adj = ledger
            .record_adjustment(AdjustStock {
                venue_id: V.to_string(),
                product_id: P.to_string(),
                quantity: -2,
                actor: "manager-7".to_string(),
                reason: Some("count".to_string()),
                batch_number: None,
                expire_date: None,
                date: d(2025, 1, 4),
            })
            .await
            .unwrap();
        assert_eq!(adj.balance, 5);

        ledger
            .record_damage(write_off(1, None, d(2025, 1, 5)))
            .await
            .unwrap();

        let summary = ledger.monthly_summary(V, P, 2025, 1).await.unwrap().unwrap();
        assert_eq!(summary.current_stock, 4);
        assert_eq!(summary.returns, 1);
        assert_eq!(summary.adjustments, -2);
        assert_eq!(summary.waste, 1);
    }
}
