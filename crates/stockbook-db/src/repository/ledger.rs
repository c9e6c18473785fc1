//! # Ledger Repository
//!
//! Storage for monthly ledger documents.
//!
//! ## Row Layout
//! Scalar fields (carry-forward, totals, closing balance) get their own
//! columns so they can be queried; the entry list is stored as a JSON array
//! in `entries`. The row is always written whole.
//!
//! ## Optimistic Versioning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  doc.version == 0  →  INSERT ... version = 1                           │
//! │                        (primary key clash → Conflict)                  │
//! │                                                                         │
//! │  doc.version == n  →  UPDATE ... SET version = n + 1                   │
//! │                        WHERE key AND version = n                        │
//! │                        (0 rows affected → Conflict)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The caller is expected to bump its in-memory versions only after the
//! surrounding transaction commits.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::summary::SummaryRepository;
use stockbook_core::{LedgerEntry, MonthlyLedger, MonthlySummary, MonthlyTotals, YearMonth};

const ENTITY: &str = "monthly_ledger";

/// Raw `monthly_ledgers` row.
#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    venue_id: String,
    product_id: String,
    year: i64,
    month: i64,
    carry_forward: i64,
    expired_carry_forward_stock: i64,
    total_stock_added: i64,
    total_used_stock: i64,
    total_expired_stock: i64,
    total_damage_stock: i64,
    closing_balance: i64,
    entries: String,
    next_seq: i64,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for MonthlyLedger {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let period = YearMonth::new(row.year as i32, row.month as u32)
            .map_err(|e| DbError::Serialization(e.to_string()))?;
        let entries: Vec<LedgerEntry> = serde_json::from_str(&row.entries)?;

        Ok(MonthlyLedger {
            venue_id: row.venue_id,
            product_id: row.product_id,
            period,
            carry_forward: row.carry_forward,
            expired_carry_forward_stock: row.expired_carry_forward_stock,
            totals: MonthlyTotals {
                total_stock_added: row.total_stock_added,
                total_used_stock: row.total_used_stock,
                total_expired_stock: row.total_expired_stock,
                total_damage_stock: row.total_damage_stock,
            },
            closing_balance: row.closing_balance,
            entries,
            next_seq: row.next_seq.max(0) as u32,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        venue_id, product_id, year, month,
        carry_forward, expired_carry_forward_stock,
        total_stock_added, total_used_stock, total_expired_stock, total_damage_stock,
        closing_balance, entries, next_seq, version, created_at, updated_at
    FROM monthly_ledgers
"#;

/// Repository for monthly ledger documents.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.ledgers();
///
/// // Whole chain for one product, oldest month first
/// let docs = repo.list_for_product("venue-1", "prod-1").await?;
///
/// // Write back what changed, with refreshed summaries
/// repo.save_all(&book.dirty_documents(), &summaries).await?;
/// ```
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Gets one month's document.
    ///
    /// ## Returns
    /// * `Ok(Some(MonthlyLedger))` - Document found
    /// * `Ok(None)` - No document for that month
    pub async fn get(
        &self,
        venue_id: &str,
        product_id: &str,
        period: YearMonth,
    ) -> DbResult<Option<MonthlyLedger>> {
        let sql = format!(
            "{} WHERE venue_id = ?1 AND product_id = ?2 AND year = ?3 AND month = ?4",
            SELECT_COLUMNS
        );

        let row = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(venue_id)
            .bind(product_id)
            .bind(period.year as i64)
            .bind(period.month as i64)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MonthlyLedger::try_from).transpose()
    }

    /// Lists every document for a product, oldest month first.
    pub async fn list_for_product(
        &self,
        venue_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<MonthlyLedger>> {
        let sql = format!(
            "{} WHERE venue_id = ?1 AND product_id = ?2 ORDER BY year, month",
            SELECT_COLUMNS
        );

        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(venue_id)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(
            venue_id = %venue_id,
            product_id = %product_id,
            count = rows.len(),
            "Loaded ledger documents"
        );

        rows.into_iter().map(MonthlyLedger::try_from).collect()
    }

    /// Writes one document on an open connection or transaction.
    ///
    /// Returns the version now stored.
    ///
    /// ## Errors
    /// `DbError::Conflict` when the stored version is not `doc.version`
    /// (or, for a new document, when a row already exists).
    pub async fn save_with(conn: &mut SqliteConnection, doc: &MonthlyLedger) -> DbResult<i64> {
        let key = doc.key().to_string();
        let entries = serde_json::to_string(&doc.entries)?;

        if doc.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO monthly_ledgers (
                    venue_id, product_id, year, month,
                    carry_forward, expired_carry_forward_stock,
                    total_stock_added, total_used_stock, total_expired_stock, total_damage_stock,
                    closing_balance, entries, next_seq, version, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?15)
                "#,
            )
            .bind(&doc.venue_id)
            .bind(&doc.product_id)
            .bind(doc.period.year as i64)
            .bind(doc.period.month as i64)
            .bind(doc.carry_forward)
            .bind(doc.expired_carry_forward_stock)
            .bind(doc.totals.total_stock_added)
            .bind(doc.totals.total_used_stock)
            .bind(doc.totals.total_expired_stock)
            .bind(doc.totals.total_damage_stock)
            .bind(doc.closing_balance)
            .bind(&entries)
            .bind(doc.next_seq as i64)
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::conflict(ENTITY, key.clone(), 0),
                other => other,
            })?;

            debug!(key = %key, "Inserted ledger document");
            return Ok(1);
        }

        let result = sqlx::query(
            r#"
            UPDATE monthly_ledgers SET
                carry_forward = ?5,
                expired_carry_forward_stock = ?6,
                total_stock_added = ?7,
                total_used_stock = ?8,
                total_expired_stock = ?9,
                total_damage_stock = ?10,
                closing_balance = ?11,
                entries = ?12,
                next_seq = ?13,
                updated_at = ?14,
                version = version + 1
            WHERE venue_id = ?1 AND product_id = ?2 AND year = ?3 AND month = ?4
              AND version = ?15
            "#,
        )
        .bind(&doc.venue_id)
        .bind(&doc.product_id)
        .bind(doc.period.year as i64)
        .bind(doc.period.month as i64)
        .bind(doc.carry_forward)
        .bind(doc.expired_carry_forward_stock)
        .bind(doc.totals.total_stock_added)
        .bind(doc.totals.total_used_stock)
        .bind(doc.totals.total_expired_stock)
        .bind(doc.totals.total_damage_stock)
        .bind(doc.closing_balance)
        .bind(&entries)
        .bind(doc.next_seq as i64)
        .bind(doc.updated_at)
        .bind(doc.version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(ENTITY, key, doc.version));
        }

        debug!(key = %key, version = doc.version + 1, "Updated ledger document");
        Ok(doc.version + 1)
    }

    /// Writes documents and their summaries in a single transaction.
    ///
    /// Either every document and summary lands, or none do.
    pub async fn save_all(
        &self,
        docs: &[&MonthlyLedger],
        summaries: &[MonthlySummary],
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for doc in docs {
            Self::save_with(&mut tx, doc).await?;
        }
        for summary in summaries {
            SummaryRepository::upsert_with(&mut tx, summary).await?;
        }

        tx.commit().await?;

        debug!(
            documents = docs.len(),
            summaries = summaries.len(),
            "Committed ledger write"
        );
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
