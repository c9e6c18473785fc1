//! # Alert Repository
//!
//! Database operations for stock alerts.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   condition appears           condition clears / manual resolve        │
//! │         │                              │                                │
//! │         ▼                              ▼                                │
//! │    ┌─────────┐                   ┌──────────┐                          │
//! │    │ active  │ ────────────────► │ resolved │                          │
//! │    └─────────┘                   └──────────┘                          │
//! │                                                                         │
//! │  A partial unique index keeps at most one ACTIVE alert per             │
//! │  (venue, product, kind).                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use stockbook_core::{AlertChanges, AlertStatus, StockAlert};

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, venue_id, product_id, kind, severity, status, message,
        threshold, observed, created_at, resolved_at, resolved_by
    FROM stock_alerts
"#;

/// Who resolves alerts whose condition cleared on its own.
pub const SYSTEM_RESOLVER: &str = "system";

/// Repository for stock alerts.
#[derive(Debug, Clone)]
pub struct AlertRepository {
    pool: SqlitePool,
}

impl AlertRepository {
    /// Creates a new AlertRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AlertRepository { pool }
    }

    /// Gets an alert by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<StockAlert>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);

        let alert = sqlx::query_as::<_, StockAlert>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(alert)
    }

    /// ACTIVE alerts for a product, oldest first.
    pub async fn active_for(&self, venue_id: &str, product_id: &str) -> DbResult<Vec<StockAlert>> {
        let sql = format!(
            "{} WHERE venue_id = ?1 AND product_id = ?2 AND status = ?3 ORDER BY created_at",
            SELECT_COLUMNS
        );

        let alerts = sqlx::query_as::<_, StockAlert>(&sql)
            .bind(venue_id)
            .bind(product_id)
            .bind(AlertStatus::Active)
            .fetch_all(&self.pool)
            .await?;

        Ok(alerts)
    }

    /// Every alert for a product, newest first.
    pub async fn list_for_product(
        &self,
        venue_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<StockAlert>> {
        let sql = format!(
            "{} WHERE venue_id = ?1 AND product_id = ?2 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );

        let alerts = sqlx::query_as::<_, StockAlert>(&sql)
            .bind(venue_id)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(alerts)
    }

    /// Opens and resolves alerts in one transaction.
    ///
    /// Resolutions run first so a kind can be closed and reopened in the
    /// same call without tripping the one-active-per-kind index.
    pub async fn apply_changes(&self, changes: &AlertChanges, now: DateTime<Utc>) -> DbResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for id in &changes.resolved {
            sqlx::query(
                r#"
                UPDATE stock_alerts
                SET status = ?2, resolved_at = ?3, resolved_by = ?4
                WHERE id = ?1 AND status = ?5
                "#,
            )
            .bind(id)
            .bind(AlertStatus::Resolved)
            .bind(now)
            .bind(SYSTEM_RESOLVER)
            .bind(AlertStatus::Active)
            .execute(&mut *tx)
            .await?;
        }

        for alert in &changes.opened {
            sqlx::query(
                r#"
                INSERT INTO stock_alerts (
                    id, venue_id, product_id, kind, severity, status, message,
                    threshold, observed, created_at, resolved_at, resolved_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&alert.id)
            .bind(&alert.venue_id)
            .bind(&alert.product_id)
            .bind(alert.kind)
            .bind(alert.severity)
            .bind(alert.status)
            .bind(&alert.message)
            .bind(alert.threshold)
            .bind(alert.observed)
            .bind(alert.created_at)
            .bind(alert.resolved_at)
            .bind(&alert.resolved_by)
            .execute(&mut *tx)
            .await?;

            info!(
                alert_id = %alert.id,
                venue_id = %alert.venue_id,
                product_id = %alert.product_id,
                kind = ?alert.kind,
                observed = alert.observed,
                "Stock alert opened"
            );
        }

        tx.commit().await?;

        debug!(
            opened = changes.opened.len(),
            resolved = changes.resolved.len(),
            "Applied alert changes"
        );
        Ok(())
    }

    /// Resolves an alert by hand.
    ///
    /// Resolving an already resolved alert returns it unchanged.
    ///
    /// ## Errors
    /// `DbError::NotFound` if no alert has this ID.
    pub async fn resolve(
        &self,
        id: &str,
        resolved_by: &str,
        now: DateTime<Utc>,
    ) -> DbResult<StockAlert> {
        let result = sqlx::query(
            r#"
            UPDATE stock_alerts
            SET status = ?2, resolved_at = ?3, resolved_by = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(id)
        .bind(AlertStatus::Resolved)
        .bind(now)
        .bind(resolved_by)
        .bind(AlertStatus::Active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(alert_id = %id, resolved_by = %resolved_by, "Stock alert resolved");
        }

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("StockAlert", id))
    }
}
