//! # Summary Repository
//!
//! The `monthly_summaries` projection. Rows are overwritten on every ledger
//! write for the affected months and can always be rebuilt from the ledger.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{DbError, DbResult};
use stockbook_core::{MonthlySummary, YearMonth};

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    venue_id: String,
    product_id: String,
    year: i64,
    month: i64,
    current_stock: i64,
    reserved_stock: i64,
    available_stock: i64,
    purchases: i64,
    sales: i64,
    adjustments: i64,
    waste: i64,
    returns: i64,
    unbacked_sales: i64,
    stock_value_cents: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SummaryRow> for MonthlySummary {
    type Error = DbError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(MonthlySummary {
            period: YearMonth::new(row.year as i32, row.month as u32)
                .map_err(|e| DbError::Serialization(e.to_string()))?,
            venue_id: row.venue_id,
            product_id: row.product_id,
            current_stock: row.current_stock,
            reserved_stock: row.reserved_stock,
            available_stock: row.available_stock,
            purchases: row.purchases,
            sales: row.sales,
            adjustments: row.adjustments,
            waste: row.waste,
            returns: row.returns,
            unbacked_sales: row.unbacked_sales,
            stock_value_cents: row.stock_value_cents,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        venue_id, product_id, year, month,
        current_stock, reserved_stock, available_stock,
        purchases, sales, adjustments, waste, returns, unbacked_sales,
        stock_value_cents, updated_at
    FROM monthly_summaries
"#;

/// Repository for monthly summaries.
#[derive(Debug, Clone)]
pub struct SummaryRepository {
    pool: SqlitePool,
}

impl SummaryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SummaryRepository { pool }
    }

    /// Inserts or replaces a summary on an open connection or transaction.
    pub async fn upsert_with(conn: &mut SqliteConnection, summary: &MonthlySummary) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monthly_summaries (
                venue_id, product_id, year, month,
                current_stock, reserved_stock, available_stock,
                purchases, sales, adjustments, waste, returns, unbacked_sales,
                stock_value_cents, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT (venue_id, product_id, year, month) DO UPDATE SET
                current_stock = excluded.current_stock,
                reserved_stock = excluded.reserved_stock,
                available_stock = excluded.available_stock,
                purchases = excluded.purchases,
                sales = excluded.sales,
                adjustments = excluded.adjustments,
                waste = excluded.waste,
                returns = excluded.returns,
                unbacked_sales = excluded.unbacked_sales,
                stock_value_cents = excluded.stock_value_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&summary.venue_id)
        .bind(&summary.product_id)
        .bind(summary.period.year as i64)
        .bind(summary.period.month as i64)
        .bind(summary.current_stock)
        .bind(summary.reserved_stock)
        .bind(summary.available_stock)
        .bind(summary.purchases)
        .bind(summary.sales)
        .bind(summary.adjustments)
        .bind(summary.waste)
        .bind(summary.returns)
        .bind(summary.unbacked_sales)
        .bind(summary.stock_value_cents)
        .bind(summary.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets the stored summary for one month.
    pub async fn get(
        &self,
        venue_id: &str,
        product_id: &str,
        period: YearMonth,
    ) -> DbResult<Option<MonthlySummary>> {
        let sql = format!(
            "{} WHERE venue_id = ?1 AND product_id = ?2 AND year = ?3 AND month = ?4",
            SELECT_COLUMNS
        );

        sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(venue_id)
            .bind(product_id)
            .bind(period.year as i64)
            .bind(period.month as i64)
            .fetch_optional(&self.pool)
            .await?
            .map(MonthlySummary::try_from)
            .transpose()
    }

    /// Lists a product's summaries, oldest month first.
    pub async fn list_for_product(
        &self,
        venue_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<MonthlySummary>> {
        let sql = format!(
            "{} WHERE venue_id = ?1 AND product_id = ?2 ORDER BY year, month",
            SELECT_COLUMNS
        );

        sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(venue_id)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(MonthlySummary::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn summary(stock: i64, sales: i64) -> MonthlySummary {
        MonthlySummary {
            venue_id: "v1".to_string(),
            product_id: "p1".to_string(),
            period: YearMonth::new(2025, 1).unwrap(),
            current_stock: stock,
            reserved_stock: 0,
            available_stock: stock,
            purchases: stock + sales,
            sales,
            adjustments: 0,
            waste: 0,
            returns: 0,
            unbacked_sales: 0,
            stock_value_cents: stock * 100,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.summaries();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            SummaryRepository::upsert_with(&mut conn, &summary(10, 0)).await.unwrap();
            SummaryRepository::upsert_with(&mut conn, &summary(3, 7)).await.unwrap();
        }

        let all = repo.list_for_product("v1", "p1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].current_stock, 3);
        assert_eq!(all[0].sales, 7);
        assert_eq!(all[0].stock_value_cents, 300);

        let missing = repo
            .get("v1", "p1", YearMonth::new(2025, 2).unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
