//! Price history persistence

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::domain::price::{NewPrice, PriceRecord};

const PRICE_COLUMNS: &str = "id, version_id, source, currency, price, condition, price_type, \
    listing_count, source_url, recorded_at";

#[derive(Clone)]
pub struct PriceRepository {
    pool: Arc<SqlitePool>,
}

impl PriceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Store a price unless this version already has one from the same
    /// source on the same (UTC) day. Returns whether a row was written.
    pub async fn record_daily_price(&self, price: &NewPrice) -> Result<bool> {
        self.record_daily_price_at(price, Utc::now()).await
    }

    pub async fn record_daily_price_at(&self, price: &NewPrice, at: DateTime<Utc>) -> Result<bool> {
        let day = at.format("%Y-%m-%d").to_string();
        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM price_history \
             WHERE version_id = ? AND source = ? AND substr(recorded_at, 1, 10) = ?",
        )
        .bind(price.version_id)
        .bind(&price.source)
        .bind(&day)
        .fetch_one(&*self.pool)
        .await?;

        if existing > 0 {
            tracing::debug!(
                "Price for version {} from {} already recorded on {}",
                price.version_id,
                price.source,
                day
            );
            return Ok(false);
        }

        self.insert_price(price, at).await?;
        Ok(true)
    }

    pub async fn insert_price(&self, price: &NewPrice, at: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO price_history
            (version_id, source, currency, price, condition, price_type, listing_count, source_url, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(price.version_id)
        .bind(&price.source)
        .bind(&price.currency)
        .bind(price.price)
        .bind(&price.condition)
        .bind(&price.price_type)
        .bind(price.listing_count)
        .bind(&price.source_url)
        .bind(at)
        .execute(&*self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn latest_price(&self, version_id: i64) -> Result<Option<PriceRecord>> {
        let sql = format!(
            "SELECT {PRICE_COLUMNS} FROM price_history WHERE version_id = ? \
             ORDER BY recorded_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(version_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.as_ref().map(price_from_row).transpose()
    }

    /// Oldest first, optionally restricted to one source
    pub async fn price_history(&self, version_id: i64, source: Option<&str>) -> Result<Vec<PriceRecord>> {
        let sql = format!(
            "SELECT {PRICE_COLUMNS} FROM price_history \
             WHERE version_id = ? AND (? IS NULL OR source = ?) \
             ORDER BY recorded_at, id"
        );
        let rows = sqlx::query(&sql)
            .bind(version_id)
            .bind(source)
            .bind(source)
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(price_from_row).collect()
    }

    pub async fn count_for_source(&self, source: &str) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM price_history WHERE source = ?")
            .bind(source)
            .fetch_one(&*self.pool)
            .await?;
        Ok(count)
    }
}

fn price_from_row(row: &SqliteRow) -> Result<PriceRecord> {
    Ok(PriceRecord {
        id: row.try_get("id")?,
        version_id: row.try_get("version_id")?,
        source: row.try_get("source")?,
        currency: row.try_get("currency")?,
        price: row.try_get("price")?,
        condition: row.try_get("condition")?,
        price_type: row.try_get("price_type")?,
        listing_count: row.try_get("listing_count")?,
        source_url: row.try_get("source_url")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}
