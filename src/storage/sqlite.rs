//! `SQLx`-backed record store.

use crate::models::VehicleRecord;
use crate::storage::error::{Result, StoreError};
use crate::storage::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

/// Record store over a `SQLite` pool with a unique `url` column.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: Pool<Sqlite>,
}

impl SqliteRecordStore {
    /// Open (creating if missing) the database at `url` and apply migrations.
    ///
    /// # Errors
    /// Returns `StoreError` if the connection string is invalid, the database
    /// cannot be opened, or the schema cannot be applied.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Open(format!("invalid connection string: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Open(format!("failed to open {url}: {e}")))?;

        tracing::info!("Record store opened at {}", url);
        Self::from_pool(pool).await
    }

    /// Private in-memory database. A single connection is kept alive so the data persists.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying migrations.
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cars")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Fetch the stored record for `url`, if any.
    pub async fn find_by_url(&self, url: &str) -> Result<Option<VehicleRecord>> {
        let row = sqlx::query(
            "SELECT url, title, price_usd, odometer, username, phone_number, image_url,
                    images_count, car_number, car_vin, observed_at
             FROM cars WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn upsert_ignore(&self, record: &VehicleRecord) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO cars (url, title, price_usd, odometer, username, phone_number,
                               image_url, images_count, car_number, car_vin, observed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (url) DO NOTHING",
        )
        .bind(&record.url)
        .bind(&record.title)
        .bind(record.price_usd)
        .bind(record.odometer)
        .bind(&record.username)
        .bind(&record.phone_number)
        .bind(&record.image_url)
        .bind(record.images_count)
        .bind(&record.car_number)
        .bind(&record.car_vin)
        .bind(record.observed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn record_from_row(row: &SqliteRow) -> Result<VehicleRecord> {
    let observed_at: String = row.try_get("observed_at")?;
    let observed_at = DateTime::parse_from_rfc3339(&observed_at)
        .map_err(|e| StoreError::Decode(format!("observed_at: {e}")))?
        .with_timezone(&Utc);

    Ok(VehicleRecord {
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        price_usd: row.try_get("price_usd")?,
        odometer: row.try_get("odometer")?,
        username: row.try_get("username")?,
        phone_number: row.try_get("phone_number")?,
        image_url: row.try_get("image_url")?,
        images_count: row.try_get("images_count")?,
        car_number: row.try_get("car_number")?,
        car_vin: row.try_get("car_vin")?,
        observed_at,
    })
}
