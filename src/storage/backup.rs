use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use tracing::info;

/// Post-run snapshot of the record store. Best-effort: callers only log failures.
#[async_trait]
pub trait Backup: Send + Sync {
    /// Write a timestamped dump and return its path
    async fn backup(&self) -> Result<PathBuf>;
}

/// Dumps a `SQLite` database to `<dir>/dump_<YYYYmmdd_HHMMSS>.db` with `VACUUM INTO`
pub struct SqliteBackup {
    pool: Pool<Sqlite>,
    dir: PathBuf,
}

impl SqliteBackup {
    pub fn new(pool: Pool<Sqlite>, dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl Backup for SqliteBackup {
    async fn backup(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create dump directory {}", self.dir.display()))?;

        let filename = format!("dump_{}.db", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(filename);
        let target = path
            .to_str()
            .context("Dump path is not valid UTF-8")?
            .replace('\'', "''");

        sqlx::query(&format!("VACUUM INTO '{target}'"))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to write dump {}", path.display()))?;

        // VACUUM INTO on an in-memory database succeeds without writing anything
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            bail!("Dump {} was not written", path.display());
        }

        info!("💾 Database dump saved to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VehicleRecord;
    use crate::storage::{RecordStore, SqliteRecordStore};
    use chrono::Utc;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "car-scout-{}-{}-{}",
            name,
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    fn record() -> VehicleRecord {
        VehicleRecord {
            url: "https://auto.ria.com/uk/auto_dump_1.html".to_string(),
            title: "Lada Niva".to_string(),
            price_usd: 3000,
            odometer: None,
            username: None,
            phone_number: None,
            image_url: None,
            images_count: 0,
            car_number: None,
            car_vin: None,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_backup_writes_dump_file() {
        let dir = scratch_dir("dump");
        tokio::fs::create_dir_all(&dir).await.expect("create scratch dir");
        let store = SqliteRecordStore::connect(&format!("sqlite://{}", dir.join("src.db").display()))
            .await
            .expect("open store");
        store.upsert_ignore(&record()).await.expect("insert");

        let dumps = dir.join("dumps");
        let backup = SqliteBackup::new(store.pool().clone(), dumps.clone());

        let path = backup.backup().await.expect("backup");

        assert!(path.starts_with(&dumps));
        assert!(tokio::fs::metadata(&path).await.expect("dump exists").len() > 0);

        let copy = SqliteRecordStore::connect(&format!("sqlite://{}", path.display()))
            .await
            .expect("open dump");
        assert_eq!(copy.count().await.unwrap(), 1);

        copy.close().await;
        store.close().await;
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_backup_of_in_memory_store_reports_failure() {
        let store = SqliteRecordStore::in_memory().await.expect("open store");
        store.upsert_ignore(&record()).await.expect("insert");

        let dir = scratch_dir("memdump");
        let backup = SqliteBackup::new(store.pool().clone(), dir.clone());

        assert!(backup.backup().await.is_err());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
