//! Persistence of vehicle records, keyed by listing URL.

pub mod backup;
pub mod error;
pub mod sqlite;

pub use backup::{Backup, SqliteBackup};
pub use error::{Result, StoreError};
pub use sqlite::SqliteRecordStore;

use crate::models::VehicleRecord;
use async_trait::async_trait;

/// Insert-if-absent store. A stored row is never modified afterwards.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert `record` unless its URL is already stored.
    ///
    /// Returns `false` (not an error) when the URL exists; the existing row is left untouched.
    async fn upsert_ignore(&self, record: &VehicleRecord) -> Result<bool>;
}
