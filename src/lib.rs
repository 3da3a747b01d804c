//! Harvests vehicle listings from a paginated search site, recovers price,
//! mileage, contact and VIN from each detail page's embedded client state,
//! and stores them once per listing URL.

pub mod config;
pub mod models;
pub mod pipeline;
pub mod schedule;
pub mod scrapers;
pub mod storage;

pub use config::Config;
pub use models::{DetailAttributes, ListingStub, VehicleRecord};
pub use pipeline::{Pipeline, RunSummary};
pub use scrapers::{FetchClient, ListingIndexScanner, Page, PageFetcher, SearchParams};
pub use storage::{Backup, RecordStore, SqliteBackup, SqliteRecordStore, StoreError};
