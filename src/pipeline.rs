//! One harvesting run: scan the listing index, enrich every listing from its
//! detail page, then persist and snapshot.

use crate::models::{DetailAttributes, ListingStub, VehicleRecord};
use crate::scrapers::detail;
use crate::scrapers::{ListingIndexScanner, Page, PageFetcher, SearchParams};
use crate::storage::{Backup, RecordStore};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 16;

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Stubs found on the search pages
    pub discovered: usize,
    /// Records whose detail step completed
    pub enriched: usize,
    pub inserted: usize,
    /// Records whose URL was already stored
    pub duplicates: usize,
    pub cancelled: bool,
}

/// Stateless pipeline; `run` may be called repeatedly and concurrently.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn RecordStore>,
    backup: Option<Arc<dyn Backup>>,
    params: SearchParams,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn RecordStore>,
        params: SearchParams,
    ) -> Self {
        Self {
            fetcher,
            store,
            backup: None,
            params,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Ceiling on in-flight detail fetches
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_backup(mut self, backup: Arc<dyn Backup>) -> Self {
        self.backup = Some(backup);
        self
    }

    /// Run to completion.
    ///
    /// # Errors
    /// Fails only when the record store does.
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_until(&CancellationToken::new()).await
    }

    /// Run until done or until `cancel` fires.
    ///
    /// On cancellation during enrichment, records that already completed are
    /// still persisted; listings still in flight are left for the next run.
    pub async fn run_until(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        info!("Scanning listing index from {}", self.params.base_url());

        let scanner = ListingIndexScanner::new(Arc::clone(&self.fetcher), self.params.clone());
        let stubs = tokio::select! {
            stubs = scanner.collect() => stubs,
            _ = cancel.cancelled() => {
                warn!("Run cancelled during index scan, nothing to store");
                return Ok(RunSummary { cancelled: true, ..RunSummary::default() });
            }
        };
        info!("Found {} listings, fetching detail pages", stubs.len());

        let discovered = stubs.len();
        let (records, cancelled) = self.enrich_all(stubs, cancel).await;
        if cancelled {
            warn!(
                "Run cancelled after enriching {} of {} listings",
                records.len(),
                discovered
            );
        }

        let mut summary = RunSummary {
            discovered,
            enriched: records.len(),
            cancelled,
            ..RunSummary::default()
        };

        for record in &records {
            let inserted = self
                .store
                .upsert_ignore(record)
                .await
                .inspect_err(|e| error!("Failed to store {}: {}", record.url, e))
                .with_context(|| format!("Failed to store {}", record.url))?;
            if inserted {
                summary.inserted += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        info!(
            "✅ Stored {} new records ({} already known)",
            summary.inserted, summary.duplicates
        );

        if let Some(backup) = &self.backup {
            if let Err(e) = backup.backup().await {
                warn!("Backup failed: {:#}", e);
            }
        }

        Ok(summary)
    }

    /// Fetch and extract every stub concurrently; results keep scan order.
    /// Once `cancel` fires, in-flight fetches are abandoned and nothing new starts.
    async fn enrich_all(
        &self,
        stubs: Vec<ListingStub>,
        cancel: &CancellationToken,
    ) -> (Vec<VehicleRecord>, bool) {
        let mut slots: Vec<Option<VehicleRecord>> = vec![None; stubs.len()];

        let mut tasks = stream::iter(stubs.into_iter().enumerate())
            .map(|(index, stub)| {
                let fetcher = Arc::clone(&self.fetcher);
                let fallback = stub.clone();
                let token = cancel.clone();
                async move {
                    // Spawned tasks outlive this stream, so each one watches the token itself
                    let task = tokio::spawn(async move {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => None,
                            record = enrich(fetcher, stub) => Some(record),
                        }
                    });
                    let record = match task.await {
                        Ok(record) => record,
                        Err(e) => {
                            warn!("Enrichment of {} aborted: {}", fallback.url, e);
                            Some(VehicleRecord::from_stub(fallback, Utc::now()))
                        }
                    };
                    (index, record)
                }
            })
            .buffer_unordered(self.concurrency);

        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = tasks.next() => match next {
                    Some((index, record)) => slots[index] = record,
                    None => break,
                },
            }
        }

        (slots.into_iter().flatten().collect(), cancelled)
    }
}

async fn enrich(fetcher: Arc<dyn PageFetcher>, stub: ListingStub) -> VehicleRecord {
    let attributes = match fetcher.fetch(&stub.url).await {
        Page::Body(html) => detail::extract(&html),
        Page::Unavailable => {
            debug!("Detail page unavailable: {}", stub.url);
            DetailAttributes::default()
        }
    };
    VehicleRecord::from_parts(stub, attributes, Utc::now())
}
