use anyhow::{Context, Result};
use car_scout::schedule::next_run_after;
use car_scout::{Config, FetchClient, Pipeline, SearchParams, SqliteBackup, SqliteRecordStore};
use chrono::Local;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "car-scout")]
#[command(about = "Harvest vehicle listings into a local database once a day")]
struct Cli {
    /// Run a single harvest now and exit instead of waiting for the daily trigger
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("car_scout=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    info!("🚗 Car Scout");

    let store = Arc::new(SqliteRecordStore::connect(&config.database_url).await?);
    let params = SearchParams::new(&config.start_url)?.with_page_retries(config.scan_page_retries);
    let pipeline = Pipeline::new(
        Arc::new(FetchClient::with_timeout(config.fetch_timeout)?),
        store.clone(),
        params,
    )
    .with_concurrency(config.fetch_concurrency)
    .with_backup(Arc::new(SqliteBackup::new(
        store.pool().clone(),
        config.dump_dir.clone(),
    )));

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing current run");
            on_signal.cancel();
        }
    });

    if cli.once {
        harvest(&pipeline, &config, &shutdown).await?;
        store.close().await;
        return Ok(());
    }

    info!(
        "Scheduler started, harvesting daily at {:02}:{:02}",
        config.scrape_hour, config.scrape_minute
    );

    loop {
        let now = Local::now();
        let next = next_run_after(&now, config.scrape_hour, config.scrape_minute)
            .context("No valid next run time")?;
        info!("Next harvest at {}", next.format("%Y-%m-%d %H:%M"));

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.cancelled() => break,
        }

        if let Err(e) = harvest(&pipeline, &config, &shutdown).await {
            error!("Harvest failed: {:#}", e);
        }
        if shutdown.is_cancelled() {
            break;
        }
    }

    store.close().await;
    Ok(())
}

/// One run, bounded by the configured deadline and by process shutdown
async fn harvest(pipeline: &Pipeline, config: &Config, shutdown: &CancellationToken) -> Result<()> {
    let cancel = shutdown.child_token();
    if let Some(deadline) = config.run_deadline {
        let timer = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            timer.cancel();
        });
    }

    let summary = pipeline.run_until(&cancel).await?;
    cancel.cancel();

    println!(
        "{} listings found, {} enriched, {} new, {} already stored{}",
        summary.discovered,
        summary.enriched,
        summary.inserted,
        summary.duplicates,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}
