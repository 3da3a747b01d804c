use crate::pipeline::DEFAULT_CONCURRENCY;
use crate::scrapers::types::DEFAULT_START_URL;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Process configuration, read from the environment (and `.env` when present)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub start_url: String,
    pub scrape_hour: u32,
    pub scrape_minute: u32,
    pub dump_dir: PathBuf,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    pub run_deadline: Option<Duration>,
    pub scan_page_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scrape_hour = parse_or(&lookup, "SCRAPE_HOUR", 12u32)?;
        let scrape_minute = parse_or(&lookup, "SCRAPE_MINUTE", 0u32)?;
        if scrape_hour > 23 {
            bail!("SCRAPE_HOUR must be between 0 and 23, got {}", scrape_hour);
        }
        if scrape_minute > 59 {
            bail!("SCRAPE_MINUTE must be between 0 and 59, got {}", scrape_minute);
        }

        let fetch_concurrency = parse_or(&lookup, "FETCH_CONCURRENCY", DEFAULT_CONCURRENCY)?;
        if fetch_concurrency == 0 {
            bail!("FETCH_CONCURRENCY must be at least 1");
        }

        let run_deadline = match lookup("RUN_DEADLINE_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value("RUN_DEADLINE_SECS", &raw)?)),
            None => None,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://cars.db".to_string()),
            start_url: lookup("START_URL").unwrap_or_else(|| DEFAULT_START_URL.to_string()),
            scrape_hour,
            scrape_minute,
            dump_dir: lookup("DUMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("dumps")),
            fetch_concurrency,
            fetch_timeout: Duration::from_secs(parse_or(&lookup, "FETCH_TIMEOUT_SECS", 30u64)?),
            run_deadline,
            scan_page_retries: parse_or(&lookup, "SCAN_PAGE_RETRIES", 0u32)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
}
