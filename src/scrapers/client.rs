use crate::scrapers::traits::{Page, PageFetcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";
pub const ACCEPT_LANGUAGE_VALUE: &str = "uk-UA,uk;q=0.9";

/// HTTP fetcher sending the fixed header set, without retries
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    /// Create a fetch client with the default 30 second timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a fetch client with a custom per-request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch(&self, url: &str) -> Page {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Fetch failed for {}: {}", url, e);
                return Page::Unavailable;
            }
        };

        if !response.status().is_success() {
            debug!("{} returned status: {}", url, response.status());
            return Page::Unavailable;
        }

        match response.text().await {
            Ok(body) => {
                debug!("Downloaded {} bytes from {}", body.len(), url);
                Page::Body(body)
            }
            Err(e) => {
                debug!("Failed to read response body from {}: {}", url, e);
                Page::Unavailable
            }
        }
    }
}
