use async_trait::async_trait;

/// Outcome of a single page fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Body(String),
    /// Non-success status, network failure or timeout. Terminal for this URL in the current run.
    Unavailable,
}

/// Common trait for page retrieval.
/// Implementations must be safe to call from many tasks at once and never fail loudly.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET the page at `url`
    async fn fetch(&self, url: &str) -> Page;
}
