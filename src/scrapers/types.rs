use anyhow::{Context, Result};
use reqwest::Url;

pub const DEFAULT_START_URL: &str = "https://auto.ria.com/uk/search/?search_type=1&page=0&limit=50";

/// Search parameters for listing index scraping
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Search-results URL; its `page` query parameter is rewritten per page
    base_url: Url,
    /// Extra attempts for a failed results page before it counts as the end
    pub page_retries: u32,
}

impl SearchParams {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid search URL: {}", base_url))?;

        Ok(Self {
            base_url,
            page_retries: 0,
        })
    }

    pub fn with_page_retries(mut self, retries: u32) -> Self {
        self.page_retries = retries;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of results page `page`, keeping every other query parameter in place
    pub fn page_url(&self, page: u32) -> Url {
        let mut replaced = false;
        let pairs: Vec<(String, String)> = self
            .base_url
            .query_pairs()
            .map(|(key, value)| {
                if key == "page" {
                    replaced = true;
                    (key.into_owned(), page.to_string())
                } else {
                    (key.into_owned(), value.into_owned())
                }
            })
            .collect();

        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in &pairs {
                query.append_pair(key, value);
            }
            if !replaced {
                query.append_pair("page", &page.to_string());
            }
        }
        url
    }

    /// Resolve a listing href found on a results page
    pub fn resolve(&self, href: &str) -> Option<String> {
        self.base_url.join(href).ok().map(String::from)
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_START_URL).expect("default search URL is valid"),
            page_retries: 0,
        }
    }
}
