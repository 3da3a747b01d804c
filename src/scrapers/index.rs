use crate::models::ListingStub;
use crate::scrapers::traits::{Page, PageFetcher};
use crate::scrapers::types::SearchParams;
use futures::stream::{self, Stream, StreamExt};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

static LISTING_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href*='auto_']").expect("listing selector is valid"));
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector is valid"));

/// Walks search-result pages in order until one is empty or unavailable
pub struct ListingIndexScanner {
    fetcher: Arc<dyn PageFetcher>,
    params: SearchParams,
}

impl ListingIndexScanner {
    pub fn new(fetcher: Arc<dyn PageFetcher>, params: SearchParams) -> Self {
        Self { fetcher, params }
    }

    /// Lazily yield stubs page by page, starting fresh at page 0 on every call.
    ///
    /// The next page is only requested once the current one has been judged non-empty.
    pub fn scan(&self) -> impl Stream<Item = ListingStub> + Send + '_ {
        stream::unfold(0u32, move |page| async move {
            let stubs = self.scan_page(page).await;
            if stubs.is_empty() {
                info!("Listing index exhausted at page {}", page);
                None
            } else {
                Some((stubs, page + 1))
            }
        })
        .flat_map(stream::iter)
    }

    /// Drain the whole index before returning
    pub async fn collect(&self) -> Vec<ListingStub> {
        self.scan().collect().await
    }

    async fn scan_page(&self, page: u32) -> Vec<ListingStub> {
        let url = self.params.page_url(page);

        for attempt in 0..=self.params.page_retries {
            match self.fetcher.fetch(url.as_str()).await {
                Page::Body(html) => {
                    let stubs = parse_search_page(&html, &self.params);
                    debug!("Page {}: {} listings", page, stubs.len());
                    return stubs;
                }
                Page::Unavailable => {
                    debug!("Search page {} unavailable (attempt {})", page, attempt + 1);
                }
            }
        }

        Vec::new()
    }
}

/// Extract listing stubs from one search-results page.
///
/// Duplicate hrefs on the same page keep their first occurrence.
pub fn parse_search_page(html: &str, params: &SearchParams) -> Vec<ListingStub> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut stubs = Vec::new();

    for anchor in document.select(&LISTING_LINK) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.is_empty() || !seen.insert(href.to_string()) {
            continue;
        }
        let Some(url) = params.resolve(href) else {
            debug!("Skipping unresolvable href: {}", href);
            continue;
        };

        let text = anchor.text().collect::<Vec<_>>().join(" ");
        let words: Vec<&str> = text.split_whitespace().collect();
        let title = if words.len() > 1 {
            words[1..words.len().min(4)].join(" ")
        } else {
            String::new()
        };

        let image_url = anchor
            .select(&IMAGE)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);
        let images_count = u32::from(image_url.is_some());

        stubs.push(ListingStub {
            url,
            title,
            image_url,
            images_count,
        });
    }

    stubs
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves canned pages by URL and records every request
    struct ScriptedFetcher {
        pages: Vec<(String, Page)>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<(String, Page)>) -> Self {
            Self {
                pages,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Page {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .iter()
                .find(|(u, _)| u == url)
                .map(|(_, page)| page.clone())
                .unwrap_or(Page::Unavailable)
        }
    }

    fn results_page(hrefs: &[&str]) -> String {
        let anchors: String = hrefs
            .iter()
            .map(|href| {
                format!(
                    r#"<a href="{href}"><img src="https://cdn.example/{href}.jpg">Продаж Toyota Camry 2018 року</a>"#
                )
            })
            .collect();
        format!("<html><body>{anchors}</body></html>")
    }

    #[test]
    fn test_parse_search_page_extracts_stub_fields() {
        let html = r#"
            <html><body>
              <a href="/uk/auto_bmw_x5_100.html">
                <img src="https://cdn.riastatic.com/photos/100.jpg">
                Продаж BMW X5 2019 дизель
              </a>
              <a href="/uk/news/other.html">Not a listing</a>
            </body></html>
        "#;
        let stubs = parse_search_page(html, &SearchParams::default());

        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].url, "https://auto.ria.com/uk/auto_bmw_x5_100.html");
        assert_eq!(stubs[0].title, "BMW X5 2019");
        assert_eq!(
            stubs[0].image_url.as_deref(),
            Some("https://cdn.riastatic.com/photos/100.jpg")
        );
        assert_eq!(stubs[0].images_count, 1);
    }

    #[test]
    fn test_parse_search_page_keeps_first_duplicate() {
        let html = r#"
            <a href="/uk/auto_a_1.html">Продаж Audi A4 2015</a>
            <a href="/uk/auto_a_1.html">Duplicate Audi link text</a>
            <a>no href at all auto_</a>
            <a href="/uk/auto_b_2.html">Single</a>
        "#;
        let stubs = parse_search_page(html, &SearchParams::default());

        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].title, "Audi A4 2015");
        assert_eq!(stubs[0].image_url, None);
        assert_eq!(stubs[0].images_count, 0);
        assert_eq!(stubs[1].url, "https://auto.ria.com/uk/auto_b_2.html");
        assert_eq!(stubs[1].title, "");
    }

    #[tokio::test]
    async fn test_scan_stops_at_first_empty_page() {
        let params = SearchParams::default();
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            (
                params.page_url(0).to_string(),
                Page::Body(results_page(&["/uk/auto_a_1.html", "/uk/auto_b_2.html"])),
            ),
            (
                params.page_url(1).to_string(),
                Page::Body(results_page(&["/uk/auto_c_3.html"])),
            ),
            (
                params.page_url(2).to_string(),
                Page::Body("<html><body>Нічого не знайдено</body></html>".to_string()),
            ),
            (
                params.page_url(3).to_string(),
                Page::Body(results_page(&["/uk/auto_d_4.html"])),
            ),
        ]));
        let scanner = ListingIndexScanner::new(fetcher.clone(), params.clone());

        let stubs = scanner.collect().await;

        let urls: Vec<&str> = stubs.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://auto.ria.com/uk/auto_a_1.html",
                "https://auto.ria.com/uk/auto_b_2.html",
                "https://auto.ria.com/uk/auto_c_3.html",
            ]
        );
        assert_eq!(
            fetcher.requests(),
            vec![
                params.page_url(0).to_string(),
                params.page_url(1).to_string(),
                params.page_url(2).to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_stops_at_unavailable_page() {
        let params = SearchParams::default();
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(
            params.page_url(0).to_string(),
            Page::Body(results_page(&["/uk/auto_a_1.html"])),
        )]));
        let scanner = ListingIndexScanner::new(fetcher.clone(), params);

        let stubs = scanner.collect().await;

        assert_eq!(stubs.len(), 1);
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_restarts_at_page_zero() {
        let params = SearchParams::default();
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(
            params.page_url(0).to_string(),
            Page::Body(results_page(&["/uk/auto_a_1.html"])),
        )]));
        let scanner = ListingIndexScanner::new(fetcher.clone(), params.clone());

        assert_eq!(scanner.collect().await.len(), 1);
        assert_eq!(scanner.collect().await.len(), 1);
        assert_eq!(fetcher.requests()[2], params.page_url(0).to_string());
    }

    #[tokio::test]
    async fn test_page_retries_refetch_before_stopping() {
        let params = SearchParams::default().with_page_retries(2);
        let fetcher = Arc::new(ScriptedFetcher::new(vec![]));
        let scanner = ListingIndexScanner::new(fetcher.clone(), params);

        assert!(scanner.collect().await.is_empty());
        assert_eq!(fetcher.requests().len(), 3);
    }
}
