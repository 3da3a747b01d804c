pub mod client;
pub mod detail;
pub mod index;
pub mod traits;
pub mod types;

pub use client::FetchClient;
pub use index::{parse_search_page, ListingIndexScanner};
pub use traits::{Page, PageFetcher};
pub use types::SearchParams;
