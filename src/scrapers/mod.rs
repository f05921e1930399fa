//! Listing scraper: fetching, pagination discovery and card extraction.

pub mod date;
pub mod extract;
mod http_client;
pub mod pagination;
mod selectors;

pub use date::DateNormalizer;
pub use extract::{split_location_date, PageExtractor};
pub use http_client::{pick_user_agent, FetchError, HttpClient, DEFAULT_USER_AGENTS};
pub use pagination::{generate_page_urls, resolve_page_count, PageCount, Paginator};
pub use selectors::SiteSelectors;

use async_trait::async_trait;

/// Anything that can turn a URL into page markup.
///
/// Implemented by [`HttpClient`]; tests drive the pipeline with in-memory
/// sources.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page. Failures are returned, never retried.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
