//! Pagination discovery for listing searches.
//!
//! The first results page carries a pagination list whose last item is the
//! last page number. From that number the full list of page URLs is
//! generated without visiting the intermediate pages.

use scraper::{ElementRef, Html};
use tracing::{info, warn};

use super::{PageSource, SiteSelectors};

/// Outcome of reading the first page's pagination markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    /// The search has this many result pages (always at least 1).
    Pages(u32),
    /// The site reported an empty result set.
    NoResults,
}

/// Determine the number of result pages from first-page markup.
///
/// Resolution order:
/// 1. digits in the last pagination item's link text,
/// 2. the last item's `aria-label` when it mentions "Page",
/// 3. a single item with no forward control means one page,
/// 4. anything else is ambiguous and treated as one page.
pub fn resolve_page_count(html: &str, selectors: &SiteSelectors) -> PageCount {
    let document = Html::parse_document(html);
    let items: Vec<ElementRef> = document.select(&selectors.pagination_item).collect();

    let Some(last_item) = items.last() else {
        if document.select(&selectors.no_results).next().is_some() {
            info!("Search returned no listings");
            return PageCount::NoResults;
        }
        warn!("Pagination block not found; assuming a single page");
        return PageCount::Pages(1);
    };

    let link_text = last_item
        .select(&selectors.pagination_link)
        .next()
        .map(|a| a.text().collect::<String>().trim().to_string());

    if let Some(text) = link_text.filter(|t| is_digits(t)) {
        return match text.parse::<u32>() {
            Ok(n) => {
                info!("Last page number: {}", n);
                PageCount::Pages(n.max(1))
            }
            Err(e) => {
                warn!("Could not parse last page '{}': {}; assuming one page", text, e);
                PageCount::Pages(1)
            }
        };
    }

    let aria_label = last_item.value().attr("aria-label").unwrap_or("");
    if aria_label.contains("Page") {
        return match aria_label
            .split_whitespace()
            .last()
            .and_then(|n| n.parse::<u32>().ok())
        {
            Some(n) => {
                info!("Last page number from aria-label: {}", n);
                PageCount::Pages(n.max(1))
            }
            None => {
                warn!(
                    "Could not parse aria-label '{}'; assuming one page",
                    aria_label
                );
                PageCount::Pages(1)
            }
        };
    }

    if items.len() <= 1 && document.select(&selectors.pagination_forward).next().is_none() {
        info!("Found a single results page");
        return PageCount::Pages(1);
    }

    warn!("Could not determine the last page number; check pagination selectors");
    PageCount::Pages(1)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Generate URLs for pages `1..=total`.
///
/// Page 1 is the seed verbatim. Page 2 is joined with `&` when the seed
/// already has a query string and `?` otherwise; every later page is joined
/// with `&`. Each URL appends `page=N` to the unmodified seed.
pub fn generate_page_urls(seed: &str, total: u32) -> Vec<String> {
    if total < 1 {
        return Vec::new();
    }

    let mut urls = Vec::with_capacity(total as usize);
    urls.push(seed.to_string());

    let mut separator = if seed.contains('?') { '&' } else { '?' };
    for page in 2..=total {
        urls.push(format!("{}{}page={}", seed, separator, page));
        separator = '&';
    }
    urls
}

/// Discovers the page URLs of a listing search.
#[derive(Debug, Clone)]
pub struct Paginator {
    selectors: SiteSelectors,
}

impl Paginator {
    pub fn new(selectors: SiteSelectors) -> Self {
        Self { selectors }
    }

    /// Fetch the seed page and return every page URL of the search.
    ///
    /// Returns an empty list when the seed cannot be fetched or the search
    /// has no results.
    pub async fn discover_pages(&self, source: &dyn PageSource, seed: &str) -> Vec<String> {
        info!("Discovering pages from {}", seed);

        let html = match source.fetch(seed).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not fetch first page {}: {}", seed, e);
                return Vec::new();
            }
        };

        match resolve_page_count(&html, &self.selectors) {
            PageCount::NoResults => Vec::new(),
            PageCount::Pages(total) => {
                let urls = generate_page_urls(seed, total);
                info!("Generated {} page URL(s)", urls.len());
                urls
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::scrapers::FetchError;
    use async_trait::async_trait;

    fn selectors() -> SiteSelectors {
        SiteSelectors::from_config(&SiteConfig::default()).unwrap()
    }

    fn pagination(items: &[&str], forward: bool) -> String {
        let lis: String = items
            .iter()
            .enumerate()
            .map(|(i, inner)| {
                format!(
                    r#"<li data-testid="pagination-list-item-{}">{}</li>"#,
                    i + 1,
                    inner
                )
            })
            .collect();
        let fwd = if forward {
            r#"<a data-testid="pagination-forward" href="?page=2">next</a>"#
        } else {
            ""
        };
        format!(
            r#"<html><body><ul data-testid="pagination-list">{}</ul>{}</body></html>"#,
            lis, fwd
        )
    }

    #[test]
    fn test_generate_seed_without_query() {
        let seed = "https://example.com/kiev/";
        assert_eq!(
            generate_page_urls(seed, 3),
            vec![
                seed.to_string(),
                format!("{}?page=2", seed),
                format!("{}&page=3", seed),
            ]
        );
    }

    #[test]
    fn test_generate_seed_with_query() {
        let seed = "https://example.com/kiev/?currency=UAH";
        assert_eq!(
            generate_page_urls(seed, 3),
            vec![
                seed.to_string(),
                format!("{}&page=2", seed),
                format!("{}&page=3", seed),
            ]
        );
    }

    #[test]
    fn test_generate_single_and_zero() {
        assert_eq!(generate_page_urls("https://a/", 1), vec!["https://a/"]);
        assert!(generate_page_urls("https://a/", 0).is_empty());
    }

    #[test]
    fn test_last_item_digits() {
        let html = pagination(
            &[
                r#"<a href="/">1</a>"#,
                r#"<a href="?page=2">2</a>"#,
                r#"<a href="?page=17"> 17 </a>"#,
            ],
            true,
        );
        assert_eq!(resolve_page_count(&html, &selectors()), PageCount::Pages(17));
    }

    #[test]
    fn test_aria_label_fallback() {
        let html = r#"<ul data-testid="pagination-list">
            <li data-testid="pagination-list-item-1"><a>1</a></li>
            <li data-testid="pagination-list-item-2" aria-label="Page 9"><a>…</a></li>
        </ul>"#;
        assert_eq!(resolve_page_count(html, &selectors()), PageCount::Pages(9));
    }

    #[test]
    fn test_unparseable_aria_label_defaults_to_one() {
        let html = r#"<ul data-testid="pagination-list">
            <li data-testid="pagination-list-item-1"><a>1</a></li>
            <li data-testid="pagination-list-item-2" aria-label="Page last"><a>…</a></li>
        </ul>"#;
        assert_eq!(resolve_page_count(html, &selectors()), PageCount::Pages(1));
    }

    #[test]
    fn test_single_item_without_forward() {
        let html = pagination(&["<span>current</span>"], false);
        assert_eq!(resolve_page_count(&html, &selectors()), PageCount::Pages(1));
    }

    #[test]
    fn test_ambiguous_pagination_defaults_to_one() {
        let html = pagination(&["<span>a</span>", "<span>b</span>"], true);
        assert_eq!(resolve_page_count(&html, &selectors()), PageCount::Pages(1));
    }

    #[test]
    fn test_digit_overflow_defaults_to_one() {
        let html = pagination(&[r#"<a>99999999999999999999</a>"#], false);
        assert_eq!(resolve_page_count(&html, &selectors()), PageCount::Pages(1));
    }

    #[test]
    fn test_no_pagination_block() {
        let html = "<html><body><div>listings</div></body></html>";
        assert_eq!(resolve_page_count(html, &selectors()), PageCount::Pages(1));
    }

    #[test]
    fn test_no_results_marker() {
        let html = r#"<html><body><div data-testid="no-search-results">Нічого</div></body></html>"#;
        assert_eq!(resolve_page_count(html, &selectors()), PageCount::NoResults);
    }

    struct StaticSource(Result<String, ()>);

    #[async_trait]
    impl PageSource for StaticSource {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.0.clone().map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_discover_pages_starts_with_seed() {
        let html = pagination(&[r#"<a>1</a>"#, r#"<a>2</a>"#], true);
        let paginator = Paginator::new(selectors());
        let seed = "https://example.com/search";
        let pages = paginator
            .discover_pages(&StaticSource(Ok(html)), seed)
            .await;
        assert_eq!(pages, vec![seed.to_string(), format!("{}?page=2", seed)]);
    }

    #[tokio::test]
    async fn test_discover_pages_fetch_failure_is_empty() {
        let paginator = Paginator::new(selectors());
        let pages = paginator
            .discover_pages(&StaticSource(Err(())), "https://example.com/search")
            .await;
        assert!(pages.is_empty());
    }
}
