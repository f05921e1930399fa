//! Compiled CSS selectors for the target site.

use scraper::Selector;

use crate::config::{ConfigError, SiteConfig};

/// Selector set compiled once from [`SiteConfig`].
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub ad_card: Selector,
    pub title: Selector,
    pub location_date: Selector,
    pub price: Selector,
    pub area: Selector,
    pub link: Selector,
    pub pagination_item: Selector,
    pub pagination_link: Selector,
    pub pagination_forward: Selector,
    pub no_results: Selector,
}

fn parse(field: &'static str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|_| ConfigError::InvalidSelector {
        field,
        selector: css.to_string(),
    })
}

impl SiteSelectors {
    pub fn from_config(site: &SiteConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            ad_card: parse("ad_card", &site.ad_card)?,
            title: parse("title", &site.title)?,
            location_date: parse("location_date", &site.location_date)?,
            price: parse("price", &site.price)?,
            area: parse("area", &site.area)?,
            link: parse("link", &site.link)?,
            pagination_item: parse("pagination_item", &site.pagination_item)?,
            pagination_link: parse("pagination_link", &site.pagination_link)?,
            pagination_forward: parse("pagination_forward", &site.pagination_forward)?,
            no_results: parse("no_results", &site.no_results)?,
        })
    }
}
