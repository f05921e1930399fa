//! Ad card extraction from a results page.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::{DateNormalizer, SiteSelectors};
use crate::models::{AdRecord, NOT_AVAILABLE};

/// Why a card was skipped.
#[derive(Debug, Error, PartialEq, Eq)]
enum CardError {
    #[error("card has no title")]
    MissingTitle,
    #[error("card has no link")]
    MissingLink,
    #[error("cannot resolve link '{0}'")]
    BadLink(String),
}

/// Split the combined "location - date" text.
///
/// Splits on every occurrence of `separator`; the first part is the location
/// and the second the date. Parts are trimmed. The date is `None` when the
/// separator does not occur.
pub fn split_location_date(text: &str, separator: &str) -> (String, Option<String>) {
    if separator.is_empty() {
        return (text.trim().to_string(), None);
    }
    let mut parts = text.split(separator);
    let location = parts.next().unwrap_or_default().trim().to_string();
    let date = parts.next().map(|d| d.trim().to_string());
    (location, date)
}

/// Extracts [`AdRecord`]s from listing pages.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    selectors: SiteSelectors,
    separator: String,
    normalizer: DateNormalizer,
}

impl PageExtractor {
    pub fn new(selectors: SiteSelectors, separator: &str, normalizer: DateNormalizer) -> Self {
        Self {
            selectors,
            separator: separator.to_string(),
            normalizer,
        }
    }

    /// Extract every complete ad card from `html`.
    ///
    /// Relative links are resolved against `page_url`; "today" dates are
    /// normalized against `today`. Cards lacking a title or link are
    /// skipped and logged; extraction itself never fails.
    pub fn extract(&self, html: &str, page_url: &str, today: NaiveDate) -> Vec<AdRecord> {
        let document = Html::parse_document(html);
        let base = match Url::parse(page_url) {
            Ok(base) => Some(base),
            Err(e) => {
                warn!("Page URL {} is not absolute ({}); only absolute links kept", page_url, e);
                None
            }
        };

        let cards: Vec<ElementRef> = document.select(&self.selectors.ad_card).collect();
        if cards.is_empty() {
            warn!(
                "No ad cards found on {}; check the ad_card selector",
                page_url
            );
            return Vec::new();
        }

        let mut ads = Vec::with_capacity(cards.len());
        for (index, card) in cards.into_iter().enumerate() {
            match self.extract_card(card, base.as_ref(), today) {
                Ok(ad) => ads.push(ad),
                Err(e) => debug!("Skipping card #{} on {}: {}", index + 1, page_url, e),
            }
        }

        info!("Extracted {} ad(s) from {}", ads.len(), page_url);
        ads
    }

    fn extract_card(
        &self,
        card: ElementRef,
        base: Option<&Url>,
        today: NaiveDate,
    ) -> Result<AdRecord, CardError> {
        let title = first_text(card, &self.selectors.title).ok_or(CardError::MissingTitle)?;
        let url = self.resolve_link(card, base)?;

        let (location, posted_at) = match first_text(card, &self.selectors.location_date) {
            Some(text) => {
                let (location, date) = split_location_date(&text, &self.separator);
                let posted_at = match date {
                    Some(raw) => self.normalizer.normalize(&raw, today),
                    None => NOT_AVAILABLE.to_string(),
                };
                (location, posted_at)
            }
            None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
        };

        let ad = AdRecord {
            posted_at,
            title,
            location,
            price: first_text(card, &self.selectors.price)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            area: first_text(card, &self.selectors.area).unwrap_or_default(),
            url,
        };

        if ad.title == NOT_AVAILABLE {
            return Err(CardError::MissingTitle);
        }
        if !ad.is_complete() {
            return Err(CardError::MissingLink);
        }
        Ok(ad)
    }

    fn resolve_link(&self, card: ElementRef, base: Option<&Url>) -> Result<String, CardError> {
        let href = card
            .select(&self.selectors.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(CardError::MissingLink)?;

        let resolved = match base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        resolved
            .map(String::from)
            .map_err(|_| CardError::BadLink(href.to_string()))
    }
}

/// Trimmed text of the first element matching `selector`.
fn first_text(card: ElementRef, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}
