//! Scraped listing record.

use serde::{Deserialize, Serialize};

/// Placeholder for fields the listing card did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

/// One scraped listing.
///
/// Identity is the `url` field: two records describe the same listing iff
/// their URLs are byte-for-byte equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRecord {
    /// Normalized absolute date, or the raw text shown by the site.
    pub posted_at: String,
    pub title: String,
    pub location: String,
    /// Price as displayed, including currency. Never parsed.
    pub price: String,
    /// Floor area as displayed; empty when the card has none.
    pub area: String,
    /// Absolute listing URL.
    pub url: String,
}

impl AdRecord {
    /// Values in backing-table column order (`time,name,location,price,square,link`).
    pub fn to_row(&self) -> [&str; 6] {
        [
            &self.posted_at,
            &self.title,
            &self.location,
            &self.price,
            &self.area,
            &self.url,
        ]
    }

    /// Whether both identity-critical fields were extracted.
    pub fn is_complete(&self) -> bool {
        self.title != NOT_AVAILABLE && self.url != NOT_AVAILABLE && !self.url.is_empty()
    }
}
