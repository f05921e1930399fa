//! Relative date normalization.
//!
//! Listing cards show ads posted today as "Сьогодні о 12:30"; everything
//! older already carries a calendar date. Only the "today" form is rewritten.

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use crate::config::LocaleConfig;

/// Rewrites "today" markers into `DD <month genitive> YYYY<suffix>`.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    today_token: String,
    months: Vec<String>,
    suffix: String,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::new(&LocaleConfig::default())
    }
}

impl DateNormalizer {
    pub fn new(locale: &LocaleConfig) -> Self {
        Self {
            today_token: locale.today_token.to_lowercase(),
            months: locale.months.clone(),
            suffix: locale.date_suffix.clone(),
        }
    }

    /// Normalize one raw date string.
    ///
    /// Text containing the "today" token becomes an absolute date for
    /// `today`; any other text is returned unchanged. If the date cannot be
    /// formatted the raw text is returned.
    pub fn normalize(&self, raw: &str, today: NaiveDate) -> String {
        if self.today_token.is_empty() || !raw.to_lowercase().contains(&self.today_token) {
            return raw.to_string();
        }

        match self.format_date(today) {
            Some(formatted) => {
                debug!("Replaced '{}' with '{}'", raw, formatted);
                formatted
            }
            None => {
                warn!(
                    "No month name for {}; keeping original date text '{}'",
                    today, raw
                );
                raw.to_string()
            }
        }
    }

    /// Format a date with the locale's month table.
    pub fn format_date(&self, date: NaiveDate) -> Option<String> {
        let month = self.months.get(date.month0() as usize)?;
        Some(format!(
            "{:02} {} {}{}",
            date.day(),
            month,
            date.year(),
            self.suffix
        ))
    }
}
