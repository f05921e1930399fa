//! One scrape run: pagination, extraction, novelty filtering, persistence and
//! notification.
//!
//! Runs are strictly sequential. Pages are fetched one at a time in generated
//! order with a random pause between fetches; a failed page is skipped and
//! the run continues with the rest.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::config::{ConfigError, MessagesConfig, SeedConfig, Settings};
use crate::models::AdRecord;
use crate::notify::Notifier;
use crate::scrapers::{DateNormalizer, PageExtractor, PageSource, Paginator, SiteSelectors};
use crate::storage::{DedupStore, NoveltyFilter};

/// Pauses inserted between requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Pacing {
    /// Bounds (seconds) of the uniform random pause between page fetches.
    pub page_delay_secs: (f64, f64),
    /// Pause between consecutive per-ad messages.
    pub message_delay: Duration,
}

impl Pacing {
    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            page_delay_secs: (0.0, 0.0),
            message_delay: Duration::ZERO,
        }
    }

    fn from_settings(settings: &Settings) -> Self {
        Self {
            page_delay_secs: (
                settings.fetch.page_delay_min_secs,
                settings.fetch.page_delay_max_secs,
            ),
            message_delay: Duration::from_millis(settings.telegram.message_delay_ms),
        }
    }

    fn page_delay(&self) -> Duration {
        let (min, max) = self.page_delay_secs;
        if !max.is_finite() || max <= 0.0 {
            return Duration::ZERO;
        }
        let min = if min.is_finite() { min.max(0.0) } else { max };
        let secs = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            max
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Seeds whose pagination could not be discovered.
    pub seeds_failed: usize,
    pub pages_total: usize,
    /// Pages skipped because the fetch failed.
    pub pages_failed: usize,
    /// Ads extracted across all pages, duplicates included.
    pub ads_scraped: usize,
    /// URLs loaded from the backing table at the start of the run.
    pub known_before: usize,
    /// Ads that were not seen before, in scrape order.
    pub new_ads: Vec<AdRecord>,
    /// Rows appended to the backing table; `None` if the write failed.
    pub persisted: Option<usize>,
}

/// At most one run at a time within a process.
#[derive(Debug, Clone, Default)]
pub struct RunLock(Arc<Mutex<()>>);

impl RunLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock if no run holds it.
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.0.clone().try_lock_owned().ok()
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.0.try_lock().is_err()
    }
}

/// The scrape pipeline, built once from [`Settings`].
pub struct Pipeline {
    seeds: Vec<SeedConfig>,
    source: Arc<dyn PageSource>,
    notifier: Arc<dyn Notifier>,
    paginator: Paginator,
    extractor: PageExtractor,
    store: DedupStore,
    messages: MessagesConfig,
    pacing: Pacing,
    timezone: Tz,
}

impl Pipeline {
    pub fn new(
        settings: &Settings,
        source: Arc<dyn PageSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        settings.validate_scrape()?;
        let selectors = SiteSelectors::from_config(&settings.site)?;

        Ok(Self {
            seeds: settings.seeds.clone(),
            source,
            notifier,
            paginator: Paginator::new(selectors.clone()),
            extractor: PageExtractor::new(
                selectors,
                &settings.site.location_date_separator,
                DateNormalizer::new(&settings.locale),
            ),
            store: DedupStore::new(&settings.storage.csv_path),
            messages: settings.messages.clone(),
            pacing: Pacing::from_settings(settings),
            timezone: settings.schedule.timezone()?,
        })
    }

    /// Replace the configured pauses.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    /// Run once if `lock` is free; `None` when another run is in progress.
    pub async fn run_exclusive(&self, lock: &RunLock) -> Option<RunReport> {
        let Some(_guard) = lock.try_acquire() else {
            warn!("A run is already in progress; skipping this trigger");
            return None;
        };
        Some(self.run().await)
    }

    /// Execute one full run.
    pub async fn run(&self) -> RunReport {
        self.run_on(self.today()).await
    }

    /// Execute one full run, normalizing "today" dates against `today`.
    pub async fn run_on(&self, today: NaiveDate) -> RunReport {
        info!("===== Run started ({} seed(s)) =====", self.seeds.len());
        let mut report = RunReport::default();

        let page_urls = self.discover_all(&mut report).await;
        if page_urls.is_empty() {
            warn!("No pages to process; ending run");
            return report;
        }
        report.pages_total = page_urls.len();
        info!("Processing {} page(s)", page_urls.len());

        let mut filter = NoveltyFilter::new(self.store.load_known_urls());
        report.known_before = filter.known_count();
        info!("Loaded {} known URL(s)", report.known_before);

        let scraped = self.scrape_pages(&page_urls, today, &mut report).await;
        report.ads_scraped = scraped.len();
        info!("Collected {} ad(s) from all pages", scraped.len());

        report.new_ads = filter.filter_new(scraped);
        info!("Found {} new ad(s)", report.new_ads.len());

        if report.new_ads.is_empty() {
            self.notifier.notify_no_new().await;
            info!("===== Run finished: nothing new =====");
            return report;
        }

        report.persisted = match self.store.append(&report.new_ads) {
            Ok(written) => Some(written),
            Err(e) => {
                error!(
                    "Failed to persist new ads to {}: {}",
                    self.store.path().display(),
                    e
                );
                None
            }
        };

        self.notify_new(&report.new_ads).await;
        info!("===== Run finished =====");
        report
    }

    async fn discover_all(&self, report: &mut RunReport) -> Vec<String> {
        let mut page_urls = Vec::new();
        for seed in &self.seeds {
            let pages = self
                .paginator
                .discover_pages(self.source.as_ref(), &seed.url)
                .await;
            if pages.is_empty() {
                warn!("No pages discovered for seed {}", seed.label());
                report.seeds_failed += 1;
                let message = self.messages.pages_failed.replace("{seed}", seed.label());
                self.notifier.notify_error(&message).await;
                continue;
            }
            page_urls.extend(pages);
        }
        page_urls
    }

    async fn scrape_pages(
        &self,
        page_urls: &[String],
        today: NaiveDate,
        report: &mut RunReport,
    ) -> Vec<AdRecord> {
        let mut scraped = Vec::new();
        let last = page_urls.len().saturating_sub(1);

        for (index, url) in page_urls.iter().enumerate() {
            info!("Scraping page {}/{}: {}", index + 1, page_urls.len(), url);
            match self.source.fetch(url).await {
                Ok(html) => scraped.extend(self.extractor.extract(&html, url, today)),
                Err(e) => {
                    warn!("Skipping page {}: {}", url, e);
                    report.pages_failed += 1;
                }
            }

            if index < last {
                let delay = self.pacing.page_delay();
                if !delay.is_zero() {
                    info!("Waiting {:.2}s before next page", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                }
            }
        }
        scraped
    }

    async fn notify_new(&self, new_ads: &[AdRecord]) {
        info!("Sending {} new ad(s)", new_ads.len());
        self.notifier.notify_summary(new_ads.len()).await;
        for (index, ad) in new_ads.iter().enumerate() {
            if index > 0 && !self.pacing.message_delay.is_zero() {
                tokio::time::sleep(self.pacing.message_delay).await;
            }
            self.notifier.notify_ad(ad).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_none_is_zero() {
        assert_eq!(Pacing::none().page_delay(), Duration::ZERO);
    }

    #[test]
    fn test_page_delay_within_bounds() {
        let pacing = Pacing {
            page_delay_secs: (5.0, 10.0),
            message_delay: Duration::from_secs(1),
        };
        for _ in 0..50 {
            let delay = pacing.page_delay().as_secs_f64();
            assert!((5.0..=10.0).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_unusable_bounds_do_not_panic() {
        for bounds in [(5.0, f64::INFINITY), (f64::NAN, 10.0), (1e300, 1e300), (-3.0, -1.0)] {
            let pacing = Pacing {
                page_delay_secs: bounds,
                message_delay: Duration::ZERO,
            };
            let _ = pacing.page_delay();
        }
    }

    #[test]
    fn test_fixed_delay_when_bounds_equal() {
        let pacing = Pacing {
            page_delay_secs: (2.0, 2.0),
            message_delay: Duration::ZERO,
        };
        assert_eq!(pacing.page_delay(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_run_lock_is_exclusive() {
        let lock = RunLock::new();
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.is_running());
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(!lock.is_running());
        assert!(lock.try_acquire().is_some());
    }
}
