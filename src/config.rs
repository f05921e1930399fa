//! Configuration management for rentwatch.
//!
//! Settings are read once at process start from an optional TOML file,
//! then overlaid with environment variables (after `.env` has been loaded).
//! Every section has defaults, so an empty file is a valid configuration.
//! Components receive the pieces they need by reference and never read the
//! environment themselves.

use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "rentwatch.toml";

/// Upper bound for either end of the page delay range.
pub const MAX_PAGE_DELAY_SECS: f64 = 3600.0;

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid chat id '{0}': expected an integer")]
    InvalidChatId(String),

    #[error("invalid CSS selector for {field}: {selector}")]
    InvalidSelector { field: &'static str, selector: String },

    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("invalid seed URL '{0}'")]
    InvalidSeed(String),

    #[error("no seed URLs configured")]
    NoSeeds,

    #[error("month table must have 12 entries, found {0}")]
    MonthTable(usize),

    #[error("page delay range is invalid: min {min}s, max {max}s (each within 0..=3600s, min <= max)")]
    DelayRange { min: f64, max: f64 },
}

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listing-search URLs scraped on every run.
    pub seeds: Vec<SeedConfig>,
    pub fetch: FetchConfig,
    pub site: SiteConfig,
    pub locale: LocaleConfig,
    pub storage: StorageConfig,
    pub telegram: TelegramConfig,
    pub messages: MessagesConfig,
    pub schedule: ScheduleConfig,
    pub bot: BotConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seeds: vec![SeedConfig {
                name: Some("kyiv-2room".to_string()),
                url: DEFAULT_SEED_URL.to_string(),
            }],
            fetch: FetchConfig::default(),
            site: SiteConfig::default(),
            locale: LocaleConfig::default(),
            storage: StorageConfig::default(),
            telegram: TelegramConfig::default(),
            messages: MessagesConfig::default(),
            schedule: ScheduleConfig::default(),
            bot: BotConfig::default(),
        }
    }
}

const DEFAULT_SEED_URL: &str = "https://www.olx.ua/uk/nedvizhimost/kvartiry/dolgosrochnaya-arenda-kvartir/kiev/?currency=UAH&search%5Bfilter_float_total_area:to%5D=60&search%5Bfilter_enum_furnish%5D%5B0%5D=yes&search%5Bfilter_enum_number_of_rooms_string%5D%5B0%5D=dvuhkomnatnye";

impl Settings {
    /// Load settings from an explicit path, or from `rentwatch.toml` in the
    /// working directory if present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overlay values from the environment.
    ///
    /// Takes a lookup function so callers decide where values come from; the
    /// CLI passes `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(domain) = get("PUBLIC_DOMAIN").or_else(|| get("RAILWAY_PUBLIC_DOMAIN")) {
            self.bot.public_domain = Some(domain);
        }
        if let Some(port) = get("PORT").and_then(|p| p.trim().parse().ok()) {
            self.bot.port = port;
        }
        if let Some(secret) = get("TELEGRAM_WEBHOOK_SECRET") {
            self.bot.webhook_secret = Some(secret);
        }
        if let Some(path) = get("RENTWATCH_CSV_PATH") {
            self.storage.csv_path = PathBuf::from(path);
        }
    }

    /// Check everything a run needs, without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.telegram.credentials()?;
        self.validate_scrape()
    }

    /// Validation for scrape-only use (no Telegram credentials required).
    pub fn validate_scrape(&self) -> Result<(), ConfigError> {
        if self.seeds.is_empty() {
            return Err(ConfigError::NoSeeds);
        }
        for seed in &self.seeds {
            url::Url::parse(&seed.url).map_err(|_| ConfigError::InvalidSeed(seed.url.clone()))?;
        }
        if self.locale.months.len() != 12 {
            return Err(ConfigError::MonthTable(self.locale.months.len()));
        }
        let (min, max) = (self.fetch.page_delay_min_secs, self.fetch.page_delay_max_secs);
        let in_range = |secs: f64| secs.is_finite() && (0.0..=MAX_PAGE_DELAY_SECS).contains(&secs);
        if !in_range(min) || !in_range(max) || min > max {
            return Err(ConfigError::DelayRange {
                min: self.fetch.page_delay_min_secs,
                max: self.fetch.page_delay_max_secs,
            });
        }
        self.schedule.timezone()?;
        crate::scrapers::SiteSelectors::from_config(&self.site)?;
        Ok(())
    }
}

/// One listing-search URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Label used in logs and failure messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
}

impl SeedConfig {
    /// Name for logs, falling back to the URL.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}

/// HTTP fetch behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Lower bound of the random pause between page fetches.
    pub page_delay_min_secs: f64,
    /// Upper bound of the random pause between page fetches.
    pub page_delay_max_secs: f64,
    /// User agents picked at random per request. Empty uses the built-in pool.
    pub user_agents: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            page_delay_min_secs: 5.0,
            page_delay_max_secs: 10.0,
            user_agents: Vec::new(),
        }
    }
}

/// CSS selectors describing the listing site's markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub ad_card: String,
    pub title: String,
    pub location_date: String,
    /// Literal separator between location and date in the combined field.
    pub location_date_separator: String,
    pub price: String,
    pub area: String,
    pub link: String,
    pub pagination_item: String,
    pub pagination_link: String,
    pub pagination_forward: String,
    pub no_results: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            ad_card: "div.css-l9drzq".to_string(),
            title: "h4, h6".to_string(),
            location_date: "p.css-vbz67q, p[data-testid='location-date']".to_string(),
            location_date_separator: " - ".to_string(),
            price: "p.css-uj7mm0, p[data-testid='price']".to_string(),
            area: "span.css-6as4g5".to_string(),
            link: "a".to_string(),
            pagination_item:
                "ul[data-testid=\"pagination-list\"] li[data-testid^=\"pagination-list-item\"]"
                    .to_string(),
            pagination_link: "a".to_string(),
            pagination_forward: "a[data-testid=\"pagination-forward\"]".to_string(),
            no_results: "div[data-testid=\"no-search-results\"]".to_string(),
        }
    }
}

/// Locale table for relative dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Token meaning "today", matched case-insensitively.
    pub today_token: String,
    /// Month names in genitive case, January first.
    pub months: Vec<String>,
    /// Appended after the year.
    pub date_suffix: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            today_token: "сьогодні".to_string(),
            months: [
                "січня",
                "лютого",
                "березня",
                "квітня",
                "травня",
                "червня",
                "липня",
                "серпня",
                "вересня",
                "жовтня",
                "листопада",
                "грудня",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
            date_suffix: " р.".to_string(),
        }
    }
}

/// Backing table location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub csv_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("csv").join("all_ad.csv"),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    #[serde(skip_serializing)]
    pub bot_token: Option<String>,
    /// Destination chat. Kept as text until validated.
    pub chat_id: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
    /// Pause between consecutive per-ad messages.
    pub message_delay_ms: u64,
    /// Text of the listing hyperlink in ad messages.
    pub link_label: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
            message_delay_ms: 1000,
            link_label: "Переглянути на OLX".to_string(),
        }
    }
}

impl TelegramConfig {
    /// Bot token and numeric chat id, or the reason they are unusable.
    pub fn credentials(&self) -> Result<(String, i64), ConfigError> {
        let token = self
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let raw = self
            .chat_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(ConfigError::Missing("TELEGRAM_CHAT_ID"))?;
        let chat_id = raw
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidChatId(raw.to_string()))?;
        Ok((token, chat_id))
    }
}

/// Outbound message texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// `{count}` is replaced with the number of new ads.
    pub summary: String,
    pub no_new: String,
    /// `{seed}` is replaced with the seed label.
    pub pages_failed: String,
    pub start_reply: String,
    pub scan_started: String,
    pub scan_busy: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            summary: "✅ Знайдено нових оголошень: {count}".to_string(),
            no_new: "ℹ️ Нових оголошень не знайдено.".to_string(),
            pages_failed: "❌ Не вдалося отримати URL сторінок OLX для парсингу.".to_string(),
            start_reply: "Бот запущено. Щоденні повідомлення о 13:30 налаштовані!".to_string(),
            scan_started: "🔎 Пошук нових оголошень запущено.".to_string(),
            scan_busy: "⏳ Пошук вже виконується.".to_string(),
        }
    }
}

/// Daily trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Six-field cron expression (with seconds).
    pub cron: String,
    /// IANA timezone for the cron expression and for "today".
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: "0 30 13 * * *".to_string(),
            timezone: "Europe/Kyiv".to_string(),
        }
    }
}

impl ScheduleConfig {
    /// Parsed timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

/// How chat updates reach the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Telegram pushes updates to an HTTPS endpoint.
    #[default]
    Webhook,
    /// The bot long-polls `getUpdates`.
    Polling,
}

/// Chat front end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub transport: Transport,
    /// Public host name used to build the webhook URL.
    pub public_domain: Option<String>,
    pub port: u16,
    pub webhook_path: String,
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Webhook,
            public_domain: None,
            port: 8080,
            webhook_path: "/webhook".to_string(),
            webhook_secret: None,
            poll_timeout_secs: 30,
        }
    }
}

impl BotConfig {
    /// Full webhook URL, required in webhook mode.
    pub fn webhook_url(&self) -> Result<String, ConfigError> {
        let domain = self
            .public_domain
            .as_deref()
            .map(|d| d.trim().trim_end_matches('/'))
            .filter(|d| !d.is_empty())
            .ok_or(ConfigError::Missing("PUBLIC_DOMAIN"))?;
        let domain = domain
            .strip_prefix("https://")
            .or_else(|| domain.strip_prefix("http://"))
            .unwrap_or(domain);
        Ok(format!("https://{}{}", domain, self.webhook_path))
    }
}
