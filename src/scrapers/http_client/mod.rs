//! HTTP client with user agent rotation and failure classification.

mod user_agent;

pub use user_agent::{pick_user_agent, DEFAULT_USER_AGENTS};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, Client};
use thiserror::Error;
use tracing::{debug, error, info};

use super::PageSource;
use crate::config::FetchConfig;

/// Why a page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// HTTP client used for listing pages.
///
/// Each request carries a user agent picked at random from the configured
/// pool. No retries: a failed page is reported to the caller, which skips it.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    user_agents: Vec<String>,
}

impl HttpClient {
    /// Create a client from fetch settings.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            user_agents: config.user_agents.clone(),
        })
    }

    /// GET a page and return its body as text.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let user_agent = pick_user_agent(&self.user_agents).to_string();
        debug!("GET {} (User-Agent: {})", url, user_agent);

        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        info!(
            "Fetched {} ({} bytes in {:?})",
            url,
            body.len(),
            start.elapsed()
        );
        Ok(body)
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await.inspect_err(|e| {
            error!("{}", e);
        })
    }
}
