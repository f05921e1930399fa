//! Telegram Bot API client and notifier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info};

use super::types::{ApiResponse, Update, WebhookInfo};
use super::{format_ad_message, format_summary, Notifier};
use crate::config::{MessagesConfig, TelegramConfig};
use crate::models::AdRecord;

/// Errors talking to the Bot API.
///
/// Request errors are stored without their URL, which embeds the bot token.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Telegram request failed: {0}")]
    Http(reqwest::Error),

    #[error("Telegram API error (HTTP {status}): {description}")]
    Api { status: u16, description: String },
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Http(err.without_url())
    }
}

/// Thin Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    /// Create a client for `token` against `api_base` (normally
    /// `https://api.telegram.org`).
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    /// Create a client from Telegram settings and an already validated token.
    pub fn from_config(config: &TelegramConfig, token: &str) -> Result<Self, NotifyError> {
        Self::new(
            &config.api_base,
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, NotifyError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            Ok(api) => Err(NotifyError::Api {
                status: status.as_u16(),
                description: api
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
            Err(_) => Err(NotifyError::Api {
                status: status.as_u16(),
                description: body.chars().take(200).collect(),
            }),
        }
    }

    /// `sendMessage` with HTML parse mode and link previews disabled.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), NotifyError> {
        let mut params = vec![
            ("chat_id", chat_id.to_string()),
            ("text", text.to_string()),
            ("parse_mode", "HTML".to_string()),
            ("disable_web_page_preview", "true".to_string()),
        ];
        if let Some(message_id) = reply_to {
            params.push(("reply_to_message_id", message_id.to_string()));
        }

        let request = self.client.get(self.method_url("sendMessage")).query(&params);
        self.call::<serde_json::Value>(request).await.map(|_| ())
    }

    pub async fn get_webhook_info(&self) -> Result<WebhookInfo, NotifyError> {
        self.call(self.client.get(self.method_url("getWebhookInfo")))
            .await
    }

    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), NotifyError> {
        let mut params = vec![("url", url.to_string())];
        if let Some(secret) = secret {
            params.push(("secret_token", secret.to_string()));
        }
        let request = self.client.get(self.method_url("setWebhook")).query(&params);
        self.call::<bool>(request).await.map(|_| ())
    }

    pub async fn delete_webhook(&self) -> Result<(), NotifyError> {
        self.call::<bool>(self.client.get(self.method_url("deleteWebhook")))
            .await
            .map(|_| ())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, NotifyError> {
        let mut params = vec![
            ("timeout", timeout_secs.to_string()),
            ("allowed_updates", "[\"message\"]".to_string()),
        ];
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }
        let request = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&params)
            .timeout(Duration::from_secs(timeout_secs + 10));
        self.call(request).await
    }
}

/// Sends run results to a single chat.
pub struct TelegramNotifier {
    client: TelegramClient,
    chat_id: i64,
    messages: MessagesConfig,
    link_label: String,
}

impl TelegramNotifier {
    pub fn new(
        client: TelegramClient,
        chat_id: i64,
        messages: MessagesConfig,
        link_label: &str,
    ) -> Self {
        Self {
            client,
            chat_id,
            messages,
            link_label: link_label.to_string(),
        }
    }

    async fn deliver(&self, text: &str) {
        match self.client.send_message(self.chat_id, text, None).await {
            Ok(()) => info!("Message delivered to chat {}", self.chat_id),
            Err(e) => error!("Failed to deliver message to chat {}: {}", self.chat_id, e),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_summary(&self, new_count: usize) {
        self.deliver(&format_summary(&self.messages.summary, new_count))
            .await;
    }

    async fn notify_no_new(&self) {
        self.deliver(&self.messages.no_new).await;
    }

    async fn notify_ad(&self, ad: &AdRecord) {
        self.deliver(&format_ad_message(ad, &self.link_label)).await;
    }

    async fn notify_error(&self, context: &str) {
        self.deliver(context).await;
    }
}
