//! Outbound notifications for new ads.
//!
//! Every message is delivered independently: a failed send is logged by the
//! notifier and never reaches the caller, so one bad message cannot stop the
//! rest of a run.

mod telegram;
mod types;

pub use telegram::{NotifyError, TelegramClient, TelegramNotifier};
pub use types::{Chat, Message, Update, WebhookInfo};

use async_trait::async_trait;

use crate::models::AdRecord;
use crate::utils::html_escape;

/// Destination for run results.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce how many new ads the run found.
    async fn notify_summary(&self, new_count: usize);

    /// Announce a run that found nothing new.
    async fn notify_no_new(&self);

    /// Forward one new ad.
    async fn notify_ad(&self, ad: &AdRecord);

    /// Report a run-level problem.
    async fn notify_error(&self, context: &str);
}

/// Render the message body for one ad (Telegram HTML).
///
/// Empty or "N/A" fields are rendered as-is so the template always has the
/// same shape.
pub fn format_ad_message(ad: &AdRecord, link_label: &str) -> String {
    format!(
        "🏠 <b>{}</b>\n📍 {}\n💰 {}\n📏 {}\n⏰ {}\n🔗 <a href='{}'>{}</a>",
        html_escape(&ad.title),
        html_escape(&ad.location),
        html_escape(&ad.price),
        html_escape(&ad.area),
        html_escape(&ad.posted_at),
        html_escape(&ad.url),
        html_escape(link_label),
    )
}

/// Fill the `{count}` placeholder of the summary template.
pub fn format_summary(template: &str, new_count: usize) -> String {
    template.replace("{count}", &new_count.to_string())
}
