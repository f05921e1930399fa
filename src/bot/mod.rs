//! Chat front end: daily schedule plus the `/start` and `/scan` commands,
//! delivered over a webhook or long polling.

mod polling;
mod scheduler;
mod webhook;

pub use polling::run_polling;
pub use scheduler::start_scheduler;
pub use webhook::{create_router, ensure_webhook, serve_webhook, serve_webhook_with};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MessagesConfig;
use crate::notify::{Message, TelegramClient, Update};
use crate::pipeline::{Pipeline, RunLock};

/// Commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Confirm the bot is alive.
    Start,
    /// Start a run now.
    Scan,
}

impl Command {
    /// Parse the leading command of a message, accepting the `/cmd@botname`
    /// form used in group chats.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        match name {
            "/start" => Some(Command::Start),
            "/scan" => Some(Command::Scan),
            _ => None,
        }
    }
}

/// Everything an incoming update may need.
pub struct BotContext {
    client: TelegramClient,
    chat_id: i64,
    messages: MessagesConfig,
    pipeline: Arc<Pipeline>,
    lock: RunLock,
}

impl BotContext {
    pub fn new(
        client: TelegramClient,
        chat_id: i64,
        messages: MessagesConfig,
        pipeline: Arc<Pipeline>,
        lock: RunLock,
    ) -> Self {
        Self {
            client,
            chat_id,
            messages,
            pipeline,
            lock,
        }
    }

    pub fn client(&self) -> &TelegramClient {
        &self.client
    }

    #[cfg(test)]
    pub(crate) fn lock(&self) -> &RunLock {
        &self.lock
    }

    /// React to one update. Anything that is not a known command is ignored.
    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            debug!("Ignoring update {} without a message", update.update_id);
            return;
        };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };

        info!("Command {:?} from chat {}", command, message.chat.id);
        match command {
            Command::Start => {
                self.reply(&message, &self.messages.start_reply).await;
            }
            Command::Scan => self.start_scan(&message).await,
        }
    }

    async fn start_scan(&self, message: &Message) {
        if message.chat.id != self.chat_id {
            warn!("Ignoring /scan from unauthorized chat {}", message.chat.id);
            return;
        }

        let Some(guard) = self.lock.try_acquire() else {
            self.reply(message, &self.messages.scan_busy).await;
            return;
        };

        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let _guard = guard;
            pipeline.run().await;
        });
        self.reply(message, &self.messages.scan_started).await;
    }

    async fn reply(&self, message: &Message, text: &str) {
        if let Err(e) = self
            .client
            .send_message(message.chat.id, text, Some(message.message_id))
            .await
        {
            warn!("Failed to reply in chat {}: {}", message.chat.id, e);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{context, CountingSource};
    use super::*;
    use crate::notify::Chat;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn update(chat_id: i64, text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(Message {
                message_id: 10,
                chat: Chat { id: chat_id },
                text: Some(text.to_string()),
            }),
        }
    }

    async fn wait_for_fetches(source: &CountingSource, expected: usize) -> usize {
        for _ in 0..50 {
            let seen = source.fetches.load(Ordering::SeqCst);
            if seen >= expected {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        source.fetches.load(Ordering::SeqCst)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/start@rentwatch_bot"), Some(Command::Start));
        assert_eq!(Command::parse("  /scan now"), Some(Command::Scan));
        assert_eq!(Command::parse("/stop"), None);
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[tokio::test]
    async fn test_scan_starts_a_run() {
        let source = Arc::new(CountingSource::default());
        let ctx = context(source.clone());

        ctx.handle_update(update(42, "/scan")).await;

        assert_eq!(wait_for_fetches(&source, 1).await, 1);
    }

    #[tokio::test]
    async fn test_scan_skipped_while_running() {
        let source = Arc::new(CountingSource::default());
        let ctx = context(source.clone());
        let _held = ctx.lock().try_acquire().unwrap();

        ctx.handle_update(update(42, "/scan")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scan_from_other_chat_ignored() {
        let source = Arc::new(CountingSource::default());
        let ctx = context(source.clone());

        ctx.handle_update(update(7, "/scan")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
        assert!(!ctx.lock().is_running());
    }

    #[tokio::test]
    async fn test_start_does_not_run() {
        let source = Arc::new(CountingSource::default());
        let ctx = context(source.clone());

        ctx.handle_update(update(42, "/start")).await;
        ctx.handle_update(Update {
            update_id: 2,
            message: None,
        })
        .await;

        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }
}
