//! Shared helpers for CLI commands.

use std::sync::Arc;

use crate::config::Settings;
use crate::notify::{TelegramClient, TelegramNotifier};
use crate::pipeline::Pipeline;
use crate::scrapers::HttpClient;

/// Everything a command needs to run the pipeline and talk to Telegram.
pub struct Wiring {
    pub pipeline: Pipeline,
    pub client: TelegramClient,
    pub chat_id: i64,
}

/// Validate `settings` and build the live pipeline.
pub fn build_wiring(settings: &Settings) -> anyhow::Result<Wiring> {
    settings.validate()?;
    let (token, chat_id) = settings.telegram.credentials()?;

    let client = TelegramClient::from_config(&settings.telegram, &token)?;
    let notifier = TelegramNotifier::new(
        client.clone(),
        chat_id,
        settings.messages.clone(),
        &settings.telegram.link_label,
    );
    let source = HttpClient::new(&settings.fetch)?;
    let pipeline = Pipeline::new(settings, Arc::new(source), Arc::new(notifier))?;

    Ok(Wiring {
        pipeline,
        client,
        chat_id,
    })
}
