//! Long-running bot command.

use std::sync::Arc;

use console::style;
use tracing::warn;

use crate::bot::{run_polling, serve_webhook, start_scheduler, BotContext};
use crate::cli::helpers::build_wiring;
use crate::config::{Settings, Transport};
use crate::pipeline::RunLock;

/// Start the daily scheduler and the chat front end.
pub async fn cmd_serve(settings: &Settings) -> anyhow::Result<()> {
    if settings.bot.transport == Transport::Webhook {
        settings.bot.webhook_url()?;
    }
    let wiring = build_wiring(settings)?;

    let pipeline = Arc::new(wiring.pipeline);
    let lock = RunLock::new();
    let mut scheduler = start_scheduler(&settings.schedule, pipeline.clone(), lock.clone()).await?;

    println!(
        "{} Daily run scheduled ({} {})",
        style("✓").green(),
        settings.schedule.cron,
        settings.schedule.timezone
    );

    let ctx = Arc::new(BotContext::new(
        wiring.client,
        wiring.chat_id,
        settings.messages.clone(),
        pipeline,
        lock,
    ));

    println!(
        "{} Starting bot ({:?} transport)",
        style("→").cyan(),
        settings.bot.transport
    );
    println!("  Press Ctrl+C to stop");

    let result = match settings.bot.transport {
        Transport::Webhook => serve_webhook(ctx, &settings.bot).await,
        Transport::Polling => run_polling(ctx, settings.bot.poll_timeout_secs).await,
    };

    if let Err(e) = scheduler.shutdown().await {
        warn!("Scheduler shutdown failed: {}", e);
    }
    result
}
