//! Long-polling transport.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::BotContext;

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Poll `getUpdates` until Ctrl+C, dispatching each update as it arrives.
pub async fn run_polling(ctx: Arc<BotContext>, timeout_secs: u64) -> anyhow::Result<()> {
    // Updates are not delivered by getUpdates while a webhook is set.
    if let Err(e) = ctx.client().delete_webhook().await {
        warn!("Failed to remove webhook before polling: {}", e);
    }

    info!("Polling for updates");
    let mut offset: Option<i64> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Polling stopped");
                break;
            }
            result = ctx.client().get_updates(offset, timeout_secs) => {
                match result {
                    Ok(updates) => {
                        debug!("Received {} update(s)", updates.len());
                        for update in updates {
                            offset = Some(update.update_id + 1);
                            let ctx = ctx.clone();
                            tokio::spawn(async move {
                                ctx.handle_update(update).await;
                            });
                        }
                    }
                    Err(e) => {
                        warn!("getUpdates failed: {}; retrying in {}s", e, RETRY_DELAY.as_secs());
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    Ok(())
}
