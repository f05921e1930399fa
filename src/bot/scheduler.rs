//! Daily scheduled runs.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::config::ScheduleConfig;
use crate::pipeline::{Pipeline, RunLock};

/// Register the daily run and start the scheduler.
///
/// The returned scheduler must be kept alive for jobs to fire.
pub async fn start_scheduler(
    schedule: &ScheduleConfig,
    pipeline: Arc<Pipeline>,
    lock: RunLock,
) -> anyhow::Result<JobScheduler> {
    let timezone = schedule.timezone()?;
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async_tz(schedule.cron.as_str(), timezone, move |_uuid, _lock| {
        let pipeline = pipeline.clone();
        let lock = lock.clone();
        Box::pin(async move {
            info!("Scheduled run triggered");
            pipeline.run_exclusive(&lock).await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!(
        "Scheduler started ({} in {})",
        schedule.cron, schedule.timezone
    );
    Ok(scheduler)
}
