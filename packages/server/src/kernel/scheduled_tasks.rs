//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! The only periodic task is the cache sweep: every 10 minutes, evict
//! in-memory entries older than the TTL and delete disk snapshots past the
//! retention window. Eviction never loses data - every entry was persisted
//! by `put` before it was served.

use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::kernel::cache::GuideCache;

/// Start all scheduled tasks.
pub async fn start_scheduler(cache: Arc<GuideCache>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep_job = Job::new_async("0 */10 * * * *", move |_uuid, _lock| {
        let cache = cache.clone();
        Box::pin(async move {
            let (evicted, deleted) = cache.sweep();
            if evicted > 0 || deleted > 0 {
                info!(evicted, deleted, "Cache sweep complete");
            }
        })
    })?;

    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    info!("Scheduled tasks started (cache sweep every 10 minutes)");
    Ok(scheduler)
}
