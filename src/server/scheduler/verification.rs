use tokio_cron_scheduler::{Job, JobScheduler};

use crate::server::{
    error::AppError,
    task::{queue::TaskQueue, Task},
};

/// Fires at the start of every verification slot.
const VERIFICATION_CRON: &str = "0 */15 * * * *";

/// Starts the verification scheduler
///
/// Every 15 minutes a `VerifyGuilds` fan-out task is queued. The fan-out decides which
/// guilds fall into the current slot, so the schedule itself stays global.
///
/// # Arguments
/// - `queue`: Task queue shared with the workers
pub async fn start_scheduler(queue: TaskQueue) -> Result<(), AppError> {
    let scheduler = JobScheduler::new().await?;

    let job_queue = queue.clone();

    let job = Job::new_async(VERIFICATION_CRON, move |_uuid, _lock| {
        let queue = job_queue.clone();

        Box::pin(async move {
            if let Err(e) = enqueue_fan_out(&queue).await {
                tracing::error!("Error queueing guild verification: {}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!("Verification scheduler started");

    Ok(())
}

/// Queues the fan-out task that selects the guilds due in the current slot.
pub async fn enqueue_fan_out(queue: &TaskQueue) -> Result<(), AppError> {
    queue.push(Task::VerifyGuilds).await?;

    tracing::debug!("Queued guild verification fan-out");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::server::store::MemoryStore;

    #[tokio::test]
    async fn fan_out_is_immediately_due() {
        let queue = TaskQueue::new(Arc::new(MemoryStore::new()));

        enqueue_fan_out(&queue).await.unwrap();

        let envelope = queue.pop_due().await.unwrap().unwrap();
        assert_eq!(envelope.task, Task::VerifyGuilds);
        assert_eq!(envelope.attempts, 0);
        assert!(queue.pop_due().await.unwrap().is_none());
    }
}
