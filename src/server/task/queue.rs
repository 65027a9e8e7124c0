//! Time-ordered task queue in the shared store.

use chrono::Utc;
use std::{sync::Arc, time::Duration};

use super::{Task, TaskEnvelope};
use crate::server::{
    error::AppError,
    store::{duration_ms, keys, now_ms, SharedStore},
};

#[derive(Clone)]
pub struct TaskQueue {
    store: Arc<dyn SharedStore>,
}

impl TaskQueue {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Enqueues an envelope to become due after `countdown`.
    ///
    /// # Returns
    /// - `Ok(())` - Envelope stored
    /// - `Err(AppError::SerdeErr)` - Envelope could not be encoded
    /// - `Err(AppError::StoreErr)` - Shared store unavailable
    pub async fn enqueue(&self, envelope: &TaskEnvelope, countdown: Duration) -> Result<(), AppError> {
        let payload = serde_json::to_string(envelope)?;
        let due_ms = now_ms() + duration_ms(countdown);

        self.store
            .schedule(keys::TASK_QUEUE, &payload, due_ms)
            .await?;
        tracing::debug!(
            "Queued {} task {} in {:?}",
            envelope.task.name(),
            envelope.id,
            countdown
        );

        Ok(())
    }

    /// Enqueues a fresh task to run immediately.
    pub async fn push(&self, task: Task) -> Result<(), AppError> {
        self.enqueue(&TaskEnvelope::new(task), Duration::ZERO).await
    }

    /// Removes and returns one due envelope.
    ///
    /// Expired and undecodable envelopes are dropped, and the next due one is tried.
    ///
    /// # Returns
    /// - `Ok(Some(TaskEnvelope))` - A due task, owned exclusively by the caller
    /// - `Ok(None)` - Nothing is due
    /// - `Err(AppError::StoreErr)` - Shared store unavailable
    pub async fn pop_due(&self) -> Result<Option<TaskEnvelope>, AppError> {
        loop {
            let Some(payload) = self.store.pop_due(keys::TASK_QUEUE, now_ms()).await? else {
                return Ok(None);
            };

            match serde_json::from_str::<TaskEnvelope>(&payload) {
                Ok(envelope) if envelope.is_expired(Utc::now()) => {
                    tracing::debug!(
                        "Discarding expired {} task {}",
                        envelope.task.name(),
                        envelope.id
                    );
                }
                Ok(envelope) => return Ok(Some(envelope)),
                Err(e) => tracing::warn!("Dropping undecodable task payload: {}", e),
            }
        }
    }
}
