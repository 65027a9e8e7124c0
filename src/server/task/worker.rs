//! Worker loop executing queued tasks.

use chrono::Utc;
use std::time::Duration;

use super::{retry::Decision, Task, TaskEnvelope, TaskError};
use crate::server::{
    data::guild_member::GuildMemberRepository,
    error::AppError,
    service::remote_error::RemoteErrorService,
    state::AppState,
    verify::engine::VerifyEngine,
};

/// Sleep between polls of an empty queue.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct Worker {
    id: usize,
    state: AppState,
}

impl Worker {
    pub fn new(id: usize, state: AppState) -> Self {
        Self { id, state }
    }

    /// Runs forever, pulling one due task at a time.
    pub async fn run(self) {
        tracing::info!("Worker {} started", self.id);

        loop {
            match self.tick().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => tracing::error!("Worker {} failed to process queue: {}", self.id, e),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Pops and settles one due task.
    ///
    /// # Returns
    /// - `Ok(true)` - A task was processed
    /// - `Ok(false)` - Nothing was due
    /// - `Err(AppError)` - The queue itself failed
    pub async fn tick(&self) -> Result<bool, AppError> {
        let Some(envelope) = self.state.queue.pop_due().await? else {
            return Ok(false);
        };

        let result = self.execute(&envelope.task).await;
        self.settle(envelope, result).await?;

        Ok(true)
    }

    async fn execute(&self, task: &Task) -> Result<(), TaskError> {
        let engine = VerifyEngine::new(&self.state);

        match task {
            Task::DiscordCall {
                method,
                route,
                payload,
            } => self
                .state
                .gateway
                .call(*method, route, &self.state.bot, payload.as_ref())
                .await
                .map(|_| ())
                .map_err(|kind| TaskError::gateway(*method, route.as_str(), kind)),
            Task::VerifyGuilds => engine.fan_out(Utc::now()).await.map(|_| ()),
            Task::VerifyGuild {
                guild_id,
                cursor,
                force,
            } => engine.run_page(*guild_id, *cursor, *force).await.map(|_| ()),
            Task::VerifyMember {
                guild_id,
                member,
                force,
                joined,
            } => engine
                .verify_member(*guild_id, member, *force, *joined)
                .await
                .map(|_| ()),
            Task::RecordMember { guild_id, user_id } => {
                GuildMemberRepository::new(&self.state.db)
                    .insert(*guild_id, *user_id)
                    .await?;
                Ok(())
            }
        }
    }

    async fn settle(
        &self,
        envelope: TaskEnvelope,
        result: Result<(), TaskError>,
    ) -> Result<(), AppError> {
        let error = match result {
            Ok(()) => {
                if let Some(link) = &envelope.link {
                    self.state.queue.enqueue(link, Duration::ZERO).await?;
                }
                return Ok(());
            }
            Err(error) => error,
        };

        let decision = self
            .state
            .retry
            .decide(&envelope, &error, &mut rand::rng());

        match decision {
            Decision::Retry { countdown, counted } => {
                tracing::debug!(
                    "Retrying {} task {} in {:?}: {}",
                    envelope.task.name(),
                    envelope.id,
                    countdown,
                    error
                );
                self.state
                    .queue
                    .enqueue(&envelope.retried(counted), countdown)
                    .await
            }
            Decision::GiveUp => {
                tracing::error!(
                    "Giving up on {} task {} after {} attempts: {}",
                    envelope.task.name(),
                    envelope.id,
                    envelope.attempts + 1,
                    error
                );
                Ok(())
            }
            Decision::Fail => self.on_failure(&envelope.task, &error).await,
        }
    }

    async fn on_failure(&self, task: &Task, error: &TaskError) -> Result<(), AppError> {
        match (task, error) {
            (Task::DiscordCall { .. }, TaskError::Gateway { route, kind, .. }) => {
                RemoteErrorService::new(&self.state.db)
                    .handle_discord(route, kind)
                    .await?;
            }
            (_, TaskError::App(AppError::VerifyErr(e))) => {
                tracing::info!("{} task not run: {}", task.name(), e)
            }
            _ => tracing::error!("{} task failed: {}", task.name(), error),
        }

        Ok(())
    }
}
