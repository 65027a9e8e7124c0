//! Units of work shared by every worker process.
//!
//! A `Task` names what to do; a `TaskEnvelope` carries the scheduling state that travels
//! with it through the shared queue (attempt counters, expiry and the "run after" link).
//! Workers never sleep on a rate limit: a deferred task goes back into the queue with a
//! countdown and the worker moves on.

pub mod queue;
pub mod retry;
pub mod worker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::server::{
    error::{store::StoreError, verify::VerifyError, AppError},
    gateway::{ErrorKind, Method},
    model::member::MemberSnapshot,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// One queued call to the chat platform, made with the bot token.
    DiscordCall {
        method: Method,
        route: String,
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Fans scheduled verification out to the guilds due in the current slot.
    VerifyGuilds,
    /// One page of a guild verification run.
    VerifyGuild {
        guild_id: i64,
        cursor: i64,
        #[serde(default)]
        force: bool,
    },
    /// Verifies a single member, either on join or after a deferred lookup.
    VerifyMember {
        guild_id: i64,
        member: MemberSnapshot,
        #[serde(default)]
        force: bool,
        /// Set for members who just joined; failures are also posted to the jail channel.
        #[serde(default)]
        joined: bool,
    },
    /// Records a member as verified in a guild.
    RecordMember { guild_id: i64, user_id: i64 },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::DiscordCall { .. } => "discord_call",
            Task::VerifyGuilds => "verify_guilds",
            Task::VerifyGuild { .. } => "verify_guild",
            Task::VerifyMember { .. } => "verify_member",
            Task::RecordMember { .. } => "record_member",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Random id; keeps identical tasks distinct inside the queue.
    pub id: u64,
    pub task: Task,
    /// Counted failed attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Rate-limit waits that did not count as attempts.
    #[serde(default)]
    pub rate_limit_waits: u32,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Enqueued when this task succeeds.
    #[serde(default)]
    pub link: Option<Box<TaskEnvelope>>,
}

impl TaskEnvelope {
    pub fn new(task: Task) -> Self {
        Self {
            id: rand::random(),
            task,
            attempts: 0,
            rate_limit_waits: 0,
            expires_at: None,
            link: None,
        }
    }

    /// Sets the task to run after this one succeeds.
    pub fn then(mut self, next: TaskEnvelope) -> Self {
        self.link = Some(Box::new(next));
        self
    }

    /// Drops the task if it is still queued after `ttl`.
    pub fn expires_in(mut self, ttl: chrono::Duration) -> Self {
        self.expires_at = Some(Utc::now() + ttl);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// The envelope to re-enqueue after a failed attempt.
    pub fn retried(mut self, counted: bool) -> Self {
        if counted {
            self.attempts += 1;
        } else {
            self.rate_limit_waits += 1;
        }
        self
    }
}

/// Why one execution of a task failed.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A gateway call the task depends on failed.
    #[error("{method} {route} failed: {kind}")]
    Gateway {
        method: Method,
        route: String,
        kind: ErrorKind,
    },

    #[error(transparent)]
    App(#[from] AppError),
}

impl TaskError {
    pub fn gateway(method: Method, route: impl Into<String>, kind: ErrorKind) -> Self {
        Self::Gateway {
            method,
            route: route.into(),
            kind,
        }
    }

    /// Whether running the task again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TaskError::Gateway { method, kind, .. } => kind.is_retryable(*method),
            TaskError::App(err) => err.is_transient(),
        }
    }
}

impl From<sea_orm::DbErr> for TaskError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::App(err.into())
    }
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        Self::App(err.into())
    }
}

impl From<VerifyError> for TaskError {
    fn from(err: VerifyError) -> Self {
        Self::App(err.into())
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        Self::App(err.into())
    }
}
