//! Application state shared by workers, the scheduler and the bot handler.
//!
//! All fields are cheap to clone:
//! - `DatabaseConnection` is a connection pool (clones share the pool)
//! - `Arc<Gateway>` and `Arc<dyn SharedStore>` are reference-counted
//! - `TaskQueue` holds an `Arc` to the shared store

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::server::{
    gateway::{Credential, Gateway},
    store::SharedStore,
    task::{queue::TaskQueue, retry::RetryPolicy},
    verify::VerifySettings,
};

#[derive(Clone)]
pub struct AppState {
    /// Database connection pool for guild configuration, profiles and member lists.
    pub db: DatabaseConnection,

    /// Shared key-value store holding rate-limit buckets, locks and the task queue.
    pub store: Arc<dyn SharedStore>,

    /// Rate-limit compliant call primitive for both remote services.
    pub gateway: Arc<Gateway>,

    pub queue: TaskQueue,

    /// Bot token credential used for every chat-platform call.
    pub bot: Credential,

    pub retry: RetryPolicy,
    pub verify: VerifySettings,
}
