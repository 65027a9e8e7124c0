//! Shared key-value store used for every piece of cross-worker state.
//!
//! Workers share no memory, so bucket mappings, remaining-call counters, discovery locks,
//! verification cursors and the task queue all live behind the [`SharedStore`] trait.
//! Every mutation that checks and changes state is a single atomic operation on the
//! backend (a Lua script for Redis, one mutex section for the in-process store); there is
//! no read-then-write pair anywhere in this interface.

pub mod keys;
pub mod memory;
pub mod redis;
mod scripts;

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use crate::server::error::store::StoreError;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Expiry attached to a written key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Relative time-to-live.
    After(Duration),
    /// Absolute unix time in milliseconds.
    AtMillis(i64),
}

/// Keys and limits for one atomic rate-limit consume.
///
/// Either half may be absent: Discord discovery calls only count against the global
/// window, and game-API keys have no global window.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeRequest {
    pub bucket: Option<BucketWindow>,
    pub global: Option<GlobalWindow>,
}

/// Per-bucket counter keys.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketWindow {
    pub remaining_key: String,
    /// Key holding the remote-reported limit; `fallback_limit` applies when absent.
    pub limit_key: String,
    /// Key holding the observed window length in ms; `fallback_window` applies when absent.
    pub window_key: String,
    pub fallback_limit: i64,
    pub fallback_window: Duration,
}

/// Cross-route ceiling for the current time window.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalWindow {
    pub counter_key: String,
    /// Set while the remote service has imposed a global block.
    pub block_key: String,
    pub limit: i64,
    pub ttl: Duration,
}

/// Result of an atomic consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeResult {
    /// One call was granted. `remaining` is the bucket counter after the decrement, or
    /// `None` when only the global window was consulted.
    Allowed { remaining: Option<i64> },
    BucketExhausted,
    GlobalBlocked,
    GlobalExhausted,
}

/// Server-reported bucket state written back after a response.
#[derive(Debug, Clone, PartialEq)]
pub struct RemainingUpdate {
    pub remaining_key: String,
    pub limit_key: String,
    pub window_key: String,
    pub reset_key: String,
    pub remaining: i64,
    pub limit: i64,
    pub reset_at_ms: i64,
    /// Window length observed at the start of a fresh window, if known.
    pub window: Option<Duration>,
    /// Lifetime of the limit and window keys.
    pub metadata_ttl: Duration,
    /// Two reset times closer than this are treated as the same window.
    pub tolerance: Duration,
}

/// Atomic operations over the shared store.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> Result<(), StoreError>;

    /// Sets the key only if it does not exist. Returns whether the value was written.
    async fn set_nx(&self, key: &str, value: &str, expiry: Expiry) -> Result<bool, StoreError>;

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError>;

    /// Remaining lifetime of a key, `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Resets the lifetime of an existing key. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Adds `delta` to an integer counter, applying `ttl` if the counter has no expiry.
    async fn incr(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64, StoreError>;

    /// Adds members to a set and resets the set's lifetime.
    async fn set_add(&self, key: &str, members: &[String], ttl: Duration)
        -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Checks and decrements the bucket and global counters in one atomic step.
    async fn consume(&self, request: &ConsumeRequest) -> Result<ConsumeResult, StoreError>;

    /// Writes server-reported bucket state, keeping the lower of the local and server
    /// remaining counts while both describe the same window. Returns the stored value.
    async fn record_remaining(&self, update: &RemainingUpdate) -> Result<i64, StoreError>;

    /// Adds a payload to a time-ordered queue, due at `due_ms` unix milliseconds.
    async fn schedule(&self, queue: &str, payload: &str, due_ms: i64) -> Result<(), StoreError>;

    /// Atomically removes and returns one payload whose due time has passed.
    async fn pop_due(&self, queue: &str, now_ms: i64) -> Result<Option<String>, StoreError>;
}

/// Current unix time in milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn duration_ms(duration: Duration) -> i64 {
    duration.as_millis().min(i64::MAX as u128) as i64
}
