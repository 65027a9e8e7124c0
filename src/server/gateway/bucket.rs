use std::sync::Arc;
use std::time::Duration;

use super::{
    headers::{remote_seconds, RateLimitHeaders},
    outcome::RateLimitScope,
    route::RouteKey,
};
use crate::server::{
    error::store::StoreError,
    store::{
        keys, now_ms, BucketWindow, ConsumeRequest, ConsumeResult, Expiry, GlobalWindow,
        RemainingUpdate, SharedStore,
    },
};

/// Route to bucket mappings outlive their buckets so rarely-called routes keep their
/// mapping between windows.
const ROUTE_MAPPING_TTL: Duration = Duration::from_secs(86_400);
const DISCOVERY_LOCK_TTL: Duration = Duration::from_secs(1);
const GLOBAL_COUNTER_TTL: Duration = Duration::from_secs(60);
/// Limit assumed for a discovered bucket whose limit key has expired.
const DISCORD_FALLBACK_LIMIT: i64 = 1;
const DISCORD_FALLBACK_WINDOW: Duration = Duration::from_secs(1);
const SAME_WINDOW_TOLERANCE: Duration = Duration::from_millis(1_000);

/// Rate-limit ceilings that are not discovered from responses.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimits {
    /// Discord's cross-route requests-per-second ceiling.
    pub discord_global_per_second: i64,
    /// Calls allowed per game-API key per `torn_window`.
    pub torn_key_limit: i64,
    pub torn_window: Duration,
}

/// Known state of a discovered bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub id: String,
    pub limit: Option<i64>,
    pub remaining: Option<i64>,
    pub reset_at_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Bucket),
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryLock {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consume {
    Allowed,
    Denied {
        scope: RateLimitScope,
        retry_after: Option<Duration>,
    },
}

/// Shared registry of route to bucket mappings and per-bucket counters.
///
/// All state lives in the [`SharedStore`]; the registry itself is a stateless view that
/// any number of workers can hold.
#[derive(Clone)]
pub struct BucketRegistry {
    store: Arc<dyn SharedStore>,
    limits: RateLimits,
}

impl BucketRegistry {
    pub fn new(store: Arc<dyn SharedStore>, limits: RateLimits) -> Self {
        Self { store, limits }
    }

    /// Returns the bucket currently mapped to a route.
    ///
    /// # Arguments
    /// - `route` - Normalized route key
    ///
    /// # Returns
    /// - `Ok(Resolution::Resolved(bucket))` - The remote service has revealed the mapping
    /// - `Ok(Resolution::Unresolved)` - No response for this route has been recorded yet
    /// - `Err(StoreError)` - The store could not be read
    pub async fn resolve(&self, route: &RouteKey) -> Result<Resolution, StoreError> {
        let Some(id) = self.store.get(&keys::route_bucket(route)).await? else {
            return Ok(Resolution::Unresolved);
        };

        let limit = self.read_int(&keys::bucket_limit(&id)).await?;
        let remaining = self.read_int(&keys::bucket_remaining(&id)).await?;
        let reset_at_ms = self.read_int(&keys::bucket_reset(&id)).await?;

        Ok(Resolution::Resolved(Bucket {
            id,
            limit,
            remaining,
            reset_at_ms,
        }))
    }

    /// Claims the right to make the first, bucket-revealing call for a route.
    ///
    /// The lock expires on its own after about a second so a crashed worker never blocks
    /// a route for longer.
    pub async fn acquire_discovery_lock(
        &self,
        route: &RouteKey,
    ) -> Result<DiscoveryLock, StoreError> {
        let granted = self
            .store
            .set_nx(
                &keys::discovery_lock(route),
                "1",
                Expiry::After(DISCOVERY_LOCK_TTL),
            )
            .await?;

        Ok(if granted {
            DiscoveryLock::Granted
        } else {
            DiscoveryLock::Denied
        })
    }

    pub async fn release_discovery_lock(&self, route: &RouteKey) -> Result<(), StoreError> {
        self.store.delete(&[keys::discovery_lock(route)]).await
    }

    /// Atomically takes one call from a Discord bucket and the global window.
    pub async fn try_consume(&self, bucket_id: &str) -> Result<Consume, StoreError> {
        let request = ConsumeRequest {
            bucket: Some(BucketWindow {
                remaining_key: keys::bucket_remaining(bucket_id),
                limit_key: keys::bucket_limit(bucket_id),
                window_key: keys::bucket_window(bucket_id),
                fallback_limit: DISCORD_FALLBACK_LIMIT,
                fallback_window: DISCORD_FALLBACK_WINDOW,
            }),
            global: Some(self.global_window()),
        };

        self.consume(request, &keys::bucket_remaining(bucket_id))
            .await
    }

    /// Takes one call from the global window only, for a discovery call.
    pub async fn try_consume_global(&self) -> Result<Consume, StoreError> {
        let request = ConsumeRequest {
            bucket: None,
            global: Some(self.global_window()),
        };

        self.consume(request, "").await
    }

    /// Takes one call from the fixed per-key bucket of a game-API key.
    pub async fn try_consume_key(&self, api_key: &str) -> Result<Consume, StoreError> {
        let bucket_id = format!("torn:{api_key}");
        let request = ConsumeRequest {
            bucket: Some(BucketWindow {
                remaining_key: keys::bucket_remaining(&bucket_id),
                limit_key: keys::bucket_limit(&bucket_id),
                window_key: keys::bucket_window(&bucket_id),
                fallback_limit: self.limits.torn_key_limit,
                fallback_window: self.limits.torn_window,
            }),
            global: None,
        };

        self.consume(request, &keys::bucket_remaining(&bucket_id))
            .await
    }

    /// Writes back the bucket state reported on a response.
    ///
    /// The route mapping is refreshed whenever a bucket id is present. Counters are only
    /// written when limit, remaining and reset are all known; the stored remaining count
    /// is the lower of the local and server values while both describe the same window.
    pub async fn record_response(
        &self,
        route: &RouteKey,
        headers: &RateLimitHeaders,
    ) -> Result<(), StoreError> {
        let Some(bucket_id) = headers.bucket.as_deref() else {
            return Ok(());
        };

        self.store
            .set(
                &keys::route_bucket(route),
                bucket_id,
                Expiry::After(ROUTE_MAPPING_TTL),
            )
            .await?;

        let now = now_ms();
        let (Some(limit), Some(remaining), Some(reset_at_ms)) =
            (headers.limit, headers.remaining, headers.reset_at_ms(now))
        else {
            return Ok(());
        };
        let reset_at_ms = reset_at_ms.max(now + 1);

        // At the start of a window the time to reset is the window length.
        let window = (remaining + 1 >= limit)
            .then_some(headers.reset_after)
            .flatten()
            .and_then(remote_seconds)
            .filter(|window| !window.is_zero());

        let stored = self
            .store
            .record_remaining(&RemainingUpdate {
                remaining_key: keys::bucket_remaining(bucket_id),
                limit_key: keys::bucket_limit(bucket_id),
                window_key: keys::bucket_window(bucket_id),
                reset_key: keys::bucket_reset(bucket_id),
                remaining,
                limit,
                reset_at_ms,
                window,
                metadata_ttl: ROUTE_MAPPING_TTL,
                tolerance: SAME_WINDOW_TOLERANCE,
            })
            .await?;

        tracing::debug!(
            "Bucket {} for {}: {}/{} remaining",
            bucket_id,
            route,
            stored,
            limit
        );

        Ok(())
    }

    /// Blocks every Discord call for the given duration after a global 429.
    pub async fn block_global(&self, retry_after: Duration) -> Result<(), StoreError> {
        tracing::warn!("Discord global rate limit hit, blocking for {:?}", retry_after);

        self.store
            .set(
                &keys::discord_global_block(),
                "1",
                Expiry::After(retry_after.max(Duration::from_millis(1))),
            )
            .await
    }

    fn global_window(&self) -> GlobalWindow {
        GlobalWindow {
            counter_key: keys::discord_global(now_ms() / 1000),
            block_key: keys::discord_global_block(),
            limit: self.limits.discord_global_per_second,
            ttl: GLOBAL_COUNTER_TTL,
        }
    }

    async fn consume(
        &self,
        request: ConsumeRequest,
        remaining_key: &str,
    ) -> Result<Consume, StoreError> {
        Ok(match self.store.consume(&request).await? {
            ConsumeResult::Allowed { .. } => Consume::Allowed,
            ConsumeResult::BucketExhausted => Consume::Denied {
                scope: RateLimitScope::Local,
                retry_after: self.store.ttl(remaining_key).await?,
            },
            ConsumeResult::GlobalBlocked => Consume::Denied {
                scope: RateLimitScope::Global,
                retry_after: self.store.ttl(&keys::discord_global_block()).await?,
            },
            ConsumeResult::GlobalExhausted => Consume::Denied {
                scope: RateLimitScope::Global,
                retry_after: Some(Duration::from_millis(
                    (1000 - now_ms().rem_euclid(1000)) as u64,
                )),
            },
        })
    }

    async fn read_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        match self.store.get(key).await? {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("expected an integer, found '{raw}'"),
            }),
        }
    }
}
