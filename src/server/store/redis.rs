use async_trait::async_trait;
use redis::{aio::ConnectionManager, Script};
use std::time::Duration;

use super::{
    duration_ms, scripts, ConsumeRequest, ConsumeResult, Expiry, RemainingUpdate, SharedStore,
};
use crate::server::error::store::StoreError;

/// Redis-backed store shared by every worker process.
///
/// `ConnectionManager` reconnects transparently and is cheap to clone, so each
/// operation works on its own clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    consume: Script,
    record_remaining: Script,
    incr_with_ttl: Script,
    pop_due: Script,
}

impl RedisStore {
    /// Connects to Redis at the given URL.
    ///
    /// # Arguments
    /// - `url` - Redis connection URL (e.g. `redis://localhost:6379`)
    ///
    /// # Returns
    /// - `Ok(RedisStore)` - Connected store
    /// - `Err(StoreError::Redis)` - Invalid URL or connection failure
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            consume: Script::new(scripts::CONSUME),
            record_remaining: Script::new(scripts::RECORD_REMAINING),
            incr_with_ttl: Script::new(scripts::INCR_WITH_TTL),
            pop_due: Script::new(scripts::POP_DUE),
        })
    }
}

fn with_expiry(cmd: &mut redis::Cmd, expiry: Expiry) {
    match expiry {
        Expiry::After(ttl) => cmd.arg("PX").arg(duration_ms(ttl).max(1)),
        Expiry::AtMillis(at) => cmd.arg("PXAT").arg(at),
    };
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        with_expiry(&mut cmd, expiry);
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, expiry: Expiry) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        with_expiry(&mut cmd, expiry);
        let written: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(written.is_some())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.conn.clone();
        let pttl: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok((pttl >= 0).then(|| Duration::from_millis(pttl as u64)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let updated: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(duration_ms(ttl).max(1))
            .query_async(&mut conn)
            .await?;
        Ok(updated == 1)
    }

    async fn incr(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = self
            .incr_with_ttl
            .key(key)
            .arg(delta)
            .arg(duration_ms(ttl).max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_add(
        &self,
        key: &str,
        members: &[String],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("SADD")
            .arg(key)
            .arg(members)
            .ignore()
            .cmd("PEXPIRE")
            .arg(key)
            .arg(duration_ms(ttl).max(1))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("SMEMBERS").arg(key).query_async(&mut conn).await?;
        Ok(members)
    }

    async fn consume(&self, request: &ConsumeRequest) -> Result<ConsumeResult, StoreError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.consume.prepare_invoke();

        match &request.bucket {
            Some(bucket) => {
                invocation
                    .key(&bucket.remaining_key)
                    .key(&bucket.limit_key)
                    .key(&bucket.window_key);
            }
            None => {
                invocation.key("_").key("_").key("_");
            }
        }
        match &request.global {
            Some(global) => {
                invocation.key(&global.counter_key).key(&global.block_key);
            }
            None => {
                invocation.key("_").key("_");
            }
        }

        let (fallback_limit, fallback_window) = request
            .bucket
            .as_ref()
            .map(|b| (b.fallback_limit, duration_ms(b.fallback_window).max(1)))
            .unwrap_or((0, 1));
        let (global_limit, global_ttl) = request
            .global
            .as_ref()
            .map(|g| (g.limit, duration_ms(g.ttl).max(1)))
            .unwrap_or((0, 1));

        invocation
            .arg(if request.bucket.is_some() { "1" } else { "0" })
            .arg(fallback_limit)
            .arg(fallback_window)
            .arg(if request.global.is_some() { "1" } else { "0" })
            .arg(global_limit)
            .arg(global_ttl);

        let (status, remaining): (i64, i64) = invocation.invoke_async(&mut conn).await?;

        Ok(match status {
            1 => ConsumeResult::Allowed {
                remaining: (remaining >= 0).then_some(remaining),
            },
            0 => ConsumeResult::BucketExhausted,
            -2 => ConsumeResult::GlobalBlocked,
            -3 => ConsumeResult::GlobalExhausted,
            other => {
                return Err(StoreError::Corrupt {
                    key: request
                        .bucket
                        .as_ref()
                        .map(|b| b.remaining_key.clone())
                        .unwrap_or_default(),
                    reason: format!("consume script returned status {other}"),
                })
            }
        })
    }

    async fn record_remaining(&self, update: &RemainingUpdate) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = self
            .record_remaining
            .key(&update.remaining_key)
            .key(&update.limit_key)
            .key(&update.window_key)
            .key(&update.reset_key)
            .arg(update.remaining)
            .arg(update.limit)
            .arg(update.reset_at_ms)
            .arg(update.window.map(duration_ms).unwrap_or(0))
            .arg(duration_ms(update.metadata_ttl).max(1))
            .arg(duration_ms(update.tolerance))
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn schedule(&self, queue: &str, payload: &str, due_ms: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("ZADD")
            .arg(queue)
            .arg(due_ms)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn pop_due(&self, queue: &str, now_ms: i64) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = self
            .pop_due
            .key(queue)
            .arg(now_ms)
            .invoke_async(&mut conn)
            .await?;
        Ok(payload)
    }
}
