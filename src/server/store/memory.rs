use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{
    duration_ms, now_ms, ConsumeRequest, ConsumeResult, Expiry, RemainingUpdate, SharedStore,
};
use crate::server::error::store::StoreError;

/// In-process store for tests and single-process deployments.
///
/// Each operation runs under one mutex, which gives the same atomicity the Redis scripts
/// provide across processes. Expired keys are dropped lazily on access.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

enum Value {
    Str(String),
    Set(HashSet<String>),
    Queue(BTreeSet<(i64, String)>),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn deadline(expiry: Expiry, now: i64) -> i64 {
    match expiry {
        Expiry::After(ttl) => now + duration_ms(ttl).max(1),
        Expiry::AtMillis(at) => at,
    }
}

fn corrupt(key: &str, reason: &str) -> StoreError {
    StoreError::Corrupt {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Live-entry view over the map at a fixed instant.
struct View<'a> {
    entries: &'a mut HashMap<String, Entry>,
    now: i64,
}

impl<'a> View<'a> {
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let expired = matches!(
            self.entries.get(key),
            Some(Entry { expires_at: Some(at), .. }) if *at <= self.now
        );
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn get_str(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(corrupt(key, "not a string value")),
        }
    }

    fn get_int(&mut self, key: &str) -> Result<Option<i64>, StoreError> {
        match self.get_str(key)? {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| corrupt(key, "not an integer")),
        }
    }

    fn put(&mut self, key: &str, value: Value, expires_at: Option<i64>) {
        if matches!(expires_at, Some(at) if at <= self.now) {
            self.entries.remove(key);
            return;
        }
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
    }

    fn put_str(&mut self, key: &str, value: impl ToString, expires_at: Option<i64>) {
        self.put(key, Value::Str(value.to_string()), expires_at);
    }
}

impl MemoryStore {
    async fn view<R>(&self, f: impl FnOnce(&mut View<'_>) -> R) -> R {
        let mut entries = self.entries.lock().await;
        let mut view = View {
            entries: &mut *entries,
            now: now_ms(),
        };
        f(&mut view)
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.view(|v| v.get_str(key)).await
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> Result<(), StoreError> {
        self.view(|v| {
            let at = deadline(expiry, v.now);
            v.put_str(key, value, Some(at));
            Ok(())
        })
        .await
    }

    async fn set_nx(&self, key: &str, value: &str, expiry: Expiry) -> Result<bool, StoreError> {
        self.view(|v| {
            if v.live(key).is_some() {
                return Ok(false);
            }
            let at = deadline(expiry, v.now);
            v.put_str(key, value, Some(at));
            Ok(true)
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        self.view(|v| {
            for key in keys {
                v.entries.remove(key);
            }
            Ok(())
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.view(|v| {
            let now = v.now;
            Ok(v.live(key)
                .and_then(|e| e.expires_at)
                .map(|at| Duration::from_millis((at - now).max(0) as u64)))
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.view(|v| {
            let at = v.now + duration_ms(ttl).max(1);
            Ok(match v.live(key) {
                Some(entry) => {
                    entry.expires_at = Some(at);
                    true
                }
                None => false,
            })
        })
        .await
    }

    async fn incr(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64, StoreError> {
        self.view(|v| {
            let now = v.now;
            let existing_expiry = v.live(key).and_then(|e| e.expires_at);
            let value = v.get_int(key)?.unwrap_or(0) + delta;
            let at = existing_expiry.unwrap_or(now + duration_ms(ttl).max(1));
            v.put_str(key, value, Some(at));
            Ok(value)
        })
        .await
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
        self.view(|v| {
            let at = v.now + duration_ms(ttl).max(1);
            let mut set = match v.live(key) {
                None => HashSet::new(),
                Some(Entry { value: Value::Set(set), .. }) => std::mem::take(set),
                Some(_) => return Err(corrupt(key, "not a set")),
            };
            set.extend(members.iter().cloned());
            v.put(key, Value::Set(set), Some(at));
            Ok(())
        })
        .await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.view(|v| match v.live(key) {
            None => Ok(Vec::new()),
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(corrupt(key, "not a set")),
        })
        .await
    }

    async fn consume(&self, request: &ConsumeRequest) -> Result<ConsumeResult, StoreError> {
        self.view(|v| {
            if let Some(global) = &request.global {
                if v.live(&global.block_key).is_some() {
                    return Ok(ConsumeResult::GlobalBlocked);
                }
                if v.get_int(&global.counter_key)?.unwrap_or(0) >= global.limit {
                    return Ok(ConsumeResult::GlobalExhausted);
                }
            }

            let mut remaining = None;
            if let Some(bucket) = &request.bucket {
                let expires_at = v.live(&bucket.remaining_key).and_then(|e| e.expires_at);
                match v.get_int(&bucket.remaining_key)? {
                    Some(current) if current <= 0 => return Ok(ConsumeResult::BucketExhausted),
                    Some(current) => {
                        v.put_str(&bucket.remaining_key, current - 1, expires_at);
                        remaining = Some(current - 1);
                    }
                    None => {
                        let limit = v
                            .get_int(&bucket.limit_key)?
                            .unwrap_or(bucket.fallback_limit);
                        if limit <= 0 {
                            return Ok(ConsumeResult::BucketExhausted);
                        }
                        let window = v
                            .get_int(&bucket.window_key)?
                            .unwrap_or(duration_ms(bucket.fallback_window))
                            .max(1);
                        let at = v.now + window;
                        v.put_str(&bucket.remaining_key, limit - 1, Some(at));
                        remaining = Some(limit - 1);
                    }
                }
            }

            if let Some(global) = &request.global {
                let used = v.get_int(&global.counter_key)?.unwrap_or(0);
                let at = v.now + duration_ms(global.ttl).max(1);
                v.put_str(&global.counter_key, used + 1, Some(at));
            }

            Ok(ConsumeResult::Allowed { remaining })
        })
        .await
    }

    async fn record_remaining(&self, update: &RemainingUpdate) -> Result<i64, StoreError> {
        self.view(|v| {
            let current = v.get_int(&update.remaining_key)?;
            let known_reset = v.get_int(&update.reset_key)?;
            let tolerance = duration_ms(update.tolerance);

            let value = match (current, known_reset) {
                (Some(current), None) => current.min(update.remaining),
                (Some(current), Some(known)) if update.reset_at_ms <= known + tolerance => {
                    current.min(update.remaining)
                }
                _ => update.remaining,
            };

            let metadata_at = v.now + duration_ms(update.metadata_ttl).max(1);
            v.put_str(&update.remaining_key, value, Some(update.reset_at_ms));
            v.put_str(&update.reset_key, update.reset_at_ms, Some(update.reset_at_ms));
            v.put_str(&update.limit_key, update.limit, Some(metadata_at));
            if let Some(window) = update.window.filter(|w| !w.is_zero()) {
                v.put_str(&update.window_key, duration_ms(window), Some(metadata_at));
            }
            Ok(value)
        })
        .await
    }

    async fn schedule(&self, queue: &str, payload: &str, due_ms: i64) -> Result<(), StoreError> {
        self.view(|v| {
            let mut items = match v.live(queue) {
                None => BTreeSet::new(),
                Some(Entry { value: Value::Queue(items), .. }) => std::mem::take(items),
                Some(_) => return Err(corrupt(queue, "not a queue")),
            };
            items.retain(|(_, existing)| existing != payload);
            items.insert((due_ms, payload.to_string()));
            v.put(queue, Value::Queue(items), None);
            Ok(())
        })
        .await
    }

    async fn pop_due(&self, queue: &str, now_ms: i64) -> Result<Option<String>, StoreError> {
        self.view(|v| match v.live(queue) {
            None => Ok(None),
            Some(Entry { value: Value::Queue(items), .. }) => {
                let due = items.iter().next().filter(|(at, _)| *at <= now_ms).cloned();
                Ok(due.map(|item| {
                    items.remove(&item);
                    item.1
                }))
            }
            Some(_) => Err(corrupt(queue, "not a queue")),
        })
        .await
    }
}
