//! Ephemeral counter stores backing the admission controller
//!
//! The controller only needs five primitives. Implementations:
//! - [`RedisCounterStore`](super::redis_store::RedisCounterStore) for shared deployments
//! - [`MemoryCounterStore`] for single-node setups and tests
//! - [`NullCounterStore`] when no store is configured (always allows)

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::errors::{LimiterError, LimiterResult};

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Short name reported by the health endpoint
    fn backend_name(&self) -> &'static str;

    /// Atomically add one and return the new value. Missing keys start at zero.
    async fn incr(&self, key: &str) -> LimiterResult<i64>;

    /// Set a key's time to live
    async fn expire(&self, key: &str, ttl: Duration) -> LimiterResult<()>;

    /// Current value, zero when missing
    async fn get(&self, key: &str) -> LimiterResult<i64>;

    /// Atomically subtract one and return the new value
    async fn decr(&self, key: &str) -> LimiterResult<i64>;

    async fn del(&self, key: &str) -> LimiterResult<()>;
}

/// Bound a store call by `limit`, turning an elapsed timer into [`LimiterError::Timeout`]
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, fut: F) -> LimiterResult<T>
where
    F: Future<Output = LimiterResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(LimiterError::Timeout {
            operation,
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}

/// Store used when limiting is disabled.
///
/// Reports zero for every counter so both limiters see an empty budget and
/// allow; remaining-budget metadata still shows the nominal limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCounterStore;

#[async_trait]
impl CounterStore for NullCounterStore {
    fn backend_name(&self) -> &'static str {
        "disabled"
    }

    async fn incr(&self, _key: &str) -> LimiterResult<i64> {
        Ok(0)
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> LimiterResult<()> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> LimiterResult<i64> {
        Ok(0)
    }

    async fn decr(&self, _key: &str) -> LimiterResult<i64> {
        Ok(0)
    }

    async fn del(&self, _key: &str) -> LimiterResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryEntry {
    value: i64,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local counter store with Redis-like expiry semantics
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

/// Expired entries are dropped in bulk once the map grows past this
const MEMORY_PURGE_THRESHOLD: usize = 10_000;

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining time to live of a key, `None` if it has no expiry or does not exist
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    async fn add(&self, key: &str, delta: i64) -> i64 {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if entries.len() > MEMORY_PURGE_THRESHOLD {
            entries.retain(|_, entry| !entry.is_expired(now));
        }

        let entry = entries.entry(key.to_string()).or_insert(MemoryEntry {
            value: 0,
            expires_at: None,
        });
        if entry.is_expired(now) {
            entry.value = 0;
            entry.expires_at = None;
        }
        entry.value += delta;
        entry.value
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn incr(&self, key: &str) -> LimiterResult<i64> {
        Ok(self.add(key, 1).await)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> LimiterResult<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key)
            && !entry.is_expired(now)
        {
            entry.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> LimiterResult<i64> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value)
            .unwrap_or(0))
    }

    async fn decr(&self, key: &str) -> LimiterResult<i64> {
        Ok(self.add(key, -1).await)
    }

    async fn del(&self, key: &str) -> LimiterResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
