//! Redis-backed counter store
//!
//! The connection is established lazily and retried on the next call after a
//! failure, so a Redis outage at startup only degrades limiting until it recovers.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::counter_store::CounterStore;
use crate::errors::{LimiterError, LimiterResult};

pub struct RedisCounterStore {
    client: Client,
    manager: OnceCell<ConnectionManager>,
}

impl RedisCounterStore {
    /// Validate the URL without connecting
    pub fn new(redis_url: &str) -> LimiterResult<Self> {
        let client = Client::open(redis_url).map_err(|e| LimiterError::Backend {
            operation: "open",
            message: e.to_string(),
        })?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
        })
    }

    /// Try to connect now; failure is logged and retried lazily
    pub async fn warm_up(&self, timeout: Duration) {
        match tokio::time::timeout(timeout, self.connection()).await {
            Ok(Ok(_)) => info!("Connected to Redis counter store"),
            Ok(Err(e)) => warn!("Redis counter store unavailable at startup (limits fail open): {}", e),
            Err(_) => warn!(
                "Redis counter store did not answer within {}ms at startup (limits fail open)",
                timeout.as_millis()
            ),
        }
    }

    async fn connection(&self) -> LimiterResult<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        // Clones share the same multiplexed connection
        Ok(manager.clone())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn incr(&self, key: &str) -> LimiterResult<i64> {
        let mut conn = self.connection().await?;
        Ok(conn.incr(key, 1).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> LimiterResult<()> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1) as i64;
        let _: () = conn.expire(key, seconds).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> LimiterResult<i64> {
        let mut conn = self.connection().await?;
        let value: Option<i64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn decr(&self, key: &str) -> LimiterResult<i64> {
        let mut conn = self.connection().await?;
        Ok(conn.decr(key, 1).await?)
    }

    async fn del(&self, key: &str) -> LimiterResult<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
