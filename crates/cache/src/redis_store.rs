//! Redis-backed [`FastStore`].

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::store::{CacheError, FastStore};

/// [`FastStore`] over a Redis server.
///
/// Blocking pops run on their own connection so a waiting `BLPOP` does not
/// stall the commands issued by submitters and the control API.
#[derive(Clone)]
pub struct RedisFastStore {
    conn: ConnectionManager,
    blocking: ConnectionManager,
}

impl RedisFastStore {
    /// Open both connections to the server at `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        let blocking = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis");
        Ok(Self { conn, blocking })
    }

    /// Round-trip a `PING`.
    pub async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl FastStore for RedisFastStore {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.srem(key, member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn push_tail(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.rpush(key, value).await?;
        Ok(())
    }

    async fn pop_head_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, CacheError> {
        // BLPOP with a zero timeout blocks forever, so a zero wait is a plain LPOP.
        if timeout.is_zero() {
            let mut conn = self.conn.clone();
            let value: Option<String> = redis::cmd("LPOP")
                .arg(key)
                .query_async(&mut conn)
                .await?;
            return Ok(value);
        }

        let mut conn = self.blocking.clone();
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        Ok(popped.map(|(_, value)| value))
    }

    async fn remove_from_list(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.lrem(key, 0, value).await?;
        Ok(removed.max(0) as usize)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(values)
    }
}
