use std::time::Duration;

use async_trait::async_trait;
use lipsync_core::error::CoreError;

/// Errors from the fast store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be interpreted (e.g. a queued id that is
    /// not a UUID).
    #[error("Invalid cache entry at {key}: {reason}")]
    InvalidEntry { key: String, reason: String },
}

impl From<CacheError> for CoreError {
    fn from(err: CacheError) -> Self {
        CoreError::Persistence(err.to_string())
    }
}

/// Low-latency key/value store with expiry, sets and lists.
///
/// Every operation is atomic per key. `pop_head_blocking` hands each list
/// element to exactly one caller even when several callers wait on the
/// same key.
#[async_trait]
pub trait FastStore: Send + Sync {
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove a key of any kind. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), CacheError>;

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), CacheError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError>;

    async fn push_tail(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Pop the head of the list, waiting up to `timeout` for one to arrive.
    /// `Ok(None)` on timeout.
    async fn pop_head_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, CacheError>;

    /// Remove every occurrence of `value`. Returns how many were removed.
    async fn remove_from_list(&self, key: &str, value: &str) -> Result<usize, CacheError>;

    /// The whole list, head first.
    async fn list_range(&self, key: &str) -> Result<Vec<String>, CacheError>;
}
