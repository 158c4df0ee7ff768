//! In-process [`FastStore`].
//!
//! Values, sets and lists live in separate maps behind one mutex. Expiry
//! is checked lazily on read using the tokio clock, so paused-time tests
//! can advance past a TTL.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::store::{CacheError, FastStore};

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, Entry>,
    sets: HashMap<String, HashSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
}

#[derive(Default)]
pub struct MemoryFastStore {
    inner: Mutex<Inner>,
    pushed: Notify,
}

impl MemoryFastStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FastStore for MemoryFastStore {
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.inner.lock().await.values.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut inner = self.inner.lock().await;
        let expired = match inner.values.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()))
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.values.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut inner = self.inner.lock().await;
        let value = inner
            .values
            .remove(key)
            .is_some_and(|entry| entry.expires_at > Instant::now());
        let set = inner.sets.remove(key).is_some();
        let list = inner.lists.remove(key).is_some();
        Ok(value || set || list)
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        self.inner
            .lock()
            .await
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut inner = self.inner.lock().await;
        if let Some(set) = inner.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                inner.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn push_tail(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.inner
            .lock()
            .await
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop_head_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, CacheError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a push between the check
            // and the wait is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().await;
                if let Some(list) = inner.lists.get_mut(key) {
                    if let Some(value) = list.pop_front() {
                        if list.is_empty() {
                            inner.lists.remove(key);
                        }
                        return Ok(Some(value));
                    }
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn remove_from_list(&self, key: &str, value: &str) -> Result<usize, CacheError> {
        let mut inner = self.inner.lock().await;
        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|item| item != value);
        let removed = before - list.len();
        if list.is_empty() {
            inner.lists.remove(key);
        }
        Ok(removed)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }
}
