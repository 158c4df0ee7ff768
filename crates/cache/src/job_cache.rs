//! Typed job operations over a [`FastStore`].

use std::sync::Arc;
use std::time::Duration;

use lipsync_core::job::Job;
use lipsync_core::types::{JobId, OwnerId};

use crate::keys::{CacheKeys, CacheTtl};
use crate::store::{CacheError, FastStore};

/// Cached job copies, the per-owner id index and the pending list.
#[derive(Clone)]
pub struct JobCache {
    store: Arc<dyn FastStore>,
    keys: CacheKeys,
    ttl: CacheTtl,
}

impl JobCache {
    pub fn new(store: Arc<dyn FastStore>, keys: CacheKeys, ttl: CacheTtl) -> Self {
        Self { store, keys, ttl }
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// Write the job's current state, with the expiry its status calls for.
    pub async fn put_job(&self, job: &Job) -> Result<(), CacheError> {
        let value = serde_json::to_string(job)?;
        self.store
            .set_with_expiry(&self.keys.job(job.id), &value, self.ttl.for_status(job.status))
            .await
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>, CacheError> {
        match self.store.get(&self.keys.job(id)).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Drop the cached copy. Returns `true` if one existed.
    pub async fn evict(&self, id: JobId) -> Result<bool, CacheError> {
        self.store.delete(&self.keys.job(id)).await
    }

    pub async fn index_owner(&self, owner_id: OwnerId, id: JobId) -> Result<(), CacheError> {
        self.store
            .add_to_set(&self.keys.owner(owner_id), &id.to_string())
            .await
    }

    pub async fn unindex_owner(&self, owner_id: OwnerId, id: JobId) -> Result<(), CacheError> {
        self.store
            .remove_from_set(&self.keys.owner(owner_id), &id.to_string())
            .await
    }

    /// Ids recorded in an owner's index.
    pub async fn owner_job_ids(&self, owner_id: OwnerId) -> Result<Vec<JobId>, CacheError> {
        let key = self.keys.owner(owner_id);
        let members = self.store.set_members(&key).await?;
        members.iter().map(|m| parse_id(&key, m)).collect()
    }

    /// Append to the tail of the pending list.
    pub async fn enqueue(&self, id: JobId) -> Result<(), CacheError> {
        self.store
            .push_tail(&self.keys.pending_queue, &id.to_string())
            .await
    }

    /// Pop the head of the pending list, waiting up to `timeout`.
    pub async fn dequeue(&self, timeout: Duration) -> Result<Option<JobId>, CacheError> {
        let key = &self.keys.pending_queue;
        match self.store.pop_head_blocking(key, timeout).await? {
            Some(value) => parse_id(key, &value).map(Some),
            None => Ok(None),
        }
    }

    /// Remove every queued occurrence of `id`.
    pub async fn remove_queued(&self, id: JobId) -> Result<usize, CacheError> {
        self.store
            .remove_from_list(&self.keys.pending_queue, &id.to_string())
            .await
    }

    /// Queued ids, head first.
    pub async fn pending_ids(&self) -> Result<Vec<JobId>, CacheError> {
        let key = &self.keys.pending_queue;
        let values = self.store.list_range(key).await?;
        values.iter().map(|v| parse_id(key, v)).collect()
    }
}

fn parse_id(key: &str, value: &str) -> Result<JobId, CacheError> {
    value.parse().map_err(|e: uuid::Error| CacheError::InvalidEntry {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
