//! The durable and fast stores, kept in step.
//!
//! The durable store is authoritative. The cached copy is written after
//! every successful durable write, and cache failures are only logged.

use std::sync::Arc;

use lipsync_cache::JobCache;
use lipsync_core::error::CoreError;
use lipsync_core::job::{Job, JobUpdate};
use lipsync_core::types::JobId;
use lipsync_db::JobStore;

/// Result of loading a record for processing.
#[derive(Debug)]
pub(crate) enum Loaded {
    /// Read from the durable store.
    Durable(Job),
    /// The durable read failed; this is the cached copy.
    CacheOnly { job: Job, durable_error: String },
    Missing,
}

#[derive(Clone)]
pub(crate) struct JobStores {
    pub(crate) durable: Arc<dyn JobStore>,
    pub(crate) cache: JobCache,
}

impl JobStores {
    pub(crate) fn new(durable: Arc<dyn JobStore>, cache: JobCache) -> Self {
        Self { durable, cache }
    }

    /// Durable first, falling back to the cached copy only when the durable
    /// store cannot be read.
    pub(crate) async fn load(&self, id: JobId) -> Loaded {
        match self.durable.get_by_id(id).await {
            Ok(Some(job)) => Loaded::Durable(job),
            Ok(None) => Loaded::Missing,
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Durable read failed, trying cache");
                match self.cache.get_job(id).await {
                    Ok(Some(job)) => Loaded::CacheOnly {
                        job,
                        durable_error: e.to_string(),
                    },
                    Ok(None) => Loaded::Missing,
                    Err(cache_err) => {
                        tracing::warn!(job_id = %id, error = %cache_err, "Cache read failed");
                        Loaded::Missing
                    }
                }
            }
        }
    }

    /// Cache first, then durable. Used by status queries.
    pub(crate) async fn read_through(&self, id: JobId) -> Result<Option<Job>, CoreError> {
        match self.cache.get_job(id).await {
            Ok(Some(job)) => return Ok(Some(job)),
            Ok(None) => {}
            Err(e) => tracing::warn!(job_id = %id, error = %e, "Cache read failed, using durable store"),
        }
        Ok(self.durable.get_by_id(id).await?)
    }

    /// Apply `update` on behalf of the worker or sweeper.
    ///
    /// Returns the record after the update, or `None` when the guard
    /// rejected it or the record is gone. If the durable store errors the
    /// update is applied to `current` in memory and cached anyway, so the
    /// outcome stays visible to clients.
    pub(crate) async fn apply(&self, current: &Job, update: &JobUpdate) -> Option<Job> {
        let updated = match self.durable.update(current.id, update).await {
            Ok(Some(job)) => job,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(
                    job_id = %current.id,
                    status = %update.status,
                    error = %e,
                    "Durable update failed, recording outcome in cache only"
                );
                let mut job = current.clone();
                if !job.apply(update) {
                    return None;
                }
                job
            }
        };
        self.cache_best_effort(&updated).await;
        Some(updated)
    }

    /// Refresh the cached copy, logging failures.
    pub(crate) async fn cache_best_effort(&self, job: &Job) {
        if let Err(e) = self.cache.put_job(job).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to cache job");
        }
    }
}
