//! Submission, status queries and control operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use lipsync_core::error::CoreError;
use lipsync_core::job::{Job, JobStatus, JobUpdate};
use lipsync_core::payload::VideoPayload;
use lipsync_core::types::{JobId, OwnerId};
use lipsync_db::models::job::JobListQuery;
use lipsync_events::{JobEvent, Notifier};
use serde::Serialize;

use crate::stores::JobStores;

/// Job counts per status for one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub by_status: BTreeMap<JobStatus, usize>,
}

impl StatusSummary {
    pub fn count(&self, status: JobStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// The caller-facing surface of the queue.
#[derive(Clone)]
pub struct JobService {
    stores: JobStores,
    notifier: Arc<dyn Notifier>,
}

impl JobService {
    pub(crate) fn new(stores: JobStores, notifier: Arc<dyn Notifier>) -> Self {
        Self { stores, notifier }
    }

    /// Accept a new job.
    ///
    /// The durable insert must succeed. Caching and the owner index are
    /// best-effort. If the id cannot be queued the durable record is
    /// removed again, since nothing would ever pick up a pending record
    /// that is not on the queue.
    pub async fn submit(&self, owner_id: OwnerId, payload: VideoPayload) -> Result<Job, CoreError> {
        payload.check()?;
        let job = Job::new(owner_id, payload);

        self.stores.durable.insert(&job).await.map_err(|e| {
            tracing::error!(job_id = %job.id, error = %e, "Failed to persist new job");
            CoreError::from(e)
        })?;

        self.stores.cache_best_effort(&job).await;
        if let Err(e) = self.stores.cache.index_owner(owner_id, job.id).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to index job for owner");
        }

        if let Err(e) = self.stores.cache.enqueue(job.id).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to enqueue job, rolling back");
            if let Err(rollback) = self.stores.durable.delete(job.id).await {
                tracing::error!(job_id = %job.id, error = %rollback, "Rollback of unqueued job failed");
            }
            if let Err(cache_err) = self.stores.cache.evict(job.id).await {
                tracing::warn!(job_id = %job.id, error = %cache_err, "Failed to evict unqueued job");
            }
            if let Err(cache_err) = self.stores.cache.unindex_owner(owner_id, job.id).await {
                tracing::warn!(job_id = %job.id, error = %cache_err, "Failed to unindex unqueued job");
            }
            return Err(CoreError::Persistence(format!("Failed to enqueue job: {e}")));
        }

        tracing::info!(job_id = %job.id, owner_id = %owner_id, "Job submitted");
        Ok(job)
    }

    /// Current state of a job, from the cache when possible.
    pub async fn get_status(&self, id: JobId) -> Result<Job, CoreError> {
        self.stores
            .read_through(id)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    /// [`get_status`](Self::get_status), restricted to the job's owner.
    pub async fn get_for_owner(&self, id: JobId, owner_id: OwnerId) -> Result<Job, CoreError> {
        let job = self.get_status(id).await?;
        if job.owner_id != owner_id {
            return Err(CoreError::Forbidden(format!(
                "Job {id} does not belong to the requesting owner"
            )));
        }
        Ok(job)
    }

    /// An owner's jobs, newest first.
    pub async fn list_for_owner(
        &self,
        owner_id: OwnerId,
        query: &JobListQuery,
    ) -> Result<Vec<Job>, CoreError> {
        Ok(self.stores.durable.query_by_owner(owner_id, query).await?)
    }

    pub fn summarize_by_status(jobs: &[Job]) -> StatusSummary {
        let mut summary = StatusSummary {
            total: jobs.len(),
            by_status: JobStatus::ALL.into_iter().map(|s| (s, 0)).collect(),
        };
        for job in jobs {
            *summary.by_status.entry(job.status).or_insert(0) += 1;
        }
        summary
    }

    /// Cancel a pending or in-progress job.
    ///
    /// A job already claimed by the worker keeps running; if the external
    /// task finishes, its completion or failure replaces the cancellation.
    pub async fn cancel(&self, id: JobId) -> Result<Job, CoreError> {
        let current = self
            .stores
            .durable
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::job_not_found(id))?;
        if current.status.is_terminal() {
            return Err(CoreError::InvalidTransition {
                id,
                from: current.status,
                action: "cancel",
            });
        }

        let cancelled = match self.stores.durable.update(id, &JobUpdate::cancel(Utc::now())).await? {
            Some(job) => job,
            None => {
                // Lost a race with the worker or a delete.
                let latest = self
                    .stores
                    .durable
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| CoreError::job_not_found(id))?;
                return Err(CoreError::InvalidTransition {
                    id,
                    from: latest.status,
                    action: "cancel",
                });
            }
        };

        if let Err(e) = self.stores.cache.remove_queued(id).await {
            tracing::warn!(job_id = %id, error = %e, "Failed to remove cancelled job from queue");
        }
        self.stores.cache_best_effort(&cancelled).await;
        self.notifier
            .publish(cancelled.owner_id, JobEvent::cancelled(&cancelled));

        tracing::info!(job_id = %id, from = %current.status, "Job cancelled");
        Ok(cancelled)
    }

    /// Remove a job from both stores and the queue.
    ///
    /// Does not stop an external task already running for it.
    pub async fn delete(&self, id: JobId) -> Result<(), CoreError> {
        let durable_copy = self.stores.durable.get_by_id(id).await?;
        let cached_copy = match &durable_copy {
            Some(_) => None,
            None => self.stores.cache.get_job(id).await.unwrap_or_else(|e| {
                tracing::warn!(job_id = %id, error = %e, "Cache read failed during delete");
                None
            }),
        };
        let owner_id = durable_copy
            .as_ref()
            .or(cached_copy.as_ref())
            .map(|job| job.owner_id);

        let removed_durable = self.stores.durable.delete(id).await?;
        let removed_cached = self.stores.cache.evict(id).await.unwrap_or_else(|e| {
            tracing::warn!(job_id = %id, error = %e, "Failed to evict cached job");
            false
        });
        if let Some(owner_id) = owner_id {
            if let Err(e) = self.stores.cache.unindex_owner(owner_id, id).await {
                tracing::warn!(job_id = %id, error = %e, "Failed to unindex deleted job");
            }
        }
        if let Err(e) = self.stores.cache.remove_queued(id).await {
            tracing::warn!(job_id = %id, error = %e, "Failed to dequeue deleted job");
        }

        if !removed_durable && !removed_cached && owner_id.is_none() {
            return Err(CoreError::job_not_found(id));
        }
        tracing::info!(job_id = %id, "Job deleted");
        Ok(())
    }
}
