use std::collections::HashMap;

use async_trait::async_trait;
use lipsync_core::job::{Job, JobStatus, JobUpdate};
use lipsync_core::types::{JobId, OwnerId, Timestamp};
use tokio::sync::RwLock;

use super::{JobStore, StoreError};
use crate::models::job::JobListQuery;

/// In-process [`JobStore`] with the same transition semantics as Postgres.
///
/// Records do not survive a restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs
            .get_mut(&id)
            .and_then(|job| job.apply(update).then(|| job.clone())))
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn query_by_owner(
        &self,
        owner_id: OwnerId,
        query: &JobListQuery,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<&Job> = jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .filter(|job| query.status.map_or(true, |status| job.status == status))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(query.effective_offset() as usize)
            .take(query.effective_limit() as usize)
            .cloned()
            .collect())
    }

    async fn query_stale(
        &self,
        status: JobStatus,
        older_than: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut stale: Vec<Job> = jobs
            .values()
            .filter(|job| job.status == status && job.updated_at < older_than)
            .cloned()
            .collect();
        stale.sort_by_key(|job| job.updated_at);
        Ok(stale)
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}
