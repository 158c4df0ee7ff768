use async_trait::async_trait;
use lipsync_core::job::{Job, JobStatus, JobUpdate};
use lipsync_core::types::{JobId, OwnerId, Timestamp};

use super::{JobStore, StoreError};
use crate::models::job::JobListQuery;
use crate::repositories::JobRepo;
use crate::DbPool;

/// Postgres-backed [`JobStore`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        JobRepo::insert(&self.pool, job).await.map_err(|err| match err {
            StoreError::Database(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() =>
            {
                StoreError::Duplicate(job.id)
            }
            other => other,
        })
    }

    async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        JobRepo::update(&self.pool, id, update).await
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        JobRepo::find_by_id(&self.pool, id).await
    }

    async fn query_by_owner(
        &self,
        owner_id: OwnerId,
        query: &JobListQuery,
    ) -> Result<Vec<Job>, StoreError> {
        JobRepo::list_by_owner(&self.pool, owner_id, query).await
    }

    async fn query_stale(
        &self,
        status: JobStatus,
        older_than: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        JobRepo::list_stale(&self.pool, status, older_than).await
    }

    async fn delete(&self, id: JobId) -> Result<bool, StoreError> {
        JobRepo::delete(&self.pool, id).await
    }
}
