//! Repository for the `generation_jobs` table.
//!
//! Status transitions are guarded in SQL: every update names the statuses
//! the row must currently hold, so concurrent writers cannot move a job
//! backwards through the state machine.

use lipsync_core::job::{Job, JobStatus, JobUpdate};
use lipsync_core::types::{JobId, OwnerId, Timestamp};
use sqlx::PgPool;

use crate::models::job::{JobListQuery, JobRow};
use crate::models::status::{status_id, StatusId};
use crate::store::StoreError;

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, payload, status_id, \
    video_url, duration_secs, error_message, \
    created_at, updated_at, completed_at";

/// Provides persistence operations for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a freshly submitted job.
    pub async fn insert(pool: &PgPool, job: &Job) -> Result<(), StoreError> {
        let payload = serde_json::to_value(&job.payload)?;
        sqlx::query(
            "INSERT INTO generation_jobs \
                 (id, owner_id, payload, status_id, video_url, duration_secs, \
                  error_message, created_at, updated_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(job.id)
        .bind(job.owner_id)
        .bind(payload)
        .bind(status_id(job.status))
        .bind(job.result.as_ref().map(|r| r.video_url.as_str()))
        .bind(job.result.as_ref().and_then(|r| r.duration_secs))
        .bind(job.error.as_deref())
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Apply a guarded transition and return the updated row.
    ///
    /// Returns `None` when the job does not exist or its current status is
    /// not in `update.from`. `video_url`, `duration_secs` and
    /// `error_message` keep their first non-null value, and `updated_at`
    /// only ever moves forward.
    pub async fn update(
        pool: &PgPool,
        id: JobId,
        update: &JobUpdate,
    ) -> Result<Option<Job>, StoreError> {
        let allowed: Vec<StatusId> = update.from.iter().copied().map(status_id).collect();
        let result = update.result.as_ref();
        let query = format!(
            "UPDATE generation_jobs \
             SET status_id = $2, \
                 video_url = COALESCE(video_url, $3), \
                 duration_secs = COALESCE(duration_secs, $4), \
                 error_message = COALESCE(error_message, $5), \
                 completed_at = COALESCE($6, completed_at), \
                 updated_at = GREATEST(updated_at, $7) \
             WHERE id = $1 AND status_id = ANY($8) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(status_id(update.status))
            .bind(result.map(|r| r.video_url.as_str()))
            .bind(result.and_then(|r| r.duration_secs))
            .bind(update.error.as_deref())
            .bind(update.completed_at)
            .bind(update.updated_at)
            .bind(allowed)
            .fetch_optional(pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    /// List an owner's jobs, newest first, with optional status filter.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: OwnerId,
        params: &JobListQuery,
    ) -> Result<Vec<Job>, StoreError> {
        let status_clause = if params.status.is_some() {
            "AND status_id = $4"
        } else {
            ""
        };
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE owner_id = $1 {status_clause} \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query)
            .bind(owner_id)
            .bind(params.effective_limit())
            .bind(params.effective_offset());
        if let Some(status) = params.status {
            q = q.bind(status_id(status));
        }

        q.fetch_all(pool)
            .await?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    /// Jobs in `status` whose `updated_at` is strictly older than `older_than`,
    /// oldest first.
    pub async fn list_stale(
        pool: &PgPool,
        status: JobStatus,
        older_than: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE status_id = $1 AND updated_at < $2 \
             ORDER BY updated_at ASC"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(status_id(status))
            .bind(older_than)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    /// Permanently delete a job. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: JobId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM generation_jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
