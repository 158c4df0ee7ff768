//! The durable store seam.
//!
//! [`JobStore`] is the authoritative persistence for job records. Updates
//! are guarded transitions ([`JobUpdate`]) applied atomically per record.

use async_trait::async_trait;
use lipsync_core::error::CoreError;
use lipsync_core::job::{Job, JobStatus, JobUpdate};
use lipsync_core::types::{JobId, OwnerId, Timestamp};

use crate::models::job::JobListQuery;
use crate::models::status::StatusId;

mod memory;
mod pg;

pub use memory::MemoryJobStore;
pub use pg::PgJobStore;

/// Errors from the durable store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database rejected or failed the query.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored payload could not be encoded or decoded.
    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row carried a status id outside the lookup table.
    #[error("Unknown status id {0}")]
    UnknownStatus(StatusId),

    /// An insert collided with an existing id.
    #[error("Job {0} already exists")]
    Duplicate(JobId),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::Persistence(err.to_string())
    }
}

/// Authoritative, restart-surviving persistence for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record.
    async fn insert(&self, job: &Job) -> Result<(), StoreError>;

    /// Apply a guarded transition. `None` if the record is missing or its
    /// status is not admitted by the update's guard.
    async fn update(&self, id: JobId, update: &JobUpdate) -> Result<Option<Job>, StoreError>;

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// An owner's jobs, newest first, filtered and paginated by `query`.
    async fn query_by_owner(
        &self,
        owner_id: OwnerId,
        query: &JobListQuery,
    ) -> Result<Vec<Job>, StoreError>;

    /// Jobs in `status` last updated strictly before `older_than`.
    async fn query_stale(
        &self,
        status: JobStatus,
        older_than: Timestamp,
    ) -> Result<Vec<Job>, StoreError>;

    /// Remove a record. Returns `true` if it existed.
    async fn delete(&self, id: JobId) -> Result<bool, StoreError>;
}
