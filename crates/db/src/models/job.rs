//! Row model and listing DTO for the `generation_jobs` table.

use lipsync_core::job::{Job, JobResult, JobStatus};
use lipsync_core::types::{JobId, OwnerId, Timestamp};
use serde::Deserialize;
use sqlx::FromRow;

use super::status::{status_from_id, StatusId};
use crate::store::StoreError;

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 20;

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    pub video_url: Option<String>,
    pub duration_secs: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status =
            status_from_id(row.status_id).ok_or(StoreError::UnknownStatus(row.status_id))?;
        let payload = serde_json::from_value(row.payload)?;
        let result = row.video_url.map(|video_url| JobResult {
            video_url,
            duration_secs: row.duration_secs,
        });
        Ok(Job {
            id: row.id,
            owner_id: row.owner_id,
            payload,
            status,
            result,
            error: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// Filters and pagination for listing an owner's jobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    /// Only return jobs in this status.
    pub status: Option<JobStatus>,
    /// Maximum number of results. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

impl JobListQuery {
    /// Effective page size after applying the default and the cap.
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(0, MAX_LIMIT)
    }

    /// Effective offset, never negative.
    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
