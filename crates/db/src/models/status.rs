//! Mapping between [`JobStatus`] and the `job_statuses` lookup table.
//!
//! Ids match the seed rows inserted by the initial migration (1-based, in
//! lifecycle order).

use lipsync_core::job::JobStatus;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Return the database status ID for `status`.
pub fn status_id(status: JobStatus) -> StatusId {
    match status {
        JobStatus::Pending => 1,
        JobStatus::InProgress => 2,
        JobStatus::Completed => 3,
        JobStatus::Failed => 4,
        JobStatus::Cancelled => 5,
    }
}

/// Resolve a database status ID, `None` for ids outside the seed data.
pub fn status_from_id(id: StatusId) -> Option<JobStatus> {
    JobStatus::ALL
        .into_iter()
        .find(|status| status_id(*status) == id)
}
