//! Key layout and expiry horizons for cached jobs.

use std::time::Duration;

use lipsync_core::job::JobStatus;
use lipsync_core::types::{JobId, OwnerId};

/// Default prefix for per-job entries: `video_job:{id}`.
pub const DEFAULT_JOB_PREFIX: &str = "video_job";

/// Default prefix for per-owner id sets: `user_jobs:{owner}`.
pub const DEFAULT_OWNER_PREFIX: &str = "user_jobs";

/// Default key of the pending list.
pub const DEFAULT_PENDING_QUEUE: &str = "video_queue:pending";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    pub job_prefix: String,
    pub owner_prefix: String,
    pub pending_queue: String,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self {
            job_prefix: DEFAULT_JOB_PREFIX.to_string(),
            owner_prefix: DEFAULT_OWNER_PREFIX.to_string(),
            pending_queue: DEFAULT_PENDING_QUEUE.to_string(),
        }
    }
}

impl CacheKeys {
    pub fn job(&self, id: JobId) -> String {
        format!("{}:{id}", self.job_prefix)
    }

    pub fn owner(&self, owner_id: OwnerId) -> String {
        format!("{}:{owner_id}", self.owner_prefix)
    }
}

/// How long cached job copies live.
///
/// Non-terminal jobs use the short horizon, terminal ones the long horizon
/// so clients can still read the outcome after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub pending: Duration,
    pub terminal: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            pending: Duration::from_secs(3600),
            terminal: Duration::from_secs(86_400),
        }
    }
}

impl CacheTtl {
    pub fn for_status(&self, status: JobStatus) -> Duration {
        if status.is_terminal() {
            self.terminal
        } else {
            self.pending
        }
    }
}
