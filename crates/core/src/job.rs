//! The job record and its lifecycle.
//!
//! A [`Job`] moves through the states of [`JobStatus`]. Every mutation is
//! described by a [`JobUpdate`], which carries the target status, the set
//! of statuses the record must currently hold for the update to apply,
//! and the fields it writes. Stores apply updates atomically per record;
//! [`Job::apply`] is the in-process reference of those semantics.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::payload::VideoPayload;
use crate::types::{JobId, OwnerId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in-progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, failed and cancelled jobs never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Cancelled -> Completed | Failed` is allowed: a cancel that lands
    /// after the worker claimed the job does not stop it, and the worker's
    /// own terminal update wins. `Pending -> Completed` covers a run that
    /// finishes after the recovery sweeper requeued it.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (InProgress, Pending)
                | (Cancelled, Completed)
                | (Cancelled, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown job status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The artifact produced by a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Location of the generated video.
    pub video_url: String,
    /// Measured duration of the video, when the generator reports one.
    pub duration_secs: Option<f64>,
}

/// One unit of asynchronous work and its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub payload: VideoPayload,
    pub status: JobStatus,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// Create a fresh pending job with a new random id.
    pub fn new(owner_id: OwnerId, payload: VideoPayload) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new_v4(),
            owner_id,
            payload,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Apply `update` if its guard admits the current status.
    ///
    /// Returns `false` (leaving the record untouched) when the guard
    /// rejects. `result` and `error` are write-once and `updated_at`
    /// never moves backwards.
    pub fn apply(&mut self, update: &JobUpdate) -> bool {
        if !update.permits(self.status) {
            return false;
        }
        self.status = update.status;
        if self.result.is_none() {
            self.result = update.result.clone();
        }
        if self.error.is_none() {
            self.error = update.error.clone();
        }
        if update.completed_at.is_some() {
            self.completed_at = update.completed_at;
        }
        self.updated_at = self.updated_at.max(update.updated_at);
        true
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// A guarded partial update describing one state transition.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    /// Status after the update.
    pub status: JobStatus,
    /// Statuses the record must hold for the update to apply.
    pub from: &'static [JobStatus],
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl JobUpdate {
    fn new(status: JobStatus, from: &'static [JobStatus], at: Timestamp) -> Self {
        Self {
            status,
            from,
            result: None,
            error: None,
            completed_at: None,
            updated_at: at,
        }
    }

    /// `pending -> in-progress`, issued by the worker when it dequeues.
    pub fn claim(at: Timestamp) -> Self {
        Self::new(JobStatus::InProgress, &[JobStatus::Pending], at)
    }

    /// `in-progress -> completed` with the produced artifact.
    ///
    /// Also admitted from `pending`, so a run that outlives the staleness
    /// threshold still lands after the sweeper requeued its job.
    pub fn complete(result: JobResult, at: Timestamp) -> Self {
        Self {
            result: Some(result),
            completed_at: Some(at),
            ..Self::new(
                JobStatus::Completed,
                &[
                    JobStatus::Pending,
                    JobStatus::InProgress,
                    JobStatus::Cancelled,
                ],
                at,
            )
        }
    }

    /// `{pending, in-progress} -> failed` with a human-readable reason.
    pub fn fail(error: impl Into<String>, at: Timestamp) -> Self {
        Self {
            error: Some(error.into()),
            completed_at: Some(at),
            ..Self::new(
                JobStatus::Failed,
                &[
                    JobStatus::Pending,
                    JobStatus::InProgress,
                    JobStatus::Cancelled,
                ],
                at,
            )
        }
    }

    /// `{pending, in-progress} -> cancelled`, issued by the control API.
    pub fn cancel(at: Timestamp) -> Self {
        Self {
            completed_at: Some(at),
            ..Self::new(
                JobStatus::Cancelled,
                &[JobStatus::Pending, JobStatus::InProgress],
                at,
            )
        }
    }

    /// `in-progress -> pending`, issued by the recovery sweeper.
    pub fn requeue(at: Timestamp) -> Self {
        Self::new(JobStatus::Pending, &[JobStatus::InProgress], at)
    }

    /// Whether a record currently in `current` may take this update.
    pub fn permits(&self, current: JobStatus) -> bool {
        self.from.contains(&current)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
