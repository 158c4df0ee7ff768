use chrono::{DateTime, Utc};
use lipsync_core::job::{Job, JobResult, JobStatus};
use lipsync_core::job_events::{
    MESSAGE_CANCELLED, MESSAGE_COMPLETED, MESSAGE_FAILED, MESSAGE_STARTED,
    MSG_TYPE_JOB_CANCELLED, MSG_TYPE_JOB_COMPLETED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_PROGRESS,
    MSG_TYPE_JOB_REQUEUED, MSG_TYPE_JOB_STARTED,
};
use lipsync_core::types::{JobId, OwnerId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A lifecycle notification for one job.
///
/// Built with one of the named constructors and optionally enriched with
/// [`with_progress`](JobEvent::with_progress),
/// [`with_result`](JobEvent::with_result) or
/// [`with_error`](JobEvent::with_error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Message type, e.g. `"job_started"`.
    #[serde(rename = "type")]
    pub event_type: String,

    pub job_id: JobId,

    pub status: JobStatus,

    /// Human-readable message for display.
    pub message: String,

    /// Completion percentage reported by the generator, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(
        event_type: impl Into<String>,
        job_id: JobId,
        status: JobStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            job_id,
            status,
            message: message.into(),
            progress: None,
            video_url: None,
            duration_secs: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// The worker claimed the job.
    pub fn started(job_id: JobId) -> Self {
        Self::new(MSG_TYPE_JOB_STARTED, job_id, JobStatus::InProgress, MESSAGE_STARTED)
    }

    /// Intermediate progress. The status stays `in-progress`.
    pub fn progress(job_id: JobId, message: impl Into<String>) -> Self {
        Self::new(MSG_TYPE_JOB_PROGRESS, job_id, JobStatus::InProgress, message)
    }

    pub fn completed(job: &Job) -> Self {
        let event = Self::new(MSG_TYPE_JOB_COMPLETED, job.id, job.status, MESSAGE_COMPLETED);
        match &job.result {
            Some(result) => event.with_result(result),
            None => event,
        }
    }

    pub fn failed(job: &Job) -> Self {
        let event = Self::new(MSG_TYPE_JOB_FAILED, job.id, job.status, MESSAGE_FAILED);
        match &job.error {
            Some(error) => event.with_error(error.clone()),
            None => event,
        }
    }

    pub fn cancelled(job: &Job) -> Self {
        Self::new(MSG_TYPE_JOB_CANCELLED, job.id, job.status, MESSAGE_CANCELLED)
    }

    /// The recovery sweeper put a stalled job back on the queue.
    pub fn requeued(job: &Job) -> Self {
        Self::new(
            MSG_TYPE_JOB_REQUEUED,
            job.id,
            job.status,
            "Video generation restarted after interruption",
        )
    }

    pub fn with_progress(mut self, percent: u8) -> Self {
        self.progress = Some(percent.min(100));
        self
    }

    pub fn with_result(mut self, result: &JobResult) -> Self {
        self.video_url = Some(result.video_url.clone());
        self.duration_secs = result.duration_secs;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// An event together with the owner it was published for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub owner_id: OwnerId,
    pub event: JobEvent,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
