//! Message constants for job lifecycle notifications.
//!
//! Used by the pipeline when publishing to the notification channel.

/// Worker claimed the job and started the external task.
pub const MSG_TYPE_JOB_STARTED: &str = "job_started";

/// Intermediate progress reported by the external task.
pub const MSG_TYPE_JOB_PROGRESS: &str = "job_progress";

/// Job completed successfully.
pub const MSG_TYPE_JOB_COMPLETED: &str = "job_completed";

/// Job failed with an error.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// Job was cancelled through the control API.
pub const MSG_TYPE_JOB_CANCELLED: &str = "job_cancelled";

/// Job was reset to pending by the recovery sweeper.
pub const MSG_TYPE_JOB_REQUEUED: &str = "job_requeued";

pub const MESSAGE_STARTED: &str = "Starting video generation...";
pub const MESSAGE_PROCESSING: &str = "Processing...";
pub const MESSAGE_COMPLETED: &str = "Video generation completed!";
pub const MESSAGE_FAILED: &str = "Video generation failed";
pub const MESSAGE_CANCELLED: &str = "Video generation cancelled";
