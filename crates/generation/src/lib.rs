//! The external video generation task.
//!
//! [`GenerationTask`] is the opaque long-running operation the worker
//! drives: submit, stream progress, then succeed with a video or fail
//! with a message. [`FalGenerationTask`] implements it over the fal
//! queue REST API.

pub mod api;
pub mod config;
pub mod fal;
pub mod messages;

pub use api::{FalApiError, FalQueueApi};
pub use config::FalConfig;
pub use fal::FalGenerationTask;

use async_trait::async_trait;
use lipsync_core::error::CoreError;
use lipsync_core::job::{Job, JobResult};
use lipsync_core::types::JobId;
use tokio::sync::mpsc;

/// Inputs for one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub job_id: JobId,
    pub image_url: String,
    pub audio_url: String,
    /// Stable per job, so a retried run can be deduplicated upstream.
    pub idempotency_key: String,
}

impl GenerationRequest {
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            image_url: job.payload.scene.image_url.clone(),
            audio_url: job.payload.audio_url.clone(),
            idempotency_key: job.id.to_string(),
        }
    }
}

/// An intermediate progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProgress {
    pub message: String,
    pub percent: Option<u8>,
}

impl GenerationProgress {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            percent: None,
        }
    }
}

/// The produced video.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub video_url: String,
    pub duration_secs: Option<f64>,
}

impl From<GenerationOutput> for JobResult {
    fn from(output: GenerationOutput) -> Self {
        JobResult {
            video_url: output.video_url,
            duration_secs: output.duration_secs,
        }
    }
}

/// Errors from a generation run.
///
/// The display text is what gets recorded on the failed job, so
/// [`GenerationError::Failed`] renders its message unchanged.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator reported a failure.
    #[error("{0}")]
    Failed(String),

    /// Talking to the generator failed.
    #[error(transparent)]
    Api(#[from] FalApiError),

    /// The generator's answer could not be understood.
    #[error("Unexpected generator response: {0}")]
    InvalidResponse(String),
}

impl From<GenerationError> for CoreError {
    fn from(err: GenerationError) -> Self {
        CoreError::ExternalTask(err.to_string())
    }
}

/// A long-running external operation that turns a request into a video.
///
/// Implementations may send any number of progress reports on `progress`
/// before returning. A closed progress channel is not an error.
#[async_trait]
pub trait GenerationTask: Send + Sync {
    async fn run(
        &self,
        request: GenerationRequest,
        progress: mpsc::UnboundedSender<GenerationProgress>,
    ) -> Result<GenerationOutput, GenerationError>;
}
