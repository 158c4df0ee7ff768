//! [`GenerationTask`] backed by a fal queue model.

use std::time::Duration;

use async_trait::async_trait;
use lipsync_core::job_events::MESSAGE_PROCESSING;
use tokio::sync::mpsc;

use crate::api::FalQueueApi;
use crate::config::FalConfig;
use crate::messages::{LipsyncInput, LipsyncOutput, LogEntry, QueueStatus};
use crate::{GenerationError, GenerationOutput, GenerationProgress, GenerationRequest, GenerationTask};

/// Runs lipsync generations on fal: submit, poll status, fetch the output.
pub struct FalGenerationTask {
    api: FalQueueApi,
    model: String,
    poll_interval: Duration,
}

impl FalGenerationTask {
    pub fn new(api: FalQueueApi, model: String, poll_interval: Duration) -> Self {
        Self {
            api,
            model,
            poll_interval,
        }
    }

    pub fn from_config(config: &FalConfig) -> Self {
        Self::new(
            FalQueueApi::new(config.queue_url.clone(), config.api_key.clone()),
            config.model.clone(),
            config.poll_interval,
        )
    }
}

#[async_trait]
impl GenerationTask for FalGenerationTask {
    async fn run(
        &self,
        request: GenerationRequest,
        progress: mpsc::UnboundedSender<GenerationProgress>,
    ) -> Result<GenerationOutput, GenerationError> {
        let input = LipsyncInput {
            image_url: &request.image_url,
            audio_url: &request.audio_url,
        };
        let submitted = self
            .api
            .submit(&self.model, &input, &request.idempotency_key)
            .await?;
        tracing::info!(
            job_id = %request.job_id,
            request_id = %submitted.request_id,
            model = %self.model,
            "Submitted generation request"
        );

        let mut forwarder = LogForwarder::new(progress);
        loop {
            let status = self.api.status(&submitted.status_url).await?;
            match &status {
                QueueStatus::InQueue { queue_position } => {
                    tracing::debug!(
                        job_id = %request.job_id,
                        queue_position = ?queue_position,
                        "Generation queued upstream"
                    );
                }
                QueueStatus::InProgress { .. } => forwarder.forward(status.logs()),
                QueueStatus::Completed { error, .. } => {
                    forwarder.forward(status.logs());
                    if let Some(error) = error {
                        return Err(GenerationError::Failed(error.clone()));
                    }
                    break;
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let output: LipsyncOutput = self.api.result(&submitted.response_url).await?;
        if output.video.url.is_empty() {
            return Err(GenerationError::InvalidResponse(
                "output has no video url".to_string(),
            ));
        }
        Ok(GenerationOutput {
            video_url: output.video.url,
            duration_secs: output.duration,
        })
    }
}

/// Turns the cumulative upstream log into progress reports, sending each
/// line once.
struct LogForwarder {
    sender: mpsc::UnboundedSender<GenerationProgress>,
    seen: usize,
    announced: bool,
}

impl LogForwarder {
    fn new(sender: mpsc::UnboundedSender<GenerationProgress>) -> Self {
        Self {
            sender,
            seen: 0,
            announced: false,
        }
    }

    fn forward(&mut self, logs: &[LogEntry]) {
        let fresh = logs.get(self.seen..).unwrap_or_default();
        if fresh.is_empty() {
            if !self.announced {
                self.announced = true;
                let _ = self.sender.send(GenerationProgress::message(MESSAGE_PROCESSING));
            }
            return;
        }
        for entry in fresh {
            let _ = self.sender.send(GenerationProgress::message(entry.message.clone()));
        }
        self.seen = logs.len();
        self.announced = true;
    }
}
