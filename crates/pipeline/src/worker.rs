//! The worker loop: drain the pending list one job at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lipsync_core::job::{Job, JobStatus, JobUpdate};
use lipsync_core::types::JobId;
use lipsync_events::{JobEvent, Notifier};
use lipsync_generation::{GenerationOutput, GenerationProgress, GenerationRequest, GenerationTask};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::stores::{JobStores, Loaded};
use crate::supervisor::SingleInstance;

/// Processes queued jobs sequentially through the generation task.
pub struct JobWorker {
    stores: JobStores,
    notifier: Arc<dyn Notifier>,
    task: Arc<dyn GenerationTask>,
    dequeue_timeout: Duration,
    error_backoff: Duration,
}

impl JobWorker {
    pub(crate) fn new(
        stores: JobStores,
        notifier: Arc<dyn Notifier>,
        task: Arc<dyn GenerationTask>,
        dequeue_timeout: Duration,
        error_backoff: Duration,
    ) -> Self {
        Self {
            stores,
            notifier,
            task,
            dequeue_timeout,
            error_backoff,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Shutdown is checked between jobs and between pops, never while a
    /// job is being processed, so a popped id is always handled.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            dequeue_timeout = ?self.dequeue_timeout,
            "Job worker started",
        );

        while !cancel.is_cancelled() {
            match self.stores.cache.dequeue(self.dequeue_timeout).await {
                Ok(Some(id)) => {
                    self.process(id).await;
                }
                Ok(None) => tracing::trace!("Queue empty"),
                Err(e) => {
                    tracing::error!(error = %e, "Dequeue failed, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        tracing::info!("Job worker shutting down");
    }

    /// Handle one dequeued id. Returns the record's final state, or `None`
    /// if the job was skipped.
    pub async fn process(&self, id: JobId) -> Option<Job> {
        let job = match self.stores.load(id).await {
            Loaded::Durable(job) => job,
            Loaded::CacheOnly { job, durable_error } => {
                if job.status != JobStatus::Pending {
                    tracing::info!(job_id = %id, status = %job.status, "Skipping non-pending job");
                    return None;
                }
                return self
                    .finish_failed(&job, format!("Failed to load job record: {durable_error}"))
                    .await;
            }
            Loaded::Missing => {
                tracing::warn!(job_id = %id, "Dequeued job not found, skipping");
                return None;
            }
        };

        if job.status != JobStatus::Pending {
            tracing::info!(job_id = %id, status = %job.status, "Skipping non-pending job");
            return None;
        }

        let Some(job) = self.stores.apply(&job, &JobUpdate::claim(Utc::now())).await else {
            tracing::info!(job_id = %id, "Job changed before it could be claimed, skipping");
            return None;
        };
        self.notifier.publish(job.owner_id, JobEvent::started(job.id));
        tracing::info!(job_id = %id, owner_id = %job.owner_id, "Processing job");

        match self.run_task(&job).await {
            Ok(output) => {
                let update = JobUpdate::complete(output.into(), Utc::now());
                let Some(done) = self.stores.apply(&job, &update).await else {
                    tracing::warn!(job_id = %id, "Job removed before completion was recorded, dropping result");
                    return None;
                };
                self.notifier.publish(done.owner_id, JobEvent::completed(&done));
                tracing::info!(job_id = %id, "Job completed");
                Some(done)
            }
            Err(message) => self.finish_failed(&job, message).await,
        }
    }

    /// Run the generation task, forwarding progress as it arrives.
    async fn run_task(&self, job: &Job) -> Result<GenerationOutput, String> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = self.task.run(GenerationRequest::for_job(job), tx);
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                Some(progress) = rx.recv() => self.publish_progress(job, progress),
            }
        };
        while let Ok(progress) = rx.try_recv() {
            self.publish_progress(job, progress);
        }

        result.map_err(|e| {
            tracing::error!(job_id = %job.id, error = %e, "Generation failed");
            e.to_string()
        })
    }

    fn publish_progress(&self, job: &Job, progress: GenerationProgress) {
        tracing::debug!(job_id = %job.id, message = %progress.message, "Generation progress");
        let mut event = JobEvent::progress(job.id, progress.message);
        if let Some(percent) = progress.percent {
            event = event.with_progress(percent);
        }
        self.notifier.publish(job.owner_id, event);
    }

    async fn finish_failed(&self, job: &Job, message: String) -> Option<Job> {
        let update = JobUpdate::fail(message, Utc::now());
        let Some(failed) = self.stores.apply(job, &update).await else {
            tracing::warn!(job_id = %job.id, "Job changed before failure was recorded");
            return None;
        };
        self.notifier.publish(failed.owner_id, JobEvent::failed(&failed));
        tracing::warn!(
            job_id = %job.id,
            error = failed.error.as_deref().unwrap_or_default(),
            "Job failed"
        );
        Some(failed)
    }
}

/// Starts the worker loop, at most once at a time.
#[derive(Clone)]
pub struct WorkerSupervisor {
    worker: Arc<JobWorker>,
    instance: SingleInstance,
}

impl WorkerSupervisor {
    pub(crate) fn new(worker: Arc<JobWorker>) -> Self {
        Self {
            worker,
            instance: SingleInstance::new("job_worker"),
        }
    }

    /// Spawn the loop. Returns `None` if it is already running.
    pub fn start(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let worker = Arc::clone(&self.worker);
        self.instance.spawn(async move { worker.run(cancel).await })
    }

    pub fn is_running(&self) -> bool {
        self.instance.is_running()
    }

    pub fn worker(&self) -> &JobWorker {
        &self.worker
    }
}
