//! The asynchronous video generation job queue.
//!
//! [`JobQueue`] wires the durable store, the fast store, the notification
//! channel and the generation task together and exposes:
//!
//! - [`JobService`]: submission, status queries, cancel and delete.
//! - [`WorkerSupervisor`]: the single worker draining the pending list.
//! - [`SweeperSupervisor`]: periodic recovery of abandoned jobs.

pub mod config;
pub mod service;
mod stores;
mod supervisor;
pub mod sweeper;
pub mod worker;

pub use config::QueueConfig;
pub use service::{JobService, StatusSummary};
pub use sweeper::{RecoverySweeper, SweepReport, SweeperSupervisor};
pub use worker::{JobWorker, WorkerSupervisor};

use std::sync::Arc;

use lipsync_cache::{FastStore, JobCache};
use lipsync_core::error::CoreError;
use lipsync_db::JobStore;
use lipsync_events::Notifier;
use lipsync_generation::GenerationTask;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::stores::JobStores;

/// The assembled queue.
pub struct JobQueue {
    service: JobService,
    worker: WorkerSupervisor,
    sweeper: SweeperSupervisor,
}

impl JobQueue {
    pub fn new(
        durable: Arc<dyn JobStore>,
        fast: Arc<dyn FastStore>,
        notifier: Arc<dyn Notifier>,
        task: Arc<dyn GenerationTask>,
        config: QueueConfig,
    ) -> Self {
        let cache = JobCache::new(fast, config.keys.clone(), config.ttl);
        let stores = JobStores::new(durable, cache);

        let worker = JobWorker::new(
            stores.clone(),
            Arc::clone(&notifier),
            task,
            config.dequeue_timeout,
            config.error_backoff,
        );
        let sweeper = RecoverySweeper::new(
            stores.clone(),
            Arc::clone(&notifier),
            config.stale_after,
            config.sweep_interval,
        );

        Self {
            service: JobService::new(stores, notifier),
            worker: WorkerSupervisor::new(Arc::new(worker)),
            sweeper: SweeperSupervisor::new(Arc::new(sweeper)),
        }
    }

    pub fn service(&self) -> &JobService {
        &self.service
    }

    /// Start the worker loop. Returns `None` if it is already running.
    pub fn start_worker(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        self.worker.start(cancel)
    }

    /// Start the recovery loop, which sweeps immediately and then
    /// periodically. Returns `None` if it is already running.
    pub fn start_sweeper(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        self.sweeper.start(cancel)
    }

    /// Run one recovery sweep on the caller's task.
    pub async fn sweep_now(&self) -> Result<SweepReport, CoreError> {
        self.sweeper.sweeper().sweep_once().await
    }

    pub fn worker(&self) -> &WorkerSupervisor {
        &self.worker
    }

    pub fn sweeper(&self) -> &SweeperSupervisor {
        &self.sweeper
    }
}
