//! Recovery of jobs abandoned mid-flight.
//!
//! A job left `in-progress` by a crashed or restarted worker is never
//! popped again. The sweeper finds such jobs by the age of their last
//! update, resets them to `pending` and puts them back on the queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lipsync_core::error::CoreError;
use lipsync_core::job::{JobStatus, JobUpdate};
use lipsync_core::types::Timestamp;
use lipsync_events::{JobEvent, Notifier};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::stores::JobStores;
use crate::supervisor::SingleInstance;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Stale in-progress jobs found.
    pub scanned: usize,
    /// Jobs reset to pending and queued again.
    pub recovered: usize,
    /// Jobs that moved on between the scan and the reset.
    pub skipped: usize,
    pub errors: usize,
}

pub struct RecoverySweeper {
    stores: JobStores,
    notifier: Arc<dyn Notifier>,
    stale_after: Duration,
    interval: Duration,
}

impl RecoverySweeper {
    pub(crate) fn new(
        stores: JobStores,
        notifier: Arc<dyn Notifier>,
        stale_after: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            stores,
            notifier,
            stale_after,
            interval,
        }
    }

    /// Sweep once immediately, then every interval, until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            stale_after_secs = self.stale_after.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Recovery sweeper started",
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Recovery sweeper stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Recovery sweep failed");
                    }
                }
            }
        }
    }

    /// Requeue every in-progress job not updated within the staleness
    /// threshold.
    pub async fn sweep_once(&self) -> Result<SweepReport, CoreError> {
        let now = Utc::now();
        let stale = self
            .stores
            .durable
            .query_stale(JobStatus::InProgress, cutoff(now, self.stale_after))
            .await?;

        let mut report = SweepReport {
            scanned: stale.len(),
            ..SweepReport::default()
        };

        for job in stale {
            let requeued = match self.stores.durable.update(job.id, &JobUpdate::requeue(now)).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to reset stale job");
                    report.errors += 1;
                    continue;
                }
            };

            self.stores.cache_best_effort(&requeued).await;
            if let Err(e) = self.stores.cache.enqueue(requeued.id).await {
                // Back to in-progress so a later sweep picks it up again.
                tracing::error!(job_id = %job.id, error = %e, "Failed to requeue stale job");
                if let Ok(Some(job)) = self
                    .stores
                    .durable
                    .update(requeued.id, &JobUpdate::claim(requeued.updated_at))
                    .await
                {
                    self.stores.cache_best_effort(&job).await;
                }
                report.errors += 1;
                continue;
            }

            self.notifier
                .publish(requeued.owner_id, JobEvent::requeued(&requeued));
            tracing::warn!(
                job_id = %requeued.id,
                last_update = %job.updated_at,
                "Recovered stale in-progress job"
            );
            report.recovered += 1;
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                recovered = report.recovered,
                skipped = report.skipped,
                errors = report.errors,
                "Recovery sweep finished"
            );
        } else {
            tracing::debug!("Recovery sweep found no stale jobs");
        }
        Ok(report)
    }
}

/// `now - age`, clamped to the earliest representable time.
fn cutoff(now: Timestamp, age: Duration) -> Timestamp {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Starts the sweeper loop, at most once at a time.
#[derive(Clone)]
pub struct SweeperSupervisor {
    sweeper: Arc<RecoverySweeper>,
    instance: SingleInstance,
}

impl SweeperSupervisor {
    pub(crate) fn new(sweeper: Arc<RecoverySweeper>) -> Self {
        Self {
            sweeper,
            instance: SingleInstance::new("recovery_sweeper"),
        }
    }

    /// Spawn the loop. Returns `None` if it is already running.
    pub fn start(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let sweeper = Arc::clone(&self.sweeper);
        self.instance.spawn(async move { sweeper.run(cancel).await })
    }

    pub fn is_running(&self) -> bool {
        self.instance.is_running()
    }

    pub fn sweeper(&self) -> &RecoverySweeper {
        &self.sweeper
    }
}
