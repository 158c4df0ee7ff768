use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

/// Ensures at most one instance of a background loop runs at a time.
#[derive(Debug, Clone)]
pub(crate) struct SingleInstance {
    name: &'static str,
    running: Arc<AtomicBool>,
}

/// Clears the running flag when the loop ends, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SingleInstance {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Spawn `task` unless an instance is already running.
    pub(crate) fn spawn<F>(&self, task: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(task = self.name, "Already running, ignoring start");
            return None;
        }

        let guard = RunningGuard(Arc::clone(&self.running));
        Some(tokio::spawn(async move {
            let _guard = guard;
            task.await;
        }))
    }
}
