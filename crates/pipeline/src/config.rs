use std::time::Duration;

use lipsync_cache::keys::{DEFAULT_JOB_PREFIX, DEFAULT_OWNER_PREFIX, DEFAULT_PENDING_QUEUE};
use lipsync_cache::{CacheKeys, CacheTtl};
use lipsync_core::config::{env_parse, env_string, ConfigError};

/// Tunables for the queue, worker and recovery sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub keys: CacheKeys,
    pub ttl: CacheTtl,
    /// How long one blocking pop waits before the worker re-checks shutdown.
    pub dequeue_timeout: Duration,
    /// Pause after a fast-store error in the worker loop.
    pub error_backoff: Duration,
    /// An in-progress job untouched for this long is considered abandoned.
    pub stale_after: Duration,
    pub sweep_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            keys: CacheKeys::default(),
            ttl: CacheTtl::default(),
            dequeue_timeout: Duration::from_secs(1),
            error_backoff: Duration::from_millis(1000),
            stale_after: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl QueueConfig {
    /// Load from environment variables with defaults.
    ///
    /// | Env Var                         | Default               |
    /// |---------------------------------|-----------------------|
    /// | `JOB_PENDING_TTL_SECS`          | `3600`                |
    /// | `JOB_TERMINAL_TTL_SECS`         | `86400`               |
    /// | `WORKER_DEQUEUE_TIMEOUT_SECS`   | `1`                   |
    /// | `WORKER_ERROR_BACKOFF_MS`       | `1000`                |
    /// | `RECOVERY_STALE_AFTER_SECS`     | `600`                 |
    /// | `RECOVERY_SWEEP_INTERVAL_SECS`  | `300`                 |
    /// | `JOB_KEY_PREFIX`                | `video_job`           |
    /// | `OWNER_KEY_PREFIX`              | `user_jobs`           |
    /// | `PENDING_QUEUE_KEY`             | `video_queue:pending` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            keys: CacheKeys {
                job_prefix: env_string("JOB_KEY_PREFIX", DEFAULT_JOB_PREFIX),
                owner_prefix: env_string("OWNER_KEY_PREFIX", DEFAULT_OWNER_PREFIX),
                pending_queue: env_string("PENDING_QUEUE_KEY", DEFAULT_PENDING_QUEUE),
            },
            ttl: CacheTtl {
                pending: Duration::from_secs(env_parse("JOB_PENDING_TTL_SECS", 3600)?),
                terminal: Duration::from_secs(env_parse("JOB_TERMINAL_TTL_SECS", 86_400)?),
            },
            dequeue_timeout: Duration::from_secs(env_parse("WORKER_DEQUEUE_TIMEOUT_SECS", 1)?),
            error_backoff: Duration::from_millis(env_parse("WORKER_ERROR_BACKOFF_MS", 1000)?),
            stale_after: Duration::from_secs(env_parse("RECOVERY_STALE_AFTER_SECS", 600)?),
            sweep_interval: Duration::from_secs(env_parse("RECOVERY_SWEEP_INTERVAL_SECS", 300)?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the worker and sweeper cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("JOB_PENDING_TTL_SECS", self.ttl.pending),
            ("JOB_TERMINAL_TTL_SECS", self.ttl.terminal),
            ("WORKER_DEQUEUE_TIMEOUT_SECS", self.dequeue_timeout),
            ("RECOVERY_STALE_AFTER_SECS", self.stale_after),
            ("RECOVERY_SWEEP_INTERVAL_SECS", self.sweep_interval),
        ];
        for (var, value) in positive {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    var,
                    value: "0".to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}
