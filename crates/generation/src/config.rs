use std::time::Duration;

use lipsync_core::config::{env_parse, env_required, env_string, ConfigError};

/// Default fal queue endpoint.
pub const DEFAULT_QUEUE_URL: &str = "https://queue.fal.run";

/// Default image + audio to talking-head model.
pub const DEFAULT_MODEL: &str = "fal-ai/bytedance/omnihuman";

const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// fal connection settings.
#[derive(Clone)]
pub struct FalConfig {
    pub api_key: String,
    pub queue_url: String,
    pub model: String,
    pub poll_interval: Duration,
}

impl std::fmt::Debug for FalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FalConfig")
            .field("api_key", &"<redacted>")
            .field("queue_url", &self.queue_url)
            .field("model", &self.model)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FalConfig {
    /// Load from environment variables.
    ///
    /// | Env Var                | Default                       |
    /// |------------------------|-------------------------------|
    /// | `FAL_KEY`              | required                      |
    /// | `FAL_QUEUE_URL`        | `https://queue.fal.run`       |
    /// | `FAL_MODEL`            | `fal-ai/bytedance/omnihuman`  |
    /// | `FAL_POLL_INTERVAL_MS` | `2000`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: env_required("FAL_KEY")?,
            queue_url: env_string("FAL_QUEUE_URL", DEFAULT_QUEUE_URL),
            model: env_string("FAL_MODEL", DEFAULT_MODEL),
            poll_interval: Duration::from_millis(
                env_parse("FAL_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?.max(1),
            ),
        })
    }
}
