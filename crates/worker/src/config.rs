use std::str::FromStr;
use std::time::Duration;

use lipsync_core::config::{env_parse, env_required, env_string, parse_value, ConfigError};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected `text` or `json`, got `{other}`")),
        }
    }
}

/// Process-level settings for the worker binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub redis_url: String,
    pub log_format: LogFormat,
    /// How long shutdown waits for the job in hand before giving up.
    pub shutdown_timeout: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `DATABASE_URL`          | required                 |
    /// | `REDIS_URL`             | `redis://localhost:6379` |
    /// | `LOG_FORMAT`            | `text`                   |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(value) => parse_value("LOG_FORMAT", &value)?,
            Err(_) => LogFormat::default(),
        };

        Ok(Self {
            database_url: env_required("DATABASE_URL")?,
            redis_url: env_string("REDIS_URL", "redis://localhost:6379"),
            log_format,
            shutdown_timeout: Duration::from_secs(env_parse("SHUTDOWN_TIMEOUT_SECS", 30)?),
        })
    }
}
