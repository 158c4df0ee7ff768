//! fal queue API message types.
//!
//! A submission returns the URLs to poll; the status endpoint reports
//! `IN_QUEUE`, `IN_PROGRESS` or `COMPLETED` in its `status` field; the
//! response endpoint returns the model output.

use serde::{Deserialize, Serialize};

/// Response to `POST {queue_url}/{model}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub request_id: String,
    pub status_url: String,
    pub response_url: String,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// One log line from the running model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogEntry {
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Body of `GET {status_url}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    InQueue {
        #[serde(default)]
        queue_position: Option<u32>,
    },
    InProgress {
        #[serde(default)]
        logs: Option<Vec<LogEntry>>,
    },
    Completed {
        #[serde(default)]
        logs: Option<Vec<LogEntry>>,
        /// Set when the run finished unsuccessfully.
        #[serde(default)]
        error: Option<String>,
    },
}

impl QueueStatus {
    /// Log lines reported so far, oldest first.
    pub fn logs(&self) -> &[LogEntry] {
        match self {
            QueueStatus::InQueue { .. } => &[],
            QueueStatus::InProgress { logs } | QueueStatus::Completed { logs, .. } => {
                logs.as_deref().unwrap_or_default()
            }
        }
    }
}

/// Model input for the image + audio to talking-head endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LipsyncInput<'a> {
    pub image_url: &'a str,
    pub audio_url: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoFile {
    pub url: String,
}

/// Model output fetched from the response URL.
#[derive(Debug, Clone, Deserialize)]
pub struct LipsyncOutput {
    pub video: VideoFile,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Parse a status body.
pub fn parse_status(text: &str) -> Result<QueueStatus, serde_json::Error> {
    serde_json::from_str(text)
}
