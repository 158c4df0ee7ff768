//! Submission payload for a video generation job.
//!
//! The queue treats the payload as opaque once accepted; the rules below
//! only gate what may be submitted.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;

/// The scene whose source image is animated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SceneData {
    #[validate(custom(function = "validate_http_url"))]
    pub image_url: String,

    #[validate(length(min = 1, message = "Scene must have a name"))]
    pub name: String,

    #[validate(length(min = 1, message = "Scene must have a description"))]
    pub description: String,

    /// Any other scene attributes the client sent along.
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Source image plus driving audio for one talking-head video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VideoPayload {
    #[validate(nested)]
    pub scene: SceneData,

    #[validate(custom(function = "validate_http_url"))]
    pub audio_url: String,
}

impl VideoPayload {
    /// Check the payload, mapping rule violations to [`CoreError::Validation`].
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()
            .map_err(|errors| CoreError::Validation(errors.to_string()))
    }
}

/// Accept only absolute `http://` or `https://` URLs with a host part.
fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
        _ => {
            let mut error = ValidationError::new("http_url");
            error.message = Some("must be a valid HTTP URL".into());
            Err(error)
        }
    }
}
