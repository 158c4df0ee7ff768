//! REST client for the fal queue endpoints.
//!
//! Wraps request submission, status polling and result retrieval using
//! [`reqwest`].

use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::messages::{QueueStatus, SubmitResponse};

/// Header carrying the caller's deduplication token.
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// HTTP client for the fal queue.
pub struct FalQueueApi {
    client: reqwest::Client,
    queue_url: String,
    api_key: String,
}

/// Errors from the fal REST layer.
#[derive(Debug, thiserror::Error)]
pub enum FalApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// fal returned a non-2xx status code.
    #[error("fal API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl FalQueueApi {
    /// * `queue_url` - Base URL, e.g. `https://queue.fal.run`.
    pub fn new(queue_url: String, api_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), queue_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, queue_url: String, api_key: String) -> Self {
        Self {
            client,
            queue_url: queue_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Queue a run of `model` with `input`.
    ///
    /// Sends `POST {queue_url}/{model}`. Requests carrying the same
    /// `idempotency_key` are treated as one run upstream.
    pub async fn submit<I: Serialize + ?Sized>(
        &self,
        model: &str,
        input: &I,
        idempotency_key: &str,
    ) -> Result<SubmitResponse, FalApiError> {
        let response = self
            .client
            .post(format!("{}/{}", self.queue_url, model))
            .header(AUTHORIZATION, self.auth_header())
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(input)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Poll a run's status, including its logs.
    pub async fn status(&self, status_url: &str) -> Result<QueueStatus, FalApiError> {
        let response = self
            .client
            .get(status_url)
            .query(&[("logs", "1")])
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the output of a completed run.
    pub async fn result<T: DeserializeOwned>(&self, response_url: &str) -> Result<T, FalApiError> {
        let response = self
            .client
            .get(response_url)
            .header(AUTHORIZATION, self.auth_header())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    /// Return the response unchanged on a 2xx status, otherwise a
    /// [`FalApiError::ApiError`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, FalApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(FalApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FalApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
