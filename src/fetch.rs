//! Fetching with bounded retry.
//!
//! Client errors fail at once. Server and transport errors are retried with a
//! linearly growing pause, up to the policy's attempt limit.

mod http;
mod local;
#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpTransport;
pub use local::LocalTransport;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::error::LoadError;

/// Raw response of a transport call.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Parse the body as JSON, classifying failures as parse errors.
    pub fn json<T: DeserializeOwned>(&self, context: &str) -> Result<T, LoadError> {
        serde_json::from_str(&self.body).map_err(|e| LoadError::json(context, &e))
    }
}

/// Failure below the HTTP layer (DNS, connection reset, unreadable file).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("failed to read body: {0}")]
    Body(String),
}

/// Something that can answer GET and JSON POST requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Response, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<Response, TransportError>;
}

/// Retry settings for [`fetch_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// GET `url`, retrying server and transport failures.
///
/// A 4xx response is returned as an error immediately. A 5xx response or a
/// transport failure is retried up to `max_attempts - 1` more times, sleeping
/// `attempt * base_delay` before each new attempt.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    url: &str,
    policy: RetryPolicy,
) -> Result<Response, LoadError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let last_error = match transport.get(url).await {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) if response.is_client_error() => {
                return Err(LoadError::Status {
                    url: url.to_string(),
                    status: response.status,
                });
            }
            Ok(response) => LoadError::Status {
                url: url.to_string(),
                status: response.status,
            },
            Err(source) => LoadError::Transport {
                url: url.to_string(),
                source,
            },
        };

        if attempt >= attempts {
            return Err(last_error);
        }

        tracing::debug!(url, attempt, error = %last_error, "retrying fetch");
        tokio::time::sleep(policy.delay_for(attempt)).await;
        attempt += 1;
    }
}
