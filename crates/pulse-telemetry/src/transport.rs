//! HTTP delivery seam for telemetry batches
//!
//! The batcher talks to its collector through the [`Transport`] trait so
//! tests can substitute recording or failing implementations. The production
//! implementation is a thin reqwest wrapper with a bounded request timeout.

use async_trait::async_trait;
use pulse_core::{PulseError, Result};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Delivery seam between the batcher and the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body and return the response status code.
    ///
    /// Returns `Err` only for transport-level failures (connect, timeout);
    /// non-2xx statuses are returned as the status code for the caller to
    /// interpret.
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16>;
}

/// reqwest-backed transport used in production
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PulseError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| PulseError::Transport(format!("Failed to send request: {}", e)))?;

        Ok(response.status().as_u16())
    }
}
