//! Content API access.
//!
//! A thin wrapper around one shared `reqwest::Client` that knows how the
//! upstream content API forms its URLs. Every call carries its own timeout,
//! because the collection, artifact, and download stages each tolerate a
//! different amount of latency.
//!
//! Nothing here retries. A failed call is terminal for that call and the
//! caller records the absence.

use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::config::RunConfig;

/// Why one HTTP exchange failed.
#[derive(Debug)]
pub enum FetchFailure {
    Network(reqwest::Error),
    Status(reqwest::StatusCode),
    Json(serde_json::Error),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Network(e) => write!(f, "network error: {e}"),
            FetchFailure::Status(s) => write!(f, "HTTP status {s}"),
            FetchFailure::Json(e) => write!(f, "invalid JSON: {e}"),
        }
    }
}

impl std::error::Error for FetchFailure {}

/// Shared HTTP client plus the two upstream URL prefixes.
#[derive(Debug, Clone)]
pub struct ContentApi {
    client: Client,
    base_content_url: String,
    base_study_url: String,
}

impl ContentApi {
    /// Build the shared HTTP client and take the base URLs from `config`.
    pub fn new(config: &RunConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_content_url: config.base_content_url.clone(),
            base_study_url: config.base_study_url.clone(),
        })
    }

    /// JSON endpoint for a canonical URI. The URI is appended verbatim.
    pub fn content_url(&self, uri: &str) -> String {
        format!("{}{}", self.base_content_url, uri)
    }

    /// Public study page for a canonical URI.
    pub fn study_url(&self, uri: &str) -> String {
        format!("{}{}", self.base_study_url, uri)
    }

    /// GET `url` and parse the body as JSON. Non-2xx is an error.
    #[instrument(level = "debug", skip(self), fields(%url))]
    pub async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchFailure> {
        let body = self.get_bytes(url, timeout).await?;
        serde_json::from_slice(&body).map_err(FetchFailure::Json)
    }

    /// GET `url` and return the raw body.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL to fetch
    /// * `timeout` - Limit for the whole request, body included
    ///
    /// # Errors
    ///
    /// [`FetchFailure::Network`] for connection, timeout and body errors,
    /// [`FetchFailure::Status`] for any non-2xx response.
    #[instrument(level = "debug", skip(self), fields(%url))]
    pub async fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchFailure> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(FetchFailure::Network)?;

        let status = resp.status();
        if !status.is_success() {
            warn!(%status, elapsed_ms = t0.elapsed().as_millis() as u64, "Non-success response");
            return Err(FetchFailure::Status(status));
        }

        let body = resp.bytes().await.map_err(FetchFailure::Network)?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET complete"
        );
        Ok(body.to_vec())
    }
}
