//! Telemetry API client.
//!
//! The [`TelemetryClient`] trait is the seam between the pollers and the
//! network. [`HttpTelemetryClient`] implements it over HTTP with `reqwest`.
//!
//! ## Endpoints
//!
//! - `GET {endpoint}/v1/machines/{id}/status` returns a [`MachineStatus`]
//! - `GET {endpoint}/v1/machines/{id}/events?limit=N` returns up to `N`
//!   [`MachineEvent`]s, newest first
//!
//! ## Example
//!
//! ```rust,no_run
//! use cnc_monitor::{HttpTelemetryClient, MachineId, TelemetryClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpTelemetryClient::builder()
//!         .endpoint("http://localhost:8000")
//!         .build()?;
//!
//!     let machine = MachineId::new("CNC-SIM-001")?;
//!     let status = client.fetch_status(&machine).await?;
//!     println!("{} rpm", status.rpm);
//!     Ok(())
//! }
//! ```

mod error;

pub use error::PollError;

use std::fmt::Debug;
use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::data::{MachineEvent, MachineId, MachineStatus};

/// Maximum length of a server error body carried into a [`PollError`].
const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Typed access to the remote telemetry API.
///
/// Implementations perform exactly one request per call and never retry;
/// retry cadence belongs to the pollers.
#[async_trait]
pub trait TelemetryClient: Send + Sync + Debug {
    /// Fetch the current status of a machine.
    async fn fetch_status(&self, machine_id: &MachineId) -> Result<MachineStatus, PollError>;

    /// Fetch up to `limit` recent events, newest first.
    async fn fetch_events(
        &self,
        machine_id: &MachineId,
        limit: NonZeroUsize,
    ) -> Result<Vec<MachineEvent>, PollError>;

    /// Returns a human-readable description of the remote endpoint.
    ///
    /// Used for display in the TUI footer.
    fn description(&self) -> &str;
}

/// HTTP implementation of [`TelemetryClient`].
#[derive(Debug, Clone)]
pub struct HttpTelemetryClient {
    client: Client,
    endpoint: String,
}

impl HttpTelemetryClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> HttpTelemetryClientBuilder {
        HttpTelemetryClientBuilder::default()
    }

    /// Returns the API base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn machine_url(&self, machine_id: &MachineId, resource: &str) -> String {
        format!("{}/v1/machines/{}/{}", self.endpoint, machine_id, resource)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PollError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                PollError::transport("Request timed out")
            } else {
                PollError::transport(format!("Failed to read response body: {}", e))
            }
        })?;

        if !status.is_success() {
            return Err(PollError::protocol(status.as_u16(), error_message(status, &body)));
        }

        serde_json::from_slice(&body).map_err(|e| {
            PollError::protocol(status.as_u16(), format!("Invalid response body: {}", e))
        })
    }
}

#[async_trait]
impl TelemetryClient for HttpTelemetryClient {
    async fn fetch_status(&self, machine_id: &MachineId) -> Result<MachineStatus, PollError> {
        let url = self.machine_url(machine_id, "status");
        self.get_json(self.client.get(&url)).await
    }

    async fn fetch_events(
        &self,
        machine_id: &MachineId,
        limit: NonZeroUsize,
    ) -> Result<Vec<MachineEvent>, PollError> {
        let url = self.machine_url(machine_id, "events");
        self.get_json(self.client.get(&url).query(&[("limit", limit.get())])).await
    }

    fn description(&self) -> &str {
        &self.endpoint
    }
}

/// Builder for [`HttpTelemetryClient`].
#[derive(Debug, Default)]
pub struct HttpTelemetryClientBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl HttpTelemetryClientBuilder {
    /// Set the API base URL (e.g., "http://localhost:8000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the per-request timeout (default: 5 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpTelemetryClient, reqwest::Error> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let client = Client::builder().timeout(timeout).build()?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(HttpTelemetryClient { client, endpoint })
    }
}

/// Extract a human-readable message from an error response body.
///
/// Prefers a JSON `detail`, `message` or `error` field, then the raw text,
/// then the status line's reason phrase.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["detail", "message", "error"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(v) if !v.is_null() => return v.to_string(),
                _ => {}
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    }

    status.canonical_reason().unwrap_or("Unknown error").to_string()
}
