//! Error types for telemetry fetches.

use serde::Serialize;
use thiserror::Error;

/// A failed fetch, scoped to the poll loop that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind")]
pub enum PollError {
    /// The request never completed (connection refused, reset, timeout).
    #[error("Connection failed: {message}")]
    #[serde(rename = "transport-failure")]
    Transport { message: String },

    /// The request completed but the server rejected it.
    #[error("HTTP {status_code}: {message}")]
    #[serde(rename = "protocol-failure")]
    Protocol { status_code: u16, message: String },
}

impl PollError {
    pub fn transport(message: impl Into<String>) -> Self {
        PollError::Transport {
            message: message.into(),
        }
    }

    pub fn protocol(status_code: u16, message: impl Into<String>) -> Self {
        PollError::Protocol {
            status_code,
            message: message.into(),
        }
    }

    /// Returns a short kind label for display.
    pub fn kind(&self) -> &'static str {
        match self {
            PollError::Transport { .. } => "transport-failure",
            PollError::Protocol { .. } => "protocol-failure",
        }
    }
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PollError::transport("Request timed out")
        } else if let Some(status) = err.status() {
            PollError::protocol(status.as_u16(), err.to_string())
        } else {
            PollError::transport(err.to_string())
        }
    }
}
