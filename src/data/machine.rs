//! Machine status and event types as served by the telemetry API.
//!
//! Field names follow the JSON contract of
//! `GET /v1/machines/{id}/status` and `GET /v1/machines/{id}/events`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a machine identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidMachineId {
    #[error("machine id must not be empty")]
    Empty,
    #[error("machine id {0:?} may only contain letters, digits, '-', '_' and '.'")]
    Character(String),
}

/// A validated machine identifier.
///
/// Identifiers are interpolated into request paths, so only URL-safe
/// characters are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidMachineId> {
        let id = id.into();
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(InvalidMachineId::Empty);
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return Err(InvalidMachineId::Character(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution state reported by the controller.
///
/// Unknown states are kept verbatim in [`Execution::Other`] rather than
/// failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Execution {
    Executing,
    Stopped,
    Ready,
    Other(String),
}

impl Execution {
    /// Returns the display label for this state.
    pub fn label(&self) -> &str {
        match self {
            Execution::Executing => "Executing",
            Execution::Stopped => "Stopped",
            Execution::Ready => "Ready",
            Execution::Other(s) => s,
        }
    }
}

impl From<String> for Execution {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "EXECUTING" => Execution::Executing,
            "STOPPED" => Execution::Stopped,
            "READY" => Execution::Ready,
            _ => Execution::Other(s),
        }
    }
}

impl From<Execution> for String {
    fn from(e: Execution) -> Self {
        match e {
            Execution::Executing => "EXECUTING".to_string(),
            Execution::Stopped => "STOPPED".to_string(),
            Execution::Ready => "READY".to_string(),
            Execution::Other(s) => s,
        }
    }
}

/// Operating mode reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Automatic,
    Manual,
    Other(String),
}

impl Mode {
    /// Returns the display label for this mode.
    pub fn label(&self) -> &str {
        match self {
            Mode::Automatic => "Automatic",
            Mode::Manual => "Manual",
            Mode::Other(s) => s,
        }
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "AUTOMATIC" => Mode::Automatic,
            "MANUAL" => Mode::Manual,
            _ => Mode::Other(s),
        }
    }
}

impl From<Mode> for String {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Automatic => "AUTOMATIC".to_string(),
            Mode::Manual => "MANUAL".to_string(),
            Mode::Other(s) => s,
        }
    }
}

/// Snapshot of the machine state at one point in time.
///
/// Each poll produces a new snapshot that replaces the previous one whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub machine_id: String,
    #[serde(default)]
    pub controller_family: Option<String>,
    /// Server-reported instant the data refers to.
    pub timestamp_utc: DateTime<Utc>,
    pub mode: Mode,
    pub execution: Execution,
    /// Spindle speed (rev/min).
    pub rpm: f64,
    /// Feed rate (mm/min).
    pub feed_rate: f64,
    #[serde(default)]
    pub spindle_load_pct: Option<f64>,
    #[serde(default)]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub alarm_code: Option<String>,
    #[serde(default)]
    pub alarm_message: Option<String>,
    #[serde(default)]
    pub part_count: Option<u64>,
    /// Update cadence declared by the server. Only used for staleness.
    pub update_interval_ms: u64,
    #[serde(default)]
    pub source: Option<String>,
}

impl MachineStatus {
    /// Combined alarm text, if either part is present.
    pub fn alarm(&self) -> Option<String> {
        format_alarm(self.alarm_code.as_deref(), self.alarm_message.as_deref())
    }
}

/// A historical status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineEvent {
    pub timestamp_utc: DateTime<Utc>,
    pub execution: Execution,
    #[serde(default)]
    pub mode: Option<Mode>,
    pub rpm: f64,
    pub feed_rate: f64,
    #[serde(default)]
    pub spindle_load_pct: Option<f64>,
    #[serde(default)]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub alarm_code: Option<String>,
    #[serde(default)]
    pub alarm_message: Option<String>,
}

impl MachineEvent {
    /// Combined alarm text, if either part is present.
    pub fn alarm(&self) -> Option<String> {
        format_alarm(self.alarm_code.as_deref(), self.alarm_message.as_deref())
    }
}

fn format_alarm(code: Option<&str>, message: Option<&str>) -> Option<String> {
    match (code, message) {
        (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
        (Some(code), None) => Some(code.to_string()),
        (None, Some(message)) => Some(message.to_string()),
        (None, None) => None,
    }
}
