//! Connection health derived from the freshness of received data.
//!
//! Health is never read from the transport. It compares the status
//! snapshot's `timestamp_utc` with the local clock at the moment the
//! response was observed.
//!
//! Client and server clocks are not synchronized. Skew between them shifts
//! the computed age one way or the other and is not corrected; a server
//! clock running ahead makes data look fresher (negative age counts as
//! connected).

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::machine::MachineStatus;

/// Default staleness multiplier applied to `update_interval_ms`.
pub const DEFAULT_STALENESS_MULTIPLIER: f64 = 3.0;

/// Health of the link to the machine as seen by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionHealth {
    Connected,
    Unstable,
    Disconnected,
}

impl ConnectionHealth {
    /// Classify a successfully fetched status.
    ///
    /// Data older than `multiplier × update_interval_ms` at `observed_at` is
    /// `Unstable`, anything else `Connected`. Fetch failures are
    /// `Disconnected` and never go through this function.
    pub fn classify(
        observed_at: DateTime<Utc>,
        status: &MachineStatus,
        multiplier: f64,
    ) -> ConnectionHealth {
        let age = observed_at - status.timestamp_utc;
        // Full precision; only overflows for ages beyond ~292 years
        let age_ms = match age.num_nanoseconds() {
            Some(ns) => ns as f64 / 1_000_000.0,
            None if age > TimeDelta::zero() => f64::INFINITY,
            None => f64::NEG_INFINITY,
        };
        let max_delay_ms = multiplier * status.update_interval_ms as f64;

        if age_ms > max_delay_ms {
            ConnectionHealth::Unstable
        } else {
            ConnectionHealth::Connected
        }
    }

    /// Returns the display label.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionHealth::Connected => "connected",
            ConnectionHealth::Unstable => "unstable",
            ConnectionHealth::Disconnected => "disconnected",
        }
    }
}
