//! Data models for machine telemetry.
//!
//! This module holds the types received from the telemetry API and the
//! connection health derived from them.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "1s", "500ms")
//! - [`health`]: Connection health classification from data freshness
//! - [`machine`]: Wire types ([`MachineStatus`], [`MachineEvent`], [`MachineId`])
//!
//! ## Data Flow
//!
//! ```text
//! GET /v1/machines/{id}/status (JSON)
//!        │
//!        ▼
//! MachineStatus ──▶ ConnectionHealth::classify() (timestamp_utc vs. local clock)
//!
//! GET /v1/machines/{id}/events?limit=N (JSON array, newest first)
//!        │
//!        ▼
//! Vec<MachineEvent>
//! ```

pub mod duration;
pub mod health;
pub mod machine;

pub use health::{ConnectionHealth, DEFAULT_STALENESS_MULTIPLIER};
pub use machine::{Execution, InvalidMachineId, MachineEvent, MachineId, MachineStatus, Mode};
