//! # cnc-monitor
//!
//! A terminal dashboard and library for watching a CNC machine through its
//! telemetry API.
//!
//! Two independent poll loops fetch the machine status and its recent events.
//! Their results, failures included, are merged into a single
//! [`PresentationState`] that the terminal UI renders. Connection health is
//! judged from the freshness of the data itself: a status whose
//! `timestamp_utc` lags the local clock by more than a few update intervals is
//! `unstable` even if the request succeeded.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Monitor                            │
//! │  ┌──────────────┐                                           │
//! │  │ StatusPoller │──┐                                        │
//! │  └──────────────┘  │  SliceWriter  ┌────────────┐           │
//! │                    ├──────────────▶│ StateStore │           │
//! │  ┌──────────────┐  │               └─────┬──────┘           │
//! │  │ EventsPoller │──┘                     │ StateReader      │
//! │  └──────┬───────┘                        ▼                  │
//! │         │                          ┌───────────┐            │
//! │         ▼                          │ app / ui  │──▶ Terminal│
//! │  TelemetryClient (HTTP)            └───────────┘            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`client`]**: The [`TelemetryClient`] trait and its `reqwest`
//!   implementation; failures map to [`PollError`]
//! - **[`data`]**: Wire types and [`ConnectionHealth`] classification
//! - **[`poller`]**: Fixed-interval loops with a clean stop
//! - **[`store`]**: The single source of truth for the UI
//! - **[`monitor`]**: Wires one store to the two pollers
//! - **[`settings`]**: Layered configuration (defaults, TOML, env, CLI)
//! - **[`app`]**, **[`events`]**, **[`ui`]**: The terminal front end
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch the default simulator
//! cnc-monitor
//!
//! # Another machine on another host, with a log file
//! cnc-monitor --api-base-url http://10.0.0.5:8000 --machine-id SIM_M80_01 --log-file monitor.log
//!
//! # One-shot JSON dump
//! cnc-monitor --export state.json
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use cnc_monitor::{HttpTelemetryClient, Monitor, Settings};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::load(None).unwrap();
//! let client = HttpTelemetryClient::builder()
//!     .endpoint(settings.api_base_url.clone())
//!     .timeout(settings.request_timeout)
//!     .build()
//!     .unwrap();
//!
//! let monitor = Monitor::activate(Arc::new(client), &settings);
//! let mut reader = monitor.reader();
//! while reader.changed().await.is_ok() {
//!     let state = reader.snapshot();
//!     println!("{:?} {:?}", state.health, state.status.map(|s| s.rpm));
//! }
//! # });
//! ```

pub mod app;
pub mod client;
pub mod data;
pub mod events;
pub mod monitor;
pub mod poller;
pub mod settings;
pub mod store;
pub mod ui;

pub use app::App;
pub use client::{HttpTelemetryClient, PollError, TelemetryClient};
pub use data::{ConnectionHealth, Execution, MachineEvent, MachineId, MachineStatus, Mode};
pub use monitor::Monitor;
pub use poller::{
    EventsPoller, OverlapPolicy, PollJob, Poller, PollerConfig, PollerState, StatusPoller,
};
pub use settings::Settings;
pub use store::{PresentationState, StateReader, StateStore};
