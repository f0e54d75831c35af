//! Layered configuration.
//!
//! Values are resolved in this order, later sources winning:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config monitor.toml`)
//! 3. Environment variables prefixed with `CNC_MONITOR_`
//!    (e.g. `CNC_MONITOR_API_BASE_URL`, `CNC_MONITOR_EVENTS_LIMIT`)
//! 4. Command-line flags, applied by the binary through [`Overrides`]
//!
//! ```toml
//! api_base_url = "http://10.0.0.5:8000"
//! machine_id = "SIM_M80_01"
//! status_interval = "1s"
//! events_interval = "10s"
//! events_limit = 20
//! staleness_multiplier = 3.0
//! overlap = "skip"
//! ```

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::data::duration::parse_duration;
use crate::data::{MachineId, DEFAULT_STALENESS_MULTIPLIER};
use crate::poller::{OverlapPolicy, PollerConfig};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "CNC_MONITOR";

/// Settings as they appear in files and the environment.
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    api_base_url: String,
    machine_id: String,
    status_interval: String,
    events_interval: String,
    events_limit: usize,
    staleness_multiplier: f64,
    overlap: String,
    request_timeout: String,
    #[serde(default)]
    log_file: Option<PathBuf>,
}

/// Values supplied on the command line. `None` keeps the layered value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub machine_id: Option<String>,
    pub status_interval: Option<String>,
    pub events_interval: Option<String>,
    pub events_limit: Option<usize>,
    pub staleness_multiplier: Option<f64>,
    pub overlap: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub machine_id: MachineId,
    pub status_interval: Duration,
    pub events_interval: Duration,
    pub events_limit: NonZeroUsize,
    pub staleness_multiplier: f64,
    pub overlap: OverlapPolicy,
    pub request_timeout: Duration,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Load defaults, the optional file and the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with(config_path, Environment::with_prefix(ENV_PREFIX), Overrides::default())
    }

    /// Load with explicit environment source and CLI overrides.
    pub fn load_with(
        config_path: Option<&Path>,
        environment: Environment,
        overrides: Overrides,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("api_base_url", "http://localhost:8000")?
            .set_default("machine_id", "CNC-SIM-001")?
            .set_default("status_interval", "1s")?
            .set_default("events_interval", "10s")?
            .set_default("events_limit", 20)?
            .set_default("staleness_multiplier", DEFAULT_STALENESS_MULTIPLIER)?
            .set_default("overlap", "skip")?
            .set_default("request_timeout", "5s")?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let raw: RawSettings = builder
            .add_source(environment.try_parsing(true))
            .set_override_option("api_base_url", overrides.api_base_url)?
            .set_override_option("machine_id", overrides.machine_id)?
            .set_override_option("status_interval", overrides.status_interval)?
            .set_override_option("events_interval", overrides.events_interval)?
            .set_override_option("events_limit", overrides.events_limit.map(|n| n as u64))?
            .set_override_option("staleness_multiplier", overrides.staleness_multiplier)?
            .set_override_option("overlap", overrides.overlap)?
            .set_override_option(
                "log_file",
                overrides.log_file.map(|p| p.to_string_lossy().into_owned()),
            )?
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self> {
        let api_base_url = raw.api_base_url.trim().to_string();
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            bail!("api_base_url must start with http:// or https://: {}", api_base_url);
        }

        let machine_id = MachineId::new(raw.machine_id).context("Invalid machine_id")?;

        let status_interval = parse_interval("status_interval", &raw.status_interval)?;
        let events_interval = parse_interval("events_interval", &raw.events_interval)?;
        let request_timeout = parse_interval("request_timeout", &raw.request_timeout)?;

        let Some(events_limit) = NonZeroUsize::new(raw.events_limit) else {
            bail!("events_limit must be a positive integer");
        };

        if !raw.staleness_multiplier.is_finite() || raw.staleness_multiplier <= 0.0 {
            bail!(
                "staleness_multiplier must be a positive number, got {}",
                raw.staleness_multiplier
            );
        }

        let overlap = raw.overlap.parse()?;

        Ok(Self {
            api_base_url,
            machine_id,
            status_interval,
            events_interval,
            events_limit,
            staleness_multiplier: raw.staleness_multiplier,
            overlap,
            request_timeout,
            log_file: raw.log_file,
        })
    }

    pub fn status_poller(&self) -> PollerConfig {
        PollerConfig::new(self.status_interval).with_overlap(self.overlap)
    }

    pub fn events_poller(&self) -> PollerConfig {
        PollerConfig::new(self.events_interval).with_overlap(self.overlap)
    }
}

fn parse_interval(key: &str, value: &str) -> Result<Duration> {
    let d = parse_duration(value).with_context(|| format!("Invalid {}: {:?}", key, value))?;
    if d.is_zero() {
        bail!("{} must be greater than zero", key);
    }
    Ok(d)
}
