//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Shared primitives and utilities for the publisher runtime."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use tracing::debug;

use crate::logging::LogFormat;

fn default_queue() -> String {
    "sensor_readings".to_owned()
}

fn default_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_progress_every() -> u64 {
    10
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_fault_probability() -> f64 {
    0.05
}

fn default_fault_duration() -> SpanConfig {
    SpanConfig::new(30.0, 120.0)
}

fn default_initial_target() -> SpanConfig {
    SpanConfig::new(40.0, 60.0)
}

fn default_normal_band() -> SpanConfig {
    SpanConfig::new(15.0, 85.0)
}

fn default_drift_step() -> f64 {
    2.0
}

fn default_mean_reversion() -> f64 {
    0.05
}

fn default_centre() -> f64 {
    50.0
}

fn default_noise_fraction() -> f64 {
    0.02
}

fn default_tolerance_fraction() -> f64 {
    0.1
}

/// Top-level configuration for the publisher and generator tools.
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// working configuration once a limits path is supplied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "SDS_CONFIG";
    pub const DEFAULT_CANDIDATES: [&str; 2] = ["configs/sds.toml", "sds.toml"];

    /// Load configuration, preferring an explicit path, then `SDS_CONFIG`,
    /// then the default candidates. Falls back to defaults when nothing exists.
    pub fn load_with_source(explicit: Option<&Path>) -> Result<LoadedAppConfig> {
        if let Some(path) = explicit {
            let config = Self::from_path(path)?;
            return Ok(LoadedAppConfig {
                config,
                source: Some(path.to_path_buf()),
            });
        }

        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in Self::DEFAULT_CANDIDATES {
            let path = Path::new(candidate);
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        Ok(LoadedAppConfig {
            config: AppConfig::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.publisher.validate()?;
        self.transport.validate()?;
        self.simulation.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// CSV file holding the operational limits of every sensor.
    #[serde(default)]
    pub limits_path: Option<PathBuf>,
    #[serde(default = "default_queue")]
    pub queue: String,
    #[serde(default = "default_interval")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub interval: Duration,
    /// Emit a progress event every N published messages.
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Stop after this many messages; runs until interrupted when unset.
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            limits_path: None,
            queue: default_queue(),
            interval: default_interval(),
            progress_every: default_progress_every(),
            seed: None,
            max_ticks: None,
        }
    }
}

impl PublisherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(anyhow!("publisher interval must be greater than zero"));
        }
        if self.queue.trim().is_empty() {
            return Err(anyhow!("publisher queue name must not be empty"));
        }
        if self.progress_every == 0 {
            return Err(anyhow!("publisher progress_every must be greater than zero"));
        }
        Ok(())
    }

    /// Return the limits path or a startup diagnostic when none was configured.
    pub fn require_limits_path(&self) -> Result<&Path> {
        self.limits_path
            .as_deref()
            .ok_or_else(|| anyhow!("a limits CSV path is required (argument or publisher.limits_path)"))
    }
}

/// Transport backends the publisher can hand readings to.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON lines on standard output.
    #[default]
    Stdout,
    /// JSON lines appended to a file.
    File,
    /// Newline-delimited JSON frames over a TCP connection.
    Tcp,
    /// In-process queue, mainly for tests.
    Memory,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Stdout => "stdout",
            TransportKind::File => "file",
            TransportKind::Tcp => "tcp",
            TransportKind::Memory => "memory",
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(TransportKind::Stdout),
            "file" => Ok(TransportKind::File),
            "tcp" => Ok(TransportKind::Tcp),
            "memory" => Ok(TransportKind::Memory),
            other => Err(format!("unknown transport: {}", other)),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    /// `host:port` of the broker bridge for the tcp transport.
    #[serde(default)]
    pub address: Option<String>,
    /// Output file for the file transport.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_retry_delay")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub retry_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            address: None,
            path: None,
            connect_attempts: default_connect_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_attempts == 0 {
            return Err(anyhow!("transport connect_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Inclusive `[min, max]` pair used for uniform draws and clamp bands.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanConfig {
    pub min: f64,
    pub max: f64,
}

impl SpanConfig {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn validate(&self, field: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(anyhow!(
                "simulation {} must satisfy min <= max (got {} .. {})",
                field,
                self.min,
                self.max
            ));
        }
        Ok(())
    }
}

/// Directional targets applied to a faulted machine's sensors, in percent of range.
///
/// A `high` sensor moves from `high_start_pct` to `high_start_pct + high_overshoot_pct`
/// over the episode; a `low` sensor from `low_start_pct` down by `low_overshoot_pct`.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaultProfile {
    pub high_start_pct: f64,
    pub high_overshoot_pct: f64,
    pub low_start_pct: f64,
    pub low_overshoot_pct: f64,
}

impl Default for FaultProfile {
    fn default() -> Self {
        Self {
            high_start_pct: 80.0,
            high_overshoot_pct: 40.0,
            low_start_pct: 20.0,
            low_overshoot_pct: 30.0,
        }
    }
}

/// Tuning constants for the drift, fault, and synthesis models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Per-tick probability of starting a fault episode while idle.
    #[serde(default = "default_fault_probability")]
    pub fault_probability: f64,
    #[serde(default = "default_fault_duration")]
    pub fault_duration_secs: SpanConfig,
    #[serde(default = "default_initial_target")]
    pub initial_target_pct: SpanConfig,
    /// Clamp band for targets of healthy machines.
    #[serde(default = "default_normal_band")]
    pub normal_band_pct: SpanConfig,
    #[serde(default = "default_drift_step")]
    pub drift_step_pct: f64,
    #[serde(default = "default_mean_reversion")]
    pub mean_reversion: f64,
    #[serde(default = "default_centre")]
    pub centre_pct: f64,
    /// Noise amplitude as a fraction of the sensor span.
    #[serde(default = "default_noise_fraction")]
    pub noise_fraction: f64,
    /// Allowed excursion outside the nominal range, as a fraction of the span.
    #[serde(default = "default_tolerance_fraction")]
    pub tolerance_fraction: f64,
    #[serde(default)]
    pub fault_profile: FaultProfile,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fault_probability: default_fault_probability(),
            fault_duration_secs: default_fault_duration(),
            initial_target_pct: default_initial_target(),
            normal_band_pct: default_normal_band(),
            drift_step_pct: default_drift_step(),
            mean_reversion: default_mean_reversion(),
            centre_pct: default_centre(),
            noise_fraction: default_noise_fraction(),
            tolerance_fraction: default_tolerance_fraction(),
            fault_profile: FaultProfile::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fault_probability) {
            return Err(anyhow!(
                "simulation fault_probability must lie in [0, 1] (got {})",
                self.fault_probability
            ));
        }
        self.fault_duration_secs.validate("fault_duration_secs")?;
        if self.fault_duration_secs.min <= 0.0 {
            return Err(anyhow!("simulation fault_duration_secs must be positive"));
        }
        self.initial_target_pct.validate("initial_target_pct")?;
        self.normal_band_pct.validate("normal_band_pct")?;
        let profile = &self.fault_profile;
        let scalars = [
            ("drift_step_pct", self.drift_step_pct),
            ("mean_reversion", self.mean_reversion),
            ("centre_pct", self.centre_pct),
            ("noise_fraction", self.noise_fraction),
            ("tolerance_fraction", self.tolerance_fraction),
            ("fault_profile.high_start_pct", profile.high_start_pct),
            ("fault_profile.high_overshoot_pct", profile.high_overshoot_pct),
            ("fault_profile.low_start_pct", profile.low_start_pct),
            ("fault_profile.low_overshoot_pct", profile.low_overshoot_pct),
        ];
        if let Some((field, value)) = scalars.iter().find(|(_, value)| !value.is_finite()) {
            return Err(anyhow!("simulation {} must be finite (got {})", field, value));
        }
        if self.drift_step_pct < 0.0 || self.noise_fraction < 0.0 || self.tolerance_fraction < 0.0
        {
            return Err(anyhow!(
                "simulation drift_step_pct, noise_fraction and tolerance_fraction must be non-negative"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log file; file logging is off when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
