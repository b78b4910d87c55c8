// src/config.rs - Logger configuration (serial link, output files, decay thresholds)

use crate::error::{PoxError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// Main PULSOX configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Serial link to the oximeter
    pub serial: SerialConfig,

    /// Raw log, latest-sample file and diagnostic log locations
    pub output: OutputConfig,

    /// Severity decay thresholds
    #[serde(default)]
    pub settings: DecayConfig,

    /// Reconnect timing
    #[serde(default)]
    pub retry: RetryConfig,

    /// Verbose per-line logging
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Load and validate a YAML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PoxError::Config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML configuration document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ingestion loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(PoxError::Config("serial.port must not be empty".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(PoxError::Config("serial.baud_rate must be greater than zero".into()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(PoxError::Config("serial.read_timeout_ms must be greater than zero".into()));
        }
        if self.serial.max_line_bytes == 0 {
            return Err(PoxError::Config("serial.max_line_bytes must be greater than zero".into()));
        }
        if self.output.filepath.as_os_str().is_empty() {
            return Err(PoxError::Config("output.filepath must not be empty".into()));
        }
        if self.output.latest_file.trim().is_empty() {
            return Err(PoxError::Config("output.latest_file must not be empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// SERIAL LINK
// ============================================================================

/// Serial port settings
#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on a single read wait; keeps the loop responsive to shutdown
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Lines longer than this are discarded instead of buffered
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ============================================================================
// OUTPUT FILES
// ============================================================================

/// Output locations
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Append-only raw device log
    pub filepath: PathBuf,

    /// File name of the latest-sample JSON, placed next to `filepath`
    #[serde(default = "default_latest_file")]
    pub latest_file: String,

    /// Diagnostic log written by the tracing subscriber
    #[serde(default = "default_logfile")]
    pub logfile: PathBuf,
}

impl OutputConfig {
    /// Directory holding the raw log and the latest-sample file
    pub fn directory(&self) -> PathBuf {
        match self.filepath.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Full path of the latest-sample JSON file
    pub fn latest_path(&self) -> PathBuf {
        self.directory().join(&self.latest_file)
    }
}

// ============================================================================
// SEVERITY DECAY
// ============================================================================

/// Time thresholds (seconds) for severity decay.
///
/// `time2o` is accepted for compatibility with existing configuration files
/// but is not consulted: Red drops to Orange as soon as the bit clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DecayConfig {
    #[serde(default = "default_time2o")]
    pub time2o: u64,

    /// Orange → Yellow after this many seconds in Orange
    #[serde(default = "default_time2y")]
    pub time2y: u64,

    /// Yellow → Green after this many seconds in Yellow
    #[serde(default = "default_time2g")]
    pub time2g: u64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            time2o: default_time2o(),
            time2y: default_time2y(),
            time2g: default_time2g(),
        }
    }
}

// ============================================================================
// RECONNECT TIMING
// ============================================================================

/// Reconnect delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Wait between failed attempts to open the device
    #[serde(default = "default_open_backoff")]
    pub open_backoff_secs: u64,

    /// Wait after a connected device drops before reopening it
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            open_backoff_secs: default_open_backoff(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

// ============================================================================
// DEFAULT VALUE FUNCTIONS
// ============================================================================

fn default_baud_rate() -> u32 { 9600 }
fn default_read_timeout() -> u64 { 1000 }
fn default_max_line_bytes() -> usize { 4096 }
fn default_latest_file() -> String { "pox.json".to_string() }
fn default_logfile() -> PathBuf { PathBuf::from("/var/log/pox_logger.log") }
fn default_time2o() -> u64 { 10 }
fn default_time2y() -> u64 { 60 }
fn default_time2g() -> u64 { 300 }
fn default_open_backoff() -> u64 { 5 }
fn default_reconnect_delay() -> u64 { 2 }
