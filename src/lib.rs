//! PULSOX - Pulse-Oximeter Telemetry Logger
//!
//! Reads line-oriented telemetry from a pulse-oximeter over a serial link,
//! keeps a decayed severity indicator for each of the 24 alarm/exception
//! channels and publishes the most recent sample as JSON for a display.
//!
//! # Pipeline
//!
//! ```text
//! device line -> extract -> severity (per channel) -> sample -> pox.json
//!            \-> raw log
//! ```
//!
//! # Feature Flags
//!
//! - `serial` (default): native serial port connector, required by the binary
//!
//! # Examples
//!
//! ```rust
//! use pulsox::{DecayConfig, DeviceFields, Label, Sample, SeverityLevel, SeverityTracker};
//!
//! let line = "SPO2=97% BPM=072 PI=1.2 ALARM=01 EXC=00";
//! let fields = DeviceFields::from_line(line);
//!
//! let mut tracker = SeverityTracker::new(DecayConfig::default());
//! let now = chrono::Local::now();
//! let css = tracker.apply_masks(&fields.alarm, &fields.exc, now);
//!
//! let sample = Sample::assemble(&fields, css, now);
//! assert_eq!(sample.bpm, "72");
//! assert_eq!(sample.css[&Label::alarm(1).unwrap()], SeverityLevel::Red);
//! ```

// ============================================================================
// CORE MODULES
// ============================================================================

/// Error type shared by every module
pub mod error;

/// YAML configuration with defaults and validation
pub mod config;

/// `KEY=value` field extraction from device lines
pub mod extract;

/// Per-channel severity state machine with time-based decay
pub mod severity;

/// Latest-sample record and numeric normalization
pub mod sample;

/// Raw log and latest-sample file writers
pub mod sink;

/// Device link abstraction, line framing and serial connector
pub mod transport;

/// Reconnecting ingestion loop
pub mod ingest;

// ============================================================================
// PUBLIC RE-EXPORTS
// ============================================================================

pub use config::{Config, DecayConfig, OutputConfig, RetryConfig, SerialConfig};
pub use error::{PoxError, Result};
pub use extract::{extract_value, DeviceFields};
pub use ingest::{IngestSettings, IngestStats, Ingestor, ReconnectPolicy};
pub use sample::{normalize_numeric, Sample};
pub use severity::{parse_mask, ChannelKind, Label, SeverityLevel, SeverityMap, SeverityTracker};
pub use sink::{LatestSampleFile, RawLog};
pub use transport::{Connector, DeviceStream};

#[cfg(feature = "serial")]
pub use transport::SerialConnector;

// ============================================================================
// VERSION INFORMATION
// ============================================================================

/// PULSOX version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub mod build_info {
    /// Git commit hash (if available)
    pub const GIT_HASH: Option<&str> = option_env!("PULSOX_GIT_HASH");

    /// Build timestamp
    pub const BUILD_TIMESTAMP: &str = env!("PULSOX_BUILD_TIMESTAMP");

    /// Target triple
    pub const TARGET: &str = env!("PULSOX_TARGET");

    /// Build profile (debug/release)
    pub const PROFILE: &str = env!("PULSOX_PROFILE");

    /// One-line summary for the startup log
    pub fn summary() -> String {
        format!(
            "{} {} ({}, built {}, git {})",
            TARGET,
            PROFILE,
            super::VERSION,
            BUILD_TIMESTAMP,
            GIT_HASH.unwrap_or("unknown")
        )
    }
}

// ============================================================================
// LOGGING
// ============================================================================

/// Install the global tracing subscriber.
///
/// Events go to the console and, when `logfile` can be opened for appending,
/// to that file as well. `RUST_LOG` overrides the default `pulsox=info`
/// (`pulsox=debug` when `debug` is set). Returns `false` if the log file was
/// unavailable and only the console is in use. Calling it twice is harmless.
pub fn init_logging(debug: bool, logfile: &std::path::Path) -> bool {
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = if debug { "pulsox=debug" } else { "pulsox=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let file = logfile
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(logfile));

    let file_available = file.is_ok();
    let file_layer = file.ok().map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();

    file_available
}
