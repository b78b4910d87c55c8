// src/error.rs - Error types for PULSOX
use thiserror::Error;

/// Application level error type used throughout the crate.
#[derive(Error, Debug)]
pub enum PoxError {
    /// I/O related failure (sinks, log file, device stream)
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error while encoding the latest-sample file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The device link could not be opened or was lost
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Convenient alias over [`Result`] using [`PoxError`]
pub type Result<T> = std::result::Result<T, PoxError>;
