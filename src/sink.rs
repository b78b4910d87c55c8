// src/sink.rs - Output sinks: append-only raw device log and latest-sample file

use crate::error::Result;
use crate::sample::Sample;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Timestamp prefix of raw log lines (ISO-8601, local time)
pub const RAW_LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Create the directory that will hold `path`, if any
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).await?;
        }
    }
    Ok(())
}

/// Format one raw log line (without the trailing newline)
pub fn raw_log_line(at: DateTime<Local>, line: &str) -> String {
    format!("{} {}", at.format(RAW_LOG_TIMESTAMP_FORMAT), line)
}

// ============================================================================
// RAW LOG
// ============================================================================

/// Append-only record of every device line, flushed on each write
pub struct RawLog {
    path: PathBuf,
    file: File,
}

impl RawLog {
    /// Open (or create) the log for appending
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        info!("Writing device data to: {}", path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `<timestamp> <line>` and flush it to the OS
    pub async fn append(&mut self, at: DateTime<Local>, line: &str) -> Result<String> {
        let mut entry = raw_log_line(at, line);
        entry.push('\n');
        self.file.write_all(entry.as_bytes()).await?;
        self.file.flush().await?;
        entry.pop();
        Ok(entry)
    }
}

// ============================================================================
// LATEST SAMPLE
// ============================================================================

/// JSON file that always holds only the most recent sample
#[derive(Debug, Clone)]
pub struct LatestSampleFile {
    path: PathBuf,
}

impl LatestSampleFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents with `sample` in a single write
    pub async fn write(&self, sample: &Sample) -> Result<()> {
        let json = sample.to_json()?;
        fs::write(&self.path, json).await?;
        Ok(())
    }
}
