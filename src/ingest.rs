// src/ingest.rs - Resilient ingestion loop
//
// One sequential task owns the device link, the raw log and the severity
// state. The link is either Disconnected or Connected; every failure leads
// back to Disconnected and a timed retry. Only cancellation ends the loop.

use crate::{
    config::{Config, DecayConfig, RetryConfig},
    extract::DeviceFields,
    sample::Sample,
    severity::SeverityTracker,
    sink::{LatestSampleFile, RawLog},
    transport::{device_lines, Connector, DeviceLines},
};
use chrono::{DateTime, Local};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delays of the two-state reconnect policy. Attempts are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait after a failed open before the next attempt
    pub open_backoff: Duration,
    /// Wait after a connected link drops before reopening
    pub reconnect_delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(retry: &RetryConfig) -> Self {
        Self {
            open_backoff: Duration::from_secs(retry.open_backoff_secs),
            reconnect_delay: Duration::from_secs(retry.reconnect_delay_secs),
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Everything the loop needs besides the connector
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub raw_log_path: PathBuf,
    pub latest_path: PathBuf,
    pub read_timeout: Duration,
    pub max_line_bytes: usize,
    pub decay: DecayConfig,
    pub policy: ReconnectPolicy,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            raw_log_path: config.output.filepath.clone(),
            latest_path: config.output.latest_path(),
            read_timeout: config.serial.read_timeout(),
            max_line_bytes: config.serial.max_line_bytes,
            decay: config.settings,
            policy: ReconnectPolicy::from_config(&config.retry),
        }
    }
}

/// Counters reported when the loop stops
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub connect_attempts: u64,
    pub connections: u64,
    pub connections_lost: u64,
    pub lines_received: u64,
    pub samples_written: u64,
    pub write_errors: u64,
}

enum LinkState {
    Disconnected,
    Connected(DeviceLines),
}

pub struct Ingestor<C: Connector> {
    connector: C,
    settings: IngestSettings,
    tracker: SeverityTracker,
    latest: LatestSampleFile,
    raw_log: Option<RawLog>,
    cancel: CancellationToken,
    stats: IngestStats,
}

impl<C: Connector> Ingestor<C> {
    pub fn new(connector: C, settings: IngestSettings, cancel: CancellationToken) -> Self {
        Self {
            connector,
            tracker: SeverityTracker::new(settings.decay),
            latest: LatestSampleFile::new(settings.latest_path.clone()),
            settings,
            raw_log: None,
            cancel,
            stats: IngestStats::default(),
        }
    }

    /// Run until cancelled. Transport and output failures are logged and
    /// retried, never returned.
    pub async fn run(&mut self) -> IngestStats {
        info!("Starting ingestion from {}", self.connector.describe());
        let mut link = LinkState::Disconnected;

        while !self.cancel.is_cancelled() {
            link = match link {
                LinkState::Disconnected => self.open_link().await,
                LinkState::Connected(lines) => self.read_next(lines).await,
            };
        }

        self.raw_log = None;
        info!("Ingestion stopped");
        self.stats.clone()
    }

    async fn open_link(&mut self) -> LinkState {
        self.stats.connect_attempts += 1;
        match self.connector.connect().await {
            Ok(stream) => {
                self.stats.connections += 1;
                self.raw_log = open_raw_log(&self.settings.raw_log_path).await;
                LinkState::Connected(device_lines(stream, self.settings.max_line_bytes))
            }
            Err(e) => {
                warn!(
                    "Connection to {} failed: {}. Retrying in {:?}",
                    self.connector.describe(),
                    e,
                    self.settings.policy.open_backoff
                );
                pause(&self.cancel, self.settings.policy.open_backoff).await;
                LinkState::Disconnected
            }
        }
    }

    async fn read_next(&mut self, mut lines: DeviceLines) -> LinkState {
        match timeout(self.settings.read_timeout, lines.next()).await {
            // Nothing arrived within the read timeout
            Err(_) => LinkState::Connected(lines),
            Ok(Some(Ok(line))) => {
                self.process_line(&line, Local::now()).await;
                LinkState::Connected(lines)
            }
            Ok(Some(Err(e))) => {
                error!("Connection error: {}. Reconnecting...", e);
                self.lose_link(lines).await
            }
            Ok(None) => {
                error!("Device stream closed. Reconnecting...");
                self.lose_link(lines).await
            }
        }
    }

    async fn lose_link(&mut self, lines: DeviceLines) -> LinkState {
        drop(lines);
        self.raw_log = None;
        self.stats.connections_lost += 1;
        pause(&self.cancel, self.settings.policy.reconnect_delay).await;
        LinkState::Disconnected
    }

    /// Handle one device line captured at `now`: append it to the raw log,
    /// advance every channel and publish the resulting sample.
    ///
    /// Blank lines are ignored and return `None`.
    pub async fn process_line(&mut self, line: &str, now: DateTime<Local>) -> Option<Sample> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        self.stats.lines_received += 1;
        self.record_raw(line, now).await;

        let fields = DeviceFields::from_line(line);
        let css = self.tracker.apply_masks(&fields.alarm, &fields.exc, now);
        let sample = Sample::assemble(&fields, css, now);

        match self.latest.write(&sample).await {
            Ok(()) => self.stats.samples_written += 1,
            Err(e) => {
                error!("Failed to write {}: {}", self.latest.path().display(), e);
                self.stats.write_errors += 1;
            }
        }

        Some(sample)
    }

    async fn record_raw(&mut self, line: &str, now: DateTime<Local>) {
        if self.raw_log.is_none() {
            self.raw_log = open_raw_log(&self.settings.raw_log_path).await;
        }
        let Some(log) = self.raw_log.as_mut() else {
            self.stats.write_errors += 1;
            return;
        };

        match log.append(now, line).await {
            Ok(entry) => debug!("[DATA] {}", entry),
            Err(e) => {
                error!("Failed to append to {}: {}", log.path().display(), e);
                self.stats.write_errors += 1;
                self.raw_log = None;
            }
        }
    }

    pub fn tracker(&self) -> &SeverityTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Sleep, waking early on cancellation
async fn pause(cancel: &CancellationToken, delay: Duration) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = sleep(delay) => {}
    }
}

async fn open_raw_log(path: &Path) -> Option<RawLog> {
    match RawLog::open(path).await {
        Ok(log) => Some(log),
        Err(e) => {
            error!("Failed to open raw log {}: {}", path.display(), e);
            None
        }
    }
}
