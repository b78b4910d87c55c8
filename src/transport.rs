// src/transport.rs - Device link: connector interface, line framing, serial port
use crate::error::Result;
use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, warn};

/// Byte stream of an open device link
pub type DeviceStream = Box<dyn AsyncRead + Send + Unpin>;

/// Newline-delimited device lines read from a [`DeviceStream`]
pub type DeviceLines = FramedRead<DeviceStream, DeviceLineCodec>;

/// Opens the link to the device.
///
/// The ingestion loop calls [`Connector::connect`] once per connection
/// lifetime and owns the retry policy, so implementations should make a
/// single attempt and report failure as [`crate::PoxError::Transport`].
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pulsox::transport::{Connector, DeviceStream};
///
/// struct Replay(&'static [u8]);
///
/// #[async_trait]
/// impl Connector for Replay {
///     async fn connect(&mut self) -> pulsox::Result<DeviceStream> {
///         Ok(Box::new(std::io::Cursor::new(self.0)))
///     }
///
///     fn describe(&self) -> String {
///         "replay".to_string()
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send {
    /// Open the device link
    async fn connect(&mut self) -> Result<DeviceStream>;

    /// Human-readable endpoint name for log messages
    fn describe(&self) -> String;
}

/// Frame a freshly opened stream into device lines
pub fn device_lines(stream: DeviceStream, max_line_bytes: usize) -> DeviceLines {
    FramedRead::new(stream, DeviceLineCodec::new(max_line_bytes))
}

// ============================================================================
// LINE CODEC
// ============================================================================

/// Splits the device byte stream on `\n`.
///
/// Lines are decoded as ASCII with other bytes dropped and surrounding
/// whitespace (including `\r`) trimmed. Lines longer than `max_length` are
/// discarded whole. A partial line left at end of stream is dropped.
#[derive(Debug, Clone)]
pub struct DeviceLineCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
}

impl DeviceLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

fn ascii_line(raw: &[u8]) -> String {
    let text: String = raw
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();
    text.trim().to_string()
}

impl Decoder for DeviceLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        loop {
            let newline = buf[self.next_index..].iter().position(|b| *b == b'\n');
            let Some(offset) = newline else {
                if buf.len() > self.max_length {
                    if !self.discarding {
                        warn!("Discarding device line longer than {} bytes", self.max_length);
                    }
                    buf.clear();
                    self.discarding = true;
                    self.next_index = 0;
                } else {
                    self.next_index = buf.len();
                }
                return Ok(None);
            };

            let end = self.next_index + offset;
            self.next_index = 0;
            let raw = buf.split_to(end + 1);

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if end > self.max_length {
                warn!("Discarding device line longer than {} bytes", self.max_length);
                continue;
            }
            return Ok(Some(ascii_line(&raw[..end])));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if !buf.is_empty() {
            debug!("Dropping {} bytes of incomplete device line", buf.len());
            buf.clear();
        }
        self.next_index = 0;
        self.discarding = false;
        Ok(None)
    }
}

// ============================================================================
// SERIAL PORT
// ============================================================================

#[cfg(feature = "serial")]
pub use serial::SerialConnector;

#[cfg(feature = "serial")]
mod serial {
    use super::{Connector, DeviceStream};
    use crate::config::SerialConfig;
    use crate::error::{PoxError, Result};
    use async_trait::async_trait;
    use tokio_serial::SerialPortBuilderExt;
    use tracing::info;

    /// Native serial port connector
    pub struct SerialConnector {
        port: String,
        baud_rate: u32,
    }

    impl SerialConnector {
        pub fn new(config: &SerialConfig) -> Self {
            Self {
                port: config.port.clone(),
                baud_rate: config.baud_rate,
            }
        }
    }

    #[async_trait]
    impl Connector for SerialConnector {
        async fn connect(&mut self) -> Result<DeviceStream> {
            let stream = tokio_serial::new(self.port.as_str(), self.baud_rate)
                .open_native_async()
                .map_err(|e| PoxError::Transport(format!("{}: {}", self.port, e)))?;
            info!("Serial connection opened: {} @ {} baud", self.port, self.baud_rate);
            Ok(Box::new(stream))
        }

        fn describe(&self) -> String {
            format!("{} @ {} baud", self.port, self.baud_rate)
        }
    }
}
