//! ---
//! sds_section: "02-messaging-ipc-data-model"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Reading envelopes and publish transports."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sds_common::config::{TransportConfig, TransportKind};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::logging::{log_message, MessageDirection};
use crate::types::{DeliveryMode, SensorReadingMessage, TransportFrame};
use crate::{Result, TransportError};

/// Publish side of a message transport.
///
/// Implementations deliver each message once and report failures to the caller;
/// retry policy belongs to the broker client behind the transport, not to the engine.
#[async_trait]
pub trait Transport: Send {
    /// Publish one message to `queue`.
    async fn publish(
        &mut self,
        queue: &str,
        message: &SensorReadingMessage,
        delivery: DeliveryMode,
    ) -> Result<()>;
    /// Flush and release the underlying resource. Further publishes fail.
    async fn close(&mut self) -> Result<()>;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

/// Open the transport selected by `config`.
///
/// Connection problems surface here so that startup can abort before any tick runs.
pub async fn connect(config: &TransportConfig) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match config.kind {
        TransportKind::Stdout => Box::new(StdoutTransport::new()),
        TransportKind::File => {
            let path = config.path.as_deref().ok_or(TransportError::MissingSetting {
                kind: "file",
                field: "path",
            })?;
            Box::new(FileTransport::open(path).await?)
        }
        TransportKind::Tcp => {
            let address = config
                .address
                .as_deref()
                .ok_or(TransportError::MissingSetting {
                    kind: "tcp",
                    field: "address",
                })?;
            Box::new(
                TcpTransport::connect(address, config.connect_attempts, config.retry_delay)
                    .await?,
            )
        }
        TransportKind::Memory => Box::new(InMemoryTransport::new()),
    };
    info!(transport = transport.name(), "transport ready");
    Ok(transport)
}

async fn write_line<W>(writer: &mut W, payload: &impl serde::Serialize) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut line = serde_json::to_vec(payload)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes one JSON message body per line to standard output.
pub struct StdoutTransport {
    out: Option<Stdout>,
}

impl StdoutTransport {
    /// Create a transport bound to the process stdout.
    pub fn new() -> Self {
        Self {
            out: Some(tokio::io::stdout()),
        }
    }
}

impl Default for StdoutTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    async fn publish(
        &mut self,
        queue: &str,
        message: &SensorReadingMessage,
        _delivery: DeliveryMode,
    ) -> Result<()> {
        let out = self.out.as_mut().ok_or(TransportError::Closed("stdout"))?;
        write_line(out, message).await?;
        log_message(MessageDirection::Outbound, "stdout", queue, message);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush().await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Appends one JSON message body per line to a file.
pub struct FileTransport {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileTransport {
    /// Open `path` for appending, creating it when missing.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn publish(
        &mut self,
        queue: &str,
        message: &SensorReadingMessage,
        _delivery: DeliveryMode,
    ) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(TransportError::Closed("file"))?;
        write_line(writer, message).await?;
        log_message(MessageDirection::Outbound, "file", queue, message);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Streams [`TransportFrame`]s as newline-delimited JSON to a broker bridge.
pub struct TcpTransport {
    address: String,
    stream: Option<BufWriter<TcpStream>>,
}

impl TcpTransport {
    /// Dial `address`, retrying up to `attempts` times with `retry_delay` between tries.
    pub async fn connect(address: &str, attempts: u32, retry_delay: Duration) -> Result<Self> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            info!(address, attempt, "connecting to broker");
            match TcpStream::connect(address).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    info!(address, "connected to broker");
                    return Ok(Self {
                        address: address.to_owned(),
                        stream: Some(BufWriter::new(stream)),
                    });
                }
                Err(err) if attempt < attempts => {
                    warn!(address, attempt, error = %err, "broker connection failed; retrying");
                    tokio::time::sleep(retry_delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(TransportError::Unreachable {
                        address: address.to_owned(),
                        attempts,
                        source: err,
                    });
                }
            }
        }
    }

    /// Remote address this transport was connected to.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn publish(
        &mut self,
        queue: &str,
        message: &SensorReadingMessage,
        delivery: DeliveryMode,
    ) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed("tcp"))?;
        let frame = TransportFrame::new(queue, message.clone(), delivery);
        if let Err(err) = write_line(stream, &frame).await {
            log_message(MessageDirection::Failed, "tcp", queue, message);
            return Err(err);
        }
        log_message(MessageDirection::Outbound, "tcp", queue, message);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.flush().await?;
            stream.into_inner().shutdown().await?;
            info!(address = %self.address, "broker connection closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

#[derive(Default)]
struct MemoryQueue {
    frames: VecDeque<TransportFrame>,
    closed: bool,
}

/// In-memory transport backed by a shared queue; clones observe the same frames.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    queue: Arc<Mutex<MemoryQueue>>,
}

impl InMemoryTransport {
    /// Create an empty in-memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every published frame.
    pub fn drain(&self) -> Vec<TransportFrame> {
        self.queue.lock().frames.drain(..).collect()
    }

    /// Number of frames waiting to be drained.
    pub fn len(&self) -> usize {
        self.queue.lock().frames.len()
    }

    /// Whether no frames are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `close` has been called on any clone.
    pub fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(
        &mut self,
        queue: &str,
        message: &SensorReadingMessage,
        delivery: DeliveryMode,
    ) -> Result<()> {
        let mut guard = self.queue.lock();
        if guard.closed {
            return Err(TransportError::Closed("memory"));
        }
        guard
            .frames
            .push_back(TransportFrame::new(queue, message.clone(), delivery));
        log_message(MessageDirection::Outbound, "memory", queue, message);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.queue.lock().closed = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadingValues;
    use chrono::Utc;

    fn message() -> SensorReadingMessage {
        let mut readings = ReadingValues::new();
        readings.insert("PUMP1:TEMP".into(), "51.00".into());
        SensorReadingMessage::synthetic(Utc::now(), readings)
    }

    #[tokio::test]
    async fn in_memory_transport_records_frames() {
        let probe = InMemoryTransport::new();
        let mut transport = probe.clone();
        transport
            .publish("sensor_readings", &message(), DeliveryMode::Persistent)
            .await
            .unwrap();
        assert_eq!(probe.len(), 1);
        let frames = probe.drain();
        assert_eq!(frames[0].queue, "sensor_readings");
        assert!(frames[0].persistent);
        assert!(probe.is_empty());
    }

    #[tokio::test]
    async fn in_memory_transport_rejects_publish_after_close() {
        let mut transport = InMemoryTransport::new();
        transport.close().await.unwrap();
        assert!(transport.is_closed());
        let err = transport
            .publish("q", &message(), DeliveryMode::Persistent)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed("memory")));
    }

    #[tokio::test]
    async fn connect_requires_settings_per_kind() {
        let config = TransportConfig {
            kind: TransportKind::Tcp,
            ..TransportConfig::default()
        };
        let err = connect(&config).await.err().unwrap();
        assert!(matches!(
            err,
            TransportError::MissingSetting { kind: "tcp", field: "address" }
        ));

        let config = TransportConfig {
            kind: TransportKind::File,
            ..TransportConfig::default()
        };
        let err = connect(&config).await.err().unwrap();
        assert!(matches!(
            err,
            TransportError::MissingSetting { kind: "file", field: "path" }
        ));
    }

    #[tokio::test]
    async fn connect_builds_memory_transport() {
        let config = TransportConfig {
            kind: TransportKind::Memory,
            ..TransportConfig::default()
        };
        let transport = connect(&config).await.unwrap();
        assert_eq!(transport.name(), "memory");
    }
}
