//! Serial driver for low-level hardware communication
//!
//! Provides async single-byte signalling to the heater board and forwards
//! every chunk the board sends back into a bounded queue.

use async_trait::async_trait;
use sousvide_core::{Result, Signal, SousVideError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

/// Line speed of the reference hardware (8N1, no flow control)
pub const BAUD_RATE: u32 = 9600;

/// Timeout used when opening the port
pub const OPEN_TIMEOUT_MS: u64 = 2000;

/// Wait before every write so the board can settle
pub const SIGNAL_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Chunks buffered between the reader task and the consumer
pub const CHUNK_QUEUE_CAPACITY: usize = 64;

const READ_BUFFER_SIZE: usize = 256;
const READ_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Raw bytes delivered by one read
pub type Chunk = Vec<u8>;

/// Data-arrival notifications, one message per delivered chunk
pub type ChunkReceiver = mpsc::Receiver<Chunk>;

/// Trait for serial transport abstraction
///
/// Shared between the periodic sampler and the notification consumer, so all
/// methods take `&self` and implementations serialize writes internally.
#[async_trait]
pub trait SerialTransport: Send + Sync {
    /// Write a single control byte. At most one write is in flight.
    async fn send(&self, signal: Signal) -> Result<()>;

    /// Ask the board for a temperature sample
    async fn request_sample(&self) -> Result<()> {
        self.send(Signal::RequestTemperature).await
    }

    /// Release the port and stop notifications.
    ///
    /// Returns `true` only for the call that actually closed the transport.
    async fn close(&self) -> bool;

    /// Check if the transport is still open
    fn is_open(&self) -> bool;

    /// Port identifier, for logging
    fn port_name(&self) -> &str;
}

/// Serial channel over a byte stream, normally a real serial port
pub struct SerialChannel<S = SerialStream> {
    port_name: String,
    writer: Mutex<Option<WriteHalf<S>>>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
    open: AtomicBool,
}

impl SerialChannel<SerialStream> {
    /// Open the named port and start forwarding received bytes.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`SousVideError::PortNotFound`] if no port has that name
    /// - [`SousVideError::PortOpen`] on any driver-level failure
    pub fn open(port_name: &str) -> Result<(Self, ChunkReceiver)> {
        find_port(port_name)?;

        debug!("Opening serial port: {}", port_name);

        let stream = tokio_serial::new(port_name, BAUD_RATE)
            .timeout(Duration::from_millis(OPEN_TIMEOUT_MS))
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", port_name, e);
                SousVideError::PortOpen {
                    port: port_name.to_string(),
                    reason: e.to_string(),
                }
            })?;

        info!("Serial port {} opened ({} baud, 8N1)", port_name, BAUD_RATE);

        Ok(Self::from_stream(port_name, stream))
    }
}

impl<S> SerialChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap an already open stream and start forwarding received bytes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream(port_name: &str, stream: S) -> (Self, ChunkReceiver) {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(CHUNK_QUEUE_CAPACITY);

        let name = port_name.to_string();
        let reader = tokio::spawn(async move {
            if let Err(e) = read_loop(&name, read_half, tx).await {
                error!("Serial port {} lost: {}", name, e);
            }
        });

        let channel = Self {
            port_name: port_name.to_string(),
            writer: Mutex::new(Some(write_half)),
            reader: std::sync::Mutex::new(Some(reader)),
            open: AtomicBool::new(true),
        };

        (channel, rx)
    }
}

impl<S> SerialChannel<S> {
    fn take_reader(&self) -> Option<JoinHandle<()>> {
        self.reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

#[async_trait]
impl<S> SerialTransport for SerialChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&self, signal: Signal) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SousVideError::ChannelClosed)?;

        tokio::time::sleep(SIGNAL_SETTLE_DELAY).await;

        debug!("TX: {:?} ({:?})", signal, signal.as_byte() as char);

        writer.write_all(&[signal.as_byte()]).await.map_err(|e| {
            error!("Write failed: {}", e);
            SousVideError::Serial(format!("Write failed: {}", e))
        })?;

        // Flush to ensure data is sent
        writer
            .flush()
            .await
            .map_err(|e| SousVideError::Serial(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    async fn close(&self) -> bool {
        if !self.open.swap(false, Ordering::SeqCst) {
            debug!("Serial port {} already closed", self.port_name);
            return false;
        }

        if let Some(reader) = self.take_reader() {
            reader.abort();
        }
        // Dropping the write half releases the port once the reader is gone
        self.writer.lock().await.take();

        info!("Serial port {} closed", self.port_name);
        true
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl<S> Drop for SerialChannel<S> {
    fn drop(&mut self) {
        if let Some(reader) = self.take_reader() {
            reader.abort();
        }
    }
}

/// Forward every read chunk to the consumer until the receiver goes away.
///
/// Returns an error once the device is gone (EOF or a disconnect-class read
/// error). Dropping `tx` on return ends the notification stream.
async fn read_loop<R>(port_name: &str, mut port: R, tx: mpsc::Sender<Chunk>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];

    loop {
        match port.read(&mut buf).await {
            Ok(0) => {
                // EOF indicates device disconnection (USB unplugged, power loss, etc.)
                return Err(SousVideError::DeviceDisconnected(format!(
                    "{} returned EOF",
                    port_name
                )));
            }
            Ok(n) => {
                debug!("RX: {:?}", String::from_utf8_lossy(&buf[..n]));
                if tx.send(buf[..n].to_vec()).await.is_err() {
                    debug!("Chunk receiver dropped, stopping reader for {}", port_name);
                    return Ok(());
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::Interrupted
                        | std::io::ErrorKind::WouldBlock
                ) =>
            {
                continue;
            }
            Err(e) => {
                let err = SousVideError::Serial(format!("Read error: {}", e));
                if is_disconnect_error(&err) {
                    return Err(err);
                }
                warn!("Read error on {}, chunk abandoned: {}", port_name, e);
                tokio::time::sleep(READ_ERROR_PAUSE).await;
            }
        }
    }
}

/// Determine if an error indicates device disconnection
///
/// Returns `true` if the error suggests the device has been disconnected
/// (USB unplugged, power loss, etc.) rather than a transient error.
pub fn is_disconnect_error(err: &SousVideError) -> bool {
    match err {
        SousVideError::DeviceDisconnected(_) | SousVideError::ChannelClosed => true,
        SousVideError::Serial(msg) => {
            let msg_lower = msg.to_lowercase();
            msg_lower.contains("broken pipe")
                || msg_lower.contains("no such device")
                || msg_lower.contains("device disconnected")
                || msg_lower.contains("device not configured")
                || msg_lower.contains("input/output error")
        }
        _ => false,
    }
}

/// Find a serial port by exact name
///
/// Scans the ports the OS reports and returns the matching name.
pub fn find_port(port_name: &str) -> Result<String> {
    debug!("Searching for serial port {}", port_name);

    let ports = tokio_serial::available_ports().map_err(|e| {
        error!("Failed to enumerate serial ports: {}", e);
        SousVideError::PortOpen {
            port: port_name.to_string(),
            reason: format!("Failed to enumerate ports: {}", e),
        }
    })?;

    for port in ports {
        debug!("Checking port: {}", port.port_name);
        if port.port_name == port_name {
            debug!("Found serial port {}", port.port_name);
            return Ok(port.port_name);
        }
    }

    error!("Could not find serial port {}", port_name);
    Err(SousVideError::PortNotFound(port_name.to_string()))
}
