//! Error types for the sous-vide controller

use thiserror::Error;

/// Core error type for sous-vide operations
#[derive(Error, Debug)]
pub enum SousVideError {
    /// Missing, malformed or out-of-range settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// No serial port with the requested name exists
    #[error("Serial port not found: {0}")]
    PortNotFound(String),

    /// The port exists but the driver refused to open it
    #[error("Failed to open serial port {port}: {reason}")]
    PortOpen { port: String, reason: String },

    /// Serial I/O errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Device disconnected (USB unplugged, power cycle)
    #[error("Device disconnected: {0}")]
    DeviceDisconnected(String),

    /// The channel was already closed
    #[error("Serial channel closed")]
    ChannelClosed,

    /// A sample line that is not an integer temperature
    #[error("Parse error: {0}")]
    Parse(String),

    /// Telemetry record could not be written or read back
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for sous-vide operations
pub type Result<T> = std::result::Result<T, SousVideError>;

impl From<toml::de::Error> for SousVideError {
    fn from(err: toml::de::Error) -> Self {
        SousVideError::Config(err.to_string())
    }
}
