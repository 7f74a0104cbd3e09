//! Sous-vide Core Library
//!
//! Transport-free types and logic for the sous-vide bath controller:
//! heat state and wire signals, the hysteresis decision, line assembly,
//! the telemetry record format and settings.

pub mod config;
pub mod error;
pub mod hysteresis;
pub mod line_assembler;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{default_config_path, ControllerConfig, Settings};
pub use error::*;
pub use hysteresis::HysteresisBand;
pub use line_assembler::{LineAssembler, LineEvent, MAX_LINE_LEN};
pub use telemetry::{telemetry_file_name, TelemetryRecord};
pub use types::*;
