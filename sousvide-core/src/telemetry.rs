//! Telemetry record format
//!
//! One line per sample: `MM/DD/YYYY HH:MM:SS,<raw text>,<true|false>`.

use crate::error::{Result, SousVideError};
use crate::types::HeatState;
use chrono::{Local, NaiveDateTime, Timelike};

/// Fixed-width, seconds resolution, locale independent
pub const RECORD_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Timestamp embedded in the telemetry file name
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One durable telemetry record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub timestamp: NaiveDateTime,
    pub raw: String,
    pub heat: HeatState,
}

impl TelemetryRecord {
    /// Build a record, truncating the timestamp to whole seconds
    pub fn new(timestamp: NaiveDateTime, raw: impl Into<String>, heat: HeatState) -> Self {
        Self {
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            raw: raw.into(),
            heat,
        }
    }

    /// Record stamped with the local wall clock
    pub fn now(raw: impl Into<String>, heat: HeatState) -> Self {
        Self::new(Local::now().naive_local(), raw, heat)
    }

    /// Render the record as one newline-terminated line
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{}\n",
            self.timestamp.format(RECORD_TIMESTAMP_FORMAT),
            self.raw,
            self.heat.is_on()
        )
    }

    /// Parse a line produced by [`TelemetryRecord::to_line`].
    ///
    /// The raw field may itself contain commas; the first and last commas
    /// delimit it.
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);

        let (timestamp, rest) = line
            .split_once(',')
            .ok_or_else(|| SousVideError::Telemetry(format!("Missing fields: {:?}", line)))?;
        let (raw, heat) = rest
            .rsplit_once(',')
            .ok_or_else(|| SousVideError::Telemetry(format!("Missing heat field: {:?}", line)))?;

        let timestamp = NaiveDateTime::parse_from_str(timestamp, RECORD_TIMESTAMP_FORMAT)
            .map_err(|e| {
                SousVideError::Telemetry(format!("Invalid timestamp {:?}: {}", timestamp, e))
            })?;
        let heat = heat
            .parse::<bool>()
            .map(HeatState::from)
            .map_err(|e| SousVideError::Telemetry(format!("Invalid heat state {:?}: {}", heat, e)))?;

        Ok(Self {
            timestamp,
            raw: raw.to_string(),
            heat,
        })
    }
}

/// Telemetry file name for a run started at `started`
pub fn telemetry_file_name(started: NaiveDateTime) -> String {
    format!("temperature-{}.csv", started.format(FILE_TIMESTAMP_FORMAT))
}
