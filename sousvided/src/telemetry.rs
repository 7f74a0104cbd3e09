//! Append-only telemetry file
//!
//! One file per run, named after the moment it was created. Each record is
//! written with a single `write_all` and flushed before the next sample is
//! processed, so records never interleave.

use chrono::Local;
use sousvide_core::{telemetry_file_name, Result, SousVideError, TelemetryRecord};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Telemetry sink, generic over the writer so tests can capture output
pub struct TelemetryLogger<W = File> {
    sink: W,
    path: Option<PathBuf>,
    records: u64,
}

impl TelemetryLogger<File> {
    /// Create the run's telemetry file inside `dir`
    pub async fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).await.map_err(|e| {
            SousVideError::Telemetry(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let path = dir.join(telemetry_file_name(Local::now().naive_local()));
        let sink = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                SousVideError::Telemetry(format!("Failed to open {}: {}", path.display(), e))
            })?;

        info!("Writing to file {}", path.display());

        Ok(Self {
            sink,
            path: Some(path),
            records: 0,
        })
    }
}

impl<W: AsyncWrite + Unpin + Send> TelemetryLogger<W> {
    pub fn from_writer(sink: W) -> Self {
        Self {
            sink,
            path: None,
            records: 0,
        }
    }

    /// Append one record and flush it
    pub async fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
        let line = record.to_line();

        self.sink
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SousVideError::Telemetry(format!("Write failed: {}", e)))?;
        self.sink
            .flush()
            .await
            .map_err(|e| SousVideError::Telemetry(format!("Flush failed: {}", e)))?;

        self.records += 1;
        debug!("Recorded: {}", line.trim_end());
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// File path, if the logger writes to a file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
