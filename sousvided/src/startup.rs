//! Run preparation
//!
//! Opens the transport first and the telemetry file second, so a port that
//! cannot be opened leaves no empty telemetry file behind.

use crate::telemetry::TelemetryLogger;
use sousvide_core::{ControllerConfig, Result};
use sousvide_hardware::{BathModel, ChunkReceiver, SerialChannel, SerialTransport, SimulatedBath};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Everything a run needs, ready to hand to the control loop
pub struct Prepared {
    pub transport: Arc<dyn SerialTransport>,
    pub chunks: ChunkReceiver,
    pub logger: TelemetryLogger,
}

/// Open the transport (real port, or a simulated bath when `mock` is set),
/// then create the run's telemetry file in `output_dir`.
pub async fn prepare(config: &ControllerConfig, output_dir: &Path, mock: bool) -> Result<Prepared> {
    let (transport, chunks): (Arc<dyn SerialTransport>, ChunkReceiver) = if mock {
        info!("Mock mode - using a simulated bath");
        let (bath, chunks) = SimulatedBath::new(BathModel::default());
        (Arc::new(bath) as Arc<dyn SerialTransport>, chunks)
    } else {
        info!("Looking for serial port {}...", config.port);
        let (channel, chunks) = SerialChannel::open(&config.port).inspect_err(|e| {
            error!(
                "Could not open serial port {}: {}. Use --mock for testing without hardware.",
                config.port, e
            )
        })?;
        (Arc::new(channel) as Arc<dyn SerialTransport>, chunks)
    };

    let logger = match TelemetryLogger::create(output_dir).await {
        Ok(logger) => logger,
        Err(e) => {
            transport.close().await;
            return Err(e);
        }
    };

    Ok(Prepared {
        transport,
        chunks,
        logger,
    })
}
