//! Shutdown handling
//!
//! Leaves the heater off and the port released whenever the control loop
//! ends, whether the run completed or was interrupted.

use crate::processor::SampleProcessor;
use sousvide_core::{HeatState, Signal};
use sousvide_hardware::SerialTransport;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What was left once the consumer stopped
pub struct Stopped<T: SerialTransport + ?Sized, W> {
    /// The recovered processor, `None` if the consumer task failed
    pub processor: Option<SampleProcessor<T, W>>,
    /// Heat state after the last processed sample, before the forced OFF
    pub heat_at_stop: Option<HeatState>,
}

/// Stop the notification consumer, force heat off and close the transport.
///
/// The consumer is stopped between wake-ups so a decision and its record are
/// never separated. If the consumer cannot be recovered the OFF signal goes
/// straight to the transport.
///
/// # Arguments
///
/// * `transport` - Shared transport, closed last
/// * `consumer` - Notification consumer task, returns its processor when stopped
/// * `stop` - Stop flag observed by the consumer
pub async fn force_safe_state<T, W>(
    transport: &Arc<T>,
    consumer: JoinHandle<SampleProcessor<T, W>>,
    stop: watch::Sender<bool>,
) -> Stopped<T, W>
where
    T: SerialTransport + ?Sized,
    W: AsyncWrite + Unpin + Send,
{
    info!("Shutting down...");

    // Receiver may already be gone if notifications ended early
    let _ = stop.send(true);

    let mut processor = match consumer.await {
        Ok(processor) => Some(processor),
        Err(e) => {
            error!("Notification consumer failed: {}", e);
            None
        }
    };

    let heat_at_stop = processor.as_ref().map(|p| p.heater().heat_state());

    let result = match processor.as_mut() {
        Some(processor) => processor.heater_mut().force_off().await,
        None => {
            warn!("Heat state unavailable, sending OFF directly");
            transport.send(Signal::HeatOff).await
        }
    };
    if let Err(e) = result {
        error!("Failed to turn heat OFF during shutdown: {}", e);
    }

    if transport.close().await {
        info!("Connection to {} closed", transport.port_name());
    } else {
        debug!("Connection to {} was already closed", transport.port_name());
    }

    Stopped {
        processor,
        heat_at_stop,
    }
}
