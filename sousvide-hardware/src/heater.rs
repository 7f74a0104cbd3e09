//! Heater Controller - single authority over the heat state
//!
//! Applies the hysteresis decision to each reading and drives the heater
//! through the shared transport. Other contexts observe the state through a
//! `watch` snapshot only.

use crate::serial_driver::SerialTransport;
use sousvide_core::{HeatState, HysteresisBand, Reading, Result, Signal};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Heater controller interface
///
/// Generic over the transport type, allowing the real `SerialChannel`, the
/// `SimulatedBath`, or mock transports for testing.
pub struct HeaterController<T: SerialTransport + ?Sized = dyn SerialTransport> {
    transport: Arc<T>,
    band: HysteresisBand,
    state: HeatState,
    published: watch::Sender<HeatState>,
}

impl<T: SerialTransport + ?Sized> HeaterController<T> {
    /// Create a controller; the heater is assumed off
    pub fn new(transport: Arc<T>, band: HysteresisBand) -> Self {
        let (published, _) = watch::channel(HeatState::Off);
        Self {
            transport,
            band,
            state: HeatState::Off,
            published,
        }
    }

    pub fn heat_state(&self) -> HeatState {
        self.state
    }

    /// Snapshot feed of committed heat states
    pub fn subscribe(&self) -> watch::Receiver<HeatState> {
        self.published.subscribe()
    }

    /// Evaluate one reading.
    ///
    /// Returns the new state when a transition happened. The state is only
    /// committed once its signal was written; a failed write leaves the state
    /// untouched so the next reading decides again.
    pub async fn apply(&mut self, reading: Reading) -> Result<Option<HeatState>> {
        let Some(next) = self.band.decide(self.state, reading) else {
            debug!(
                "Reading {} (adjusted {}) holds heat {}",
                reading,
                self.band.adjusted(reading),
                self.state
            );
            return Ok(None);
        };

        self.transport.send(next.signal()).await.map_err(|e| {
            warn!("Failed to turn heat {}: {}", next, e);
            e
        })?;

        self.commit(next);
        info!("turning heat {}", next);
        Ok(Some(next))
    }

    /// Force the heater off, regardless of the current state.
    ///
    /// The state is set to `Off` even if the signal cannot be written.
    pub async fn force_off(&mut self) -> Result<()> {
        self.commit(HeatState::Off);
        info!("turning heat OFF");
        self.transport.send(Signal::HeatOff).await
    }

    fn commit(&mut self, state: HeatState) {
        self.state = state;
        self.published.send_replace(state);
    }
}
