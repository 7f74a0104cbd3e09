//! Simulated water bath
//!
//! A [`SerialTransport`] that answers sample requests without hardware.
//! Used by mock mode and by tests that need a deterministic device.

use crate::serial_driver::{Chunk, ChunkReceiver, SerialTransport, CHUNK_QUEUE_CAPACITY};
use async_trait::async_trait;
use sousvide_core::{Result, Signal, SousVideError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// First-order thermal model, in degrees per sample
#[derive(Debug, Clone, Copy)]
pub struct BathModel {
    pub temperature: f64,
    pub ambient: f64,
    /// Rise per sample while the heater is on
    pub heating_rate: f64,
    /// Fraction of the gap to ambient lost per sample
    pub loss_factor: f64,
}

impl Default for BathModel {
    fn default() -> Self {
        Self {
            temperature: 70.0,
            ambient: 70.0,
            heating_rate: 1.5,
            loss_factor: 0.01,
        }
    }
}

impl BathModel {
    fn step(&mut self, heating: bool) {
        if heating {
            self.temperature += self.heating_rate;
        }
        self.temperature -= (self.temperature - self.ambient) * self.loss_factor;
    }
}

enum Source {
    Model(BathModel),
    Script(VecDeque<Chunk>),
}

struct BathState {
    source: Source,
    heating: bool,
}

impl BathState {
    /// Bytes the device would send in reply to a sample request
    fn reply(&mut self) -> Option<Chunk> {
        match &mut self.source {
            Source::Model(model) => {
                let line = format!("{}\r\n", model.temperature.round() as i64);
                model.step(self.heating);
                Some(line.into_bytes())
            }
            Source::Script(chunks) => chunks.pop_front(),
        }
    }
}

/// Simulated serial device
pub struct SimulatedBath {
    state: Mutex<BathState>,
    chunks: Mutex<Option<mpsc::Sender<Chunk>>>,
    sent: Mutex<Vec<Signal>>,
    open: AtomicBool,
    closes: AtomicU32,
}

impl SimulatedBath {
    /// Bath driven by a thermal model
    pub fn new(model: BathModel) -> (Self, ChunkReceiver) {
        info!(
            "Simulated bath at {:.1} degrees (ambient {:.1})",
            model.temperature, model.ambient
        );
        Self::with_source(Source::Model(model))
    }

    /// Bath that answers each sample request with the next scripted chunk
    pub fn scripted<I, C>(chunks: I) -> (Self, ChunkReceiver)
    where
        I: IntoIterator<Item = C>,
        C: Into<Chunk>,
    {
        Self::with_source(Source::Script(
            chunks.into_iter().map(Into::into).collect(),
        ))
    }

    fn with_source(source: Source) -> (Self, ChunkReceiver) {
        let (tx, rx) = mpsc::channel(CHUNK_QUEUE_CAPACITY);
        let bath = Self {
            state: Mutex::new(BathState {
                source,
                heating: false,
            }),
            chunks: Mutex::new(Some(tx)),
            sent: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            closes: AtomicU32::new(0),
        };
        (bath, rx)
    }

    /// Every signal received, in order
    pub fn sent_signals(&self) -> Vec<Signal> {
        lock(&self.sent).clone()
    }

    /// Number of calls that actually closed the device
    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Whether the simulated heater is currently on
    pub fn is_heating(&self) -> bool {
        lock(&self.state).heating
    }

    /// Current modelled temperature; `None` for scripted baths
    pub fn temperature(&self) -> Option<f64> {
        match &lock(&self.state).source {
            Source::Model(model) => Some(model.temperature),
            Source::Script(_) => None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl SerialTransport for SimulatedBath {
    async fn send(&self, signal: Signal) -> Result<()> {
        if !self.is_open() {
            return Err(SousVideError::ChannelClosed);
        }

        debug!("SIM TX: {:?}", signal);
        lock(&self.sent).push(signal);

        let reply = {
            let mut state = lock(&self.state);
            match signal {
                Signal::HeatOn => {
                    state.heating = true;
                    None
                }
                Signal::HeatOff => {
                    state.heating = false;
                    None
                }
                Signal::RequestTemperature => state.reply(),
            }
        };

        if let Some(chunk) = reply {
            if let Some(tx) = lock(&self.chunks).as_ref() {
                if let Err(e) = tx.try_send(chunk) {
                    warn!("Simulated reply dropped: {}", e);
                }
            }
        }

        Ok(())
    }

    async fn close(&self) -> bool {
        if !self.open.swap(false, Ordering::SeqCst) {
            return false;
        }
        // Dropping the sender ends the notification stream
        lock(&self.chunks).take();
        self.closes.fetch_add(1, Ordering::SeqCst);
        info!("Simulated bath closed");
        true
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn port_name(&self) -> &str {
        "simulated"
    }
}
