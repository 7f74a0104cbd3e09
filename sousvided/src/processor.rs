//! Per-chunk sample pipeline
//!
//! Each delivered chunk goes through line assembly, the heating decision and
//! the telemetry record in one call, so a transition and its record are never
//! split by another arrival.

use crate::telemetry::TelemetryLogger;
use sousvide_core::{HeatState, LineAssembler, LineEvent, Reading, Result, TelemetryRecord};
use sousvide_hardware::{HeaterController, SerialTransport};
use tokio::io::AsyncWrite;
use tracing::{info, warn};

/// What happened to a completed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    /// The reading caused a heat transition
    Transition { reading: Reading, heat: HeatState },
    /// The reading fell inside the dead band
    Holding { reading: Reading, heat: HeatState },
    /// A transition was due but its signal could not be written
    SignalFailed { reading: Reading, heat: HeatState },
    /// The line was not an integer; recorded but ignored for control
    Unparseable { raw: String, heat: HeatState },
    /// An oversized line was discarded; nothing recorded
    Overflow { discarded: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub lines: u64,
    pub transitions: u64,
    pub unparseable: u64,
    pub overflows: u64,
    pub signal_failures: u64,
}

pub struct SampleProcessor<T: SerialTransport + ?Sized, W> {
    assembler: LineAssembler,
    heater: HeaterController<T>,
    logger: TelemetryLogger<W>,
    stats: ProcessorStats,
}

impl<T, W> SampleProcessor<T, W>
where
    T: SerialTransport + ?Sized,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(heater: HeaterController<T>, logger: TelemetryLogger<W>) -> Self {
        Self {
            assembler: LineAssembler::new(),
            heater,
            logger,
            stats: ProcessorStats::default(),
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    pub fn heater(&self) -> &HeaterController<T> {
        &self.heater
    }

    pub fn heater_mut(&mut self) -> &mut HeaterController<T> {
        &mut self.heater
    }

    pub fn logger(&self) -> &TelemetryLogger<W> {
        &self.logger
    }

    pub fn into_logger(self) -> TelemetryLogger<W> {
        self.logger
    }

    /// Feed one delivered chunk.
    ///
    /// Returns `Ok(None)` while a line is still incomplete. An error means the
    /// telemetry record could not be written; the heat decision has already
    /// been applied by then.
    pub async fn process_chunk(&mut self, chunk: &[u8]) -> Result<Option<SampleOutcome>> {
        let raw = match self.assembler.push(chunk) {
            None => return Ok(None),
            Some(LineEvent::Overflow { discarded }) => {
                self.stats.overflows += 1;
                warn!("Discarded oversized sample line ({} bytes)", discarded);
                return Ok(Some(SampleOutcome::Overflow { discarded }));
            }
            Some(LineEvent::Line(raw)) => raw,
        };
        self.stats.lines += 1;

        let outcome = match raw.parse::<Reading>() {
            Ok(reading) => match self.heater.apply(reading).await {
                Ok(Some(heat)) => {
                    self.stats.transitions += 1;
                    SampleOutcome::Transition { reading, heat }
                }
                Ok(None) => SampleOutcome::Holding {
                    reading,
                    heat: self.heater.heat_state(),
                },
                Err(e) => {
                    self.stats.signal_failures += 1;
                    warn!("Heat signal failed, state unchanged: {}", e);
                    SampleOutcome::SignalFailed {
                        reading,
                        heat: self.heater.heat_state(),
                    }
                }
            },
            Err(e) => {
                self.stats.unparseable += 1;
                warn!("Dropping sample for control: {}", e);
                SampleOutcome::Unparseable {
                    raw: raw.clone(),
                    heat: self.heater.heat_state(),
                }
            }
        };

        let record = TelemetryRecord::now(raw, self.heater.heat_state());
        self.logger.append(&record).await?;

        if let SampleOutcome::Transition { reading, heat } = &outcome {
            info!("Reading {} -> heat {}", reading, heat);
        }

        Ok(Some(outcome))
    }
}
