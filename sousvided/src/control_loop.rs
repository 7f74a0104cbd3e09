//! Control loop: periodic sampler, notification consumer and lifecycle
//!
//! Two tasks share the transport:
//!
//! - the sampler (this task) requests a sample on a fixed cadence until the
//!   run duration has elapsed or the run is interrupted
//! - the consumer (spawned) drains data-arrival notifications one at a time
//!   through the [`SampleProcessor`]
//!
//! Only the consumer touches the line buffer and the heat state. Outbound
//! writes from both tasks are serialized by the transport.

use crate::processor::{SampleOutcome, SampleProcessor};
use crate::shutdown;
use crate::telemetry::TelemetryLogger;
use sousvide_core::{ControllerConfig, HeatState};
use sousvide_hardware::{ChunkReceiver, HeaterController, SerialTransport};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Wait after opening the port before the first request
pub const HARDWARE_SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// Wait after each sample request, before the sample interval
pub const COMMAND_DELAY: Duration = Duration::from_millis(100);

/// Fixed delays around the configured cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub settle_delay: Duration,
    pub command_delay: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            settle_delay: HARDWARE_SETTLE_DELAY,
            command_delay: COMMAND_DELAY,
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub requests: u64,
    pub failed_requests: u64,
    pub records: u64,
    pub transitions: u64,
    pub unparseable: u64,
    pub overflows: u64,
    pub signal_failures: u64,
    /// Heat state after the last processed sample, before the forced OFF
    pub heat_at_stop: HeatState,
    pub telemetry_path: Option<PathBuf>,
    pub interrupted: bool,
}

#[derive(Debug, Default)]
struct SamplerStats {
    requests: u64,
    failed: u64,
}

pub struct ControlLoop<T: SerialTransport + ?Sized> {
    transport: Arc<T>,
    config: ControllerConfig,
    timing: LoopTiming,
}

impl<T: SerialTransport + ?Sized + 'static> ControlLoop<T> {
    pub fn new(transport: Arc<T>, config: ControllerConfig) -> Self {
        Self {
            transport,
            config,
            timing: LoopTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: LoopTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Run until the configured duration elapses or `interrupt` resolves.
    ///
    /// The heater is forced off and the transport closed on every exit path.
    pub async fn run<W, F>(
        self,
        chunks: ChunkReceiver,
        logger: TelemetryLogger<W>,
        interrupt: F,
    ) -> RunSummary
    where
        W: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let telemetry_path = logger.path().map(|p| p.to_path_buf());
        let heater = HeaterController::new(self.transport.clone(), self.config.band());
        let heat_feed = heater.subscribe();
        let processor = SampleProcessor::new(heater, logger);

        let (stop_tx, stop_rx) = watch::channel(false);
        let consumer = tokio::spawn(consume(processor, chunks, stop_rx));

        let mut sampler = SamplerStats::default();
        let interrupted = tokio::select! {
            _ = self.sample(&mut sampler) => false,
            _ = interrupt => true,
        };
        if interrupted {
            warn!("Run interrupted before the configured duration");
        }

        let stopped = shutdown::force_safe_state(&self.transport, consumer, stop_tx).await;

        // Last published state if the consumer could not be recovered
        let heat_at_stop = stopped.heat_at_stop.unwrap_or_else(|| *heat_feed.borrow());

        let mut summary = RunSummary {
            requests: sampler.requests,
            failed_requests: sampler.failed,
            heat_at_stop,
            telemetry_path,
            interrupted,
            ..RunSummary::default()
        };
        if let Some(processor) = stopped.processor {
            let stats = processor.stats();
            summary.records = processor.logger().records_written();
            summary.transitions = stats.transitions;
            summary.unparseable = stats.unparseable;
            summary.overflows = stats.overflows;
            summary.signal_failures = stats.signal_failures;
        }

        summary
    }

    async fn sample(&self, stats: &mut SamplerStats) {
        sleep(self.timing.settle_delay).await;
        info!("Hardware ready on {}", self.transport.port_name());

        let start = Instant::now();
        loop {
            stats.requests += 1;
            if let Err(e) = self.transport.request_sample().await {
                stats.failed += 1;
                warn!("Sample request failed: {}", e);
            }

            sleep(self.timing.command_delay).await;
            sleep(self.config.sample_interval).await;

            if start.elapsed() > self.config.duration {
                debug!("Run duration of {:?} elapsed", self.config.duration);
                break;
            }
        }
    }
}

/// Drain notifications one at a time until stopped or the stream ends.
async fn consume<T, W>(
    mut processor: SampleProcessor<T, W>,
    mut chunks: ChunkReceiver,
    mut stop: watch::Receiver<bool>,
) -> SampleProcessor<T, W>
where
    T: SerialTransport + ?Sized,
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            chunk = chunks.recv() => {
                let Some(chunk) = chunk else {
                    warn!("Serial notifications ended");
                    break;
                };
                match processor.process_chunk(&chunk).await {
                    Ok(Some(outcome)) => report(&outcome),
                    Ok(None) => {}
                    Err(e) => error!("Failed to record sample: {}", e),
                }
            }
        }
    }

    processor
}

// Transitions and drops are already logged by the processor
fn report(outcome: &SampleOutcome) {
    if let SampleOutcome::Holding { reading, heat } = outcome {
        debug!("Reading {}, heat {}", reading, heat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sousvide_core::{Signal, TelemetryRecord};
    use sousvide_hardware::{BathModel, SerialChannel, SimulatedBath};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn config(target: i32, delta: i32, duration_ms: u64, interval_ms: u64) -> ControllerConfig {
        ControllerConfig {
            target_temperature: target,
            temperature_delta: delta,
            duration: Duration::from_millis(duration_ms),
            sample_interval: Duration::from_millis(interval_ms),
            port: "simulated".to_string(),
        }
    }

    fn no_settle() -> LoopTiming {
        LoopTiming {
            settle_delay: Duration::ZERO,
            command_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_run() {
        let (bath, chunks) = SimulatedBath::scripted(["125\n", "131\n", "126\n", "132\n"]);
        let bath = Arc::new(bath);

        // 4 requests: each cycle is 10ms + 90ms, loop ends once >350ms elapsed
        let summary = ControlLoop::new(bath.clone(), config(130, 0, 350, 90))
            .with_timing(no_settle())
            .run(
                chunks,
                TelemetryLogger::from_writer(Vec::new()),
                std::future::pending(),
            )
            .await;

        assert_eq!(summary.requests, 4);
        assert_eq!(summary.records, 4);
        assert_eq!(summary.transitions, 4);
        assert_eq!(summary.heat_at_stop, HeatState::Off);
        assert!(!summary.interrupted);

        let signals = bath.sent_signals();
        assert_eq!(
            signals,
            vec![
                Signal::RequestTemperature,
                Signal::HeatOn,
                Signal::RequestTemperature,
                Signal::HeatOff,
                Signal::RequestTemperature,
                Signal::HeatOn,
                Signal::RequestTemperature,
                Signal::HeatOff,
                Signal::HeatOff,
            ]
        );
        assert_eq!(bath.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_forces_heat_off() {
        let (bath, chunks) = SimulatedBath::scripted(["100\n"]);
        let bath = Arc::new(bath);

        let summary = ControlLoop::new(bath.clone(), config(130, 0, 60_000, 1_000))
            .with_timing(no_settle())
            .run(
                chunks,
                TelemetryLogger::from_writer(Vec::new()),
                sleep(Duration::from_millis(2_500)),
            )
            .await;

        assert!(summary.interrupted);
        assert_eq!(summary.transitions, 1);
        assert_eq!(summary.heat_at_stop, HeatState::On);
        assert_eq!(bath.sent_signals().last(), Some(&Signal::HeatOff));
        assert!(!bath.is_heating());
        assert_eq!(bath.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_state_includes_sample_in_flight() {
        let (host, mut device) = duplex(64);
        let (channel, chunks) = SerialChannel::from_stream("duplex", host);

        // Answer the first request, then collect bytes until the forced OFF
        let board = tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut buf = [0u8; 8];
            while !seen.contains(&b'0') {
                let n = device.read(&mut buf).await.unwrap();
                for &byte in &buf[..n] {
                    seen.push(byte);
                    if byte == b'2' {
                        device.write_all(b"100\n").await.unwrap();
                    }
                }
            }
            seen
        });

        // Request lands at 100ms, the HeatOn write is still settling at 150ms
        let summary = ControlLoop::new(Arc::new(channel), config(130, 0, 60_000, 1_000))
            .with_timing(no_settle())
            .run(
                chunks,
                TelemetryLogger::from_writer(Vec::new()),
                sleep(Duration::from_millis(150)),
            )
            .await;

        assert!(summary.interrupted);
        assert_eq!(summary.transitions, 1);
        assert_eq!(summary.records, 1);
        assert_eq!(summary.heat_at_stop, HeatState::On);
        assert_eq!(board.await.unwrap(), vec![b'2', b'1', b'0']);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_settle() {
        let (bath, chunks) = SimulatedBath::scripted(Vec::<Vec<u8>>::new());
        let bath = Arc::new(bath);

        let summary = ControlLoop::new(bath.clone(), config(130, 0, 60_000, 1_000))
            .run(
                chunks,
                TelemetryLogger::from_writer(Vec::new()),
                sleep(Duration::from_millis(10)),
            )
            .await;

        assert!(summary.interrupted);
        assert_eq!(summary.requests, 0);
        assert_eq!(bath.sent_signals(), vec![Signal::HeatOff]);
        assert_eq!(bath.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_and_fragments_are_tolerated() {
        let (bath, chunks) = SimulatedBath::scripted(["12", "0\r\n", "ERR\n", "\n", "135\n"]);
        let bath = Arc::new(bath);

        let summary = ControlLoop::new(bath.clone(), config(130, 2, 450, 90))
            .with_timing(no_settle())
            .run(
                chunks,
                TelemetryLogger::from_writer(Vec::new()),
                std::future::pending(),
            )
            .await;

        assert_eq!(summary.requests, 5);
        // "120", "ERR", "135"; the blank line is not a sample
        assert_eq!(summary.records, 3);
        assert_eq!(summary.unparseable, 1);
        assert_eq!(summary.transitions, 2);
        assert_eq!(summary.heat_at_stop, HeatState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_bath_reaches_target() {
        let (bath, chunks) = SimulatedBath::new(BathModel::default());
        let bath = Arc::new(bath);
        let logger = TelemetryLogger::from_writer(Vec::new());

        let summary = ControlLoop::new(bath.clone(), config(80, 0, 30_000, 100))
            .with_timing(no_settle())
            .run(chunks, logger, std::future::pending())
            .await;

        assert!(summary.records > 100);
        assert!(summary.transitions >= 2);
        let temperature = bath.temperature().unwrap();
        assert!(
            (75.0..=85.0).contains(&temperature),
            "bath ended at {}",
            temperature
        );
        assert!(!bath.is_heating());
    }

    #[tokio::test]
    async fn test_records_written_to_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let logger = TelemetryLogger::create(temp_dir.path()).await.unwrap();
        let (bath, chunks) = SimulatedBath::scripted(["125\n", "131\n"]);
        let bath = Arc::new(bath);

        let summary = ControlLoop::new(bath, config(130, 0, 150, 90))
            .with_timing(no_settle())
            .run(chunks, logger, std::future::pending())
            .await;

        let path = summary.telemetry_path.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<_> = contents
            .lines()
            .map(|l| TelemetryRecord::parse_line(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw, "125");
        assert_eq!(records[0].heat, HeatState::On);
        assert_eq!(records[1].raw, "131");
        assert_eq!(records[1].heat, HeatState::Off);
    }
}
