//! Sous-vide Controller
//!
//! Holds a water bath at a target temperature by switching a heater through a
//! serial-connected board, and records every sample to a CSV telemetry file.
//!
//! Settings come from a TOML file (`--config`, then `SOUSVIDE_CONFIG`, then
//! the XDG default). With `--mock` the run uses a simulated bath instead of a
//! serial port.

use anyhow::Result;
use clap::Parser;
use sousvide_core::default_config_path;
use sousvided::config;
use sousvided::control_loop::ControlLoop;
use sousvided::startup::{self, Prepared};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Sous-vide bath controller
#[derive(Parser, Debug)]
#[command(name = "sousvided")]
#[command(version, about = "Sous-vide bath temperature controller", long_about = None)]
struct Args {
    /// Path to settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for telemetry files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Serial device path, overrides `serial.port` (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    port: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable mock mode (run against a simulated bath instead of hardware)
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.verbose);

    info!("Sous-vide controller starting...");

    // Determine config path: CLI flag > env var > default
    let config_path = args.config.unwrap_or_else(|| {
        std::env::var("SOUSVIDE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });

    // Step 1: settings, fail fast before any hardware is touched
    let mut config = config::load_controller_config(&config_path)
        .await
        .inspect_err(|e| error!("Invalid settings: {}", e))?;
    if let Some(port) = args.port {
        info!("Serial port overridden from command line: {}", port);
        config.port = port;
    }

    // Step 2: transport, then the telemetry file
    let Prepared {
        transport,
        chunks,
        logger,
    } = startup::prepare(&config, &args.output_dir, args.mock).await?;

    // Step 3: run until the duration elapses or we are told to stop
    let summary = ControlLoop::new(transport, config)
        .run(chunks, logger, shutdown_signal())
        .await;

    info!(
        "Done: {} requests ({} failed), {} records, {} heat transitions",
        summary.requests, summary.failed_requests, summary.records, summary.transitions
    );
    if summary.unparseable > 0 || summary.overflows > 0 {
        warn!(
            "{} unparseable and {} oversized sample lines",
            summary.unparseable, summary.overflows
        );
    }
    if summary.signal_failures > 0 {
        warn!("{} heat signals failed", summary.signal_failures);
    }
    if let Some(path) = &summary.telemetry_path {
        info!("Telemetry written to {}", path.display());
    }

    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
