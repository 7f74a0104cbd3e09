//! Sous-vide daemon library
//!
//! The control loop and its collaborators, used by the `sousvided` binary.
//!
//! ```no_run
//! use sousvided::control_loop::ControlLoop;
//! use sousvided::telemetry::TelemetryLogger;
//! use sousvide_hardware::{BathModel, SimulatedBath};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = sousvided::config::load_controller_config(Path::new("settings.toml")).await?;
//! let (bath, chunks) = SimulatedBath::new(BathModel::default());
//! let logger = TelemetryLogger::create(Path::new(".")).await?;
//!
//! let summary = ControlLoop::new(Arc::new(bath), config)
//!     .run(chunks, logger, std::future::pending())
//!     .await;
//! println!("{} records", summary.records);
//! # Ok(())
//! # }
//! ```

/// Settings file loading.
pub mod config;

/// Sampler, notification consumer and run lifecycle.
pub mod control_loop;

/// Per-chunk pipeline: assembly, decision, record.
pub mod processor;

/// Forced heat-off and port release on exit.
pub mod shutdown;

/// Transport and telemetry file setup before a run.
pub mod startup;

/// Append-only CSV telemetry.
pub mod telemetry;
