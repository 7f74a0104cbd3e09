//! Configuration types for the sous-vide controller
//!
//! # Architecture
//!
//! - [`Settings`] - the raw settings file, one TOML document with dotted keys
//! - [`ControllerConfig`] - validated, immutable settings consumed by the control loop
//!
//! Settings are all-or-nothing: a missing, non-numeric or negative value
//! rejects the whole file and no default is substituted.

mod paths;
mod settings;

pub use paths::default_config_path;
pub use settings::{ControllerConfig, Settings};
