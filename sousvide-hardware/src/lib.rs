//! sousvide-hardware
//!
//! Hardware abstraction crate that contains the serial transport and the
//! heater controller. The daemon uses it to talk to the bath hardware.
//
//! Public API:
//! - `serial_driver::SerialTransport` — transport seam shared by sampler and consumer
//! - `serial_driver::SerialChannel` — tokio-serial backed transport
//! - `heater::HeaterController` — single authority over the heat state
//! - `simulator::SimulatedBath` — transport that models a bath without hardware

pub mod heater;
pub mod serial_driver;
pub mod simulator;

pub use heater::HeaterController;
pub use serial_driver::{
    find_port, is_disconnect_error, Chunk, ChunkReceiver, SerialChannel, SerialTransport,
};
pub use simulator::{BathModel, SimulatedBath};
