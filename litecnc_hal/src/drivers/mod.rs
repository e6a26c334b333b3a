//! Transport implementations.
//!
//! - [`simulation`] - Simulated FPGA for development and testing
//!
//! # Adding New Transports
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `Transport` trait from `litecnc_common::hal::driver`
//! 3. Register its factory in [`register_all_transports`]

pub mod simulation;

use crate::transport_registry::TransportRegistry;

/// Register all built-in transports.
pub fn register_all_transports(registry: &mut TransportRegistry) {
    registry.register("simulation", simulation::create_transport);
}
