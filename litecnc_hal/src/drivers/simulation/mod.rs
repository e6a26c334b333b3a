//! Simulation transport module.
//!
//! This module provides a simulated FPGA board for development and testing
//! without physical hardware.

mod fpga;

pub use fpga::SimulatedFpga;

use litecnc_common::hal::config::BoardConfig;
use litecnc_common::hal::driver::Transport;

/// Factory function to create a simulated board for `config`.
pub fn create_transport(config: &BoardConfig) -> Box<dyn Transport> {
    Box::new(SimulatedFpga::new(config))
}
