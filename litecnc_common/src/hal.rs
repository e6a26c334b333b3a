//! Hardware abstraction layer types shared by the driver crates.
//!
//! This module contains the board configuration, the driver error types and
//! transport contract, and the register records exchanged with the FPGA.

pub mod config;
pub mod driver;
pub mod registers;
