//! LiteCNC Common Library
//!
//! This crate provides the shared constants, configuration loading, wire
//! codec and transport contract used by the LiteCNC driver crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Channel limits, register widths and default values
//! - [`config`] - Configuration loading traits and types
//! - [`hal`] - Board configuration, driver errors, transport contract and
//!   register records
//! - [`wire`] - Bit-stream codec for the FPGA transaction buffers
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use litecnc_common::prelude::*;
//!
//! assert_eq!(shared_register_size(9), 2);
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod wire;
