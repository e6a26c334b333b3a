//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use litecnc_common::prelude::*;`.

use std::time::Duration;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel};
pub use crate::hal::config::{BoardConfig, EncoderInstanceConfig, PwmInstanceConfig};

// ─── Errors / Transport ─────────────────────────────────────────────
pub use crate::hal::driver::{HalError, Transport, TransportError, TransportFactory};

// ─── Wire ───────────────────────────────────────────────────────────
pub use crate::hal::registers::{EncoderRecord, PwmRecord};
pub use crate::wire::{WireReader, WireRecord, WireWriter, shared_register_size};

/// Default RT cycle time as Duration.
pub const DEFAULT_CYCLE_TIME: Duration =
    Duration::from_micros(crate::consts::CYCLE_TIME_US as u64);
