//! HAL error types and the transport contract.
//!
//! This module defines:
//! - `HalError` enum - Init-time failures of board construction
//! - `TransportError` enum - Faults reported by the transport's write
//! - `Transport` trait - The byte link that moves transactions to the FPGA

use crate::config::ConfigError;
use thiserror::Error;

/// Error types for HAL initialization.
///
/// These are the only caller-visible failures: everything in the per-cycle
/// path self-corrects or is reported as a transport fault.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Board initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// No transport registered under the requested name
    #[error("Transport not found: {0}")]
    TransportNotFound(String),
}

/// Factory building a transport for a validated board configuration.
pub type TransportFactory = fn(&crate::hal::config::BoardConfig) -> Box<dyn Transport>;

impl From<ConfigError> for HalError {
    fn from(err: ConfigError) -> Self {
        HalError::ConfigError(err.to_string())
    }
}

/// Faults reported by a transport write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The board did not answer within the transaction deadline
    #[error("Transaction timed out")]
    Timeout,

    /// Low-level I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// The link is latched in its fault state
    #[error("Transport is faulted")]
    Faulted,
}

/// Byte link between the driver and the FPGA.
///
/// One call to [`Transport::write`] performs a full transaction: the outbound
/// command buffer is sent and the board's answer is kept as the inbound
/// buffer returned by [`Transport::response`], which the next read cycle
/// decodes.
///
/// # Fault model
///
/// `write` is the only operation allowed to raise a fault. Once raised,
/// [`Transport::io_error`] stays true until [`Transport::clear_io_error`] is
/// called from outside the RT cycle.
///
/// # Timing
///
/// `write` runs inside the RT cycle: it must not allocate and must finish
/// within the cycle budget.
pub trait Transport: Send {
    /// Short identifier of the link (e.g. "simulation", "etherbone").
    fn name(&self) -> &str;

    /// True while the link is latched in its fault state.
    fn io_error(&self) -> bool;

    /// Clear a latched fault.
    fn clear_io_error(&mut self);

    /// Perform one transaction with the outbound `data`.
    ///
    /// # Errors
    /// Any error latches the fault indicator.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Inbound bytes of the last completed transaction.
    fn response(&self) -> &[u8];
}
