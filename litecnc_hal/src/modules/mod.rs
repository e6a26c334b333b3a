//! Board function modules.
//!
//! Each module owns the channels of one FPGA function and knows its fixed
//! share of the outbound and inbound transaction buffers:
//!
//! - [`pwm`] - PWM/PDM generators (write only)
//! - [`encoder`] - Quadrature encoders (index enable out, counts in)
//!
//! The board calls every module in a fixed order, each one advancing the
//! shared cursor by exactly its configured width.

pub mod encoder;
pub mod pwm;

use litecnc_common::wire::{WireReader, WireWriter};
use std::time::Duration;

/// Contract between the cycle orchestrator and a function module.
///
/// # Timing
/// `prepare_write` and `process_read` run inside the RT cycle: no
/// allocation, no blocking, bounded work per channel.
pub trait BoardModule {
    /// Bytes this module contributes to every outbound transaction.
    fn write_size(&self) -> usize;

    /// Bytes this module consumes from every inbound transaction.
    fn read_size(&self) -> usize;

    /// Encode this module's registers and advance the cursor by `write_size()`.
    fn prepare_write(&mut self, writer: &mut WireWriter<'_>);

    /// Decode this module's registers, advancing the cursor by `read_size()`,
    /// and update the channel state. `period` is the scheduling period.
    fn process_read(&mut self, reader: &mut WireReader<'_>, period: Duration);
}
