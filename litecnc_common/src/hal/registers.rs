//! Per-channel register records exchanged with the FPGA.
//!
//! Each record is a fixed group of 32-bit fields in network byte order.
//!
//! | Record          | Direction | Fields                         | Size |
//! |-----------------|-----------|--------------------------------|------|
//! | `PwmRecord`     | write     | period (u32), width (u32)      | 8    |
//! | `EncoderRecord` | read      | counts (i32)                   | 4    |

use crate::consts::REGISTER_SIZE;
use crate::wire::{WireRecord, get_i32, get_u32, put_i32, put_u32};
use static_assertions::const_assert_eq;

/// Period and width registers of one PWM/PDM generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PwmRecord {
    /// Period in FPGA clock ticks (0 selects PDM)
    pub period: u32,
    /// High time in clock ticks, or 16-bit density in PDM mode
    pub width: u32,
}

impl WireRecord for PwmRecord {
    const SIZE: usize = 2 * REGISTER_SIZE;

    fn encode(&self, out: &mut [u8]) {
        put_u32(&mut out[..REGISTER_SIZE], self.period);
        put_u32(&mut out[REGISTER_SIZE..], self.width);
    }

    fn decode(data: &[u8]) -> Self {
        Self {
            period: get_u32(&data[..REGISTER_SIZE]),
            width: get_u32(&data[REGISTER_SIZE..]),
        }
    }
}

/// Raw quadrature counter of one encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderRecord {
    /// Signed edge count as latched by the FPGA
    pub counts: i32,
}

impl WireRecord for EncoderRecord {
    const SIZE: usize = REGISTER_SIZE;

    fn encode(&self, out: &mut [u8]) {
        put_i32(out, self.counts);
    }

    fn decode(data: &[u8]) -> Self {
        Self {
            counts: get_i32(data),
        }
    }
}

const_assert_eq!(PwmRecord::SIZE, 8);
const_assert_eq!(EncoderRecord::SIZE, 4);
