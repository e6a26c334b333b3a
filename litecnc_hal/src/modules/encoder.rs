//! Quadrature encoder channel engine.
//!
//! Turns the raw 32-bit counters latched by the FPGA into position and
//! velocity:
//!
//! - **Position** is normally absolute (`counts / position_scale`). When the
//!   count jumps by more than a 32-bit signed value can hold within one
//!   period, the hardware counter has wrapped: `overflow_occurred` is raised
//!   and position switches to incremental tracking. The next index pulse
//!   re-anchors the absolute position and clears the flag.
//! - **Velocity** is a moving average over the last
//!   [`VELOCITY_AVERAGE_SIZE`] position differences. Index cycles are left
//!   out, the position jump there is not motion.
//!
//! Write layout: one shared index-enable register (`ceil(n / 8)` bytes).
//! Read layout: one shared index-pulse register followed by one
//! [`EncoderRecord`] per channel.

use bitflags::bitflags;
use heapless::HistoryBuffer;
use litecnc_common::consts::{COUNTER_WRAP, SCALE_EPSILON, VELOCITY_AVERAGE_SIZE};
use litecnc_common::hal::config::{BoardConfig, EncoderInstanceConfig};
use litecnc_common::hal::registers::EncoderRecord;
use litecnc_common::wire::{WireReader, WireRecord, WireWriter, shared_register_size};
use std::fmt;
use std::time::Duration;
use tracing::warn;

use super::BoardModule;

bitflags! {
    /// Parameter corrections applied by one read cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EncoderCorrections: u8 {
        /// `position_scale` was too close to zero and reset to 1.0
        const SCALE_RESET = 1 << 0;
    }
}

/// Position tracking mode, selected by `overflow_occurred`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    /// Position derived from the counter every cycle
    Absolute,
    /// Position accumulated from count deltas after a counter wrap
    OverflowCompensated,
}

/// Host-visible signal slots of an encoder channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderPins {
    // ── Inputs ──
    /// Arm the index: the next index pulse re-anchors the position
    pub index_enable: bool,
    /// Counter reset request (reserved for firmware support)
    pub reset: bool,
    /// Use all four quadrature edges
    pub x4_mode: bool,
    /// Counts per position unit
    pub position_scale: f64,

    // ── Outputs ──
    /// Counts after x4/x1 decimation
    pub counts: i32,
    /// An index pulse was seen this cycle
    pub index_pulse: bool,
    /// Position [units]
    pub position: f64,
    /// Velocity [units/s]
    pub velocity: f64,
    /// Velocity [units/min]
    pub velocity_rpm: f64,
    /// The counter wrapped since the last index pulse
    pub overflow_occurred: bool,
}

impl EncoderPins {
    /// Initial values from the channel configuration.
    pub fn from_config(config: &EncoderInstanceConfig) -> Self {
        Self {
            index_enable: false,
            reset: false,
            x4_mode: config.x4_mode,
            position_scale: config.position_scale.unwrap_or(1.0),
            counts: 0,
            index_pulse: false,
            position: 0.0,
            velocity: 0.0,
            velocity_rpm: 0.0,
            overflow_occurred: false,
        }
    }
}

/// Slot names exposed per encoder channel, relative to the channel base name.
pub const ENCODER_PIN_NAMES: [&str; 10] = [
    "counts",
    "index_enable",
    "index_pulse",
    "position",
    "reset",
    "velocity",
    "velocity_rpm",
    "overflow_occurred",
    "position_scale",
    "x4_mode",
];

/// Count difference between two consecutive counter samples, corrected for
/// 32-bit wrap-around.
///
/// Returns the corrected delta and whether a wrap was detected. The delta is
/// computed in 64 bits; a result outside the `i32` range can only come from
/// the counter wrapping, so the 32-bit window is added or subtracted.
#[inline]
pub fn unwrap_count_delta(old: i32, new: i32) -> (i64, bool) {
    let delta = new as i64 - old as i64;
    if delta > i32::MAX as i64 {
        (delta - COUNTER_WRAP, true)
    } else if delta < i32::MIN as i64 {
        (delta + COUNTER_WRAP, true)
    } else {
        (delta, false)
    }
}

/// One quadrature encoder.
pub struct EncoderChannel {
    name: String,
    /// Host-visible slots
    pub pins: EncoderPins,
    /// Scale seen last cycle (NaN forces a recompute)
    memo_position_scale: f64,
    position_scale_recip: f64,
    /// Raw counter seen last cycle, before x1 decimation
    raw_counts: i32,
    velocity_history: HistoryBuffer<f64, VELOCITY_AVERAGE_SIZE>,
}

impl fmt::Debug for EncoderChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderChannel")
            .field("name", &self.name)
            .field("pins", &self.pins)
            .field("position_scale_recip", &self.position_scale_recip)
            .field("raw_counts", &self.raw_counts)
            .field("velocity_history", &self.velocity_history.as_slice())
            .finish()
    }
}

impl EncoderChannel {
    /// Create a channel with the given base name.
    pub fn new(name: String, config: &EncoderInstanceConfig) -> Self {
        Self {
            name,
            pins: EncoderPins::from_config(config),
            memo_position_scale: f64::NAN,
            raw_counts: 0,
            position_scale_recip: 1.0,
            velocity_history: HistoryBuffer::new(),
        }
    }

    /// Base slot name (`<board>.encoder.<name>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full slot names of this channel.
    pub fn pin_names(&self) -> impl Iterator<Item = String> + '_ {
        ENCODER_PIN_NAMES
            .iter()
            .map(move |pin| format!("{}.{}", self.name, pin))
    }

    /// Current position tracking mode.
    pub fn tracking_mode(&self) -> TrackingMode {
        if self.pins.overflow_occurred {
            TrackingMode::OverflowCompensated
        } else {
            TrackingMode::Absolute
        }
    }

    /// Apply this cycle's index-pulse bit. A pulse disarms `index_enable`.
    #[inline]
    pub fn latch_index_pulse(&mut self, pulse: bool) {
        if pulse {
            self.pins.index_enable = false;
        }
        self.pins.index_pulse = pulse;
    }

    /// Ingest the raw counter and update position and velocity.
    ///
    /// `recip_dt` is the reciprocal of the scheduling period in seconds.
    pub fn update(&mut self, raw_counts: i32, recip_dt: f64) -> EncoderCorrections {
        let mut corrections = EncoderCorrections::empty();
        let pins = &mut self.pins;

        if pins.position_scale != self.memo_position_scale {
            if pins.position_scale.abs() < SCALE_EPSILON || pins.position_scale.is_nan() {
                pins.position_scale = 1.0;
                corrections |= EncoderCorrections::SCALE_RESET;
            }
            self.position_scale_recip = 1.0 / pins.position_scale;
            self.memo_position_scale = pins.position_scale;
        }

        pins.counts = if pins.x4_mode { raw_counts } else { raw_counts / 4 };

        // Decimated counts never leave the i32 range, so wraps are detected
        // on the raw counter.
        let position_old = pins.position;
        let (raw_delta, wrapped) = unwrap_count_delta(self.raw_counts, raw_counts);
        self.raw_counts = raw_counts;
        let delta = if pins.x4_mode {
            raw_delta as f64
        } else {
            raw_delta as f64 * 0.25
        };
        if wrapped {
            pins.overflow_occurred = true;
        }

        if pins.index_pulse {
            // The counter restarts at the index; it cannot wrap within one
            // index period, so the absolute count is trusted again.
            pins.position = pins.counts as f64 * self.position_scale_recip;
            pins.overflow_occurred = false;
        } else if pins.overflow_occurred {
            pins.position += delta * self.position_scale_recip;
        } else {
            pins.position = pins.counts as f64 * self.position_scale_recip;
        }

        if !pins.index_pulse {
            self.velocity_history
                .write((pins.position - position_old) * recip_dt);
            let sum: f64 = self.velocity_history.as_slice().iter().sum();
            pins.velocity = sum * (1.0 / VELOCITY_AVERAGE_SIZE as f64);
            pins.velocity_rpm = pins.velocity * 60.0;
        }

        corrections
    }
}

/// All encoder channels of a board.
#[derive(Debug)]
pub struct EncoderModule {
    channels: Box<[EncoderChannel]>,
    /// Period seen last cycle
    memo_period: Option<Duration>,
    recip_dt: f64,
}

impl EncoderModule {
    /// Build the channel array from the board configuration.
    pub fn new(config: &BoardConfig) -> Self {
        let channels = config
            .encoders
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                EncoderChannel::new(config.encoder_base_name(index), instance)
            })
            .collect();
        Self {
            channels,
            memo_period: None,
            recip_dt: 0.0,
        }
    }

    /// Channels in register order.
    pub fn channels(&self) -> &[EncoderChannel] {
        &self.channels
    }

    /// Mutable access to the channels; the array itself never resizes.
    pub fn channels_mut(&mut self) -> &mut [EncoderChannel] {
        &mut self.channels
    }

    /// Reciprocal of the scheduling period [1/s], shared by all channels.
    pub fn recip_dt(&self) -> f64 {
        self.recip_dt
    }

    fn update_period(&mut self, period: Duration) {
        if self.memo_period == Some(period) {
            return;
        }
        if period.is_zero() {
            warn!("Zero scheduling period, keeping previous velocity time base");
            return;
        }
        self.recip_dt = 1.0 / period.as_secs_f64();
        self.memo_period = Some(period);
    }
}

impl BoardModule for EncoderModule {
    fn write_size(&self) -> usize {
        shared_register_size(self.channels.len())
    }

    fn read_size(&self) -> usize {
        shared_register_size(self.channels.len()) + self.channels.len() * EncoderRecord::SIZE
    }

    fn prepare_write(&mut self, writer: &mut WireWriter<'_>) {
        writer.pack_flags(self.channels.iter().map(|channel| channel.pins.index_enable));
    }

    fn process_read(&mut self, reader: &mut WireReader<'_>, period: Duration) {
        self.update_period(period);

        let channels = &mut self.channels;
        let count = channels.len();
        reader.unpack_flags(count, |index, pulse| channels[index].latch_index_pulse(pulse));

        let recip_dt = self.recip_dt;
        for channel in self.channels.iter_mut() {
            let record: EncoderRecord = reader.get_record();
            let corrections = channel.update(record.counts, recip_dt);
            if !corrections.is_empty() {
                warn!(
                    channel = channel.name(),
                    ?corrections,
                    "Encoder parameters out of range, corrected"
                );
            }
        }
    }
}
