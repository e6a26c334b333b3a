//! PWM/PDM channel engine.
//!
//! Converts the commanded value of each channel into the period and width
//! registers of the FPGA generator:
//!
//! ```text
//! duty_cycle = clamp(max(value / scale + offset, 0), min_dc, max_dc)
//!
//! PWM (pwm_freq != 0): period = round(clock / pwm_freq)
//!                      width  = round(period * duty_cycle)
//! PDM (pwm_freq == 0): period = 0
//!                      width  = round(0xFFFF * duty_cycle)
//! ```
//!
//! Out-of-range parameters are corrected in place and reported, never
//! rejected: a bad parameter must not stop the machine's PWM output.
//!
//! Write layout: one shared enable register (`ceil(n / 8)` bytes) followed by
//! one [`PwmRecord`] per channel.

use bitflags::bitflags;
use litecnc_common::consts::{MIN_PWM_FREQUENCY, PDM_FULL_SCALE, SCALE_EPSILON};
use litecnc_common::hal::config::{BoardConfig, PwmInstanceConfig};
use litecnc_common::hal::registers::PwmRecord;
use litecnc_common::wire::{WireReader, WireRecord, WireWriter, shared_register_size};
use std::time::Duration;
use tracing::warn;

use super::BoardModule;

bitflags! {
    /// Parameter corrections applied by one write cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PwmCorrections: u8 {
        /// `max_dc` was above 1.0
        const MAX_DC_CAPPED = 1 << 0;
        /// `min_dc` was above `max_dc`
        const MIN_DC_CAPPED = 1 << 1;
        /// `min_dc` was below 0.0
        const MIN_DC_FLOORED = 1 << 2;
        /// `max_dc` was below `min_dc`
        const MAX_DC_RAISED = 1 << 3;
        /// `scale` was too close to zero and reset to 1.0
        const SCALE_RESET = 1 << 4;
        /// `pwm_freq` was below 1 Hz in PWM mode
        const FREQ_FLOORED = 1 << 5;
        /// `pwm_freq` exceeds the clock; period held at one tick
        const PERIOD_FLOORED = 1 << 6;
    }
}

/// Host-visible signal slots of a PWM channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmPins {
    // ── Inputs ──
    /// Generator enable
    pub enable: bool,
    /// Commanded value (in units of `scale`)
    pub value: f64,
    /// Value that corresponds to a 100 % duty cycle
    pub scale: f64,
    /// Duty cycle added after scaling
    pub offset: f64,
    /// Dither request (handled by the firmware)
    pub dither_pwm: bool,
    /// PWM frequency [Hz]; 0 selects PDM
    pub pwm_freq: f64,
    /// Lower duty-cycle limit
    pub min_dc: f64,
    /// Upper duty-cycle limit
    pub max_dc: f64,

    // ── Outputs ──
    /// Duty cycle after quantization
    pub curr_dc: f64,
    /// Achieved PWM frequency [Hz] (0 in PDM mode)
    pub curr_pwm_freq: f64,
    /// Period register
    pub curr_period: u32,
    /// Width register
    pub curr_width: u32,
}

impl PwmPins {
    /// Safe initial values: generator disabled.
    pub fn from_config(config: &PwmInstanceConfig) -> Self {
        Self {
            enable: false,
            value: 0.0,
            scale: config.scale.unwrap_or(1.0),
            offset: config.offset.unwrap_or(0.0),
            dither_pwm: config.dither_pwm,
            pwm_freq: config.initial_pwm_freq(),
            min_dc: config.min_dc.unwrap_or(0.0),
            max_dc: config.max_dc.unwrap_or(1.0),
            curr_dc: 0.0,
            curr_pwm_freq: 0.0,
            curr_period: 0,
            curr_width: 0,
        }
    }
}

/// Slot names exposed per PWM channel, relative to the channel base name.
pub const PWM_PIN_NAMES: [&str; 12] = [
    "enable",
    "value",
    "scale",
    "offset",
    "dither_pwm",
    "pwm_freq",
    "min_dc",
    "max_dc",
    "curr_dc",
    "curr_pwm_freq",
    "curr_period",
    "curr_width",
];

/// Values remembered between cycles to skip divisions.
#[derive(Debug, Clone, Copy)]
struct PwmMemo {
    /// Scale seen last cycle (NaN forces a recompute)
    scale: f64,
    scale_recip: f64,
    /// Frequency seen last cycle (NaN forces a recompute)
    pwm_freq: f64,
    period: u32,
    period_recip: f64,
}

impl Default for PwmMemo {
    fn default() -> Self {
        Self {
            scale: f64::NAN,
            scale_recip: 1.0,
            pwm_freq: f64::NAN,
            period: 0,
            period_recip: 0.0,
        }
    }
}

/// One PWM/PDM generator.
#[derive(Debug, Clone)]
pub struct PwmChannel {
    name: String,
    /// Host-visible slots
    pub pins: PwmPins,
    memo: PwmMemo,
}

impl PwmChannel {
    /// Create a channel with the given base name.
    pub fn new(name: String, config: &PwmInstanceConfig) -> Self {
        Self {
            name,
            pins: PwmPins::from_config(config),
            memo: PwmMemo::default(),
        }
    }

    /// Base slot name (`<board>.pwm.<name>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full slot names of this channel.
    pub fn pin_names(&self) -> impl Iterator<Item = String> + '_ {
        PWM_PIN_NAMES
            .iter()
            .map(move |pin| format!("{}.{}", self.name, pin))
    }

    /// Compute this cycle's registers and publish the output slots.
    ///
    /// `clock_frequency` is the FPGA clock in Hz.
    pub fn prepare(&mut self, clock_frequency: f64) -> (PwmRecord, PwmCorrections) {
        let mut corrections = self.clamp_limits();
        let pins = &mut self.pins;

        if pins.scale != self.memo.scale {
            if pins.scale.abs() < SCALE_EPSILON || pins.scale.is_nan() {
                pins.scale = 1.0;
                corrections |= PwmCorrections::SCALE_RESET;
            }
            self.memo.scale = pins.scale;
            self.memo.scale_recip = 1.0 / pins.scale;
        }

        // Unidirectional: negative commands are rejected, not mirrored.
        let mut duty_cycle = pins.value * self.memo.scale_recip + pins.offset;
        if duty_cycle.is_nan() || duty_cycle < 0.0 {
            duty_cycle = 0.0;
        }
        if duty_cycle > pins.max_dc {
            duty_cycle = pins.max_dc;
        } else if duty_cycle < pins.min_dc {
            duty_cycle = pins.min_dc;
        }

        let record = if pins.pwm_freq != 0.0 {
            if pins.pwm_freq < MIN_PWM_FREQUENCY || pins.pwm_freq.is_nan() {
                pins.pwm_freq = MIN_PWM_FREQUENCY;
                corrections |= PwmCorrections::FREQ_FLOORED;
            }
            if pins.pwm_freq != self.memo.pwm_freq {
                let mut period = (clock_frequency / pins.pwm_freq).round();
                if period < 1.0 {
                    period = 1.0;
                    corrections |= PwmCorrections::PERIOD_FLOORED;
                }
                self.memo.pwm_freq = pins.pwm_freq;
                self.memo.period = period as u32;
                self.memo.period_recip = 1.0 / period;
            }
            let width = (self.memo.period as f64 * duty_cycle).round() as u32;
            pins.curr_dc = width as f64 * self.memo.period_recip;
            pins.curr_pwm_freq = clock_frequency * self.memo.period_recip;
            PwmRecord {
                period: self.memo.period,
                width,
            }
        } else {
            // Leaving PWM mode invalidates the cached period.
            self.memo.pwm_freq = f64::NAN;
            let width = (PDM_FULL_SCALE as f64 * duty_cycle).round() as u32;
            pins.curr_dc = width as f64 / PDM_FULL_SCALE as f64;
            pins.curr_pwm_freq = 0.0;
            PwmRecord { period: 0, width }
        };

        pins.curr_period = record.period;
        pins.curr_width = record.width;
        (record, corrections)
    }

    /// Bring the duty-cycle limits into `0 <= min_dc <= max_dc <= 1`.
    ///
    /// `max_dc` is normalized before `min_dc` is compared against it.
    fn clamp_limits(&mut self) -> PwmCorrections {
        let pins = &mut self.pins;
        let mut corrections = PwmCorrections::empty();

        if pins.max_dc > 1.0 {
            pins.max_dc = 1.0;
            corrections |= PwmCorrections::MAX_DC_CAPPED;
        }
        if pins.min_dc > pins.max_dc {
            pins.min_dc = pins.max_dc;
            corrections |= PwmCorrections::MIN_DC_CAPPED;
        }
        if pins.min_dc < 0.0 || pins.min_dc.is_nan() {
            pins.min_dc = 0.0;
            corrections |= PwmCorrections::MIN_DC_FLOORED;
        }
        if pins.max_dc < pins.min_dc || pins.max_dc.is_nan() {
            pins.max_dc = pins.min_dc;
            corrections |= PwmCorrections::MAX_DC_RAISED;
        }
        corrections
    }
}

/// All PWM channels of a board.
#[derive(Debug)]
pub struct PwmModule {
    clock_frequency: f64,
    channels: Box<[PwmChannel]>,
}

impl PwmModule {
    /// Build the channel array from the board configuration.
    pub fn new(config: &BoardConfig) -> Self {
        let channels = config
            .pwm
            .iter()
            .enumerate()
            .map(|(index, instance)| PwmChannel::new(config.pwm_base_name(index), instance))
            .collect();
        Self {
            clock_frequency: config.clock_frequency as f64,
            channels,
        }
    }

    /// Channels in register order.
    pub fn channels(&self) -> &[PwmChannel] {
        &self.channels
    }

    /// Mutable access to the channels; the array itself never resizes.
    pub fn channels_mut(&mut self) -> &mut [PwmChannel] {
        &mut self.channels
    }
}

impl BoardModule for PwmModule {
    fn write_size(&self) -> usize {
        shared_register_size(self.channels.len()) + self.channels.len() * PwmRecord::SIZE
    }

    fn read_size(&self) -> usize {
        0
    }

    fn prepare_write(&mut self, writer: &mut WireWriter<'_>) {
        writer.pack_flags(self.channels.iter().map(|channel| channel.pins.enable));

        let clock_frequency = self.clock_frequency;
        for channel in self.channels.iter_mut() {
            let (record, corrections) = channel.prepare(clock_frequency);
            if !corrections.is_empty() {
                warn!(
                    channel = channel.name(),
                    ?corrections,
                    "PWM parameters out of range, corrected"
                );
            }
            writer.put_record(&record);
        }
    }

    fn process_read(&mut self, _reader: &mut WireReader<'_>, _period: Duration) {
        // The generators report nothing back.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> PwmChannel {
        PwmChannel::new("test.pwm.00".to_string(), &PwmInstanceConfig::default())
    }

    fn module(count: usize, clock: u32) -> PwmModule {
        let config = BoardConfig {
            name: "test".into(),
            clock_frequency: clock,
            cycle_time_us: 1000,
            log_level: Default::default(),
            pwm: vec![PwmInstanceConfig::default(); count],
            encoders: Vec::new(),
            simulation: Default::default(),
        };
        PwmModule::new(&config)
    }

    #[test]
    fn test_half_duty_at_100khz() {
        let mut ch = channel();
        ch.pins.value = 0.5;
        ch.pins.pwm_freq = 100_000.0;

        let (record, corrections) = ch.prepare(100e6);
        assert_eq!(record, PwmRecord { period: 1000, width: 500 });
        assert!(corrections.is_empty());
        assert_eq!(ch.pins.curr_period, 1000);
        assert_eq!(ch.pins.curr_width, 500);
        assert!((ch.pins.curr_dc - 0.5).abs() < 1e-12);
        assert!((ch.pins.curr_pwm_freq - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_defaults_are_safe() {
        let ch = channel();
        assert!(!ch.pins.enable);
        assert_eq!(ch.pins.scale, 1.0);
        assert_eq!(ch.pins.pwm_freq, 100_000.0);
        assert_eq!(ch.pins.min_dc, 0.0);
        assert_eq!(ch.pins.max_dc, 1.0);
    }

    #[test]
    fn test_negative_command_floors_at_zero() {
        let mut ch = channel();
        ch.pins.value = -0.7;
        let (record, _) = ch.prepare(100e6);
        assert_eq!(record.width, 0);
        assert_eq!(ch.pins.curr_dc, 0.0);
    }

    #[test]
    fn test_limits_clamp_duty_cycle() {
        let mut ch = channel();
        ch.pins.min_dc = 0.2;
        ch.pins.max_dc = 0.8;

        ch.pins.value = 0.95;
        let (record, _) = ch.prepare(100e6);
        assert_eq!(record.width, 800);

        ch.pins.value = 0.05;
        let (record, _) = ch.prepare(100e6);
        assert_eq!(record.width, 200);
    }

    #[test]
    fn test_limit_self_correction_order() {
        let mut ch = channel();
        ch.pins.max_dc = 1.5;
        ch.pins.min_dc = 1.2;
        let (_, corrections) = ch.prepare(100e6);
        assert_eq!(ch.pins.max_dc, 1.0);
        assert_eq!(ch.pins.min_dc, 1.0);
        assert!(corrections.contains(PwmCorrections::MAX_DC_CAPPED | PwmCorrections::MIN_DC_CAPPED));

        let mut ch = channel();
        ch.pins.max_dc = -0.5;
        ch.pins.min_dc = -1.0;
        let (_, corrections) = ch.prepare(100e6);
        assert_eq!(ch.pins.min_dc, 0.0);
        assert_eq!(ch.pins.max_dc, 0.0);
        assert!(corrections.contains(PwmCorrections::MIN_DC_FLOORED | PwmCorrections::MAX_DC_RAISED));
    }

    #[test]
    fn test_limits_hold_for_arbitrary_inputs() {
        let limits = [-2.0, -0.1, 0.0, 0.3, 0.7, 1.0, 1.4];
        let values = [-10.0, -0.5, 0.0, 0.25, 0.5, 0.99, 3.0];
        let scales = [-2.0, 0.5, 1.0, 4.0];
        for &min_dc in &limits {
            for &max_dc in &limits {
                for &value in &values {
                    for &scale in &scales {
                        let mut ch = channel();
                        ch.pins.min_dc = min_dc;
                        ch.pins.max_dc = max_dc;
                        ch.pins.value = value;
                        ch.pins.scale = scale;
                        ch.pins.pwm_freq = 0.0;
                        ch.prepare(100e6);

                        let p = ch.pins;
                        assert!(0.0 <= p.min_dc && p.min_dc <= p.max_dc && p.max_dc <= 1.0);
                        assert!(p.curr_dc >= p.min_dc - 1.0 / 65535.0);
                        assert!(p.curr_dc <= p.max_dc + 1.0 / 65535.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_near_zero_scale_reset() {
        let mut ch = channel();
        ch.pins.scale = 1e-30;
        ch.pins.value = 0.25;
        let (record, corrections) = ch.prepare(100e6);
        assert_eq!(ch.pins.scale, 1.0);
        assert!(corrections.contains(PwmCorrections::SCALE_RESET));
        assert_eq!(record.width, 250);
    }

    #[test]
    fn test_nan_scale_reset() {
        let mut ch = channel();
        ch.pins.scale = f64::NAN;
        ch.pins.value = 0.25;
        let (record, corrections) = ch.prepare(100e6);
        assert_eq!(ch.pins.scale, 1.0);
        assert!(corrections.contains(PwmCorrections::SCALE_RESET));
        assert_eq!(record.width, 250);

        // The reset value is memoized, so the next cycle is clean.
        let (record, corrections) = ch.prepare(100e6);
        assert!(!corrections.contains(PwmCorrections::SCALE_RESET));
        assert_eq!(record.width, 250);
    }

    #[test]
    fn test_scale_and_offset() {
        let mut ch = channel();
        ch.pins.scale = 10.0;
        ch.pins.offset = 0.1;
        ch.pins.value = 4.0;
        let (record, _) = ch.prepare(100e6);
        assert_eq!(record.width, 500);

        // A scale change is picked up on the next cycle.
        ch.pins.scale = 20.0;
        let (record, _) = ch.prepare(100e6);
        assert_eq!(record.width, 300);
    }

    #[test]
    fn test_pdm_mode() {
        let mut ch = channel();
        ch.pins.pwm_freq = 0.0;
        ch.pins.value = 0.5;
        let (record, _) = ch.prepare(100e6);
        assert_eq!(record.period, 0);
        assert_eq!(record.width, 32768);
        assert_eq!(ch.pins.curr_pwm_freq, 0.0);

        ch.pins.value = 2.0;
        let (record, _) = ch.prepare(100e6);
        assert_eq!(record.width, PDM_FULL_SCALE);
    }

    #[test]
    fn test_return_from_pdm_restores_period() {
        let mut ch = channel();
        ch.pins.value = 0.5;
        ch.prepare(100e6);
        ch.pins.pwm_freq = 0.0;
        ch.prepare(100e6);
        ch.pins.pwm_freq = 100_000.0;
        let (record, _) = ch.prepare(100e6);
        assert_eq!(record.period, 1000);
    }

    #[test]
    fn test_frequency_floor() {
        let mut ch = channel();
        ch.pins.pwm_freq = 0.25;
        let (record, corrections) = ch.prepare(1000.0);
        assert_eq!(ch.pins.pwm_freq, 1.0);
        assert_eq!(record.period, 1000);
        assert!(corrections.contains(PwmCorrections::FREQ_FLOORED));
    }

    #[test]
    fn test_frequency_above_clock_holds_one_tick() {
        let mut ch = channel();
        ch.pins.pwm_freq = 1e9;
        ch.pins.value = 1.0;
        let (record, corrections) = ch.prepare(100e6);
        assert_eq!(record.period, 1);
        assert_eq!(record.width, 1);
        assert!(corrections.contains(PwmCorrections::PERIOD_FLOORED));
    }

    #[test]
    fn test_module_layout() {
        let mut pwm = module(9, 100_000_000);
        assert_eq!(pwm.write_size(), 2 + 9 * 8);
        assert_eq!(pwm.read_size(), 0);

        pwm.channels_mut()[0].pins.enable = true;
        pwm.channels_mut()[8].pins.enable = true;
        pwm.channels_mut()[8].pins.value = 0.25;

        let mut buf = vec![0xEEu8; pwm.write_size()];
        let mut writer = WireWriter::new(&mut buf);
        pwm.prepare_write(&mut writer);
        let written = writer.position();
        assert_eq!(written, buf.len());

        assert_eq!(&buf[..2], &[0x80, 0x80]);
        let last = PwmRecord::decode(&buf[2 + 8 * 8..]);
        assert_eq!(last, PwmRecord { period: 1000, width: 250 });
    }

    #[test]
    fn test_pin_names() {
        let ch = channel();
        let names: Vec<String> = ch.pin_names().collect();
        assert_eq!(names.len(), PWM_PIN_NAMES.len());
        assert_eq!(names[0], "test.pwm.00.enable");
        assert_eq!(names[11], "test.pwm.00.curr_width");
    }
}
