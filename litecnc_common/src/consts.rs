//! System-wide constants for the LiteCNC workspace.
//!
//! Single source of truth for channel limits, register widths and the
//! numeric guards used by the channel engines.

/// Maximum number of PWM channels a board firmware can carry.
pub const MAX_PWM_CHANNELS: usize = 32;

/// Maximum number of encoder channels a board firmware can carry.
pub const MAX_ENCODER_CHANNELS: usize = 32;

/// Default RT cycle time in microseconds (1 kHz = 1000 µs).
pub const CYCLE_TIME_US: u32 = 1000;

/// Default board name used as prefix for all signal slots.
pub const DEFAULT_BOARD_NAME: &str = "litecnc.0";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/litecnc/board.toml";

/// Width of one numeric register on the wire, in bytes.
pub const REGISTER_SIZE: usize = 4;

/// Number of velocity samples averaged per encoder channel.
pub const VELOCITY_AVERAGE_SIZE: usize = 8;

/// Full-scale width of a PDM channel (16-bit duty cycle).
pub const PDM_FULL_SCALE: u32 = 0xFFFF;

/// Scales with a magnitude below this value are replaced by 1.0.
pub const SCALE_EPSILON: f64 = 1e-20;

/// Lowest PWM frequency accepted in PWM mode [Hz].
pub const MIN_PWM_FREQUENCY: f64 = 1.0;

/// Default PWM frequency of a freshly created channel [Hz].
pub const DEFAULT_PWM_FREQUENCY: f64 = 100_000.0;

/// Size of the 32-bit counter window used for wrap-around compensation.
pub const COUNTER_WRAP: i64 = 1 << 32;
