//! Board configuration types.
//!
//! This module contains the configuration consumed once at init:
//! - `BoardConfig` - Main configuration (clock, channel lists, cycle time)
//! - `PwmInstanceConfig` - Per-channel PWM descriptor and initial values
//! - `EncoderInstanceConfig` - Per-channel encoder descriptor and initial values
//! - `SimulationConfig` - Parameters of the simulated FPGA
//!
//! Array-valued fields are optional: absence means zero channels of that kind.
//! `clock_frequency` is the only required key.

use crate::config::{ConfigError, LogLevel};
use crate::consts::{
    CYCLE_TIME_US, DEFAULT_BOARD_NAME, DEFAULT_PWM_FREQUENCY, MAX_ENCODER_CHANNELS,
    MAX_PWM_CHANNELS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default function for name
fn default_board_name() -> String {
    DEFAULT_BOARD_NAME.to_string()
}

/// Default function for cycle_time_us
fn default_cycle_time_us() -> u32 {
    CYCLE_TIME_US
}

/// Main configuration of one attached board.
///
/// # TOML Example
///
/// ```toml
/// name = "litecnc.0"
/// clock_frequency = 50_000_000
///
/// [[pwm]]
/// name = "spindle"
/// pwm_freq = 20000.0
///
/// [[encoders]]
/// position_scale = 2000.0
/// x4_mode = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board name, prefix of every signal slot.
    #[serde(default = "default_board_name")]
    pub name: String,

    /// FPGA system clock [Hz].
    pub clock_frequency: u32,

    /// RT cycle time in microseconds.
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// PWM/PDM generators, in register order.
    #[serde(default)]
    pub pwm: Vec<PwmInstanceConfig>,

    /// Quadrature encoders, in register order.
    #[serde(default)]
    pub encoders: Vec<EncoderInstanceConfig>,

    /// Simulated FPGA parameters (ignored by hardware transports).
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl BoardConfig {
    /// Validate the board configuration.
    ///
    /// # Validation Rules
    /// 1. `name` not empty
    /// 2. `clock_frequency` > 0
    /// 3. `cycle_time_us` > 0
    /// 4. `pwm.len()` <= MAX_PWM_CHANNELS
    /// 5. `encoders.len()` <= MAX_ENCODER_CHANNELS
    /// 6. Channel names unique within each kind
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "board name cannot be empty".to_string(),
            ));
        }

        if self.clock_frequency == 0 {
            return Err(ConfigError::ValidationError(
                "clock_frequency must be greater than 0".to_string(),
            ));
        }

        if self.cycle_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "cycle_time_us must be greater than 0".to_string(),
            ));
        }

        if self.pwm.len() > MAX_PWM_CHANNELS {
            return Err(ConfigError::ValidationError(format!(
                "Too many PWM channels: {} (max {})",
                self.pwm.len(),
                MAX_PWM_CHANNELS
            )));
        }

        if self.encoders.len() > MAX_ENCODER_CHANNELS {
            return Err(ConfigError::ValidationError(format!(
                "Too many encoder channels: {} (max {})",
                self.encoders.len(),
                MAX_ENCODER_CHANNELS
            )));
        }

        let mut pwm_names = HashSet::new();
        for index in 0..self.pwm.len() {
            let name = self.pwm_base_name(index);
            if !pwm_names.insert(name.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate PWM channel name: {name}"
                )));
            }
        }

        let mut encoder_names = HashSet::new();
        for index in 0..self.encoders.len() {
            let name = self.encoder_base_name(index);
            if !encoder_names.insert(name.clone()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate encoder channel name: {name}"
                )));
            }
        }

        Ok(())
    }

    /// Base slot name of PWM channel `index`: `<board>.pwm.<name|NN>`.
    pub fn pwm_base_name(&self, index: usize) -> String {
        channel_base_name(&self.name, "pwm", index, self.pwm[index].name.as_deref())
    }

    /// Base slot name of encoder channel `index`: `<board>.encoder.<name|NN>`.
    pub fn encoder_base_name(&self, index: usize) -> String {
        channel_base_name(
            &self.name,
            "encoder",
            index,
            self.encoders[index].name.as_deref(),
        )
    }
}

/// Build `<board>.<kind>.<name>`, falling back to the two-digit index.
fn channel_base_name(board: &str, kind: &str, index: usize, name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("{board}.{kind}.{name}"),
        _ => format!("{board}.{kind}.{index:02}"),
    }
}

/// PWM channel descriptor. Every value is the initial content of the
/// corresponding input slot; the host may change it at any time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PwmInstanceConfig {
    /// Optional channel name (default: index).
    #[serde(default)]
    pub name: Option<String>,
    /// Initial PWM frequency [Hz], 0 selects PDM (default 100 kHz).
    #[serde(default)]
    pub pwm_freq: Option<f64>,
    /// Initial scale (default 1.0).
    #[serde(default)]
    pub scale: Option<f64>,
    /// Initial offset (default 0.0).
    #[serde(default)]
    pub offset: Option<f64>,
    /// Initial minimum duty cycle (default 0.0).
    #[serde(default)]
    pub min_dc: Option<f64>,
    /// Initial maximum duty cycle (default 1.0).
    #[serde(default)]
    pub max_dc: Option<f64>,
    /// Initial dither flag (default false).
    #[serde(default)]
    pub dither_pwm: bool,
}

impl PwmInstanceConfig {
    /// Initial PWM frequency, falling back to the default.
    pub fn initial_pwm_freq(&self) -> f64 {
        self.pwm_freq.unwrap_or(DEFAULT_PWM_FREQUENCY)
    }
}

/// Encoder channel descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncoderInstanceConfig {
    /// Optional channel name (default: index).
    #[serde(default)]
    pub name: Option<String>,
    /// Initial counts per position unit (default 1.0).
    #[serde(default)]
    pub position_scale: Option<f64>,
    /// Use all four quadrature edges (default false).
    #[serde(default)]
    pub x4_mode: bool,
}

/// Parameters of the simulated FPGA.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Raw counts added per cycle, per encoder (missing entries = 0).
    #[serde(default)]
    pub counts_per_cycle: Vec<i32>,
    /// Raw counts per revolution; an armed index fires on each boundary.
    /// Zero disables the simulated index.
    #[serde(default)]
    pub counts_per_revolution: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    fn minimal() -> BoardConfig {
        BoardConfig::from_toml_str("clock_frequency = 50000000").unwrap()
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config = minimal();
        assert_eq!(config.name, DEFAULT_BOARD_NAME);
        assert_eq!(config.clock_frequency, 50_000_000);
        assert_eq!(config.cycle_time_us, CYCLE_TIME_US);
        assert!(config.pwm.is_empty());
        assert!(config.encoders.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_clock_frequency_is_parse_error() {
        let result = BoardConfig::from_toml_str("name = \"board\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_zero_clock_frequency_rejected() {
        let mut config = minimal();
        config.clock_frequency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_too_many_channels_rejected() {
        let mut config = minimal();
        config.pwm = vec![PwmInstanceConfig::default(); MAX_PWM_CHANNELS + 1];
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.encoders = vec![EncoderInstanceConfig::default(); MAX_ENCODER_CHANNELS + 1];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_names() {
        let config = BoardConfig::from_toml_str(
            r#"
name = "mill"
clock_frequency = 50000000

[[pwm]]
name = "spindle"

[[pwm]]

[[encoders]]
"#,
        )
        .unwrap();

        assert_eq!(config.pwm_base_name(0), "mill.pwm.spindle");
        assert_eq!(config.pwm_base_name(1), "mill.pwm.01");
        assert_eq!(config.encoder_base_name(0), "mill.encoder.00");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = minimal();
        config.encoders = vec![
            EncoderInstanceConfig {
                name: Some("x".into()),
                ..Default::default()
            },
            EncoderInstanceConfig {
                name: Some("x".into()),
                ..Default::default()
            },
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate encoder"));
    }

    #[test]
    fn test_named_channel_cannot_shadow_index_name() {
        let mut config = minimal();
        config.pwm = vec![
            PwmInstanceConfig {
                name: Some("01".into()),
                ..Default::default()
            },
            PwmInstanceConfig::default(),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_config() {
        let config = BoardConfig::from_json_str(
            r#"{"clock_frequency": 40000000, "pwm": [{"pwm_freq": 0.0}], "encoders": [{"x4_mode": true}]}"#,
        )
        .unwrap();
        assert_eq!(config.pwm[0].initial_pwm_freq(), 0.0);
        assert!(config.encoders[0].x4_mode);
    }
}
