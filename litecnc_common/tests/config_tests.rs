//! Board configuration loading tests.
//!
//! Tests for `BoardConfig` loading from files: the shipped sample config,
//! TOML/JSON selection by extension, missing files, missing required keys
//! and validation of channel limits.

use litecnc_common::config::{ConfigError, ConfigLoader, LogLevel};
use litecnc_common::consts::{DEFAULT_PWM_FREQUENCY, MAX_ENCODER_CHANNELS};
use litecnc_common::hal::config::BoardConfig;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `content` to a temp file with the given suffix.
fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(suffix).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_sample_config_loads_and_validates() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/board.toml");
    let config = BoardConfig::load(&path).expect("sample config");
    config.validate().expect("sample config is valid");

    assert_eq!(config.name, "litecnc.0");
    assert_eq!(config.clock_frequency, 50_000_000);
    assert_eq!(config.pwm.len(), 2);
    assert_eq!(config.encoders.len(), 3);
    assert_eq!(config.pwm[1].initial_pwm_freq(), 0.0);
    assert_eq!(config.pwm_base_name(0), "litecnc.0.pwm.spindle");
    assert_eq!(config.encoder_base_name(2), "litecnc.0.encoder.spindle");
    assert_eq!(
        config.simulation.counts_per_cycle.len(),
        config.encoders.len()
    );
}

#[test]
fn test_toml_file_defaults() {
    let file = write_temp(
        r#"
clock_frequency = 40000000

[[pwm]]
"#,
        ".toml",
    );
    let config = BoardConfig::load(file.path()).unwrap();
    assert_eq!(config.log_level, LogLevel::Info);
    assert_eq!(config.pwm[0].initial_pwm_freq(), DEFAULT_PWM_FREQUENCY);
    assert_eq!(config.pwm[0].scale, None);
    assert!(!config.pwm[0].dither_pwm);
    assert!(config.encoders.is_empty());
}

#[test]
fn test_json_file_by_extension() {
    let file = write_temp(
        r#"{"name": "lathe", "clock_frequency": 50000000, "log_level": "debug",
            "encoders": [{"name": "spindle", "position_scale": 4096.0}]}"#,
        ".json",
    );
    let config = BoardConfig::load(file.path()).unwrap();
    assert_eq!(config.name, "lathe");
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.encoder_base_name(0), "lathe.encoder.spindle");
}

#[test]
fn test_missing_file() {
    let result = BoardConfig::load(Path::new("/nonexistent/litecnc/board.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn test_missing_clock_frequency_is_fatal() {
    let file = write_temp("name = \"mill\"\n[[pwm]]\n", ".toml");
    let result = BoardConfig::load(file.path());
    match result {
        Err(ConfigError::ParseError(msg)) => assert!(msg.contains("clock_frequency")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_encoder_limit() {
    let mut toml = String::from("clock_frequency = 50000000\n");
    for _ in 0..=MAX_ENCODER_CHANNELS {
        toml.push_str("[[encoders]]\n");
    }
    let file = write_temp(&toml, ".toml");
    let config = BoardConfig::load(file.path()).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}
