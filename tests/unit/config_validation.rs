//! Unit tests for configuration validation.

use palletizer_motion::config::{parse_config, validate_config, SystemConfig};
use palletizer_motion::error::{ConfigError, Error};

fn config_error(toml: &str) -> ConfigError {
    match parse_config(toml) {
        Err(Error::Config(err)) => err,
        other => panic!("expected config error, got {:?}", other),
    }
}

/// Test that the default configuration is valid.
#[test]
fn test_default_is_valid() {
    assert!(validate_config(&SystemConfig::default()).is_ok());
}

/// Test planner rate validation.
#[test]
fn test_planner_rates() {
    assert_eq!(
        config_error("[planner]\ndefault_speed = 0.0\n"),
        ConfigError::InvalidDefaultSpeed(0.0)
    );
    assert_eq!(
        config_error("[planner]\ndefault_accel = -5.0\n"),
        ConfigError::InvalidDefaultAccel(-5.0)
    );
}

/// Test queue retry budget bounds.
#[test]
fn test_retry_budget() {
    assert!(parse_config("[queue]\nmax_retries = 0\n").is_ok());
    assert!(parse_config("[queue]\nmax_retries = 16\n").is_ok());
    assert_eq!(
        config_error("[queue]\nmax_retries = 17\n"),
        ConfigError::InvalidMaxRetries(17)
    );
}

/// Test compiler and bridge limits.
#[test]
fn test_limits() {
    assert_eq!(
        config_error("[compiler]\nmax_call_depth = 0\n"),
        ConfigError::InvalidCallDepth
    );
    assert_eq!(
        config_error("[bridge]\ncommand_timeout_ms = 0\n"),
        ConfigError::InvalidTimeout(0)
    );
    assert_eq!(
        config_error("[bridge]\ntimeout_duration_factor = -0.5\n"),
        ConfigError::InvalidDurationFactor(-0.5)
    );
    assert_eq!(
        config_error("[bridge]\nreconnect_interval_ms = 0\n"),
        ConfigError::InvalidInterval("reconnect_interval_ms")
    );
    assert_eq!(
        config_error("[bridge]\nevent_capacity = 0\n"),
        ConfigError::InvalidEventCapacity
    );
}

/// Test that a zero duration factor is allowed.
#[test]
fn test_zero_duration_factor() {
    let config = parse_config("[bridge]\ntimeout_duration_factor = 0.0\n").unwrap();
    assert_eq!(config.bridge.timeout_for(10_000), config.bridge.command_timeout_ms);
}
