//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::{BridgeConfig, QueueConfig, SystemConfig};

/// Validate a system configuration.
///
/// Checks:
/// - Call depth is non-zero
/// - Default speed and acceleration are positive
/// - Retry budget is within range
/// - Timeouts, intervals and channel capacity are usable
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    if config.compiler.max_call_depth == 0 {
        return Err(Error::Config(ConfigError::InvalidCallDepth));
    }

    let planner = &config.planner;
    if !(planner.default_speed.is_finite() && planner.default_speed > 0.0) {
        return Err(Error::Config(ConfigError::InvalidDefaultSpeed(
            planner.default_speed,
        )));
    }
    if !(planner.default_accel.is_finite() && planner.default_accel > 0.0) {
        return Err(Error::Config(ConfigError::InvalidDefaultAccel(
            planner.default_accel,
        )));
    }

    if config.queue.max_retries > QueueConfig::MAX_RETRIES_LIMIT {
        return Err(Error::Config(ConfigError::InvalidMaxRetries(
            config.queue.max_retries,
        )));
    }

    validate_bridge(&config.bridge)
}

fn validate_bridge(bridge: &BridgeConfig) -> Result<()> {
    if bridge.command_timeout_ms == 0 {
        return Err(Error::Config(ConfigError::InvalidTimeout(
            bridge.command_timeout_ms,
        )));
    }

    // Factor 0 disables the duration term
    if !(bridge.timeout_duration_factor.is_finite() && bridge.timeout_duration_factor >= 0.0) {
        return Err(Error::Config(ConfigError::InvalidDurationFactor(
            bridge.timeout_duration_factor,
        )));
    }

    if bridge.reconnect_interval_ms == 0 {
        return Err(Error::Config(ConfigError::InvalidInterval(
            "reconnect_interval_ms",
        )));
    }
    if bridge.optimize_interval_ms == 0 {
        return Err(Error::Config(ConfigError::InvalidInterval(
            "optimize_interval_ms",
        )));
    }

    if bridge.event_capacity == 0 {
        return Err(Error::Config(ConfigError::InvalidEventCapacity));
    }

    Ok(())
}
