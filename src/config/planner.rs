//! Planner defaults.

use serde::Deserialize;

/// Speed and acceleration used for axes the script never configures.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Units per second.
    pub default_speed: f64,

    /// Units per second squared.
    pub default_accel: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_speed: 1000.0,
            default_accel: 500.0,
        }
    }
}
