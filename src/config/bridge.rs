//! Device bridge configuration.

use std::time::Duration;

use serde::Deserialize;

/// Link, watchdog and event settings for one device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `host:port` of the device link.
    pub address: String,

    /// Base response timeout for every command.
    pub command_timeout_ms: u64,

    /// Multiplier on the planned duration added to the base timeout.
    pub timeout_duration_factor: f64,

    /// Delay between reconnection attempts.
    pub reconnect_interval_ms: u64,

    /// Period of the queue optimizer.
    pub optimize_interval_ms: u64,

    /// Capacity of the observer broadcast channel.
    pub event_capacity: usize,
}

impl BridgeConfig {
    /// Reconnection delay as a [`Duration`].
    #[inline]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Optimizer period as a [`Duration`].
    #[inline]
    pub fn optimize_interval(&self) -> Duration {
        Duration::from_millis(self.optimize_interval_ms)
    }

    /// Timeout for a command whose planned motion takes `duration_ms`.
    pub fn timeout_for(&self, duration_ms: u64) -> u64 {
        let extra = (duration_ms as f64 * self.timeout_duration_factor).ceil();
        self.command_timeout_ms.saturating_add(extra as u64)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7070".to_string(),
            command_timeout_ms: 5000,
            timeout_duration_factor: 2.0,
            reconnect_interval_ms: 2000,
            optimize_interval_ms: 1000,
            event_capacity: 256,
        }
    }
}
