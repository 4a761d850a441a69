//! Device and run state tracked by the bridge.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::motion::Position;

use super::wire::DeviceStatus;

/// Link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No link to the device.
    #[default]
    Disconnected,
    /// Link is up.
    Connected,
}

/// What the bridge knows about the device.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    /// Link state.
    pub connection: ConnectionState,
    /// A command is in flight.
    pub executing: bool,
    /// Last position reported by the device.
    pub current_position: Position,
    /// Pending queue length.
    pub queue_length: usize,
    /// When the last heartbeat arrived.
    pub last_heartbeat: Option<Instant>,
    /// Last reported run state.
    pub device_status: Option<DeviceStatus>,
}

impl DeviceState {
    /// True when the link is up.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }
}

/// Observer-facing status summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Link is up.
    pub device_connected: bool,
    /// A script has been loaded since the last stop.
    pub has_script: bool,
    /// Commands are executing.
    pub is_running: bool,
    /// Script commands finished (completed or dropped).
    pub current_command_index: usize,
    /// Script commands known, finished or not.
    pub total_commands: usize,
    /// Last known position.
    pub current_position: Position,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_uses_camel_case() {
        let snapshot = StatusSnapshot {
            device_connected: true,
            has_script: true,
            is_running: false,
            current_command_index: 2,
            total_commands: 5,
            current_position: Position::origin(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["deviceConnected"], true);
        assert_eq!(json["currentCommandIndex"], 2);
        assert_eq!(json["currentPosition"]["X"], 0);
    }

    #[test]
    fn test_default_is_disconnected() {
        let state = DeviceState::default();
        assert!(!state.is_connected());
        assert!(state.last_heartbeat.is_none());
    }
}
