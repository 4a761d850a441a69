//! Events broadcast to observers.

use serde::{Deserialize, Serialize};

use crate::motion::Position;
use crate::queue::CommandId;
use crate::script::Action;

use super::state::StatusSnapshot;

/// Everything an observer can learn about a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Link went up or down.
    Connection {
        /// New link state.
        connected: bool,
    },
    /// Status summary after any state change.
    Status(StatusSnapshot),
    /// Device reported a new position.
    Position {
        /// Merged position.
        position: Position,
    },
    /// Command handed to the device.
    Dispatched {
        /// Command id.
        id: CommandId,
        /// Command kind.
        action: Action,
        /// Watchdog timeout.
        timeout_ms: u64,
    },
    /// Command finished.
    Completed {
        /// Command id.
        id: CommandId,
    },
    /// Failed command re-queued.
    Retrying {
        /// Command id.
        id: CommandId,
        /// Retry number, starting at 1.
        attempt: u32,
        /// Retry budget.
        max_retries: u32,
    },
    /// Command failed; `terminal` when it will not run again.
    Failed {
        /// Command id.
        id: CommandId,
        /// Human-readable cause.
        reason: String,
        /// Retries exhausted or command unserializable.
        terminal: bool,
    },
    /// Device sent an error message.
    DeviceError {
        /// Device message.
        message: String,
        /// Firmware code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
    },
    /// Emergency stop issued.
    EmergencyStop {
        /// Queue id of the STOP.
        id: CommandId,
        /// Sent immediately (false when waiting for reconnect).
        sent: bool,
    },
    /// Emergency command failed; queue cleared and device force-stopped.
    Fatal {
        /// Cause.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_encoding() {
        let event = BridgeEvent::Dispatched {
            id: CommandId(4),
            action: Action::SetSpeed,
            timeout_ms: 5000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "dispatched");
        assert_eq!(json["action"], "SET_SPEED");
        assert_eq!(json["id"], 4);

        let json = serde_json::to_value(BridgeEvent::EmergencyStop {
            id: CommandId(9),
            sent: false,
        })
        .unwrap();
        assert_eq!(json["type"], "emergency_stop");
    }

    #[test]
    fn test_status_flattens_snapshot() {
        let event = BridgeEvent::Status(StatusSnapshot {
            device_connected: false,
            has_script: false,
            is_running: false,
            current_command_index: 0,
            total_commands: 0,
            current_position: Position::origin(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["hasScript"], false);
    }
}
