//! JSON wire protocol between the bridge and the device.
//!
//! Outbound: `{"cmd": "execute", "data": {...}}` or `{"cmd": "stop"}`.
//! Inbound: `{"type": "status" | "position" | "error" | "heartbeat", ...}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;
use crate::motion::AxisMap;

use super::serialize::SerializedCommand;

/// Outbound command verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireCommand {
    /// Execute the attached command.
    Execute,
    /// Halt everything immediately.
    Stop,
}

/// Message sent to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Verb.
    pub cmd: WireCommand,
    /// Payload; absent for a bare stop.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl OutboundMessage {
    /// Wrap a serialized command for execution.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Serialize`] if JSON encoding fails.
    pub fn execute(command: &SerializedCommand) -> Result<Self, DispatchError> {
        let data =
            serde_json::to_value(command).map_err(|e| DispatchError::Serialize(e.to_string()))?;
        Ok(Self {
            cmd: WireCommand::Execute,
            data,
        })
    }

    /// Bare stop, used when the bridge force-stops the device.
    pub fn stop() -> Self {
        Self {
            cmd: WireCommand::Stop,
            data: Value::Null,
        }
    }
}

/// Device-reported run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    /// Ready for the next command.
    Idle,
    /// Executing.
    Busy,
    /// Running a homing routine.
    Homing,
    /// Halted on a fault.
    Error,
    /// Any state this bridge does not know.
    #[serde(other)]
    Unknown,
}

/// Message received from the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceMessage {
    /// Run state, optionally with the current position.
    Status {
        /// Reported state.
        status: DeviceStatus,
        /// Axes the device reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<AxisMap<i32>>,
    },
    /// Position report.
    Position {
        /// Axes the device reported.
        position: AxisMap<i32>,
    },
    /// Explicit fault.
    Error {
        /// Device message.
        #[serde(default, alias = "error")]
        message: String,
        /// Firmware error code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
    },
    /// Liveness ping.
    Heartbeat {
        /// Device uptime, if reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uptime_ms: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::Axis;

    #[test]
    fn test_decode_status_with_position() {
        let msg: DeviceMessage =
            serde_json::from_str(r#"{"type":"status","status":"IDLE","position":{"X":100,"Z":-5}}"#)
                .unwrap();
        match msg {
            DeviceMessage::Status { status, position } => {
                assert_eq!(status, DeviceStatus::Idle);
                let position = position.unwrap();
                assert_eq!(position.get(Axis::Z), Some(&-5));
                assert!(!position.contains(Axis::Y));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_status_and_error_alias() {
        let msg: DeviceMessage =
            serde_json::from_str(r#"{"type":"status","status":"CALIBRATING"}"#).unwrap();
        assert_eq!(
            msg,
            DeviceMessage::Status {
                status: DeviceStatus::Unknown,
                position: None
            }
        );

        let msg: DeviceMessage =
            serde_json::from_str(r#"{"type":"error","error":"limit hit","code":7}"#).unwrap();
        assert_eq!(
            msg,
            DeviceMessage::Error {
                message: "limit hit".into(),
                code: Some(7)
            }
        );
    }

    #[test]
    fn test_bare_stop_has_no_data() {
        let json = serde_json::to_string(&OutboundMessage::stop()).unwrap();
        assert_eq!(json, r#"{"cmd":"stop"}"#);
    }
}
