//! Command to wire-payload translation.
//!
//! Every dispatched command becomes one [`SerializedCommand`]: a JSON object
//! for structured consumers plus a `serial_cmd` line for the axis firmware.

use serde::{Deserialize, Serialize};

use crate::config::BridgeConfig;
use crate::error::DispatchError;
use crate::motion::{Axis, AxisMap, MotionProfile};
use crate::queue::{CommandId, QueuedCommand};
use crate::script::{Action, Command};

/// One axis of a parallel multi-axis step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedStep {
    /// Always `MOVE`.
    pub action: Action,
    /// Axis moved.
    pub axis: Axis,
    /// Absolute target.
    pub position: i32,
    /// Serial line for this axis alone.
    pub serial_cmd: String,
}

/// Wire payload of one dispatched command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedCommand {
    /// Queue id; the device echoes nothing, but observers correlate on it.
    pub id: CommandId,
    /// Command kind.
    pub action: Action,
    /// Axis of single-axis moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axis: Option<Axis>,
    /// Target of single-axis moves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    /// Resolved speed of motion commands; the value of a uniform `SET_SPEED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Firmware command line.
    pub serial_cmd: String,
    /// Whether the bridge waits for an `IDLE` status before the next dispatch.
    pub expect_response: bool,
    /// Watchdog timeout in ms.
    pub timeout: u64,
    /// Expected duration in ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Per-axis sub-steps of multi-axis moves and groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<SerializedStep>>,
    /// Sub-steps run concurrently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
}

/// Builds [`SerializedCommand`]s with the configured timeout policy.
#[derive(Debug, Clone)]
pub struct CommandSerializer {
    config: BridgeConfig,
}

impl CommandSerializer {
    /// Create a serializer using `config`'s timeouts.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Serialize a queued command.
    ///
    /// # Errors
    ///
    /// `CALL` and `LOOP` have no wire form and yield
    /// [`DispatchError::Unserializable`].
    pub fn serialize(&self, item: &QueuedCommand) -> Result<SerializedCommand, DispatchError> {
        let command = &item.command;
        let action = command.action();

        let mut out = SerializedCommand {
            id: item.id,
            action,
            axis: None,
            position: None,
            speed: None,
            serial_cmd: String::new(),
            expect_response: true,
            timeout: 0,
            duration: None,
            commands: None,
            parallel: None,
        };

        match command {
            Command::Move(m) => {
                let speed = m.profile.map(|p| p.max_speed).or(m.speed);
                let accel = m.profile.map(|p| p.acceleration).or(m.accel);
                out.speed = speed;
                out.duration = motion_duration(m.profile.as_ref(), m.delay_ms);

                let mut line = targets_line(&m.targets);
                push_rates(&mut line, speed, accel);
                if let Some(delay) = m.delay_ms {
                    line.push_str(&format!(" D{}", delay));
                }
                out.serial_cmd = line;

                match m.targets.single() {
                    Some((axis, target)) => {
                        out.axis = Some(axis);
                        out.position = Some(*target);
                    }
                    None => {
                        out.commands = Some(steps(&m.targets));
                        out.parallel = Some(true);
                    }
                }
            }
            Command::Group(g) => {
                let speed = g.profile.map(|p| p.max_speed).or(g.speed);
                let accel = g.profile.map(|p| p.acceleration).or(g.accel);
                out.speed = speed;
                out.duration = motion_duration(g.profile.as_ref(), None);

                let mut line = String::from(if g.sync { "GRPS " } else { "GRP " });
                line.push_str(&targets_line(&g.targets));
                push_rates(&mut line, speed, accel);
                out.serial_cmd = line;
                out.commands = Some(steps(&g.targets));
                out.parallel = Some(true);
            }
            Command::Sync { .. } => out.serial_cmd = "SYNC".into(),
            Command::SetSpeed { values, .. } => {
                out.speed = values.uniform_value().copied();
                out.serial_cmd = rates_line("SPD", values);
                out.expect_response = false;
            }
            Command::SetAccel { values, .. } => {
                out.serial_cmd = rates_line("ACC", values);
                out.expect_response = false;
            }
            Command::Home { axes, .. } => out.serial_cmd = axes_line("HOME", axes),
            Command::Zero { axes, .. } => out.serial_cmd = axes_line("ZERO", axes),
            Command::Delay { ms, .. } => {
                out.duration = Some(u64::from(*ms));
                out.serial_cmd = format!("DLY {}", ms);
            }
            Command::Detect { sensor, .. } => out.serial_cmd = format!("DET {}", sensor),
            Command::Control { .. } | Command::Stop { .. } => {
                out.serial_cmd = action.as_str().to_string()
            }
            Command::Call { .. } | Command::Loop { .. } => {
                return Err(DispatchError::Unserializable(action.as_str()))
            }
        }

        out.timeout = self.config.timeout_for(out.duration.unwrap_or(0));
        Ok(out)
    }
}

fn motion_duration(profile: Option<&MotionProfile>, delay_ms: Option<u32>) -> Option<u64> {
    let motion = profile.map(MotionProfile::duration_ms);
    match (motion, delay_ms) {
        (None, None) => None,
        (motion, delay) => Some(motion.unwrap_or(0) + u64::from(delay.unwrap_or(0))),
    }
}

fn targets_line(targets: &AxisMap<i32>) -> String {
    targets
        .iter()
        .map(|(axis, target)| format!("{}{}", axis, target))
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_rates(line: &mut String, speed: Option<f64>, accel: Option<f64>) {
    if let Some(speed) = speed {
        line.push_str(&format!(" F{:.0}", speed));
    }
    if let Some(accel) = accel {
        line.push_str(&format!(" A{:.0}", accel));
    }
}

fn steps(targets: &AxisMap<i32>) -> Vec<SerializedStep> {
    targets
        .iter()
        .map(|(axis, target)| SerializedStep {
            action: Action::Move,
            axis,
            position: *target,
            serial_cmd: format!("{}{}", axis, target),
        })
        .collect()
}

fn rates_line(verb: &str, values: &AxisMap<f64>) -> String {
    let mut line = String::from(verb);
    for (axis, value) in values.iter() {
        line.push_str(&format!(" {}{:.0}", axis, value));
    }
    line
}

fn axes_line(verb: &str, axes: &[Axis]) -> String {
    let mut line = String::from(verb);
    for axis in axes {
        line.push(' ');
        line.push(axis.as_char());
    }
    line
}
