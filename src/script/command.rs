//! The command model shared by the compiler, planner, queue and bridge.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::motion::{Axis, AxisMap, MotionProfile};

/// Point-to-point move of one or more axes, executed sequentially with its
/// neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveCommand {
    /// Absolute target per axis.
    pub targets: AxisMap<i32>,
    /// Explicit speed override from the script.
    pub speed: Option<f64>,
    /// Explicit acceleration override from the script.
    pub accel: Option<f64>,
    /// Dwell after arriving, in milliseconds.
    pub delay_ms: Option<u32>,
    /// Planner-resolved profile; `None` until planned.
    pub profile: Option<MotionProfile>,
    /// Source line.
    pub line: usize,
}

impl MoveCommand {
    /// Create an unplanned move without overrides.
    pub fn new(targets: AxisMap<i32>, line: usize) -> Self {
        Self {
            targets,
            speed: None,
            accel: None,
            delay_ms: None,
            profile: None,
            line,
        }
    }

    /// Convenience constructor for a single-axis move.
    pub fn single(axis: Axis, target: i32, line: usize) -> Self {
        Self::new([(axis, target)].into_iter().collect(), line)
    }

    /// A move without speed/accel overrides or dwell.
    #[inline]
    pub fn is_simple(&self) -> bool {
        self.speed.is_none() && self.accel.is_none() && self.delay_ms.is_none()
    }
}

/// Multi-axis move where every axis is synchronised to finish together.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCommand {
    /// Absolute target per participating axis.
    pub targets: AxisMap<i32>,
    /// Group-level speed override.
    pub speed: Option<f64>,
    /// Group-level acceleration override.
    pub accel: Option<f64>,
    /// `GROUPSYNC`, or folded by the planner at a `SYNC`.
    pub sync: bool,
    /// Planner-resolved profile of the bottleneck axis.
    pub profile: Option<MotionProfile>,
    /// Source line.
    pub line: usize,
}

impl GroupCommand {
    /// Create an unplanned group.
    pub fn new(targets: AxisMap<i32>, sync: bool, line: usize) -> Self {
        Self {
            targets,
            speed: None,
            accel: None,
            sync,
            profile: None,
            line,
        }
    }
}

/// Device-level run control verbs that travel through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceVerb {
    /// Begin executing.
    Start,
    /// Hold motion.
    Pause,
    /// Continue after a pause.
    Resume,
}

/// Wire-level action name of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Single or multi-axis move
    Move,
    /// Synchronised group move
    Group,
    /// Wait for all axes
    Sync,
    /// Per-axis speed change
    SetSpeed,
    /// Per-axis acceleration change
    SetAccel,
    /// Homing run
    Home,
    /// Set current position as origin
    Zero,
    /// Timed pause
    Delay,
    /// Sensor check
    Detect,
    /// Run control: start
    Start,
    /// Run control: pause
    Pause,
    /// Run control: resume
    Resume,
    /// Emergency stop
    Stop,
    /// Function call (never on the wire)
    Call,
    /// Loop (never on the wire)
    Loop,
}

impl Action {
    /// Upper-case name as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Move => "MOVE",
            Action::Group => "GROUP",
            Action::Sync => "SYNC",
            Action::SetSpeed => "SET_SPEED",
            Action::SetAccel => "SET_ACCEL",
            Action::Home => "HOME",
            Action::Zero => "ZERO",
            Action::Delay => "DELAY",
            Action::Detect => "DETECT",
            Action::Start => "START",
            Action::Pause => "PAUSE",
            Action::Resume => "RESUME",
            Action::Stop => "STOP",
            Action::Call => "CALL",
            Action::Loop => "LOOP",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled MSL command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Point-to-point move.
    Move(MoveCommand),
    /// Synchronised multi-axis move.
    Group(GroupCommand),
    /// Barrier: wait until every axis is idle.
    Sync {
        /// Source line.
        line: usize,
    },
    /// Change the default speed of the named axes.
    SetSpeed {
        /// New speed per axis.
        values: AxisMap<f64>,
        /// Source line.
        line: usize,
    },
    /// Change the default acceleration of the named axes.
    SetAccel {
        /// New acceleration per axis.
        values: AxisMap<f64>,
        /// Source line.
        line: usize,
    },
    /// Run the homing routine; empty means every axis.
    Home {
        /// Axes to home.
        axes: Vec<Axis>,
        /// Source line.
        line: usize,
    },
    /// Declare the current position as origin; empty means every axis.
    Zero {
        /// Axes to zero.
        axes: Vec<Axis>,
        /// Source line.
        line: usize,
    },
    /// Timed pause.
    Delay {
        /// Milliseconds.
        ms: u32,
        /// Source line.
        line: usize,
    },
    /// Check a named sensor (e.g. box presence).
    Detect {
        /// Sensor name.
        sensor: String,
        /// Source line.
        line: usize,
    },
    /// Run control verb.
    Control {
        /// The verb.
        verb: DeviceVerb,
        /// Source line (0 when issued through the control API).
        line: usize,
    },
    /// Emergency stop.
    Stop {
        /// Source line (0 when issued through the control API).
        line: usize,
    },
    /// Call of a named function; removed by expansion.
    Call {
        /// Function name.
        name: String,
        /// Source line.
        line: usize,
    },
    /// Statically unrolled loop; removed by expansion.
    Loop {
        /// Iteration count.
        count: u32,
        /// Loop body.
        body: Vec<Command>,
        /// Source line.
        line: usize,
    },
}

impl Command {
    /// Source line for diagnostics.
    pub fn line(&self) -> usize {
        match self {
            Command::Move(m) => m.line,
            Command::Group(g) => g.line,
            Command::Sync { line }
            | Command::SetSpeed { line, .. }
            | Command::SetAccel { line, .. }
            | Command::Home { line, .. }
            | Command::Zero { line, .. }
            | Command::Delay { line, .. }
            | Command::Detect { line, .. }
            | Command::Control { line, .. }
            | Command::Stop { line }
            | Command::Call { line, .. }
            | Command::Loop { line, .. } => *line,
        }
    }

    /// Wire action of this command.
    pub fn action(&self) -> Action {
        match self {
            Command::Move(_) => Action::Move,
            Command::Group(_) => Action::Group,
            Command::Sync { .. } => Action::Sync,
            Command::SetSpeed { .. } => Action::SetSpeed,
            Command::SetAccel { .. } => Action::SetAccel,
            Command::Home { .. } => Action::Home,
            Command::Zero { .. } => Action::Zero,
            Command::Delay { .. } => Action::Delay,
            Command::Detect { .. } => Action::Detect,
            Command::Control { verb, .. } => match verb {
                DeviceVerb::Start => Action::Start,
                DeviceVerb::Pause => Action::Pause,
                DeviceVerb::Resume => Action::Resume,
            },
            Command::Stop { .. } => Action::Stop,
            Command::Call { .. } => Action::Call,
            Command::Loop { .. } => Action::Loop,
        }
    }

    /// Target positions of motion commands.
    pub fn targets(&self) -> Option<&AxisMap<i32>> {
        match self {
            Command::Move(m) => Some(&m.targets),
            Command::Group(g) => Some(&g.targets),
            _ => None,
        }
    }

    /// Planned profile of motion commands.
    pub fn profile(&self) -> Option<&MotionProfile> {
        match self {
            Command::Move(m) => m.profile.as_ref(),
            Command::Group(g) => g.profile.as_ref(),
            _ => None,
        }
    }

    /// A simple move: no overrides, no dwell.
    pub fn as_simple_move(&self) -> Option<&MoveCommand> {
        match self {
            Command::Move(m) if m.is_simple() => Some(m),
            _ => None,
        }
    }

    /// Executing this command twice in a row has the same effect as once.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Command::Move(_)
                | Command::Group(_)
                | Command::Sync { .. }
                | Command::SetSpeed { .. }
                | Command::SetAccel { .. }
                | Command::Home { .. }
                | Command::Zero { .. }
        )
    }

    /// Copy with source lines zeroed and planner output removed, recursively.
    pub fn normalized(&self) -> Command {
        let mut copy = self.clone();
        copy.strip_annotations();
        copy
    }

    /// Equality ignoring source lines and planner profiles.
    pub fn structurally_eq(&self, other: &Command) -> bool {
        self.normalized() == other.normalized()
    }

    fn strip_annotations(&mut self) {
        match self {
            Command::Move(m) => {
                m.line = 0;
                m.profile = None;
            }
            Command::Group(g) => {
                g.line = 0;
                g.profile = None;
            }
            Command::Loop { line, body, .. } => {
                *line = 0;
                body.iter_mut().for_each(Command::strip_annotations);
            }
            Command::Sync { line }
            | Command::SetSpeed { line, .. }
            | Command::SetAccel { line, .. }
            | Command::Home { line, .. }
            | Command::Zero { line, .. }
            | Command::Delay { line, .. }
            | Command::Detect { line, .. }
            | Command::Control { line, .. }
            | Command::Stop { line }
            | Command::Call { line, .. } => *line = 0,
        }
    }
}
