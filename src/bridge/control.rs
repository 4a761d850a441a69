//! Run control verbs accepted from operators.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::script::{Command, DeviceVerb};

/// Operator control verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlVerb {
    /// Start execution.
    Start,
    /// Hold after the current command.
    Pause,
    /// Continue after a pause.
    Resume,
    /// Emergency stop.
    Stop,
    /// Zero every axis.
    Zero,
    /// Home every axis.
    Home,
}

impl ControlVerb {
    /// Every verb.
    pub const ALL: [ControlVerb; 6] = [
        ControlVerb::Start,
        ControlVerb::Pause,
        ControlVerb::Resume,
        ControlVerb::Stop,
        ControlVerb::Zero,
        ControlVerb::Home,
    ];

    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlVerb::Start => "start",
            ControlVerb::Pause => "pause",
            ControlVerb::Resume => "resume",
            ControlVerb::Stop => "stop",
            ControlVerb::Zero => "zero",
            ControlVerb::Home => "home",
        }
    }

    /// Queued form of the verb; `None` for `stop`, which bypasses the queue.
    pub fn to_command(self) -> Option<Command> {
        let command = match self {
            ControlVerb::Start => Command::Control {
                verb: DeviceVerb::Start,
                line: 0,
            },
            ControlVerb::Pause => Command::Control {
                verb: DeviceVerb::Pause,
                line: 0,
            },
            ControlVerb::Resume => Command::Control {
                verb: DeviceVerb::Resume,
                line: 0,
            },
            ControlVerb::Zero => Command::Zero {
                axes: Vec::new(),
                line: 0,
            },
            ControlVerb::Home => Command::Home {
                axes: Vec::new(),
                line: 0,
            },
            ControlVerb::Stop => return None,
        };
        Some(command)
    }
}

impl fmt::Display for ControlVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlVerb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ControlVerb::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}
