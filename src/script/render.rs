//! MSL rendering of commands.
//!
//! Output re-compiles to the same command kinds, axes and positions. Planner
//! profiles are not rendered.

use core::fmt::{self, Write as _};

use crate::motion::{Axis, AxisMap};

use super::command::{Command, DeviceVerb, GroupCommand, MoveCommand};

/// Render a command sequence as MSL, one statement per line.
pub fn render(commands: &[Command]) -> String {
    let mut out = String::new();
    for command in commands {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{};", command);
    }
    out
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move(m) => write_move(f, m),
            Command::Group(g) => write_group(f, g),
            Command::Sync { .. } => f.write_str("SYNC"),
            Command::SetSpeed { values, .. } => write_rates(f, "SPEED", values),
            Command::SetAccel { values, .. } => write_rates(f, "ACCEL", values),
            Command::Home { axes, .. } => write_axes(f, "HOME", axes),
            Command::Zero { axes, .. } => write_axes(f, "ZERO", axes),
            Command::Delay { ms, .. } => write!(f, "DELAY({})", ms),
            Command::Detect { sensor, .. } => write!(f, "DETECT({})", sensor),
            Command::Control { verb, .. } => f.write_str(match verb {
                DeviceVerb::Start => "START",
                DeviceVerb::Pause => "PAUSE",
                DeviceVerb::Resume => "RESUME",
            }),
            Command::Stop { .. } => f.write_str("STOP"),
            Command::Call { name, .. } => write!(f, "CALL({})", name),
            Command::Loop { count, body, .. } => {
                write!(f, "LOOP({}){{", count)?;
                for command in body {
                    write!(f, "{}; ", command)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_move(f: &mut fmt::Formatter<'_>, m: &MoveCommand) -> fmt::Result {
    if let Some((axis, target)) = m.targets.single() {
        write!(f, "{}({}", axis, target)?;
        if let Some(speed) = m.speed {
            write!(f, ",s{}", speed)?;
        }
        if let Some(accel) = m.accel {
            write!(f, ",a{}", accel)?;
        }
        if let Some(delay) = m.delay_ms {
            write!(f, ",d{}", delay)?;
        }
        return f.write_str(")");
    }

    // Multi-axis moves only exist in the legacy word form.
    let mut first = true;
    for (axis, target) in m.targets.iter() {
        if !first {
            f.write_str(" ")?;
        }
        first = false;
        write!(f, "{}{}", axis, target)?;
    }
    if let Some(speed) = m.speed {
        write!(f, " F{}", speed)?;
    }
    if let Some(accel) = m.accel {
        write!(f, " A{}", accel)?;
    }
    if let Some(delay) = m.delay_ms {
        write!(f, " D{}", delay)?;
    }
    Ok(())
}

fn write_group(f: &mut fmt::Formatter<'_>, g: &GroupCommand) -> fmt::Result {
    f.write_str(if g.sync { "GROUPSYNC(" } else { "GROUP(" })?;
    let mut parts: Vec<String> = g
        .targets
        .iter()
        .map(|(axis, target)| format!("{}({})", axis, target))
        .collect();
    if let Some(speed) = g.speed {
        parts.push(format!("s{}", speed));
    }
    if let Some(accel) = g.accel {
        parts.push(format!("a{}", accel));
    }
    write!(f, "{})", parts.join(", "))
}

fn write_rates(f: &mut fmt::Formatter<'_>, name: &str, values: &AxisMap<f64>) -> fmt::Result {
    if let Some(value) = values.uniform_value() {
        return write!(f, "{}({})", name, value);
    }
    if let Some((axis, value)) = values.single() {
        return write!(f, "{}({}, {})", name, axis, value);
    }
    f.write_str(name)?;
    for (axis, value) in values.iter() {
        write!(f, " {}{}", axis, value)?;
    }
    Ok(())
}

fn write_axes(f: &mut fmt::Formatter<'_>, name: &str, axes: &[Axis]) -> fmt::Result {
    if axes.is_empty() {
        return f.write_str(name);
    }
    let list: Vec<String> = axes.iter().map(Axis::to_string).collect();
    write!(f, "{}({})", name, list.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::compile;

    #[test]
    fn test_render_forms() {
        let mut m = MoveCommand::single(Axis::X, 100, 1);
        m.delay_ms = Some(1000);
        assert_eq!(Command::Move(m).to_string(), "X(100,d1000)");

        let mut legacy = MoveCommand::new([(Axis::X, 5), (Axis::Y, -20)].into_iter().collect(), 1);
        legacy.speed = Some(1500.0);
        assert_eq!(Command::Move(legacy).to_string(), "X5 Y-20 F1500");

        let mut g = GroupCommand::new([(Axis::Z, 1), (Axis::G, 0)].into_iter().collect(), true, 1);
        g.speed = Some(800.5);
        assert_eq!(Command::Group(g).to_string(), "GROUPSYNC(Z(1), G(0), s800.5)");

        let speeds: AxisMap<f64> = [(Axis::X, 1500.0), (Axis::Y, 1200.0)].into_iter().collect();
        assert_eq!(
            Command::SetSpeed { values: speeds, line: 1 }.to_string(),
            "SPEED X1500 Y1200"
        );
        assert_eq!(
            Command::Home { axes: vec![], line: 1 }.to_string(),
            "HOME"
        );
    }

    #[test]
    fn test_render_recompiles() {
        let source = "X(100,500,d20)\nX5 Y7 A300\nGROUP(X(1),T(9),a50)\nSPEED(Z,400)\nACCEL(900)\n\
                      HOME(Y)\nZERO\nWAIT(30)\nSYNC\nDETECT(box)\nRESUME\nSTOP";
        let first = compile(source).unwrap().commands;
        let second = compile(&render(&first)).unwrap().commands;

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert!(a.structurally_eq(b), "{:?} != {:?}", a, b);
        }
    }
}
