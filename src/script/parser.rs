//! Statement grammar.
//!
//! Each statement is classified by its leading keyword in a fixed order:
//! movement, group, system, control flow. Both the MSL call form
//! (`X(100,d1000)`) and the legacy word form (`X100 F1500`) produce the same
//! [`Command`] values.

use crate::error::{CompileError, CompileErrorKind};
use crate::motion::{Axis, AxisMap};

use super::command::{Command, DeviceVerb, GroupCommand, MoveCommand};
use super::lexer::split_keyword;

type ParseResult<T> = core::result::Result<T, CompileError>;

/// Parse one non-block statement into zero or more commands.
///
/// A movement with a range (`X(100,500)`) yields two commands; everything
/// else yields exactly one.
pub(crate) fn parse_statement(text: &str, line: usize) -> ParseResult<Vec<Command>> {
    let (keyword, rest) = split_keyword(text);

    if let Some(axis) = single_axis(&keyword) {
        let moves = parse_movement(axis, text, rest, line)?;
        return Ok(moves.into_iter().map(Command::Move).collect());
    }

    let command = match keyword.as_str() {
        "GROUP" => parse_group(rest, false, line)?,
        "GROUPSYNC" => parse_group(rest, true, line)?,
        "HOME" => Command::Home {
            axes: parse_axis_list(rest, line)?,
            line,
        },
        "ZERO" => Command::Zero {
            axes: parse_axis_list(rest, line)?,
            line,
        },
        "SPEED" => Command::SetSpeed {
            values: parse_rates(rest, "SPEED", line)?,
            line,
        },
        "ACCEL" => Command::SetAccel {
            values: parse_rates(rest, "ACCEL", line)?,
            line,
        },
        "SET" => parse_set(rest, line)?,
        "SYNC" => {
            expect_no_arguments(rest, "SYNC", line)?;
            Command::Sync { line }
        }
        "WAIT" => match single_argument(rest) {
            None => Command::Sync { line },
            Some(ms) => Command::Delay {
                ms: parse_u32(ms, line)?,
                line,
            },
        },
        "DELAY" => match single_argument(rest) {
            Some(ms) => Command::Delay {
                ms: parse_u32(ms, line)?,
                line,
            },
            None => return Err(malformed(line, "DELAY needs a duration in ms")),
        },
        "DETECT" => match single_argument(rest) {
            Some(sensor) if is_identifier(sensor) => Command::Detect {
                sensor: sensor.to_string(),
                line,
            },
            _ => return Err(malformed(line, "DETECT needs a sensor name")),
        },
        "STOP" => {
            expect_no_arguments(rest, "STOP", line)?;
            Command::Stop { line }
        }
        "START" | "PAUSE" | "RESUME" => {
            expect_no_arguments(rest, &keyword, line)?;
            let verb = match keyword.as_str() {
                "START" => DeviceVerb::Start,
                "PAUSE" => DeviceVerb::Pause,
                _ => DeviceVerb::Resume,
            };
            Command::Control { verb, line }
        }
        "CALL" => match single_argument(rest) {
            Some(name) if is_identifier(name) => Command::Call {
                name: name.to_string(),
                line,
            },
            _ => {
                return Err(CompileError::new(
                    line,
                    CompileErrorKind::MalformedFunction,
                    "CALL needs a function name",
                ))
            }
        },
        "" => {
            return Err(CompileError::new(
                line,
                CompileErrorKind::UnknownToken,
                format!("unexpected '{}'", text),
            ))
        }
        other => {
            return Err(CompileError::new(
                line,
                CompileErrorKind::UnknownToken,
                format!("unknown statement '{}'", other),
            ))
        }
    };

    Ok(vec![command])
}

/// Function names: letters, digits and `_`, not starting with a digit.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn single_axis(keyword: &str) -> Option<Axis> {
    keyword.parse().ok()
}

fn parse_movement(axis: Axis, text: &str, rest: &str, line: usize) -> ParseResult<Vec<MoveCommand>> {
    match arguments(rest) {
        Some(args) => parse_msl_movement(axis, &args, line),
        None => parse_legacy_movement(text, line).map(|m| vec![m]),
    }
}

/// `AXIS(p, ...)`: positions, `d<ms>` delays, `s<speed>` and `a<accel>`.
fn parse_msl_movement(axis: Axis, args: &[&str], line: usize) -> ParseResult<Vec<MoveCommand>> {
    let mut positions: Vec<i32> = Vec::with_capacity(2);
    let mut delays: [Option<u32>; 2] = [None, None];
    let mut speed = None;
    let mut accel = None;

    for arg in args {
        let mut chars = arg.chars();
        match chars.next().map(|c| c.to_ascii_lowercase()) {
            None => return Err(malformed(line, format!("empty parameter in {} move", axis))),
            Some('d') => {
                let slot = positions.len().saturating_sub(1);
                if delays[slot].is_some() {
                    return Err(malformed(line, format!("second delay for one {} target", axis)));
                }
                delays[slot] = Some(parse_u32(chars.as_str(), line)?);
            }
            Some('s') => speed = Some(parse_rate(chars.as_str(), line)?),
            Some('a') => accel = Some(parse_rate(chars.as_str(), line)?),
            Some(_) => {
                if positions.len() == 2 {
                    return Err(malformed(
                        line,
                        format!("{} move takes at most two positions", axis),
                    ));
                }
                positions.push(parse_i32(arg, line)?);
            }
        }
    }

    if positions.is_empty() {
        return Err(malformed(line, format!("{} move without a target", axis)));
    }

    Ok(positions
        .into_iter()
        .zip(delays)
        .map(|(target, delay_ms)| {
            let mut m = MoveCommand::single(axis, target, line);
            m.speed = speed;
            m.accel = accel;
            m.delay_ms = delay_ms;
            m
        })
        .collect())
}

/// `X100 Y20 F1500 A500 D200`
fn parse_legacy_movement(text: &str, line: usize) -> ParseResult<MoveCommand> {
    let mut m = MoveCommand::new(AxisMap::new(), line);

    for word in text.split_whitespace() {
        let mut chars = word.chars();
        let letter = chars.next().map(|c| c.to_ascii_uppercase());
        let value = chars.as_str();

        match letter {
            Some('F') => m.speed = Some(parse_rate(value, line)?),
            Some('A') => m.accel = Some(parse_rate(value, line)?),
            Some('D') => m.delay_ms = Some(parse_u32(value, line)?),
            Some(c) => match Axis::from_char(c) {
                Some(axis) => {
                    if m.targets.contains(axis) {
                        return Err(malformed(line, format!("axis {} given twice", axis)));
                    }
                    m.targets.insert(axis, parse_i32(value, line)?);
                }
                None => {
                    return Err(CompileError::new(
                        line,
                        CompileErrorKind::UnknownToken,
                        format!("unknown word '{}'", word),
                    ))
                }
            },
            None => {}
        }
    }

    if m.targets.is_empty() {
        return Err(malformed(line, "move without a target"));
    }
    Ok(m)
}

/// `GROUP(X(100), Y(50), s800)`; each segment is one plain single-axis move.
fn parse_group(rest: &str, sync: bool, line: usize) -> ParseResult<Command> {
    let name = if sync { "GROUPSYNC" } else { "GROUP" };
    let args = arguments(rest)
        .ok_or_else(|| malformed(line, format!("{} needs a parenthesised body", name)))?;

    let mut group = GroupCommand::new(AxisMap::new(), sync, line);

    for segment in args.iter().filter(|s| !s.is_empty()) {
        let (keyword, value) = split_keyword(segment);
        match keyword.as_str() {
            "S" => group.speed = Some(parse_rate(value, line)?),
            "A" => group.accel = Some(parse_rate(value, line)?),
            _ => {
                let axis = single_axis(&keyword).ok_or_else(|| {
                    malformed(line, format!("'{}' is not an axis move in {}", segment, name))
                })?;
                let moves = parse_movement(axis, segment, value, line)?;
                let target = match moves.as_slice() {
                    [m] if m.is_simple() => m.targets.single().map(|(_, t)| *t),
                    _ => None,
                }
                .ok_or_else(|| {
                    malformed(
                        line,
                        format!("{} segment '{}' must be a single plain target", name, segment),
                    )
                })?;
                if group.targets.insert(axis, target).is_some() {
                    return Err(malformed(line, format!("axis {} given twice in {}", axis, name)));
                }
            }
        }
    }

    if group.targets.is_empty() {
        return Err(malformed(line, format!("{} without any axis", name)));
    }
    Ok(Command::Group(group))
}

/// `SET(SPEED, X, 1500)`, `SET ACCEL 500`
fn parse_set(rest: &str, line: usize) -> ParseResult<Command> {
    let (kind, values) = match arguments(rest) {
        Some(args) => {
            let (kind, tail) = args
                .split_first()
                .ok_or_else(|| malformed(line, "SET needs SPEED or ACCEL"))?;
            (kind.to_ascii_uppercase(), rates_from_args(tail, line)?)
        }
        None => {
            let (kind, tail) = split_keyword(rest);
            let values = rates_from_words(tail, line)?;
            (kind, values)
        }
    };

    match kind.as_str() {
        "SPEED" => Ok(Command::SetSpeed { values, line }),
        "ACCEL" => Ok(Command::SetAccel { values, line }),
        other => Err(malformed(line, format!("SET of unknown quantity '{}'", other))),
    }
}

fn parse_rates(rest: &str, name: &str, line: usize) -> ParseResult<AxisMap<f64>> {
    match arguments(rest) {
        Some(args) => rates_from_args(&args, line),
        None if rest.is_empty() => Err(malformed(line, format!("{} needs a value", name))),
        None => rates_from_words(rest, line),
    }
}

/// `(v)` for every axis, `(X, v)` for one.
fn rates_from_args(args: &[&str], line: usize) -> ParseResult<AxisMap<f64>> {
    match args {
        [value] => Ok(AxisMap::uniform(parse_rate(value, line)?)),
        [axis, value] => {
            let axis = parse_axis(axis, line)?;
            Ok([(axis, parse_rate(value, line)?)].into_iter().collect())
        }
        _ => Err(malformed(line, "expected (value) or (axis, value)")),
    }
}

/// `1500` for every axis, or `X1500 Y1200`.
fn rates_from_words(rest: &str, line: usize) -> ParseResult<AxisMap<f64>> {
    let words: Vec<&str> = rest.split_whitespace().collect();
    if let [value] = words.as_slice() {
        if value.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return Ok(AxisMap::uniform(parse_rate(value, line)?));
        }
    }
    if words.is_empty() {
        return Err(malformed(line, "missing value"));
    }

    let mut values = AxisMap::new();
    for word in words {
        let split = word.char_indices().nth(1).map(|(i, _)| i).unwrap_or(word.len());
        let axis = parse_axis(&word[..split], line)?;
        values.insert(axis, parse_rate(&word[split..], line)?);
    }
    Ok(values)
}

/// Empty (all axes), `(X, Y)`, or `X Y`.
fn parse_axis_list(rest: &str, line: usize) -> ParseResult<Vec<Axis>> {
    let items: Vec<&str> = match arguments(rest) {
        Some(args) => args.into_iter().filter(|a| !a.is_empty()).collect(),
        None => rest.split_whitespace().collect(),
    };

    let mut axes = Vec::with_capacity(items.len());
    for item in items {
        let axis = parse_axis(item, line)?;
        if !axes.contains(&axis) {
            axes.push(axis);
        }
    }
    Ok(axes)
}

fn parse_axis(text: &str, line: usize) -> ParseResult<Axis> {
    text.trim()
        .parse()
        .map_err(|_| malformed(line, format!("'{}' is not an axis", text)))
}

fn expect_no_arguments(rest: &str, name: &str, line: usize) -> ParseResult<()> {
    if single_argument(rest).is_some() {
        return Err(malformed(line, format!("{} takes no arguments", name)));
    }
    Ok(())
}

/// The one argument of `KEYWORD(arg)` or `KEYWORD arg`; `None` when absent.
fn single_argument(rest: &str) -> Option<&str> {
    let inner = match rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => inner.trim(),
        None => rest.trim(),
    };
    (!inner.is_empty()).then_some(inner)
}

/// Split `( a, b(c, d), e )` into top-level arguments, or `None` when `rest`
/// is not parenthesised.
fn arguments(rest: &str) -> Option<Vec<&str>> {
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(inner[start..].trim());
    Some(args)
}

fn parse_i32(text: &str, line: usize) -> ParseResult<i32> {
    text.trim().parse().map_err(|_| bad_number(text, line))
}

fn parse_u32(text: &str, line: usize) -> ParseResult<u32> {
    text.trim().parse().map_err(|_| bad_number(text, line))
}

/// Speeds and accelerations: finite and strictly positive.
fn parse_rate(text: &str, line: usize) -> ParseResult<f64> {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(bad_number(text, line)),
    }
}

fn bad_number(text: &str, line: usize) -> CompileError {
    CompileError::new(
        line,
        CompileErrorKind::MalformedNumber,
        format!("malformed number '{}'", text.trim()),
    )
}

fn malformed(line: usize, message: impl Into<String>) -> CompileError {
    CompileError::new(line, CompileErrorKind::MalformedStatement, message)
}
