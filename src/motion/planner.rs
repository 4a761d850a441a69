//! Kinematic planner.
//!
//! A single forward pass over compiled commands that resolves speed and
//! acceleration for every move, times synchronised groups by their bottleneck
//! axis and folds simple moves following a `SYNC` into one group.

use tracing::{debug, warn};

use crate::config::PlannerConfig;
use crate::error::PlanningError;
use crate::script::{Command, GroupCommand, MoveCommand};

use super::axis::AxisMap;
use super::position::Position;
use super::profile::{trapezoid_duration, MotionProfile};

/// Moves shorter than this (total displacement) are slowed down.
pub const SHORT_MOVE_THRESHOLD: u64 = 100;
/// Speed cap for short moves.
pub const SHORT_MOVE_MAX_SPEED: f64 = 500.0;
/// Acceleration cap for short moves.
pub const SHORT_MOVE_MAX_ACCEL: f64 = 200.0;
/// Moves longer than this (total displacement) are sped up.
pub const LONG_MOVE_THRESHOLD: u64 = 5000;
/// Speed multiplier for long moves.
pub const LONG_MOVE_BOOST: f64 = 1.5;
/// Speed cap for boosted long moves.
pub const LONG_MOVE_MAX_SPEED: f64 = 3000.0;
/// Largest displacement of a move that may be folded at a `SYNC`.
pub const SYNC_MERGE_MAX_DISPLACEMENT: u64 = 1000;
/// Speed cap for groups.
pub const GROUP_MAX_SPEED: f64 = 2000.0;
/// Headroom applied to the bottleneck axis speed of a group.
pub const GROUP_SPEED_FACTOR: f64 = 1.1;

/// Virtual machine state threaded through one planning pass.
#[derive(Debug, Clone)]
struct Cursor {
    position: Position,
    speed: [f64; 5],
    accel: [f64; 5],
}

impl Cursor {
    fn new(config: &PlannerConfig) -> Self {
        Self {
            position: Position::origin(),
            speed: [config.default_speed; 5],
            accel: [config.default_accel; 5],
        }
    }

    /// Slowest configured speed among the axes of a move.
    fn speed_for(&self, targets: &AxisMap<i32>, fallback: f64) -> f64 {
        Self::slowest(&self.speed, targets, fallback)
    }

    fn accel_for(&self, targets: &AxisMap<i32>, fallback: f64) -> f64 {
        Self::slowest(&self.accel, targets, fallback)
    }

    fn slowest(values: &[f64; 5], targets: &AxisMap<i32>, fallback: f64) -> f64 {
        targets
            .axes()
            .map(|axis| values[axis.index()])
            .reduce(f64::min)
            .unwrap_or(fallback)
    }
}

/// Motion planner.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    /// Create a planner with the given defaults.
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Planner defaults.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Resolve profiles and fold post-`SYNC` moves.
    ///
    /// Pure and idempotent: commands that already carry a profile keep it, so
    /// planning the output again yields the same sequence.
    pub fn plan(&self, commands: &[Command]) -> Vec<Command> {
        let mut cursor = Cursor::new(&self.config);
        let mut planned = Vec::with_capacity(commands.len());
        let mut folded = 0usize;
        let mut index = 0;

        while index < commands.len() {
            let command = &commands[index];
            index += 1;

            match command {
                Command::Sync { line } => match self.fold_after_sync(&commands[index..], &cursor, *line) {
                    Some((group, consumed)) => {
                        planned.push(Command::Group(self.resolve_group(&group, &mut cursor)));
                        index += consumed;
                        folded += 1;
                    }
                    None => planned.push(command.clone()),
                },
                Command::Move(m) => planned.push(Command::Move(self.resolve_move(m, &mut cursor))),
                Command::Group(g) => planned.push(Command::Group(self.resolve_group(g, &mut cursor))),
                Command::SetSpeed { values, .. } => {
                    for (axis, value) in values.iter() {
                        cursor.speed[axis.index()] = *value;
                    }
                    planned.push(command.clone());
                }
                Command::SetAccel { values, .. } => {
                    for (axis, value) in values.iter() {
                        cursor.accel[axis.index()] = *value;
                    }
                    planned.push(command.clone());
                }
                Command::Home { axes, .. } | Command::Zero { axes, .. } => {
                    cursor.position.reset(axes);
                    planned.push(command.clone());
                }
                Command::Call { line, .. } | Command::Loop { line, .. } => {
                    warn!(line, action = %command.action(), "unexpanded control flow passed through planner");
                    planned.push(command.clone());
                }
                _ => planned.push(command.clone()),
            }
        }

        debug!(
            input = commands.len(),
            output = planned.len(),
            folded,
            "plan complete"
        );
        planned
    }

    /// Reject input the planner cannot give meaning to.
    ///
    /// # Errors
    ///
    /// Returns the first `CALL`/`LOOP` left over from expansion, or the first
    /// speed/acceleration that is not a positive finite number.
    pub fn validate(commands: &[Command]) -> core::result::Result<(), PlanningError> {
        for command in commands {
            let line = command.line();
            match command {
                Command::Call { .. } => {
                    return Err(PlanningError::UnexpandedControlFlow {
                        line,
                        construct: "CALL",
                    })
                }
                Command::Loop { .. } => {
                    return Err(PlanningError::UnexpandedControlFlow {
                        line,
                        construct: "LOOP",
                    })
                }
                Command::Move(m) => {
                    check_rate(line, "speed", m.speed)?;
                    check_rate(line, "accel", m.accel)?;
                }
                Command::Group(g) => {
                    check_rate(line, "speed", g.speed)?;
                    check_rate(line, "accel", g.accel)?;
                }
                Command::SetSpeed { values, .. } => {
                    for (_, value) in values.iter() {
                        check_rate(line, "speed", Some(*value))?;
                    }
                }
                Command::SetAccel { values, .. } => {
                    for (_, value) in values.iter() {
                        check_rate(line, "accel", Some(*value))?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve_move(&self, m: &MoveCommand, cursor: &mut Cursor) -> MoveCommand {
        let mut resolved = m.clone();
        let displacement = cursor.position.displacement_to(&m.targets);

        if m.profile.is_none() {
            let mut speed = m
                .speed
                .unwrap_or_else(|| cursor.speed_for(&m.targets, self.config.default_speed));
            let mut accel = m
                .accel
                .unwrap_or_else(|| cursor.accel_for(&m.targets, self.config.default_accel));

            if displacement < SHORT_MOVE_THRESHOLD {
                speed = speed.min(SHORT_MOVE_MAX_SPEED);
                accel = accel.min(SHORT_MOVE_MAX_ACCEL);
            } else if displacement > LONG_MOVE_THRESHOLD {
                speed = (speed * LONG_MOVE_BOOST).min(LONG_MOVE_MAX_SPEED);
            }

            resolved.profile = Some(MotionProfile::trapezoidal(displacement as f64, speed, accel));
        }

        cursor.position.apply(&m.targets);
        resolved
    }

    fn resolve_group(&self, g: &GroupCommand, cursor: &mut Cursor) -> GroupCommand {
        let mut resolved = g.clone();

        if g.profile.is_none() {
            // (distance, accel, duration) of the slowest axis
            let mut bottleneck: Option<(f64, f64, f64)> = None;
            for (axis, target) in g.targets.iter() {
                let distance = cursor.position.distance_to(axis, *target) as f64;
                let speed = g.speed.unwrap_or(cursor.speed[axis.index()]);
                let accel = g.accel.unwrap_or(cursor.accel[axis.index()]);
                let duration = trapezoid_duration(distance, speed, accel);

                if duration > 0.0 && bottleneck.map_or(true, |(_, _, t)| duration > t) {
                    bottleneck = Some((distance, accel, duration));
                }
            }

            resolved.profile = Some(match bottleneck {
                Some((distance, accel, duration)) => MotionProfile {
                    distance,
                    max_speed: (distance / duration * GROUP_SPEED_FACTOR).min(GROUP_MAX_SPEED),
                    acceleration: accel,
                    duration,
                },
                None => MotionProfile::stationary(
                    g.speed
                        .unwrap_or(self.config.default_speed)
                        .min(GROUP_MAX_SPEED),
                    g.accel.unwrap_or(self.config.default_accel),
                ),
            });
        }

        cursor.position.apply(&g.targets);
        resolved
    }

    /// Collect the simple moves right after a `SYNC`; two or more become one
    /// synchronised group. Returns the group and how many moves it absorbed.
    fn fold_after_sync(
        &self,
        following: &[Command],
        cursor: &Cursor,
        line: usize,
    ) -> Option<(GroupCommand, usize)> {
        let mut targets: AxisMap<i32> = AxisMap::new();
        let mut consumed = 0;

        for command in following {
            let m = match command.as_simple_move() {
                Some(m) => m,
                None => break,
            };
            if !targets.is_disjoint(&m.targets)
                || cursor.position.displacement_to(&m.targets) > SYNC_MERGE_MAX_DISPLACEMENT
            {
                break;
            }
            targets.extend_from(&m.targets);
            consumed += 1;
        }

        (consumed >= 2).then(|| (GroupCommand::new(targets, true, line), consumed))
    }
}

/// Plan with default speed and acceleration.
pub fn plan(commands: &[Command]) -> Vec<Command> {
    Planner::default().plan(commands)
}

fn check_rate(
    line: usize,
    field: &'static str,
    value: Option<f64>,
) -> core::result::Result<(), PlanningError> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => {
            Err(PlanningError::InvalidOverride { line, field, value: v })
        }
        _ => Ok(()),
    }
}
