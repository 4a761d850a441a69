//! Motion module.
//!
//! Axes, positions, trapezoidal profiles and the planner that resolves them
//! for compiled scripts.

mod axis;
mod planner;
mod position;
mod profile;

pub use axis::{Axis, AxisMap};
pub use planner::{
    plan, Planner, GROUP_MAX_SPEED, GROUP_SPEED_FACTOR, LONG_MOVE_BOOST, LONG_MOVE_MAX_SPEED,
    LONG_MOVE_THRESHOLD, SHORT_MOVE_MAX_ACCEL, SHORT_MOVE_MAX_SPEED, SHORT_MOVE_THRESHOLD,
    SYNC_MERGE_MAX_DISPLACEMENT,
};
pub use position::Position;
pub use profile::{trapezoid_duration, MotionProfile};
