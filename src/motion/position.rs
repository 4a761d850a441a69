//! Per-axis position tracking.
//!
//! The same type serves the planner's virtual cursor and the bridge's
//! device-reported position.

use serde::{Deserialize, Serialize};

use super::axis::{Axis, AxisMap};

/// Absolute position of every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X axis position
    #[serde(rename = "X", default)]
    pub x: i32,
    /// Y axis position
    #[serde(rename = "Y", default)]
    pub y: i32,
    /// Z axis position
    #[serde(rename = "Z", default)]
    pub z: i32,
    /// Turntable position
    #[serde(rename = "T", default)]
    pub t: i32,
    /// Gripper position
    #[serde(rename = "G", default)]
    pub g: i32,
}

impl Position {
    /// All axes at the origin.
    #[inline]
    pub fn origin() -> Self {
        Self::default()
    }

    /// Position of one axis.
    #[inline]
    pub fn get(&self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::T => self.t,
            Axis::G => self.g,
        }
    }

    /// Set one axis.
    #[inline]
    pub fn set(&mut self, axis: Axis, value: i32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::T => self.t = value,
            Axis::G => self.g = value,
        }
    }

    /// Move the axes present in `targets`; other axes keep their value.
    pub fn apply(&mut self, targets: &AxisMap<i32>) {
        for (axis, value) in targets.iter() {
            self.set(axis, *value);
        }
    }

    /// Absolute distance one axis has to travel to reach `target`.
    #[inline]
    pub fn distance_to(&self, axis: Axis, target: i32) -> u64 {
        (i64::from(target) - i64::from(self.get(axis))).unsigned_abs()
    }

    /// Total displacement (sum over axes) needed to reach `targets`.
    pub fn displacement_to(&self, targets: &AxisMap<i32>) -> u64 {
        targets
            .iter()
            .map(|(axis, target)| self.distance_to(axis, *target))
            .sum()
    }

    /// Reset the given axes to 0; an empty slice resets every axis.
    pub fn reset(&mut self, axes: &[Axis]) {
        if axes.is_empty() {
            *self = Self::origin();
        } else {
            for axis in axes {
                self.set(*axis, 0);
            }
        }
    }
}
