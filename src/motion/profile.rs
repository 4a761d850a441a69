//! Motion profile calculation.
//!
//! Provides symmetric trapezoidal timing used to resolve move speeds and to
//! synchronise multi-axis groups.

use libm::sqrt;
use serde::{Deserialize, Serialize};

/// Duration in seconds of a symmetric trapezoidal move.
///
/// Falls back to the triangular profile when the move is too short to reach
/// `speed`. Returns 0 for zero distance or non-positive rates.
pub fn trapezoid_duration(distance: f64, speed: f64, accel: f64) -> f64 {
    if distance <= 0.0 || speed <= 0.0 || accel <= 0.0 {
        return 0.0;
    }

    // Time to reach cruise speed: t = v / a
    // Distance covered while accelerating: d = 0.5 * a * t²
    let accel_time = speed / accel;
    let accel_distance = 0.5 * accel * accel_time * accel_time;

    if distance <= 2.0 * accel_distance {
        // Triangle profile: never reaches cruise speed
        2.0 * sqrt(distance / accel)
    } else {
        2.0 * accel_time + (distance - 2.0 * accel_distance) / speed
    }
}

/// Planned profile for a move or group (derived, never persisted).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    /// Distance covered (sum of axis displacement for moves, bottleneck
    /// axis displacement for groups).
    pub distance: f64,

    /// Resolved cruise speed in units/sec.
    pub max_speed: f64,

    /// Resolved acceleration in units/sec².
    pub acceleration: f64,

    /// Expected duration in seconds.
    pub duration: f64,
}

impl MotionProfile {
    /// Create a trapezoidal profile for the given distance and rates.
    pub fn trapezoidal(distance: f64, max_speed: f64, acceleration: f64) -> Self {
        Self {
            distance,
            max_speed,
            acceleration,
            duration: trapezoid_duration(distance, max_speed, acceleration),
        }
    }

    /// Profile for a move that covers no distance.
    pub fn stationary(max_speed: f64, acceleration: f64) -> Self {
        Self {
            distance: 0.0,
            max_speed,
            acceleration,
            duration: 0.0,
        }
    }

    /// Check if this profile covers no distance.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.distance <= 0.0
    }

    /// Expected duration rounded up to whole milliseconds.
    #[inline]
    pub fn duration_ms(&self) -> u64 {
        (self.duration * 1000.0).ceil().max(0.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trapezoidal_profile() {
        // accel_time = 2s, accel_distance = 1000, cruise = 3000 units at 1000/s
        let duration = trapezoid_duration(5000.0, 1000.0, 500.0);
        assert!((duration - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_triangle_profile() {
        // 2 * accel_distance = 2000 >= 400, so triangle: 2 * sqrt(400 / 500)
        let duration = trapezoid_duration(400.0, 1000.0, 500.0);
        assert!((duration - 2.0 * (0.8f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_boundary_uses_triangle() {
        // Exactly 2 * accel_distance
        let triangle = trapezoid_duration(2000.0, 1000.0, 500.0);
        assert!((triangle - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_profile() {
        let profile = MotionProfile::trapezoidal(0.0, 1000.0, 500.0);
        assert!(profile.is_zero());
        assert_eq!(profile.duration_ms(), 0);
        assert_eq!(trapezoid_duration(100.0, 0.0, 500.0), 0.0);
    }

    #[test]
    fn test_duration_ms_rounds_up() {
        let profile = MotionProfile::trapezoidal(5000.0, 1000.0, 500.0);
        assert_eq!(profile.duration_ms(), 7000);
    }
}
