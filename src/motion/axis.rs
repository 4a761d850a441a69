//! Robot axes and fixed-capacity per-axis maps.

use core::fmt;
use core::str::FromStr;

use heapless::FnvIndexMap;
use serde::{Deserialize, Serialize};

/// One of the five palletizer axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal travel.
    X,
    /// Horizontal travel, perpendicular to X.
    Y,
    /// Vertical lift.
    Z,
    /// Turntable.
    T,
    /// Gripper / end-effector.
    G,
}

impl Axis {
    /// All axes in canonical order.
    pub const ALL: [Axis; 5] = [Axis::X, Axis::Y, Axis::Z, Axis::T, Axis::G];

    /// Parse an axis letter (case-insensitive).
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            'T' => Some(Axis::T),
            'G' => Some(Axis::G),
            _ => None,
        }
    }

    /// The axis letter.
    #[inline]
    pub fn as_char(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::T => 'T',
            Axis::G => 'G',
        }
    }

    /// Index into per-axis arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Axis {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_char(c).ok_or(()),
            _ => Err(()),
        }
    }
}

/// Capacity of [`AxisMap`]; must be a power of two and hold every axis.
const AXIS_MAP_CAPACITY: usize = 8;

/// Insertion-ordered map from axis to a value (target position, speed, ...).
///
/// Each axis appears at most once; inserting an existing axis replaces its value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisMap<V> {
    entries: FnvIndexMap<Axis, V, AXIS_MAP_CAPACITY>,
}

// heapless only compares maps whose values are `Eq`; rates are `f64`.
impl<V: PartialEq> PartialEq for AxisMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((a, x), (b, y))| a == b && x == y)
    }
}

impl<V> Default for AxisMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> AxisMap<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
        }
    }

    /// Insert or replace an axis value, returning the previous one.
    pub fn insert(&mut self, axis: Axis, value: V) -> Option<V> {
        // Capacity exceeds the number of axes, so insertion cannot fail.
        self.entries.insert(axis, value).ok().flatten()
    }

    /// Value for an axis.
    pub fn get(&self, axis: Axis) -> Option<&V> {
        self.entries.get(&axis)
    }

    /// Whether the axis is present.
    pub fn contains(&self, axis: Axis) -> bool {
        self.entries.contains_key(&axis)
    }

    /// Number of axes present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no axis is present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Axes in insertion order.
    pub fn axes(&self) -> impl Iterator<Item = Axis> + '_ {
        self.entries.keys().copied()
    }

    /// `(axis, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &V)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// True when the two maps share no axis.
    pub fn is_disjoint<W>(&self, other: &AxisMap<W>) -> bool {
        self.axes().all(|axis| !other.contains(axis))
    }

    /// The single entry, if the map has exactly one axis.
    pub fn single(&self) -> Option<(Axis, &V)> {
        if self.len() == 1 {
            self.iter().next()
        } else {
            None
        }
    }
}

impl<V: Clone> AxisMap<V> {
    /// Build a map assigning the same value to every axis.
    pub fn uniform(value: V) -> Self {
        Axis::ALL.iter().map(|axis| (*axis, value.clone())).collect()
    }

    /// Insert every entry of `other`, replacing existing axes.
    pub fn extend_from(&mut self, other: &AxisMap<V>) {
        for (axis, value) in other.iter() {
            self.insert(axis, value.clone());
        }
    }
}

impl<V: PartialEq> AxisMap<V> {
    /// The shared value when all five axes are present with the same value.
    pub fn uniform_value(&self) -> Option<&V> {
        if self.len() != Axis::ALL.len() {
            return None;
        }
        let mut values = self.entries.values();
        let first = values.next()?;
        values.all(|v| v == first).then_some(first)
    }
}

impl<V> FromIterator<(Axis, V)> for AxisMap<V> {
    fn from_iter<I: IntoIterator<Item = (Axis, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (axis, value) in iter {
            map.insert(axis, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_letters() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_char(axis.as_char()), Some(axis));
        }
        assert_eq!(Axis::from_char('t'), Some(Axis::T));
        assert_eq!(Axis::from_char('F'), None);
        assert_eq!("G".parse::<Axis>(), Ok(Axis::G));
        assert!("GX".parse::<Axis>().is_err());
    }

    #[test]
    fn test_axis_map_keeps_insertion_order() {
        let mut map = AxisMap::new();
        map.insert(Axis::Z, 10);
        map.insert(Axis::X, 20);
        assert_eq!(map.insert(Axis::Z, 30), Some(10));

        let axes: Vec<_> = map.axes().collect();
        assert_eq!(axes, vec![Axis::Z, Axis::X]);
        assert_eq!(map.get(Axis::Z), Some(&30));
    }

    #[test]
    fn test_rate_maps_compare() {
        let a: AxisMap<f64> = [(Axis::X, 1500.0), (Axis::Y, 800.0)].into_iter().collect();
        let b: AxisMap<f64> = [(Axis::X, 1500.0), (Axis::Y, 800.0)].into_iter().collect();
        let c: AxisMap<f64> = [(Axis::X, 1500.0)].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(AxisMap::uniform(f64::NAN), AxisMap::uniform(f64::NAN));
    }

    #[test]
    fn test_uniform_value() {
        let all = AxisMap::uniform(1500.0);
        assert_eq!(all.uniform_value(), Some(&1500.0));

        let partial: AxisMap<f64> = [(Axis::X, 1500.0)].into_iter().collect();
        assert_eq!(partial.uniform_value(), None);
    }

    #[test]
    fn test_disjoint() {
        let a: AxisMap<i32> = [(Axis::X, 1)].into_iter().collect();
        let b: AxisMap<i32> = [(Axis::Y, 1)].into_iter().collect();
        let c: AxisMap<i32> = [(Axis::X, 5), (Axis::Z, 1)].into_iter().collect();
        assert!(a.is_disjoint(&b));
        assert!(!a.is_disjoint(&c));
    }
}
