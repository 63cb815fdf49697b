//! Piecewise-constant wind segments and the cursor that walks them in step
//! with the projectile's downrange position.

use crate::v3::V3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sentinel "effectively infinite" range past the last wind segment.
pub const MAX_WIND_DISTANCE_FEET: f64 = 1e8;

/// A single wind layer: constant velocity and direction until `until_distance`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Wind {
    /// Wind speed, fps.
    pub velocity: f64,
    /// Direction the wind blows *from*, radians (0 = tailwind, π/2 = from the right).
    pub direction_from: f64,
    /// Downrange distance, ft, at which this segment ends.
    pub until_distance: f64,
}

impl Wind {
    /// Converts to a local-frame vector (x downrange, y up, z crossrange).
    /// `y` is always zero: wind has no vertical component in this model.
    pub fn as_v3(self) -> V3 {
        V3::new(
            self.velocity * self.direction_from.cos(),
            0.0,
            self.velocity * self.direction_from.sin(),
        )
    }
}

/// Cursor over an ordered list of [`Wind`] segments.
///
/// The cursor only ever advances: once `vector_for_range` moves past a
/// segment it never looks back, matching the one-directional sweep the
/// integrators perform over downrange position.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindSock {
    winds: Vec<Wind>,
    current: usize,
    next_range: f64,
    cached_vector: V3,
}

impl WindSock {
    pub fn new(winds: Vec<Wind>) -> Self {
        let mut sock = WindSock {
            winds,
            current: 0,
            next_range: MAX_WIND_DISTANCE_FEET,
            cached_vector: V3::ZERO,
        };
        sock.update_cache();
        sock
    }

    pub fn push(&mut self, wind: Wind) {
        self.winds.push(wind);
    }

    /// Index of the segment currently active. Monotonically non-decreasing
    /// across one integration run.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The wind vector for the currently active segment (zero past the end).
    pub fn current_vector(&self) -> V3 {
        self.cached_vector
    }

    fn update_cache(&mut self) {
        if let Some(wind) = self.winds.get(self.current) {
            self.cached_vector = wind.as_v3();
            self.next_range = wind.until_distance;
        } else {
            self.cached_vector = V3::ZERO;
            self.next_range = MAX_WIND_DISTANCE_FEET;
        }
    }

    /// Returns the active wind vector for `range_ft`, advancing the cursor
    /// (possibly by more than one segment is never needed in practice, but
    /// a single advance-and-refresh matches the source exactly) when the
    /// requested range has crossed the current segment's end.
    pub fn vector_for_range(&mut self, range_ft: f64) -> V3 {
        if range_ft >= self.next_range {
            self.current += 1;
            self.update_cache();
        }
        self.cached_vector
    }
}

impl Default for WindSock {
    fn default() -> Self {
        WindSock::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn empty_sock_is_always_zero() {
        let mut sock = WindSock::default();
        assert_eq!(sock.current_vector(), V3::ZERO);
        assert_eq!(sock.vector_for_range(1_000_000.0), V3::ZERO);
    }

    #[test]
    fn tailwind_points_downrange() {
        let wind = Wind {
            velocity: 10.0,
            direction_from: 0.0,
            until_distance: 100.0,
        };
        assert_abs_diff_eq!(wind.as_v3().x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(wind.as_v3().z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn crosswind_from_the_right() {
        let wind = Wind {
            velocity: 10.0,
            direction_from: FRAC_PI_2,
            until_distance: 100.0,
        };
        assert_abs_diff_eq!(wind.as_v3().x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(wind.as_v3().z, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn cursor_advances_monotonically() {
        let mut sock = WindSock::new(vec![
            Wind { velocity: 1.0, direction_from: 0.0, until_distance: 300.0 },
            Wind { velocity: 2.0, direction_from: 0.0, until_distance: 600.0 },
            Wind { velocity: 3.0, direction_from: 0.0, until_distance: 900.0 },
        ]);
        assert_eq!(sock.current_index(), 0);
        sock.vector_for_range(299.0);
        assert_eq!(sock.current_index(), 0);
        sock.vector_for_range(301.0);
        assert_eq!(sock.current_index(), 1);
        sock.vector_for_range(650.0);
        assert_eq!(sock.current_index(), 2);
        sock.vector_for_range(1000.0);
        assert_eq!(sock.current_index(), 3);
        assert_eq!(sock.current_vector(), V3::ZERO);
    }
}
