//! Flat-fire Coriolis offset approximation and the full local-frame
//! Coriolis acceleration used by the adaptive integrators.

use crate::v3::V3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Earth's angular velocity, rad/s.
const EARTH_ANGULAR_VELOCITY_RAD_S: f64 = 7.2921159e-5;
/// Imperial gravity constant, ft/s².
const GRAVITY_IMPERIAL: f64 = 32.17405;

/// Coriolis correction, parameterized by shooting latitude and azimuth.
///
/// Two modes, mutually exclusive:
/// - `flat_fire_only = true`: a closed-form downrange/vertical offset applied
///   once to the no-wind trajectory, cheap and accurate for flat, short shots.
/// - `flat_fire_only = false`: [`Coriolis::coriolis_acceleration_local`] is
///   added to the equations of motion every integration step instead.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coriolis {
    pub sin_lat: f64,
    pub cos_lat: f64,
    pub sin_az: f64,
    pub cos_az: f64,
    pub range_east: f64,
    pub range_north: f64,
    pub cross_east: f64,
    pub cross_north: f64,
    pub flat_fire_only: bool,
    pub muzzle_velocity_fps: f64,
}

impl Coriolis {
    /// Closed-form vertical/crossrange offsets for the flat-fire approximation.
    /// Zero in both components when `flat_fire_only` is false.
    pub fn flat_fire_offsets(&self, time: f64, distance_ft: f64, drop_ft: f64) -> (f64, f64) {
        if !self.flat_fire_only {
            return (0.0, 0.0);
        }

        let horizontal = EARTH_ANGULAR_VELOCITY_RAD_S * distance_ft * self.sin_lat * time;

        let vertical = if self.sin_az != 0.0 {
            let vertical_factor = -2.0
                * EARTH_ANGULAR_VELOCITY_RAD_S
                * self.muzzle_velocity_fps
                * self.cos_lat
                * self.sin_az;
            drop_ft * (vertical_factor / GRAVITY_IMPERIAL)
        } else {
            0.0
        };

        (vertical, horizontal)
    }

    /// Applies the flat-fire offsets to a raw (no-Coriolis) position vector.
    /// Returns `range_vector` unchanged when `flat_fire_only` is false, or
    /// when both offsets evaluate to zero.
    pub fn adjust_range(&self, time: f64, range_vector: V3) -> V3 {
        if !self.flat_fire_only {
            return range_vector;
        }

        let (delta_y, delta_z) = self.flat_fire_offsets(time, range_vector.x, range_vector.y);
        if delta_y == 0.0 && delta_z == 0.0 {
            return range_vector;
        }

        V3::new(range_vector.x, range_vector.y + delta_y, range_vector.z + delta_z)
    }

    /// Full local-frame Coriolis acceleration from the current velocity.
    /// Zero when `flat_fire_only` is true: that mode folds its correction
    /// into [`Coriolis::adjust_range`] instead of the equations of motion.
    pub fn coriolis_acceleration_local(&self, velocity: V3) -> V3 {
        if self.flat_fire_only {
            return V3::ZERO;
        }

        let vel_east = velocity.x * self.range_east + velocity.z * self.cross_east;
        let vel_north = velocity.x * self.range_north + velocity.z * self.cross_north;
        let vel_up = velocity.y;

        let factor = -2.0 * EARTH_ANGULAR_VELOCITY_RAD_S;
        let accel_east = factor * (self.cos_lat * vel_up - self.sin_lat * vel_north);
        let accel_north = factor * self.sin_lat * vel_east;
        let accel_up = factor * (-self.cos_lat * vel_east);

        V3::new(
            accel_east * self.range_east + accel_north * self.range_north,
            accel_up,
            accel_east * self.cross_east + accel_north * self.cross_north,
        )
    }
}

impl Default for Coriolis {
    /// No Coriolis effect at all: zero latitude/azimuth trig, flat-fire mode
    /// disabled so the acceleration path is also an identity zero.
    fn default() -> Self {
        Coriolis {
            sin_lat: 0.0,
            cos_lat: 1.0,
            sin_az: 0.0,
            cos_az: 1.0,
            range_east: 0.0,
            range_north: 1.0,
            cross_east: 1.0,
            cross_north: 0.0,
            flat_fire_only: false,
            muzzle_velocity_fps: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn disabled_coriolis_leaves_range_unchanged() {
        let coriolis = Coriolis::default();
        let range_vector = V3::new(1000.0, 5.0, -2.0);
        assert_eq!(coriolis.adjust_range(1.0, range_vector), range_vector);
        assert_eq!(coriolis.coriolis_acceleration_local(V3::new(100.0, 1.0, 0.0)), V3::ZERO);
    }

    #[test]
    fn flat_fire_disables_live_acceleration() {
        let coriolis = Coriolis {
            flat_fire_only: true,
            sin_lat: 0.5,
            ..Coriolis::default()
        };
        assert_eq!(coriolis.coriolis_acceleration_local(V3::new(100.0, 1.0, 0.0)), V3::ZERO);
    }

    #[test]
    fn flat_fire_horizontal_offset_scales_with_sin_lat_and_time() {
        let coriolis = Coriolis {
            flat_fire_only: true,
            sin_lat: 1.0,
            muzzle_velocity_fps: 2600.0,
            ..Coriolis::default()
        };
        let range_vector = V3::new(1000.0, 0.0, 0.0);
        let adjusted = coriolis.adjust_range(1.0, range_vector);
        let expected_z = EARTH_ANGULAR_VELOCITY_RAD_S * 1000.0 * 1.0 * 1.0;
        assert_abs_diff_eq!(adjusted.z, expected_z, epsilon = 1e-12);
        assert_abs_diff_eq!(adjusted.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_fire_vertical_offset_requires_nonzero_sin_az() {
        let coriolis = Coriolis {
            flat_fire_only: true,
            sin_az: 0.0,
            ..Coriolis::default()
        };
        let range_vector = V3::new(1000.0, -10.0, 0.0);
        let adjusted = coriolis.adjust_range(1.0, range_vector);
        assert_abs_diff_eq!(adjusted.y, -10.0, epsilon = 1e-12);
    }
}
