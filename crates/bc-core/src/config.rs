//! Runtime-tunable solver constants, grouped on one plain struct.
//!
//! `Config` is constructed once per engine and is only ever mutated through
//! [`crate::guard::ValueGuard`] inside a solver, which restores the original
//! value on scope exit. There is no file/env loader here; assembling a
//! `Config` from some outside source is a host concern.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Solver tuning knobs shared by every integrator and solver in an `Engine`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub c_step_multiplier: f64,
    pub c_zero_finding_accuracy: f64,
    pub c_minimum_velocity: f64,
    pub c_maximum_drop: f64,
    pub c_max_iterations: u32,
    pub c_gravity_constant: f64,
    pub c_minimum_altitude: f64,
}

impl Config {
    pub const DEFAULT_STEP_MULTIPLIER: f64 = 1.0;
    pub const DEFAULT_ZERO_FINDING_ACCURACY: f64 = 0.000_1;
    pub const DEFAULT_MINIMUM_VELOCITY: f64 = 50.0;
    pub const DEFAULT_MAXIMUM_DROP: f64 = 15_000.0;
    pub const DEFAULT_MAX_ITERATIONS: u32 = 20;
    pub const DEFAULT_GRAVITY_CONSTANT: f64 = -32.174_05;
    pub const DEFAULT_MINIMUM_ALTITUDE: f64 = -1_500.0;
}

impl Default for Config {
    fn default() -> Self {
        Config {
            c_step_multiplier: Self::DEFAULT_STEP_MULTIPLIER,
            c_zero_finding_accuracy: Self::DEFAULT_ZERO_FINDING_ACCURACY,
            c_minimum_velocity: Self::DEFAULT_MINIMUM_VELOCITY,
            c_maximum_drop: Self::DEFAULT_MAXIMUM_DROP,
            c_max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            c_gravity_constant: Self::DEFAULT_GRAVITY_CONSTANT,
            c_minimum_altitude: Self::DEFAULT_MINIMUM_ALTITUDE,
        }
    }
}
