//! Unified typed-error surface for the trajectory engine, matching the
//! taxonomy carried by the original C++ exception hierarchy
//! (`BCLIBC_SolverRuntimeError` and its subclasses).

use thiserror::Error;

use crate::traj_data::{BaseTrajData, TrajectoryData};

/// Requested target distance exceeds what this shot geometry can reach.
#[derive(Debug, Clone, PartialEq)]
pub struct OutOfRangeError {
    pub requested_distance_ft: f64,
    pub max_range_ft: f64,
    pub look_angle_rad: f64,
}

/// A zero-finding solver (damped Newton or Ridder) failed to converge.
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroFindingError {
    pub zero_finding_error: f64,
    pub iterations_count: u32,
    pub last_barrel_elevation_rad: f64,
}

/// An `integrate_at` search ran the full integration without ever crossing
/// the requested range; carries the last raw and derived rows so the
/// caller can see how close the shot came.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptionError {
    pub raw: BaseTrajData,
    pub full: TrajectoryData,
}

#[derive(Debug, Error)]
pub enum BcError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("invalid value: {0}")]
    Value(String),

    #[error("index {index} out of bounds for length {len}")]
    Index { index: isize, len: usize },

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error(
        "requested distance {:.2} ft exceeds max range {:.2} ft at look angle {:.4} rad",
        .0.requested_distance_ft, .0.max_range_ft, .0.look_angle_rad
    )]
    OutOfRange(OutOfRangeError),

    #[error(
        "zero finding did not converge: error={:.6}, iterations={}, last_elevation={:.6} rad",
        .0.zero_finding_error, .0.iterations_count, .0.last_barrel_elevation_rad
    )]
    ZeroFinding(ZeroFindingError),

    #[error(
        "no interception within integration range (last distance {:.2} ft, time {:.4} s)",
        .0.full.distance_ft, .0.full.time
    )]
    Interception(Box<InterceptionError>),
}

impl BcError {
    pub fn out_of_range(requested_distance_ft: f64, max_range_ft: f64, look_angle_rad: f64) -> Self {
        BcError::OutOfRange(OutOfRangeError {
            requested_distance_ft,
            max_range_ft,
            look_angle_rad,
        })
    }

    pub fn zero_finding(
        zero_finding_error: f64,
        iterations_count: u32,
        last_barrel_elevation_rad: f64,
    ) -> Self {
        BcError::ZeroFinding(ZeroFindingError {
            zero_finding_error,
            iterations_count,
            last_barrel_elevation_rad,
        })
    }

    pub fn interception(raw: BaseTrajData, full: TrajectoryData) -> Self {
        BcError::Interception(Box::new(InterceptionError { raw, full }))
    }
}
