//! Shared data model for the trajectory engine: the 3-vector type,
//! interpolation primitives, error taxonomy, atmosphere/wind/Coriolis
//! models, the scoped-config guard, and the trajectory sample/row types
//! every other crate in the workspace builds on.

pub mod atmosphere;
pub mod config;
pub mod coriolis;
pub mod error;
pub mod guard;
pub mod interp;
pub mod log;
pub mod traj_data;
pub mod v3;
pub mod wind;

pub use atmosphere::Atmosphere;
pub use config::Config;
pub use coriolis::Coriolis;
pub use error::{BcError, InterceptionError, OutOfRangeError, ZeroFindingError};
pub use guard::ValueGuard;
pub use traj_data::{
    BaseTrajData, BaseTrajInterpKey, BaseTrajSeq, TerminationReason, TrajFlag, TrajectoryData,
    TrajectoryDataInputs,
};
pub use v3::V3;
pub use wind::{Wind, WindSock, MAX_WIND_DISTANCE_FEET};
