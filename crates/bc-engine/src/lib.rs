//! Point-mass trajectory integrators, event filter pipeline, and solvers
//! built on [`bc_core`] and [`bc_drag`].
//!
//! - [`shot_props`] — one shot's rifle/ammunition/atmosphere/wind/Coriolis
//!   geometry, plus stability/spin-drift/drag derivations.
//! - [`integrators`] — Euler-Cromer, RK4, and RKF45, each driving a
//!   [`handlers::TrajectoryHandler`] once per accepted step.
//! - [`handlers`] — the handler pipeline: essential terminators, the
//!   event-flagging filter, single-point/zero-crossing interpolators, and a
//!   dense-buffer recorder.
//! - [`engine`] — [`engine::Engine`], which owns one shot's [`Config`] and
//!   [`shot_props::ShotProps`] together with an integrator choice and
//!   exposes the full solver surface (`integrate`, `find_apex`,
//!   `zero_angle`, `find_max_range`, `find_zero_angle`, ...).

pub mod engine;
pub mod handlers;
pub mod integrators;
pub mod shot_props;

pub use bc_core::Config;
pub use engine::{Engine, Integrator, MAX_INTEGRATION_RANGE};
pub use handlers::{
    Compositor, DenseRecorder, EssentialTerminators, SinglePointHandler, TrajectoryDataFilter,
    TrajectoryHandler, ZeroCrossingHandler,
};
pub use shot_props::ShotProps;
