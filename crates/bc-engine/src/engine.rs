//! The `Engine`: owns one shot's [`ShotProps`] and [`Config`] plus an
//! [`Integrator`] choice, and exposes the solver surface everything else in
//! this crate only supports — `integrate`, `integrate_filtered`,
//! `integrate_at`, `find_apex`, `range_for_angle`, `error_at_distance`,
//! `zero_angle`, `find_max_range`, `find_zero_angle`,
//! `zero_angle_with_fallback`.
//!
//! (REDESIGN) The source guards every public method with a recursive mutex
//! so a solver can call back into `integrate` from the same thread without
//! deadlocking on itself. Rust's borrow checker makes that runtime lock
//! unnecessary: every method here takes `&mut self`, so a solver calling
//! another method on `self` is just an ordinary nested call checked
//! statically at compile time instead of policed at runtime. This is a
//! structural difference only; the call graph and behaviour it protects
//! are unchanged. One corollary of not holding a live lock over `self`: a
//! scoped [`ValueGuard`] override here is always applied to a local `Config`
//! copy (`Config` is `Copy`) that is threaded explicitly through the nested
//! calls that need it, rather than to `self.config` in place — borrowing
//! one field of `self.config` mutably for the guard's lifetime would
//! conflict with the `&mut self` every nested integration call also needs.
//! The effect callers observe is identical to the source's in-place,
//! mutex-protected override.

use bc_core::{
    BaseTrajData, BaseTrajInterpKey, BaseTrajSeq, BcError, Config, TerminationReason, TrajFlag,
    TrajectoryData, ValueGuard,
};

use crate::handlers::{
    derive_trajectory_data, Compositor, DenseRecorder, EssentialTerminators, SinglePointHandler,
    TrajectoryDataFilter, TrajectoryHandler, ZeroCrossingHandler,
};
use crate::integrators::{integrate_euler_cromer, integrate_rk4, integrate_rkf45};
use crate::shot_props::ShotProps;

/// Upper bound on integration range for searches that have no other natural
/// stopping point (`find_apex`, `integrate_at`, `range_for_angle`, ...).
pub const MAX_INTEGRATION_RANGE: f64 = 9e9;

/// Which ODE integrator an [`Engine`] drives its trajectory with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrator {
    Euler,
    Rk4,
    Rkf45,
}

/// Resolution of [`Engine::init_zero_calculation`]: either the degenerate
/// case already has an answer, or the caller should continue with a full
/// zero-finding search using the returned working data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZeroInitial {
    Done(f64),
    Continue(ZeroInitialData),
}

/// Working values `zero_angle`/`find_zero_angle` need once
/// `init_zero_calculation` has ruled out the degenerate cases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZeroInitialData {
    pub slant_range_ft: f64,
    pub look_angle_rad: f64,
    pub target_x_ft: f64,
    pub target_y_ft: f64,
    pub start_height_ft: f64,
}

/// One shot's geometry, the solver tuning knobs, and the integrator driving
/// it. The only public state beyond `shot`/`config`/`integrator`.
pub struct Engine {
    pub shot: ShotProps,
    pub config: Config,
    pub integrator: Integrator,
}

impl Engine {
    pub fn new(shot: ShotProps, config: Config, integrator: Integrator) -> Self {
        bc_core::log::ensure_log_level_initialized();
        Engine { shot, config, integrator }
    }

    fn run(
        shot: &mut ShotProps,
        config: &Config,
        integrator: Integrator,
        range_limit_ft: f64,
        handler: &mut dyn TrajectoryHandler,
    ) -> TerminationReason {
        let mut terminators = EssentialTerminators::new(
            range_limit_ft,
            config.c_minimum_velocity,
            config.c_maximum_drop,
            config.c_minimum_altitude,
            shot,
        );
        let handlers: Vec<Box<dyn TrajectoryHandler + '_>> =
            vec![Box::new(&mut terminators), Box::new(handler)];
        let mut composite = Compositor::new(handlers);

        match integrator {
            Integrator::Euler => integrate_euler_cromer(shot, config, &mut composite),
            Integrator::Rk4 => integrate_rk4(shot, config, &mut composite),
            Integrator::Rkf45 => integrate_rkf45(shot, config, &mut composite),
        }
    }

    /// Runs `handler` (composed behind [`EssentialTerminators`]) up to
    /// `range_limit_ft` using `self.config` unmodified.
    pub fn integrate(&mut self, range_limit_ft: f64, handler: &mut dyn TrajectoryHandler) -> TerminationReason {
        let config = self.config;
        self.integrate_with(range_limit_ft, &config, handler)
    }

    /// Same as [`Self::integrate`], but with an explicit `config` instead of
    /// `self.config` — the hook every solver that needs a scoped override
    /// goes through instead.
    fn integrate_with(
        &mut self,
        range_limit_ft: f64,
        config: &Config,
        handler: &mut dyn TrajectoryHandler,
    ) -> TerminationReason {
        Self::run(&mut self.shot, config, self.integrator, range_limit_ft, handler)
    }

    /// Integrates the full shot, recording a filtered `TrajectoryData` event
    /// stream (range/time samples plus APEX/MACH/ZERO crossings per
    /// `filter_flags`) and optionally a full-resolution dense buffer
    /// alongside it.
    pub fn integrate_filtered(
        &mut self,
        range_limit_ft: f64,
        range_step_ft: Option<f64>,
        time_step: Option<f64>,
        filter_flags: TrajFlag,
        dense: bool,
    ) -> (Vec<TrajectoryData>, TerminationReason, Option<BaseTrajSeq>) {
        let mut filter =
            TrajectoryDataFilter::new(range_step_ft, time_step, range_limit_ft, filter_flags, self.shot.look_angle);
        let mut dense_recorder = if dense { Some(DenseRecorder::new()) } else { None };

        let reason = {
            let mut handlers: Vec<Box<dyn TrajectoryHandler + '_>> = vec![Box::new(&mut filter)];
            if let Some(recorder) = dense_recorder.as_mut() {
                handlers.push(Box::new(recorder));
            }
            let mut composite = Compositor::new(handlers);
            self.integrate(range_limit_ft, &mut composite)
        };

        let records = filter.finish(&self.shot, reason);
        let dense_seq = dense_recorder.map(DenseRecorder::into_inner);
        (records, reason, dense_seq)
    }

    /// Integrates up to [`MAX_INTEGRATION_RANGE`], interpolating the point
    /// where `key` reaches `target_value`. Fails with
    /// [`BcError::Interception`] carrying the last accepted point if the
    /// target is never crossed.
    pub fn integrate_at(&mut self, key: BaseTrajInterpKey, target_value: f64) -> Result<BaseTrajData, BcError> {
        let mut handler = SinglePointHandler::new(key, target_value);
        self.integrate(MAX_INTEGRATION_RANGE, &mut handler);

        if let Some(hit) = handler.get_result() {
            return Ok(*hit);
        }

        let raw = handler.get_last().copied().unwrap_or(BaseTrajData {
            time: 0.0,
            position: bc_core::V3::ZERO,
            velocity: bc_core::V3::ZERO,
            mach: 0.0,
        });
        let full = derive_trajectory_data(&raw, &self.shot, TrajFlag::NONE);
        Err(BcError::interception(raw, full))
    }

    /// Finds the apex (vertical-velocity zero crossing), requiring
    /// `barrel_elevation > 0`. Temporarily zeroes `c_minimum_velocity` so
    /// the integrator doesn't stop descending on the way back down before
    /// the handler ever sees it — the apex happens on the way up.
    pub fn find_apex(&mut self) -> Result<BaseTrajData, BcError> {
        if self.shot.barrel_elevation <= 0.0 {
            return Err(BcError::Input(
                "barrel elevation must be greater than 0 to find apex".to_string(),
            ));
        }

        let mut config = self.config;
        let new_min_velocity = if config.c_minimum_velocity != 0.0 { 0.0 } else { config.c_minimum_velocity };
        let _velocity_guard = ValueGuard::new(&mut config.c_minimum_velocity, new_min_velocity);

        let mut handler = SinglePointHandler::new(BaseTrajInterpKey::VelY, 0.0);
        self.integrate_with(MAX_INTEGRATION_RANGE, &config, &mut handler);

        handler
            .get_result()
            .copied()
            .ok_or_else(|| BcError::Runtime("no apex flagged in trajectory data".to_string()))
    }

    fn range_for_angle_with(&mut self, config: &Config, angle_rad: f64) -> f64 {
        self.shot.barrel_elevation = angle_rad;
        let mut handler = ZeroCrossingHandler::new(self.shot.look_angle);
        self.integrate_with(MAX_INTEGRATION_RANGE, config, &mut handler);
        if handler.found() { handler.result_slant_distance() } else { 0.0 }
    }

    /// Sets `barrel_elevation` to `angle_rad` and returns the slant distance
    /// at the line-of-sight crossing, or `0.0` if the trajectory never
    /// crosses back down through it.
    pub fn range_for_angle(&mut self, angle_rad: f64) -> f64 {
        let config = self.config;
        self.range_for_angle_with(&config, angle_rad)
    }

    fn error_at_distance_with(
        &mut self,
        config: &Config,
        angle_rad: f64,
        target_x_ft: f64,
        target_y_ft: f64,
    ) -> Result<f64, BcError> {
        self.shot.barrel_elevation = angle_rad;
        let mut handler = SinglePointHandler::new(BaseTrajInterpKey::PosX, target_x_ft);
        self.integrate_with(MAX_INTEGRATION_RANGE, config, &mut handler);

        let hit = handler
            .get_result()
            .ok_or_else(|| BcError::Runtime("trajectory too short to determine error at distance".to_string()))?;

        if hit.time == 0.0 {
            return Err(BcError::Runtime("trajectory sequence error".to_string()));
        }

        Ok((hit.position.y - target_y_ft) - (hit.position.x - target_x_ft).abs())
    }

    /// Sets `barrel_elevation` to `angle_rad` and returns the vertical miss
    /// at `target_x_ft`, penalised by any horizontal shortfall: `(hit.y −
    /// target_y) − |hit.x − target_x|`.
    pub fn error_at_distance(&mut self, angle_rad: f64, target_x_ft: f64, target_y_ft: f64) -> Result<f64, BcError> {
        let config = self.config;
        self.error_at_distance_with(&config, angle_rad, target_x_ft, target_y_ft)
    }

    /// Resolves the degenerate zero-finding cases (near-zero distance,
    /// drag-free close shot, near-vertical shot) or signals the caller to
    /// continue with a full search.
    fn init_zero_calculation(
        &mut self,
        distance: f64,
        apex_is_max_range_radians: f64,
        allowed_zero_error_feet: f64,
    ) -> Result<ZeroInitial, BcError> {
        let slant_range_ft = distance;
        let mut look_angle_rad = self.shot.look_angle;
        let target_x_ft = slant_range_ft * look_angle_rad.cos();
        let target_y_ft = slant_range_ft * look_angle_rad.sin();
        let start_height_ft = -self.shot.sight_height * self.shot.cant_cosine;

        if slant_range_ft.abs() < allowed_zero_error_feet {
            return Ok(ZeroInitial::Done(look_angle_rad));
        }

        if slant_range_ft.abs() < 2.0 * start_height_ft.abs().max(self.config.c_step_multiplier) {
            look_angle_rad = (target_y_ft + start_height_ft).atan2(target_x_ft);
            return Ok(ZeroInitial::Done(look_angle_rad));
        }

        if (look_angle_rad - std::f64::consts::FRAC_PI_2).abs() < apex_is_max_range_radians {
            let apex = self.find_apex()?;
            let apex_slant_ft = apex.position.x * look_angle_rad.cos() + apex.position.y * look_angle_rad.sin();
            if apex_slant_ft < slant_range_ft {
                return Err(BcError::out_of_range(slant_range_ft, apex_slant_ft, look_angle_rad));
            }
            return Ok(ZeroInitial::Done(look_angle_rad));
        }

        Ok(ZeroInitial::Continue(ZeroInitialData {
            slant_range_ft,
            look_angle_rad,
            target_x_ft,
            target_y_ft,
            start_height_ft,
        }))
    }

    /// Damped Newton-like iteration for the barrel elevation that puts the
    /// trajectory through `(target_x_ft, target_y_ft)` (derived from
    /// `distance` and the shot's look angle). Temporarily raises
    /// `c_maximum_drop`/lowers `c_minimum_altitude` if needed so the shot
    /// geometry alone can't make the target unreachable before the solver
    /// even gets a chance to converge.
    pub fn zero_angle(
        &mut self,
        distance: f64,
        apex_is_max_range_radians: f64,
        allowed_zero_error_feet: f64,
    ) -> Result<f64, BcError> {
        let data = match self.init_zero_calculation(distance, apex_is_max_range_radians, allowed_zero_error_feet)? {
            ZeroInitial::Done(angle) => return Ok(angle),
            ZeroInitial::Continue(d) => d,
        };

        let look_angle_rad = data.look_angle_rad;
        let slant_range_ft = data.slant_range_ft;
        let target_x_ft = data.target_x_ft;
        let target_y_ft = data.target_y_ft;

        let max_iterations = self.config.c_max_iterations;
        let zero_finding_accuracy = self.config.c_zero_finding_accuracy;
        let required_drop_ft = target_x_ft / 2.0 - target_y_ft;

        let mut config = self.config;
        let new_max_drop = if config.c_maximum_drop.abs() < required_drop_ft { required_drop_ft } else { config.c_maximum_drop };
        let _drop_guard = ValueGuard::new(&mut config.c_maximum_drop, new_max_drop);
        let new_min_altitude = if config.c_minimum_altitude - self.shot.alt0 > required_drop_ft {
            self.shot.alt0 - required_drop_ft
        } else {
            config.c_minimum_altitude
        };
        let _altitude_guard = ValueGuard::new(&mut config.c_minimum_altitude, new_min_altitude);

        const DAMPING_RATE: f64 = 0.7;
        const DAMPING_FLOOR: f64 = 0.3;

        let mut iterations_count: u32 = 0;
        let mut range_error_ft = 9e9_f64;
        let mut prev_range_error_ft = 9e9_f64;
        let mut prev_height_error_ft = 9e9_f64;
        let mut damping_factor = 1.0_f64;
        let mut last_correction = 0.0_f64;
        let mut height_error_ft = zero_finding_accuracy * 2.0;

        while iterations_count < max_iterations {
            let mut handler = SinglePointHandler::new(BaseTrajInterpKey::PosX, target_x_ft);
            self.integrate_with(target_x_ft, &config, &mut handler);

            let hit = handler
                .get_result()
                .copied()
                .ok_or_else(|| BcError::Runtime("failed to interpolate trajectory at target distance".to_string()))?;

            if hit.time == 0.0 {
                break;
            }

            let current_distance = hit.position.x;
            if 2.0 * current_distance < target_x_ft && self.shot.barrel_elevation == 0.0 && look_angle_rad < 1.5 {
                self.shot.barrel_elevation = 0.01;
                iterations_count += 1;
                continue;
            }

            let ca = look_angle_rad.cos();
            let sa = look_angle_rad.sin();
            let height_diff_ft = hit.position.y * ca - hit.position.x * sa;
            let look_dist_ft = hit.position.x * ca + hit.position.y * sa;
            let range_diff_ft = look_dist_ft - slant_range_ft;
            range_error_ft = range_diff_ft.abs();
            height_error_ft = height_diff_ft.abs();
            let trajectory_angle = hit.velocity.y.atan2(hit.velocity.x);

            let sensitivity =
                (self.shot.barrel_elevation - look_angle_rad).tan() * (trajectory_angle - look_angle_rad).tan();
            let denominator =
                if sensitivity < -0.5 { look_dist_ft } else { look_dist_ft * (1.0 + sensitivity) };

            if denominator.abs() <= 1e-9 {
                return Err(BcError::zero_finding(height_error_ft, iterations_count, self.shot.barrel_elevation));
            }

            let mut correction = -height_diff_ft / denominator;

            if range_error_ft > allowed_zero_error_feet {
                if range_error_ft > prev_range_error_ft - 1e-6 {
                    return Err(BcError::zero_finding(range_error_ft, iterations_count, self.shot.barrel_elevation));
                }
            } else if height_error_ft > prev_height_error_ft.abs() {
                damping_factor *= DAMPING_RATE;
                if damping_factor < DAMPING_FLOOR {
                    return Err(BcError::zero_finding(height_error_ft, iterations_count, self.shot.barrel_elevation));
                }
                self.shot.barrel_elevation -= last_correction;
                correction = last_correction;
            } else if damping_factor < 1.0 {
                damping_factor = 1.0;
            }

            prev_range_error_ft = range_error_ft;
            prev_height_error_ft = height_error_ft;

            if height_error_ft > zero_finding_accuracy || range_error_ft > allowed_zero_error_feet {
                let applied_correction = correction * damping_factor;
                self.shot.barrel_elevation += applied_correction;
                last_correction = applied_correction;
            } else {
                break;
            }

            iterations_count += 1;
        }

        if height_error_ft > zero_finding_accuracy || range_error_ft > allowed_zero_error_feet {
            return Err(BcError::zero_finding(height_error_ft, iterations_count, self.shot.barrel_elevation));
        }

        Ok(self.shot.barrel_elevation)
    }

    /// Maximum slant range this shot geometry can reach, searching barrel
    /// elevation in `[low_angle_deg, high_angle_deg]` by golden-section
    /// search. Near-vertical look angles skip the search and report the
    /// apex's slant distance directly.
    pub fn find_max_range(
        &mut self,
        low_angle_deg: f64,
        high_angle_deg: f64,
        apex_is_max_range_radians: f64,
    ) -> Result<(f64, f64), BcError> {
        let look_angle_rad = self.shot.look_angle;

        if (look_angle_rad - std::f64::consts::FRAC_PI_2).abs() < apex_is_max_range_radians {
            let apex = self.find_apex()?;
            let sdist = apex.position.x * look_angle_rad.cos() + apex.position.y * look_angle_rad.sin();
            return Ok((sdist, look_angle_rad));
        }

        let mut config = self.config;
        let new_max_drop = if config.c_maximum_drop != 0.0 { 0.0 } else { config.c_maximum_drop };
        let _drop_guard = ValueGuard::new(&mut config.c_maximum_drop, new_max_drop);
        let new_min_velocity = if config.c_minimum_velocity != 0.0 { 0.0 } else { config.c_minimum_velocity };
        let _velocity_guard = ValueGuard::new(&mut config.c_minimum_velocity, new_min_velocity);

        const INV_PHI: f64 = 0.618_033_988_749_894_9;
        const INV_PHI_SQ: f64 = 0.381_966_011_250_105_15;
        let deg_to_rad = std::f64::consts::PI / 180.0;

        let mut a = low_angle_deg * deg_to_rad;
        let mut b = high_angle_deg * deg_to_rad;
        let mut h = b - a;
        let mut c = a + INV_PHI_SQ * h;
        let mut d = a + INV_PHI * h;

        let mut yc = self.range_for_angle_with(&config, c);
        let mut yd = self.range_for_angle_with(&config, d);

        for _ in 0..100 {
            if h < 1e-5 {
                break;
            }
            if yc > yd {
                b = d;
                d = c;
                yd = yc;
                h = b - a;
                c = a + INV_PHI_SQ * h;
                yc = self.range_for_angle_with(&config, c);
            } else {
                a = c;
                c = d;
                yc = yd;
                h = b - a;
                d = a + INV_PHI * h;
                yd = self.range_for_angle_with(&config, d);
            }
        }

        let angle_at_max_rad = (a + b) / 2.0;
        let max_range_ft = self.range_for_angle_with(&config, angle_at_max_rad);
        Ok((max_range_ft, angle_at_max_rad))
    }

    /// Full Ridder's-method zero-angle search, used as the robust fallback
    /// when [`Self::zero_angle`]'s damped-Newton iteration fails to
    /// converge. `lofted` picks the high-angle solution above the apex
    /// instead of the low-angle one below it.
    pub fn find_zero_angle(
        &mut self,
        distance: f64,
        lofted: bool,
        apex_is_max_range_radians: f64,
        allowed_zero_error_feet: f64,
    ) -> Result<f64, BcError> {
        let data = match self.init_zero_calculation(distance, apex_is_max_range_radians, allowed_zero_error_feet)? {
            ZeroInitial::Done(angle) => return Ok(angle),
            ZeroInitial::Continue(d) => d,
        };

        let look_angle_rad = data.look_angle_rad;
        let slant_range_ft = data.slant_range_ft;
        let target_x_ft = data.target_x_ft;
        let target_y_ft = data.target_y_ft;
        let start_height_ft = data.start_height_ft;

        let (max_range_ft, angle_at_max_rad) = self.find_max_range(0.0, 90.0, apex_is_max_range_radians)?;

        if slant_range_ft > max_range_ft {
            return Err(BcError::out_of_range(distance, max_range_ft, look_angle_rad));
        }
        if (slant_range_ft - max_range_ft).abs() < allowed_zero_error_feet {
            return Ok(angle_at_max_rad);
        }

        let mut config = self.config;
        let new_min_velocity = if config.c_minimum_velocity != 0.0 { 0.0 } else { config.c_minimum_velocity };
        let _velocity_guard = ValueGuard::new(&mut config.c_minimum_velocity, new_min_velocity);

        const LOFTED_HIGH_RAD: f64 = 1.569_030_871_963_747_3; // 89.9 degrees

        let (mut low_angle, high_angle_start) = if lofted {
            (angle_at_max_rad, LOFTED_HIGH_RAD)
        } else {
            let sight_height_adjust =
                if start_height_ft > 0.0 { start_height_ft.atan2(target_x_ft) } else { 0.0 };
            (look_angle_rad - sight_height_adjust, angle_at_max_rad)
        };
        let mut high_angle = high_angle_start;

        let mut f_low = self.error_at_distance_with(&config, low_angle, target_x_ft, target_y_ft)?;

        if f_low > 1e8 && (low_angle - look_angle_rad).abs() < 1e-9 {
            low_angle = look_angle_rad + 1e-3;
            f_low = self.error_at_distance_with(&config, low_angle, target_x_ft, target_y_ft)?;
        }

        let mut f_high = self.error_at_distance_with(&config, high_angle, target_x_ft, target_y_ft)?;

        if f_low * f_high >= 0.0 {
            log::warn!(
                "no {} zero trajectory in elevation range ({:.2}, {:.2}) deg: f(low)={:.2}, f(high)={:.2}",
                if lofted { "lofted" } else { "low" },
                low_angle.to_degrees(),
                high_angle.to_degrees(),
                f_low,
                f_high
            );
            return Err(BcError::zero_finding(target_y_ft, 0, self.shot.barrel_elevation));
        }

        let accuracy = self.config.c_zero_finding_accuracy;
        let max_iterations = self.config.c_max_iterations;

        for _ in 0..max_iterations {
            let mid_angle = (low_angle + high_angle) / 2.0;
            let f_mid = self.error_at_distance_with(&config, mid_angle, target_x_ft, target_y_ft)?;

            if f_mid.abs() < accuracy {
                return Ok(mid_angle);
            }

            let inner = f_mid * f_mid - f_low * f_high;
            if inner <= 0.0 {
                break;
            }
            let s = inner.sqrt();
            if s == 0.0 {
                break;
            }

            let next_angle = mid_angle + (mid_angle - low_angle) * ((f_low - f_high).signum() * f_mid / s);

            if (next_angle - mid_angle).abs() < accuracy {
                return Ok(next_angle);
            }

            let f_next = self.error_at_distance_with(&config, next_angle, target_x_ft, target_y_ft)?;

            if f_next.abs() < accuracy {
                return Ok(next_angle);
            }

            if f_mid * f_next < 0.0 {
                low_angle = mid_angle;
                f_low = f_mid;
                high_angle = next_angle;
                f_high = f_next;
            } else if f_low * f_next < 0.0 {
                high_angle = next_angle;
                f_high = f_next;
            } else if f_high * f_next < 0.0 {
                low_angle = next_angle;
                f_low = f_next;
            } else {
                break;
            }

            if (high_angle - low_angle).abs() < accuracy {
                return Ok((low_angle + high_angle) / 2.0);
            }
        }

        if (high_angle - low_angle).abs() < 10.0 * accuracy {
            return Ok((low_angle + high_angle) / 2.0);
        }
        if f_low.abs() < 10.0 * accuracy {
            return Ok(low_angle);
        }
        if f_high.abs() < 10.0 * accuracy {
            return Ok(high_angle);
        }

        Err(BcError::zero_finding(target_y_ft, max_iterations, (low_angle + high_angle) / 2.0))
    }

    /// Tries the damped-Newton [`Self::zero_angle`] first; on
    /// `ZeroFindingError`, logs and falls back to the guaranteed-bracketed
    /// [`Self::find_zero_angle`] (non-lofted).
    pub fn zero_angle_with_fallback(
        &mut self,
        distance: f64,
        apex_is_max_range_radians: f64,
        allowed_zero_error_feet: f64,
    ) -> Result<f64, BcError> {
        match self.zero_angle(distance, apex_is_max_range_radians, allowed_zero_error_feet) {
            Ok(angle) => Ok(angle),
            Err(BcError::ZeroFinding(_)) => {
                log::warn!("zero_angle failed to converge; falling back to find_zero_angle");
                self.find_zero_angle(distance, false, apex_is_max_range_radians, allowed_zero_error_feet)
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_core::{Atmosphere, Coriolis, WindSock};
    use bc_drag::CurvePoint;

    fn test_shot(barrel_elevation: f64) -> ShotProps {
        let mut shot = ShotProps {
            bc: 0.5,
            look_angle: 0.0,
            twist: 11.25,
            length: 1.24,
            diameter: 0.308,
            weight: 175.0,
            barrel_elevation,
            barrel_azimuth: 0.0,
            sight_height: 1.5,
            cant_cosine: 1.0,
            cant_sine: 0.0,
            alt0: 0.0,
            calc_step: 0.005,
            muzzle_velocity: 2600.0,
            stability_coefficient: 0.0,
            curve: vec![CurvePoint { a: 0.0, b: 0.0, c: 0.0, d: 0.3 }],
            mach_list: vec![0.0, 5.0],
            atmo: Atmosphere {
                t0: 15.0,
                a0: 0.0,
                p0: 1013.25,
                mach0: 1116.45,
                density_ratio: 1.0,
                lowest_temp_c: -130.0 * 5.0 / 9.0,
            },
            coriolis: Coriolis::default(),
            wind_sock: WindSock::default(),
            filter_flags: TrajFlag::NONE,
        };
        shot.update_stability_coefficient();
        shot
    }

    #[test]
    fn integrate_reaches_target_range() {
        let mut engine = Engine::new(test_shot(0.01), Config::default(), Integrator::Rk4);
        let mut terminators = EssentialTerminators::new(0.0, 0.0, 0.0, 0.0, &engine.shot);
        // re-run through the public surface instead
        let _ = &mut terminators;
        let mut handler = SinglePointHandler::new(BaseTrajInterpKey::PosX, 500.0);
        let reason = engine.integrate(MAX_INTEGRATION_RANGE, &mut handler);
        assert!(reason != TerminationReason::NoTerminate);
        assert!(handler.found());
    }

    #[test]
    fn integrate_filtered_produces_range_rows() {
        let mut engine = Engine::new(test_shot(0.01), Config::default(), Integrator::Rk4);
        let (rows, reason, dense) =
            engine.integrate_filtered(1000.0, Some(100.0), None, TrajFlag::RANGE, true);
        assert!(!rows.is_empty());
        assert_eq!(reason, TerminationReason::TargetRangeReached);
        assert!(dense.unwrap().len() > rows.len());
    }

    #[test]
    fn find_apex_requires_positive_elevation() {
        let mut engine = Engine::new(test_shot(0.0), Config::default(), Integrator::Rk4);
        assert!(engine.find_apex().is_err());
    }

    #[test]
    fn find_apex_finds_zero_vertical_velocity() {
        let mut engine = Engine::new(test_shot(0.05), Config::default(), Integrator::Rk4);
        let apex = engine.find_apex().unwrap();
        assert!(apex.velocity.y.abs() < 1.0);
    }

    #[test]
    fn range_for_angle_matches_zero_crossing() {
        let mut engine = Engine::new(test_shot(0.0), Config::default(), Integrator::Rk4);
        let dist = engine.range_for_angle(0.02);
        assert!(dist > 0.0);
    }

    #[test]
    fn zero_angle_converges_for_a_reasonable_distance() {
        let mut engine = Engine::new(test_shot(0.0), Config::default(), Integrator::Rk4);
        let angle = engine.zero_angle(300.0, 1e-6, 0.01).unwrap();
        assert!(angle > 0.0 && angle < 0.1);
        let error = engine.error_at_distance(angle, 300.0, 0.0).unwrap();
        assert!(error.abs() < Config::DEFAULT_ZERO_FINDING_ACCURACY * 50.0);
    }

    #[test]
    fn find_max_range_reports_a_positive_angle_and_range() {
        let mut engine = Engine::new(test_shot(0.0), Config::default(), Integrator::Rk4);
        let (max_range, angle) = engine.find_max_range(0.0, 60.0, 1e-6).unwrap();
        assert!(max_range > 0.0);
        assert!(angle > 0.0);
    }

    #[test]
    fn find_zero_angle_matches_zero_angle_within_tolerance() {
        let mut engine = Engine::new(test_shot(0.0), Config::default(), Integrator::Rk4);
        let newton = engine.zero_angle(300.0, 1e-6, 0.01).unwrap();
        let ridder = engine.find_zero_angle(300.0, false, 1e-6, 0.01).unwrap();
        assert!((newton - ridder).abs() < 1e-3);
    }

    #[test]
    fn zero_angle_with_fallback_returns_ok() {
        let mut engine = Engine::new(test_shot(0.0), Config::default(), Integrator::Rk4);
        assert!(engine.zero_angle_with_fallback(300.0, 1e-6, 0.01).is_ok());
    }
}
