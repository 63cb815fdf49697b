//! The three ODE integrators an [`crate::engine::Engine`] can drive: a
//! velocity-adaptive Euler-Cromer step, classical fixed-step RK4, and an
//! adaptive embedded RKF45. All three share one calling convention: call
//! `handler.handle()` with the current (pre-step) point, advance the state
//! regardless of what the handler returned, and loop again unless the
//! handler asked to stop — in which case one further point (the state one
//! step past where the handler asked to stop) is still delivered to the
//! handler once more after the loop exits, matching the reference
//! integrators' unconditional post-loop handler call.

use bc_core::{BaseTrajData, Config, TerminationReason, V3};

use crate::handlers::TrajectoryHandler;
use crate::shot_props::ShotProps;

/// Below this Mach number the local speed of sound is treated as degenerate
/// (e.g. right at a troposphere boundary) and clamped, to avoid dividing by
/// a near-zero mach when computing the drag argument.
const MIN_MACH: f64 = 1e-6;

fn gravity_vector(config: &Config) -> V3 {
    V3::new(0.0, config.c_gravity_constant, 0.0)
}

/// Initial (position, velocity) state shared by all three integrators:
/// position accounts for cant/sight height, velocity points along the
/// barrel's elevation/azimuth at the muzzle velocity.
fn initial_state(props: &ShotProps) -> (V3, V3) {
    let range_vector = V3::new(
        0.0,
        -props.cant_cosine * props.sight_height,
        -props.cant_sine * props.sight_height,
    );

    let cos_elev = props.barrel_elevation.cos();
    let dir_vector = V3::new(
        cos_elev * props.barrel_azimuth.cos(),
        props.barrel_elevation.sin(),
        cos_elev * props.barrel_azimuth.sin(),
    );
    let velocity_vector = dir_vector * props.muzzle_velocity;

    (range_vector, velocity_vector)
}

fn safe_mach(mach: f64) -> f64 {
    if mach <= 0.0 {
        MIN_MACH
    } else {
        mach
    }
}

/// `gravity + coriolis_acceleration_local(ground_velocity)`, zero coriolis
/// term when the shot is in flat-fire mode (that mode's Coriolis correction
/// is applied as a closed-form range offset instead, not in the equations
/// of motion).
fn gravity_plus_coriolis(gravity: V3, props: &ShotProps, ground_velocity: V3) -> V3 {
    if props.coriolis.flat_fire_only {
        gravity
    } else {
        gravity + props.coriolis.coriolis_acceleration_local(ground_velocity)
    }
}

/// `gravity_plus_coriolis − km·|v_rel|·v_rel`, the common acceleration term
/// every integrator evaluates at every (sub-)stage.
fn acceleration(rel_velocity: V3, gravity_plus_coriolis: V3, km: f64, rel_speed: f64) -> V3 {
    let mut a = gravity_plus_coriolis;
    a.fused_multiply_add(rel_velocity, -km * rel_speed);
    a
}

/// Semi-implicit Euler (Euler-Cromer): velocity is updated from the current
/// acceleration first, then position is updated from the *new* velocity.
/// `dt` is velocity-adaptive (`calc_step / max(1, |v_rel|)`), the only
/// variant present in the reference source; the plain (non-Cromer) Euler
/// update is not implemented.
pub fn integrate_euler_cromer(
    props: &mut ShotProps,
    config: &Config,
    handler: &mut dyn TrajectoryHandler,
) -> TerminationReason {
    let gravity = gravity_vector(config);
    let (mut range_vector, mut velocity_vector) = initial_state(props);
    let mut time = 0.0_f64;
    let mut mach = 0.0_f64;

    let reason = loop {
        let wind_vector = props.wind_sock.vector_for_range(range_vector.x);
        let (density_ratio, m) = props
            .atmo
            .update_density_factor_and_mach_for_altitude(props.alt0 + range_vector.y);
        mach = safe_mach(m);

        let point = BaseTrajData {
            time,
            position: range_vector,
            velocity: velocity_vector,
            mach,
        };
        let stop = handler.handle(&point, props);

        let relative_velocity = velocity_vector - wind_vector;
        let relative_speed = relative_velocity.magnitude();
        let dt = props.calc_step / relative_speed.max(1.0);

        let km = density_ratio * props.drag_by_mach(relative_speed / mach);
        let gpc = gravity_plus_coriolis(gravity, props, velocity_vector);
        let accel = acceleration(relative_velocity, gpc, km, relative_speed);

        velocity_vector.fused_multiply_add(accel, dt);
        range_vector.fused_multiply_add(velocity_vector, dt);
        time += dt;

        if let Some(r) = stop {
            break r;
        }
    };

    let final_point = BaseTrajData {
        time,
        position: range_vector,
        velocity: velocity_vector,
        mach,
    };
    let _ = handler.handle(&final_point, props);

    reason
}

/// Classical fourth-order Runge-Kutta at a fixed step `calc_step`.
/// `gravity_plus_coriolis` and the drag coefficient `km` are computed once
/// per outer step from the ground state (not recomputed per sub-stage);
/// only the sub-stage relative-velocity magnitude varies between k1..k4.
pub fn integrate_rk4(
    props: &mut ShotProps,
    config: &Config,
    handler: &mut dyn TrajectoryHandler,
) -> TerminationReason {
    let gravity = gravity_vector(config);
    let (mut range_vector, mut velocity_vector) = initial_state(props);
    let mut time = 0.0_f64;
    let mut mach = 0.0_f64;
    let dt = props.calc_step;
    let dt_half = 0.5 * dt;
    let dt_sixth = dt / 6.0;

    let reason = loop {
        let wind_vector = props.wind_sock.vector_for_range(range_vector.x);
        let (density_ratio, m) = props
            .atmo
            .update_density_factor_and_mach_for_altitude(props.alt0 + range_vector.y);
        mach = safe_mach(m);

        let point = BaseTrajData {
            time,
            position: range_vector,
            velocity: velocity_vector,
            mach,
        };
        let stop = handler.handle(&point, props);

        let relative_velocity = velocity_vector - wind_vector;
        let relative_speed = relative_velocity.magnitude();
        let km = density_ratio * props.drag_by_mach(relative_speed / mach);
        let gpc = gravity_plus_coriolis(gravity, props, velocity_vector);

        let k1_v = acceleration(relative_velocity, gpc, km, relative_speed);
        let k1_p = velocity_vector;

        let mut v_temp = relative_velocity;
        v_temp.fused_multiply_add(k1_v, dt_half);
        let k2_v = acceleration(v_temp, gpc, km, v_temp.magnitude());
        let mut p_temp = velocity_vector;
        p_temp.fused_multiply_add(k1_v, dt_half);
        let k2_p = p_temp;

        let mut v_temp = relative_velocity;
        v_temp.fused_multiply_add(k2_v, dt_half);
        let k3_v = acceleration(v_temp, gpc, km, v_temp.magnitude());
        let mut p_temp = velocity_vector;
        p_temp.fused_multiply_add(k2_v, dt_half);
        let k3_p = p_temp;

        let mut v_temp = relative_velocity;
        v_temp.fused_multiply_add(k3_v, dt);
        let k4_v = acceleration(v_temp, gpc, km, v_temp.magnitude());
        let mut p_temp = velocity_vector;
        p_temp.fused_multiply_add(k3_v, dt);
        let k4_p = p_temp;

        velocity_vector.fused_multiply_add(k1_v, dt_sixth);
        velocity_vector.fused_multiply_add(k2_v, 2.0 * dt_sixth);
        velocity_vector.fused_multiply_add(k3_v, 2.0 * dt_sixth);
        velocity_vector.fused_multiply_add(k4_v, dt_sixth);

        range_vector.fused_multiply_add(k1_p, dt_sixth);
        range_vector.fused_multiply_add(k2_p, 2.0 * dt_sixth);
        range_vector.fused_multiply_add(k3_p, 2.0 * dt_sixth);
        range_vector.fused_multiply_add(k4_p, dt_sixth);
        time += dt;

        if let Some(r) = stop {
            break r;
        }
    };

    let final_point = BaseTrajData {
        time,
        position: range_vector,
        velocity: velocity_vector,
        mach,
    };
    let _ = handler.handle(&final_point, props);

    reason
}

/// Fehlberg nodes (`A_RKF`), reproduced for documentation purposes only —
/// the stage altitudes used to refresh atmosphere are read off the
/// intermediate position vectors directly, not recomputed from these.
#[allow(dead_code)]
const A_RKF: [f64; 6] = [0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0];

/// Fehlberg combination matrix: `B_RKF[i][j]` is the coefficient of stage
/// `j` in stage `i`'s intermediate state, for `j < i`.
const B_RKF: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 4.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0],
    [1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0],
    [439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0],
    [-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
];

/// Fifth-order combination weights.
const C_RKF_5: [f64; 6] = [
    16.0 / 135.0,
    0.0,
    6656.0 / 12825.0,
    28561.0 / 56430.0,
    -9.0 / 50.0,
    2.0 / 55.0,
];

/// Fourth-order combination weights, used only to form the embedded error
/// estimate against [`C_RKF_5`].
const C_RKF_4: [f64; 6] = [25.0 / 216.0, 0.0, 1408.0 / 2565.0, 2197.0 / 4104.0, -1.0 / 5.0, 0.0];

/// Absolute and relative tolerance terms of `accept_tol = ABS_TOL + REL_TOL
/// · max(‖r‖, ‖v‖)`.
const ABS_TOL: f64 = 1e-6;
const REL_TOL: f64 = 1e-6;
/// Step size floor/ceiling an accepted or retried step is clamped to.
const DT_MIN: f64 = 1e-6;
const DT_MAX: f64 = 0.05;

/// One attempted-then-possibly-retried RKF45 step: evaluates the six-stage
/// tableau, accepts or rejects based on the embedded error estimate against
/// `accept_tol`, and adapts `*h` for the next call either way. Returns the
/// accepted `(range_vector, velocity_vector, time)` once a step is accepted.
#[allow(clippy::too_many_arguments)]
fn step_rkf45(
    props: &ShotProps,
    gravity: V3,
    h: &mut f64,
    range_vector: V3,
    velocity_vector: V3,
    time: f64,
    wind_vector: V3,
) -> (V3, V3, f64) {
    loop {
        let step = h.min(DT_MAX);

        let mut k_v: [V3; 6] = [V3::ZERO; 6];
        let mut k_p: [V3; 6] = [V3::ZERO; 6];

        for i in 0..6 {
            let mut r_temp = range_vector;
            let mut v_temp = velocity_vector;
            for j in 0..i {
                let b = B_RKF[i][j];
                r_temp.fused_multiply_add(k_p[j], step * b);
                v_temp.fused_multiply_add(k_v[j], step * b);
            }

            let (density_ratio, m) = props
                .atmo
                .update_density_factor_and_mach_for_altitude(props.alt0 + r_temp.y);
            let mach = safe_mach(m);

            let relative_velocity = v_temp - wind_vector;
            let relative_speed = relative_velocity.magnitude();
            let km = density_ratio * props.drag_by_mach(relative_speed / mach);
            let gpc = gravity_plus_coriolis(gravity, props, v_temp);

            k_v[i] = acceleration(relative_velocity, gpc, km, relative_speed);
            k_p[i] = v_temp;
        }

        let mut next_v = velocity_vector;
        let mut next_r = range_vector;
        let mut error_v = V3::ZERO;
        let mut error_r = V3::ZERO;
        for i in 0..6 {
            next_v.fused_multiply_add(k_v[i], step * C_RKF_5[i]);
            next_r.fused_multiply_add(k_p[i], step * C_RKF_5[i]);
            let error_coeff = C_RKF_5[i] - C_RKF_4[i];
            error_v.fused_multiply_add(k_v[i], step * error_coeff);
            error_r.fused_multiply_add(k_p[i], step * error_coeff);
        }

        let err = error_v.magnitude().max(error_r.magnitude());
        let accept_tol = ABS_TOL + REL_TOL * range_vector.magnitude().max(velocity_vector.magnitude());

        if err > accept_tol && step > DT_MIN {
            let scale = (0.9 * (accept_tol / err).powf(0.25)).clamp(0.2, 5.0);
            *h = (step * scale).max(DT_MIN);
            continue;
        }

        if err < 0.1 * accept_tol && step < DT_MAX {
            let growth = (0.9 * (accept_tol / err.max(1e-300)).powf(0.2)).min(5.0);
            *h = (step * growth).min(DT_MAX);
        } else {
            *h = step;
        }

        return (next_r, next_v, time + step);
    }
}

/// Adaptive embedded Runge-Kutta-Fehlberg 4(5): each accepted step calls the
/// handler once (rejected/retried steps never do), with atmosphere/density
/// refreshed at every sub-stage's altitude rather than once per outer step.
pub fn integrate_rkf45(
    props: &mut ShotProps,
    config: &Config,
    handler: &mut dyn TrajectoryHandler,
) -> TerminationReason {
    let gravity = gravity_vector(config);
    let (mut range_vector, mut velocity_vector) = initial_state(props);
    let mut time = 0.0_f64;
    let mut h = props.calc_step;

    let reason = loop {
        let wind_vector = props.wind_sock.vector_for_range(range_vector.x);
        let (_density_ratio, m) = props
            .atmo
            .update_density_factor_and_mach_for_altitude(props.alt0 + range_vector.y);
        let mach = safe_mach(m);

        let point = BaseTrajData {
            time,
            position: range_vector,
            velocity: velocity_vector,
            mach,
        };
        let stop = handler.handle(&point, props);

        let (next_r, next_v, next_t) =
            step_rkf45(props, gravity, &mut h, range_vector, velocity_vector, time, wind_vector);
        range_vector = next_r;
        velocity_vector = next_v;
        time = next_t;

        if let Some(r) = stop {
            break r;
        }
    };

    let (_density_ratio, m) = props
        .atmo
        .update_density_factor_and_mach_for_altitude(props.alt0 + range_vector.y);
    let final_point = BaseTrajData {
        time,
        position: range_vector,
        velocity: velocity_vector,
        mach: safe_mach(m),
    };
    let _ = handler.handle(&final_point, props);

    reason
}
