//! Event-driven handler pipeline: each integrator calls `handle()` once per
//! accepted step, before mutating state, and a handler decides whether the
//! point is interesting, whether integration should stop, or both.

use bc_core::interp::interpolate_3pt;
use bc_core::{
    BaseTrajData, BaseTrajInterpKey, BaseTrajSeq, TerminationReason, TrajFlag, TrajectoryData,
    TrajectoryDataInputs, V3,
};

use crate::shot_props::ShotProps;

/// Below this difference in recorded time, two rows are merged into one
/// instead of emitted as separate rows with the same timestamp.
const SEPARATE_ROW_TIME_DELTA: f64 = 1e-5;

/// Float-equality tolerance used when deciding a requested range/time has
/// been hit exactly rather than needing interpolation.
const EPSILON: f64 = 1e-6;

/// Minimum number of accepted steps before `EssentialTerminators` will stop
/// a run purely because the target range was reached (guards against a
/// spurious very-first-step termination).
const MIN_ITERATIONS_COUNT: u32 = 2;

/// Something an integrator asks about every accepted trajectory point,
/// before that point's state is used to advance to the next one.
pub trait TrajectoryHandler {
    /// Inspects `raw` (and the shot it came from). Returning `Some(reason)`
    /// asks the integrator to stop after this point.
    fn handle(&mut self, raw: &BaseTrajData, props: &ShotProps) -> Option<TerminationReason>;
}

/// Lets a `&mut dyn TrajectoryHandler` (or `&mut` any concrete handler) be
/// boxed into a `Compositor` alongside owned handlers, so a solver can
/// compose a borrowed caller handler with a stack-local one without an
/// ownership-transferring adapter type.
impl<T: TrajectoryHandler + ?Sized> TrajectoryHandler for &mut T {
    fn handle(&mut self, raw: &BaseTrajData, props: &ShotProps) -> Option<TerminationReason> {
        (**self).handle(raw, props)
    }
}

/// Runs a list of handlers in order for every point. Every handler sees
/// every point regardless of whether an earlier one requested termination
/// for it: ordering only decides which reason wins when more than one
/// handler flags the same point, not whether later handlers still run.
/// This matters because a caller-supplied recording handler must still see
/// the point that made `EssentialTerminators` stop the loop.
pub struct Compositor<'a> {
    handlers: Vec<Box<dyn TrajectoryHandler + 'a>>,
}

impl<'a> Compositor<'a> {
    pub fn new(handlers: Vec<Box<dyn TrajectoryHandler + 'a>>) -> Self {
        Compositor { handlers }
    }
}

impl TrajectoryHandler for Compositor<'_> {
    fn handle(&mut self, raw: &BaseTrajData, props: &ShotProps) -> Option<TerminationReason> {
        let mut reason = None;
        for handler in &mut self.handlers {
            if let Some(r) = handler.handle(raw, props) {
                if reason.is_none() {
                    reason = Some(r);
                }
            }
        }
        reason
    }
}

/// Builds the (ShotProps, BaseTrajData) -> TrajectoryData bridge every
/// handler in this module needs: resolves Coriolis-adjusted range, spin
/// drift, and the atmosphere/drag lookup at the raw row's altitude.
pub fn derive_trajectory_data(raw: &BaseTrajData, props: &ShotProps, flag: TrajFlag) -> TrajectoryData {
    let adjusted_range = props.coriolis.adjust_range(raw.time, raw.position);
    let spin_drift_ft = props.spin_drift(raw.time);
    let (density_ratio, local_mach) = props
        .atmo
        .update_density_factor_and_mach_for_altitude(props.alt0 + raw.position.y);
    let velocity_fps = raw.velocity.magnitude();
    let mach = if raw.mach != 0.0 { velocity_fps / raw.mach } else { velocity_fps / local_mach };
    let drag = props.drag_by_mach(mach);

    let inputs = TrajectoryDataInputs {
        adjusted_range,
        spin_drift_ft,
        look_angle_rad: props.look_angle,
        mach_override: raw.mach,
        density_ratio,
        local_mach,
        drag,
        weight_gr: props.weight,
    };
    TrajectoryData::from_base(raw, &inputs, flag)
}

/// Range/time-limit, velocity-floor, drop-limit, and altitude-floor
/// termination checks applied to every accepted step regardless of which
/// event-recording handlers are also installed.
pub struct EssentialTerminators {
    target_x: f64,
    minimum_velocity: f64,
    max_drop_ft: f64,
    minimum_altitude: f64,
    alt0: f64,
    iterations: u32,
}

impl EssentialTerminators {
    pub fn new(target_x: f64, minimum_velocity: f64, maximum_drop: f64, minimum_altitude: f64, props: &ShotProps) -> Self {
        let max_drop_ft = -maximum_drop.abs() + (0.0_f64).min(-props.cant_cosine * props.sight_height);
        EssentialTerminators {
            target_x,
            minimum_velocity,
            max_drop_ft,
            minimum_altitude,
            alt0: props.alt0,
            iterations: 0,
        }
    }
}

impl TrajectoryHandler for EssentialTerminators {
    fn handle(&mut self, raw: &BaseTrajData, _props: &ShotProps) -> Option<TerminationReason> {
        self.iterations += 1;

        if self.iterations > MIN_ITERATIONS_COUNT && raw.position.x >= self.target_x {
            return Some(TerminationReason::TargetRangeReached);
        }
        if raw.velocity.magnitude() < self.minimum_velocity {
            return Some(TerminationReason::MinimumVelocityReached);
        }
        if raw.position.y < self.max_drop_ft {
            return Some(TerminationReason::MaximumDropReached);
        }
        if raw.velocity.y <= 0.0 && self.alt0 + raw.position.y < self.minimum_altitude {
            return Some(TerminationReason::MinimumAltitudeReached);
        }
        None
    }
}

/// Records the point where `key` reaches `target_value`, interpolating a
/// three-point window around the crossing with the same field-by-field
/// PCHIP used everywhere else rows get interpolated. Requests
/// [`TerminationReason::HandlerRequestedStop`] as soon as the target is
/// bracketed, which is what lets `Engine`'s solvers avoid building a full
/// dense trajectory just to read off one point (`find_apex`, `zero_angle`,
/// `error_at_distance`, `integrate_at` all use this).
pub struct SinglePointHandler {
    key: BaseTrajInterpKey,
    target_value: f64,
    points: [Option<BaseTrajData>; 3],
    count: usize,
    target_passed: bool,
    result: Option<BaseTrajData>,
}

impl SinglePointHandler {
    pub fn new(key: BaseTrajInterpKey, target_value: f64) -> Self {
        SinglePointHandler {
            key,
            target_value,
            points: [None, None, None],
            count: 0,
            target_passed: false,
            result: None,
        }
    }

    pub fn found(&self) -> bool {
        self.result.is_some()
    }

    pub fn get_result(&self) -> Option<&BaseTrajData> {
        self.result.as_ref()
    }

    /// Last point seen, whether or not the target was ever crossed: used by
    /// callers that want to report "trajectory too short" with the
    /// furthest-downrange point available.
    pub fn get_last(&self) -> Option<&BaseTrajData> {
        if self.count == 0 {
            None
        } else {
            self.points[self.count.min(3) - 1].as_ref()
        }
    }

    pub fn get_count(&self) -> usize {
        self.count
    }

    fn push(&mut self, raw: BaseTrajData) {
        if self.count < 3 {
            self.points[self.count] = Some(raw);
            self.count += 1;
        } else {
            self.points[0] = self.points[1];
            self.points[1] = self.points[2];
            self.points[2] = Some(raw);
        }
    }
}

impl TrajectoryHandler for SinglePointHandler {
    fn handle(&mut self, raw: &BaseTrajData, _props: &ShotProps) -> Option<TerminationReason> {
        if self.target_passed {
            return None;
        }

        self.push(*raw);

        if self.count < 3 {
            return None;
        }

        let (p0, p1, p2) = (
            self.points[0].unwrap(),
            self.points[1].unwrap(),
            self.points[2].unwrap(),
        );
        let val_prev = p1.key_value(self.key);
        let val_curr = p2.key_value(self.key);

        let crossed = (val_prev <= self.target_value && self.target_value <= val_curr)
            || (val_curr <= self.target_value && self.target_value <= val_prev);
        if !crossed {
            return None;
        }

        self.target_passed = true;

        let (k0, k1, k2) = (p0.key_value(self.key), p1.key_value(self.key), p2.key_value(self.key));
        if k0 == k1 || k1 == k2 || k0 == k2 {
            // Degenerate (zero-width) stencil: leave the target unresolved
            // rather than interpolate through a repeated knot.
            return None;
        }

        self.result = Some(BaseTrajData::interpolate3pt(
            self.target_value,
            &p0,
            &p1,
            &p2,
            self.key,
        ));
        Some(TerminationReason::HandlerRequestedStop)
    }
}

/// Records the point where slant height crosses zero (the sight-line
/// intersection), interpolating linearly between the two straddling rows.
pub struct ZeroCrossingHandler {
    look_angle_cos: f64,
    look_angle_sin: f64,
    prev_point: Option<BaseTrajData>,
    result: Option<BaseTrajData>,
    result_slant_distance: f64,
}

impl ZeroCrossingHandler {
    pub fn new(look_angle_rad: f64) -> Self {
        ZeroCrossingHandler {
            look_angle_cos: look_angle_rad.cos(),
            look_angle_sin: look_angle_rad.sin(),
            prev_point: None,
            result: None,
            result_slant_distance: 0.0,
        }
    }

    fn slant_height(&self, raw: &BaseTrajData) -> f64 {
        raw.position.y * self.look_angle_cos - raw.position.x * self.look_angle_sin
    }

    pub fn found(&self) -> bool {
        self.result.is_some()
    }

    pub fn get_result(&self) -> Option<&BaseTrajData> {
        self.result.as_ref()
    }

    pub fn result_slant_distance(&self) -> f64 {
        self.result_slant_distance
    }
}

impl TrajectoryHandler for ZeroCrossingHandler {
    fn handle(&mut self, raw: &BaseTrajData, _props: &ShotProps) -> Option<TerminationReason> {
        if self.result.is_some() {
            return None;
        }

        let h_curr = self.slant_height(raw);

        if let Some(prev) = self.prev_point {
            let h_prev = self.slant_height(&prev);
            if h_prev > 0.0 && h_curr <= 0.0 {
                let t = (h_prev / (h_prev - h_curr)).clamp(0.0, 1.0);
                let interp = BaseTrajData {
                    time: prev.time + t * (raw.time - prev.time),
                    position: V3::new(
                        prev.position.x + t * (raw.position.x - prev.position.x),
                        prev.position.y + t * (raw.position.y - prev.position.y),
                        prev.position.z + t * (raw.position.z - prev.position.z),
                    ),
                    velocity: V3::new(
                        prev.velocity.x + t * (raw.velocity.x - prev.velocity.x),
                        prev.velocity.y + t * (raw.velocity.y - prev.velocity.y),
                        prev.velocity.z + t * (raw.velocity.z - prev.velocity.z),
                    ),
                    mach: prev.mach + t * (raw.mach - prev.mach),
                };
                self.result_slant_distance =
                    interp.position.x * self.look_angle_cos + interp.position.y * self.look_angle_sin;
                self.result = Some(interp);
            }
        }

        self.prev_point = Some(*raw);
        None
    }
}

/// What a sampling handler recorded this step, used by
/// [`TrajectoryDataFilter::merge_or_add`] to decide whether two candidate
/// rows at (nearly) the same time should collapse into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleKind {
    Range,
    Time,
    Apex,
    Mach,
    ZeroUp,
    ZeroDown,
}

/// Full event-extraction filter: records RANGE/TIME samples at a fixed
/// step, plus APEX/MACH/ZERO_UP/ZERO_DOWN crossing events, deduplicating
/// rows that land within [`SEPARATE_ROW_TIME_DELTA`] of each other.
///
/// `finish(self)` (not `Drop`) is the API for flushing the final buffered
/// point: a `Drop` impl can't fallibly construct a `TrajectoryData` or
/// report an error, and this filter isn't releasing a resource so much as
/// producing a result — `Drop` here would either have to panic on failure
/// or silently swallow it, neither of which this crate does anywhere else.
pub struct TrajectoryDataFilter {
    range_step: Option<f64>,
    time_step: Option<f64>,
    range_limit: f64,
    /// Event kinds still eligible to fire. Starts as the caller's requested
    /// flags and only shrinks: the first point's state permanently disables
    /// crossings that can't happen (see `handle`'s first-point branch), and
    /// `APEX`/`MACH` are cleared the first time each actually fires so a
    /// later numerical wobble can't record a second one.
    active: TrajFlag,
    look_angle_cos: f64,
    look_angle_sin: f64,
    look_angle_tan: f64,

    next_range: f64,
    next_time: f64,
    prev_prev: Option<BaseTrajData>,
    prev: Option<BaseTrajData>,

    rows: Vec<(f64, SampleKind, TrajectoryData)>,
}

impl TrajectoryDataFilter {
    pub fn new(
        range_step: Option<f64>,
        time_step: Option<f64>,
        range_limit: f64,
        flags: TrajFlag,
        look_angle: f64,
    ) -> Self {
        TrajectoryDataFilter {
            range_step,
            time_step,
            range_limit,
            active: flags,
            look_angle_cos: look_angle.cos(),
            look_angle_sin: look_angle.sin(),
            look_angle_tan: look_angle.tan(),
            next_range: 0.0,
            next_time: 0.0,
            prev_prev: None,
            prev: None,
            rows: Vec::new(),
        }
    }

    fn add_row(&mut self, time: f64, kind: SampleKind, data: TrajectoryData) {
        self.merge_sorted_record(time, kind, data);
    }

    fn merge_sorted_record(&mut self, time: f64, kind: SampleKind, data: TrajectoryData) {
        if let Some(last) = self.rows.last_mut() {
            if (time - last.0).abs() < SEPARATE_ROW_TIME_DELTA {
                let merged_flag = last.2.flag | data.flag;
                last.2 = data;
                last.2.flag = merged_flag;
                last.1 = kind;
                return;
            }
        }
        self.rows.push((time, kind, data));
    }

    fn slant_height(&self, raw: &BaseTrajData) -> f64 {
        raw.position.y * self.look_angle_cos - raw.position.x * self.look_angle_sin
    }

    fn mach_ratio(raw: &BaseTrajData) -> f64 {
        raw.velocity.magnitude() / raw.mach.max(f64::EPSILON)
    }

    /// Three-point PCHIP interpolation against an arbitrary scalar function
    /// of a row rather than one of `BaseTrajInterpKey`'s raw fields. Used for
    /// the zero crossing (slant height) and Mach crossing (velocity / local
    /// Mach-1 speed), neither of which is itself a stored field.
    fn interpolate_by(
        target: f64,
        p0: &BaseTrajData,
        p1: &BaseTrajData,
        p2: &BaseTrajData,
        key_fn: impl Fn(&BaseTrajData) -> f64,
    ) -> BaseTrajData {
        let (k0, k1, k2) = (key_fn(p0), key_fn(p1), key_fn(p2));
        let field = |f: fn(&BaseTrajData) -> f64| {
            interpolate_3pt(target, k0, k1, k2, f(p0), f(p1), f(p2))
        };
        BaseTrajData {
            time: field(|r| r.time),
            position: V3::new(
                field(|r| r.position.x),
                field(|r| r.position.y),
                field(|r| r.position.z),
            ),
            velocity: V3::new(
                field(|r| r.velocity.x),
                field(|r| r.velocity.y),
                field(|r| r.velocity.z),
            ),
            mach: field(|r| r.mach),
        }
    }

    /// Consumes the filter, flushing the final point if one is pending, and
    /// returns the recorded rows in time order. The final-point flush is
    /// skipped when `termination_reason` is `TargetRangeReached`: that run
    /// already ended exactly where it was asked to, so the last accepted
    /// point carries no additional information worth a synthetic unflagged
    /// row (mirrors the original filter's destructor guard).
    pub fn finish(mut self, props: &ShotProps, termination_reason: TerminationReason) -> Vec<TrajectoryData> {
        if termination_reason != TerminationReason::TargetRangeReached {
            if let Some(last_raw) = self.prev {
                if !self
                    .rows
                    .last()
                    .is_some_and(|(t, ..)| (t - last_raw.time).abs() < SEPARATE_ROW_TIME_DELTA)
                {
                    let data = derive_trajectory_data(&last_raw, props, TrajFlag::RANGE);
                    self.add_row(last_raw.time, SampleKind::Range, data);
                }
            }
        }
        self.rows.into_iter().map(|(_, _, data)| data).collect()
    }
}

impl TrajectoryHandler for TrajectoryDataFilter {
    fn handle(&mut self, raw: &BaseTrajData, props: &ShotProps) -> Option<TerminationReason> {
        let Some(prev) = self.prev else {
            // First point: always record a RANGE row at t == 0, and use the
            // starting state to rule out event kinds that can't happen this
            // run. A shot that starts on or above the sightline can never
            // cross it going up; a shot that starts below it and isn't
            // elevated past the look angle never comes back to it at all.
            let data = derive_trajectory_data(raw, props, TrajFlag::RANGE);
            self.add_row(raw.time, SampleKind::Range, data);

            let reference_y = raw.position.x * self.look_angle_tan;
            if raw.position.y >= reference_y {
                self.active = self.active.without(TrajFlag::ZERO_UP);
            } else if props.barrel_elevation <= props.look_angle {
                self.active = self.active.without(TrajFlag::ZERO).without(TrajFlag::MRT);
            }
            if Self::mach_ratio(raw) < 1.0 {
                self.active = self.active.without(TrajFlag::MACH);
            }

            self.prev = Some(*raw);
            return None;
        };

        if let Some(prev_prev) = self.prev_prev {
            if prev_prev.time < prev.time && prev.time < raw.time {
                if let Some(step) = self.range_step {
                    while self.next_range + step <= raw.position.x + EPSILON
                        && self.next_range + step <= self.range_limit + EPSILON
                    {
                        self.next_range += step;
                        let target = self.next_range;
                        let point = if (raw.position.x - target).abs() < EPSILON {
                            *raw
                        } else {
                            BaseTrajData::interpolate3pt(target, &prev_prev, &prev, raw, BaseTrajInterpKey::PosX)
                        };
                        let data = derive_trajectory_data(&point, props, TrajFlag::RANGE);
                        self.add_row(point.time, SampleKind::Range, data);
                    }
                }

                if let Some(step) = self.time_step {
                    while self.next_time + step <= raw.time + EPSILON {
                        self.next_time += step;
                        let target = self.next_time;
                        let point = if (raw.time - target).abs() < EPSILON {
                            *raw
                        } else {
                            BaseTrajData::interpolate3pt(target, &prev_prev, &prev, raw, BaseTrajInterpKey::Time)
                        };
                        let data = derive_trajectory_data(&point, props, TrajFlag::RANGE);
                        self.add_row(point.time, SampleKind::Time, data);
                    }
                }

                if self.active.contains(TrajFlag::APEX) && prev.velocity.y > 0.0 && raw.velocity.y <= 0.0 {
                    self.active = self.active.without(TrajFlag::APEX);
                    let point =
                        BaseTrajData::interpolate3pt(0.0, &prev_prev, &prev, raw, BaseTrajInterpKey::VelY);
                    let data = derive_trajectory_data(&point, props, TrajFlag::APEX);
                    self.add_row(point.time, SampleKind::Apex, data);
                }

                if self.active.contains(TrajFlag::MACH) {
                    let (r_prev, r_curr) = (Self::mach_ratio(&prev), Self::mach_ratio(raw));
                    if r_prev >= 1.0 && r_curr < 1.0 {
                        self.active = self.active.without(TrajFlag::MACH);
                        let point = Self::interpolate_by(1.0, &prev_prev, &prev, raw, Self::mach_ratio);
                        let data = derive_trajectory_data(&point, props, TrajFlag::MACH);
                        self.add_row(point.time, SampleKind::Mach, data);
                    }
                }

                if self.active.intersects(TrajFlag::ZERO) {
                    let (h_prev, h_curr) = (self.slant_height(&prev), self.slant_height(raw));
                    if self.active.contains(TrajFlag::ZERO_DOWN) && h_prev > 0.0 && h_curr <= 0.0 {
                        self.active = self.active.without(TrajFlag::ZERO_DOWN);
                        let point = Self::interpolate_by(0.0, &prev_prev, &prev, raw, |r| self.slant_height(r));
                        let data = derive_trajectory_data(&point, props, TrajFlag::ZERO_DOWN);
                        self.add_row(point.time, SampleKind::ZeroDown, data);
                    } else if self.active.contains(TrajFlag::ZERO_UP) && h_prev < 0.0 && h_curr >= 0.0 {
                        self.active = self.active.without(TrajFlag::ZERO_UP);
                        let point = Self::interpolate_by(0.0, &prev_prev, &prev, raw, |r| self.slant_height(r));
                        let data = derive_trajectory_data(&point, props, TrajFlag::ZERO_UP);
                        self.add_row(point.time, SampleKind::ZeroUp, data);
                    }
                }
            }
        }

        self.prev_prev = Some(prev);
        self.prev = Some(*raw);
        None
    }
}

/// Appends every accepted point to an owned dense [`BaseTrajSeq`], never
/// requesting termination itself. This is what lets `Engine::integrate_filtered`
/// offer an optional full-resolution trajectory alongside the filtered event
/// rows: the dense buffer is just another handler in the same `Compositor`.
pub struct DenseRecorder {
    seq: BaseTrajSeq,
}

impl DenseRecorder {
    pub fn new() -> Self {
        DenseRecorder { seq: BaseTrajSeq::new() }
    }

    pub fn into_inner(self) -> BaseTrajSeq {
        self.seq
    }
}

impl Default for DenseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrajectoryHandler for DenseRecorder {
    fn handle(&mut self, raw: &BaseTrajData, _props: &ShotProps) -> Option<TerminationReason> {
        self.seq.append(*raw);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_core::{Atmosphere, Coriolis, WindSock};
    use bc_drag::CurvePoint;

    fn test_shot() -> ShotProps {
        ShotProps {
            bc: 0.5,
            look_angle: 0.0,
            twist: 11.25,
            length: 1.24,
            diameter: 0.308,
            weight: 175.0,
            barrel_elevation: 0.0,
            barrel_azimuth: 0.0,
            sight_height: 1.5,
            cant_cosine: 1.0,
            cant_sine: 0.0,
            alt0: 0.0,
            calc_step: 0.005,
            muzzle_velocity: 2600.0,
            stability_coefficient: 1.5,
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
            filter_flags: TrajFlag::ALL,
        }
    }

    fn row(time: f64, x: f64, y: f64, vy: f64) -> BaseTrajData {
        BaseTrajData {
            time,
            position: V3::new(x, y, 0.0),
            velocity: V3::new(2600.0, vy, 0.0),
            mach: 1116.0,
        }
    }

    #[test]
    fn essential_terminators_stops_at_target_range() {
        let shot = test_shot();
        let mut terminators = EssentialTerminators::new(1000.0, 50.0, 15_000.0, -1_500.0, &shot);
        assert!(terminators.handle(&row(0.0, 0.0, 0.0, 0.0), &shot).is_none());
        assert!(terminators.handle(&row(0.1, 500.0, 0.0, 0.0), &shot).is_none());
        let reason = terminators.handle(&row(0.4, 1200.0, -2.0, -10.0), &shot);
        assert_eq!(reason, Some(TerminationReason::TargetRangeReached));
    }

    #[test]
    fn single_point_handler_finds_target_and_requests_stop() {
        let shot = test_shot();
        let mut handler = SinglePointHandler::new(BaseTrajInterpKey::PosX, 500.0);
        assert!(handler.handle(&row(0.0, 0.0, 0.0, 10.0), &shot).is_none());
        assert!(handler.handle(&row(0.1, 300.0, 1.0, 5.0), &shot).is_none());
        let reason = handler.handle(&row(0.2, 520.0, 0.5, 0.0), &shot);
        assert_eq!(reason, Some(TerminationReason::HandlerRequestedStop));
        assert!(handler.found());
        let result = handler.get_result().unwrap();
        assert!((result.position.x - 500.0).abs() < 1e-6);
    }

    #[test]
    fn single_point_handler_tracks_any_interp_key() {
        let shot = test_shot();
        let mut handler = SinglePointHandler::new(BaseTrajInterpKey::VelY, 0.0);
        handler.handle(&row(0.0, 0.0, 0.0, 10.0), &shot);
        handler.handle(&row(0.1, 260.0, 1.0, 2.0), &shot);
        let reason = handler.handle(&row(0.2, 520.0, 1.2, -3.0), &shot);
        assert_eq!(reason, Some(TerminationReason::HandlerRequestedStop));
        assert!(handler.get_result().unwrap().velocity.y.abs() < 1e-6);
    }

    #[test]
    fn zero_crossing_handler_interpolates_between_rows() {
        let shot = test_shot();
        let mut handler = ZeroCrossingHandler::new(0.0);
        handler.handle(&row(0.0, 0.0, 1.5, 0.0), &shot);
        handler.handle(&row(0.1, 300.0, -1.5, -10.0), &shot);
        assert!(handler.found());
        let hit = handler.get_result().unwrap();
        assert!((hit.position.y).abs() < 1e-6);
    }

    #[test]
    fn filter_records_apex_once() {
        let shot = test_shot();
        let mut filter = TrajectoryDataFilter::new(None, None, 10_000.0, TrajFlag::APEX, 0.0);
        filter.handle(&row(0.0, 0.0, 0.0, 10.0), &shot);
        filter.handle(&row(0.1, 260.0, 0.5, 1.0), &shot);
        filter.handle(&row(0.2, 520.0, 0.6, -1.0), &shot);
        filter.handle(&row(0.3, 780.0, 0.5, -5.0), &shot);
        let rows = filter.finish(&shot, TerminationReason::NoTerminate);
        assert!(rows.iter().any(|r| r.flag.contains(TrajFlag::APEX)));
    }

    #[test]
    fn filter_range_sampling_hits_exact_target_distance() {
        let shot = test_shot();
        let mut filter = TrajectoryDataFilter::new(Some(100.0), None, 1000.0, TrajFlag::RANGE, 0.0);
        filter.handle(&row(0.0, 0.0, 0.0, 0.0), &shot);
        filter.handle(&row(0.01, 90.0, 0.1, -1.0), &shot);
        filter.handle(&row(0.02, 130.0, 0.15, -1.5), &shot);
        let rows = filter.finish(&shot, TerminationReason::NoTerminate);
        let sampled = rows.iter().find(|r| (r.distance_ft - 100.0).abs() < 1.0).unwrap();
        assert!((sampled.distance_ft - 100.0).abs() < EPSILON, "distance = {}", sampled.distance_ft);
    }

    #[test]
    fn filter_disables_zero_up_when_shot_starts_above_sightline() {
        let shot = test_shot();
        let mut filter = TrajectoryDataFilter::new(None, None, 1000.0, TrajFlag::ZERO, 0.0);
        // Starts above the sightline (y = 1.5 at x = 0) and falls through it
        // once: ZERO_UP must never fire, only ZERO_DOWN.
        filter.handle(&row(0.0, 0.0, 1.5, 0.0), &shot);
        filter.handle(&row(0.1, 260.0, 0.5, -5.0), &shot);
        filter.handle(&row(0.2, 520.0, -1.0, -10.0), &shot);
        let rows = filter.finish(&shot, TerminationReason::NoTerminate);
        assert!(rows.iter().all(|r| !r.flag.contains(TrajFlag::ZERO_UP)));
        assert!(rows.iter().any(|r| r.flag.contains(TrajFlag::ZERO_DOWN)));
    }

    #[test]
    fn dense_recorder_appends_every_point() {
        let shot = test_shot();
        let mut recorder = DenseRecorder::new();
        recorder.handle(&row(0.0, 0.0, 0.0, 10.0), &shot);
        recorder.handle(&row(0.1, 260.0, 0.5, 1.0), &shot);
        let seq = recorder.into_inner();
        assert_eq!(seq.len(), 2);
    }
}
