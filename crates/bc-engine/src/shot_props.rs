//! Shot geometry: everything about the rifle, ammunition, and environment
//! that stays fixed for one integration run, plus the per-row derivations
//! (stability, spin drift, drag) the integrators pull from it every step.

use bc_core::{Atmosphere, Coriolis, TrajFlag, WindSock};
use bc_drag::{drag_by_mach, Curve, MachList};

/// Twist rate, length, diameter, etc. together with the fitted drag curve,
/// atmosphere, wind, and Coriolis model for one shot.
#[derive(Debug, Clone)]
pub struct ShotProps {
    pub bc: f64,
    pub look_angle: f64,
    pub twist: f64,
    pub length: f64,
    pub diameter: f64,
    pub weight: f64,
    pub barrel_elevation: f64,
    pub barrel_azimuth: f64,
    pub sight_height: f64,
    pub cant_cosine: f64,
    pub cant_sine: f64,
    pub alt0: f64,
    pub calc_step: f64,
    pub muzzle_velocity: f64,
    pub stability_coefficient: f64,
    pub curve: Curve,
    pub mach_list: MachList,
    pub atmo: Atmosphere,
    pub coriolis: Coriolis,
    pub wind_sock: WindSock,
    pub filter_flags: TrajFlag,
}

impl ShotProps {
    /// Recomputes [`Self::stability_coefficient`] from twist/diameter/length/
    /// weight/muzzle velocity/atmosphere using the Miller stability formula.
    /// Sets (and returns) zero when any of twist/length/diameter/`p0` is
    /// zero, matching the source's degenerate-input behavior.
    pub fn update_stability_coefficient(&mut self) -> f64 {
        if self.twist == 0.0 || self.length == 0.0 || self.diameter == 0.0 || self.atmo.p0 == 0.0 {
            self.stability_coefficient = 0.0;
            return 0.0;
        }

        let twist_rate = self.twist.abs() / self.diameter;
        let length_calibers = self.length / self.diameter;
        let sd = 30.0 * self.weight
            / (twist_rate * twist_rate * self.diameter.powi(3) * length_calibers * (1.0 + length_calibers * length_calibers));
        let fv = (self.muzzle_velocity / 2800.0).powf(1.0 / 3.0);
        let ft = (self.atmo.t0 * 9.0 / 5.0) + 32.0;
        // hPa -> inHg
        let pt = self.atmo.p0 / 33.863_881_565_591;
        let ftp = ((ft + 460.0) / (59.0 + 460.0)) * (29.92 / pt);

        self.stability_coefficient = sd * fv * ftp;
        self.stability_coefficient
    }

    /// Litz spin-drift approximation, feet of crossrange drift at `time`
    /// seconds of flight. Zero whenever twist or stability is zero (no
    /// spin-induced drift to model).
    pub fn spin_drift(&self, time: f64) -> f64 {
        if self.twist == 0.0 || self.stability_coefficient == 0.0 {
            return 0.0;
        }
        let sign = if self.twist > 0.0 { 1.0 } else { -1.0 };
        sign * (1.25 * (self.stability_coefficient + 1.2) * time.powf(1.83)) / 12.0
    }

    /// Drag retardation term at `mach`, delegating the curve evaluation to
    /// `bc-drag` and scaling by this shot's ballistic coefficient.
    pub fn drag_by_mach(&self, mach: f64) -> f64 {
        const DRAG_SCALE: f64 = 2.08551e-04;
        drag_by_mach(&self.mach_list, &self.curve, mach) * DRAG_SCALE / self.bc
    }

    /// Number of fitted curve segments; used to sanity-check `curve`/
    /// `mach_list` are shaped consistently (`curve.len() == mach_list.len() - 1`).
    pub fn size(&self) -> usize {
        self.curve.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bc_core::{Atmosphere, Coriolis, WindSock};
    use bc_drag::CurvePoint;

    fn base_shot() -> ShotProps {
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
        }
    }

    #[test]
    fn stability_is_positive_for_a_normal_rifle_shot() {
        let mut shot = base_shot();
        let sg = shot.update_stability_coefficient();
        assert!(sg > 0.0, "expected positive stability coefficient, got {sg}");
    }

    #[test]
    fn zero_twist_gives_zero_stability_and_drift() {
        let mut shot = base_shot();
        shot.twist = 0.0;
        assert_abs_diff_eq!(shot.update_stability_coefficient(), 0.0);
        assert_abs_diff_eq!(shot.spin_drift(2.0), 0.0);
    }

    #[test]
    fn spin_drift_grows_with_time() {
        let mut shot = base_shot();
        shot.update_stability_coefficient();
        let early = shot.spin_drift(0.5);
        let late = shot.spin_drift(2.0);
        assert!(late.abs() > early.abs());
    }

    #[test]
    fn drag_by_mach_scales_by_bc() {
        let shot = base_shot();
        let expected = 0.3 * 2.08551e-04 / shot.bc;
        assert_abs_diff_eq!(shot.drag_by_mach(1.0), expected, epsilon = 1e-12);
    }
}
