//! Troposphere model: maps altitude to a density ratio and the local
//! Mach-1 speed, relative to a base altitude/temperature/pressure.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lapse rate in the standard atmosphere model, kelvin per foot.
const LAPSE_RATE_K_PER_FOOT: f64 = -0.001_981_2;
/// Barometric formula exponent (≈ g / (L·R)).
const PRESSURE_EXPONENT: f64 = 5.255_876;
/// Speed-of-sound coefficient, m/s per sqrt(K).
const SPEED_OF_SOUND_METRIC: f64 = 20.0467;
const M_TO_FEET: f64 = 3.280_839_895;
const DEGREES_C_TO_K: f64 = 273.15;
/// Altitude above which the troposphere model is no longer valid; a warning
/// is logged (not an error) when this is exceeded.
const TROPOSPHERE_CEILING_FEET: f64 = 36_089.0;
/// Altitude band around the base altitude within which cached base values
/// are returned directly rather than recomputed.
const BASE_ALTITUDE_BAND_FEET: f64 = 30.0;

/// Standard-atmosphere troposphere model, anchored at a base altitude.
///
/// Immutable once constructed; [`Atmosphere::update_density_factor_and_mach_for_altitude`]
/// is a pure function of `self` and the requested altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Atmosphere {
    /// Base temperature, °C.
    pub t0: f64,
    /// Base altitude, ft.
    pub a0: f64,
    /// Base pressure, hPa.
    pub p0: f64,
    /// Base Mach-1 speed, fps.
    pub mach0: f64,
    /// Base density ratio (ρ / ρ_std).
    pub density_ratio: f64,
    /// Lowest temperature this model will extrapolate to, °C.
    pub lowest_temp_c: f64,
}

impl Atmosphere {
    /// Evaluates density ratio and Mach-1 speed at `altitude_ft`.
    ///
    /// Within 30 ft of the base altitude the cached base values are
    /// returned unchanged. Above the troposphere ceiling this still
    /// evaluates (and logs a warning) rather than failing: the model is an
    /// approximation past that point, not an error.
    pub fn update_density_factor_and_mach_for_altitude(&self, altitude_ft: f64) -> (f64, f64) {
        crate::log::ensure_log_level_initialized();
        let alt_diff = altitude_ft - self.a0;

        if alt_diff.abs() < BASE_ALTITUDE_BAND_FEET {
            return (self.density_ratio, self.mach0);
        }

        if altitude_ft > TROPOSPHERE_CEILING_FEET {
            log::warn!(
                "density request for altitude {altitude_ft:.1} ft above troposphere ceiling; atmosphere model is not valid here"
            );
        }

        let mut celsius = alt_diff * LAPSE_RATE_K_PER_FOOT + self.t0;
        let absolute_zero_c = -DEGREES_C_TO_K;
        if celsius < absolute_zero_c {
            log::warn!("invalid temperature {celsius:.2} C; clamped to {absolute_zero_c:.2} C");
            celsius = absolute_zero_c;
        } else if celsius < self.lowest_temp_c {
            celsius = self.lowest_temp_c;
            log::warn!("reached minimum temperature limit; clamped to {celsius:.2} C");
        }

        let kelvin = celsius + DEGREES_C_TO_K;
        let base_kelvin = self.t0 + DEGREES_C_TO_K;

        let pressure =
            self.p0 * (1.0 + LAPSE_RATE_K_PER_FOOT * alt_diff / base_kelvin).powf(PRESSURE_EXPONENT);

        let density_delta = (base_kelvin * pressure) / (self.p0 * kelvin);
        let density_ratio = self.density_ratio * density_delta;
        let mach = kelvin.sqrt() * SPEED_OF_SOUND_METRIC * M_TO_FEET;

        (density_ratio, mach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn standard_atmo() -> Atmosphere {
        Atmosphere {
            t0: 15.0,
            a0: 0.0,
            p0: 1013.25,
            mach0: 1116.45,
            density_ratio: 1.0,
            lowest_temp_c: -130.0 * 5.0 / 9.0,
        }
    }

    #[test]
    fn near_base_altitude_returns_cached_values() {
        let atmo = standard_atmo();
        let (density_ratio, mach) = atmo.update_density_factor_and_mach_for_altitude(10.0);
        assert_eq!(density_ratio, atmo.density_ratio);
        assert_eq!(mach, atmo.mach0);
    }

    #[test]
    fn density_and_mach_stay_positive_with_altitude() {
        let atmo = standard_atmo();
        for alt in [-500.0, 0.0, 2_000.0, 10_000.0, 30_000.0] {
            let (density_ratio, mach) = atmo.update_density_factor_and_mach_for_altitude(alt);
            assert!(density_ratio > 0.0, "density ratio at {alt} ft");
            assert!(mach > 0.0, "mach at {alt} ft");
        }
    }

    #[test]
    fn density_decreases_with_altitude() {
        let atmo = standard_atmo();
        let (d_low, _) = atmo.update_density_factor_and_mach_for_altitude(1_000.0);
        let (d_high, _) = atmo.update_density_factor_and_mach_for_altitude(10_000.0);
        assert!(d_high < d_low);
    }

    #[test]
    fn mach_matches_expected_scale_at_altitude() {
        let atmo = standard_atmo();
        let (_, mach) = atmo.update_density_factor_and_mach_for_altitude(5_000.0);
        assert_relative_eq!(mach, 1096.5, max_relative = 0.01);
    }
}
