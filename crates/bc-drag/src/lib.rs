//! Ballistic-coefficient curve over Mach: a piecewise-cubic `Curve` fit to a
//! `MachList` of breakpoints, with a lookup that scales the fitted drag
//! coefficient into the retardation term the integrators use directly.
//!
//! Unlike a fixed-family (G1/G7) power-law table, the curve here is fit to
//! whatever `(mach, Cd)` breakpoints the caller supplies, so one lookup
//! function serves any drag model shape.

#![forbid(unsafe_code)]
#![cfg_attr(not(test), warn(missing_docs))]

use bc_core::BcError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Above this many Mach breakpoints, `drag_by_mach` switches from a linear
/// scan to a binary search to find the active segment.
const LINEAR_SCAN_THRESHOLD: usize = 15;

/// Scales a fitted drag coefficient into the retardation term used by the
/// equations of motion (`km = density_ratio * drag_by_mach(mach) / bc`, with
/// this constant folding in the reference-projectile cross-section term).
const DRAG_SCALE: f64 = 2.08551e-04;

/// One cubic segment of a fitted drag curve: `d + dx*(c + dx*(b + dx*a))`
/// where `dx = mach - breakpoint`, evaluated in Horner form.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CurvePoint {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// A fitted drag curve, one [`CurvePoint`] per segment between consecutive
/// [`MachList`] breakpoints (`curve.len() == mach_list.len() - 1`).
pub type Curve = Vec<CurvePoint>;

/// Ascending Mach breakpoints a [`Curve`] is fit over.
pub type MachList = Vec<f64>;

/// Ballistic coefficient together with the fitted drag curve it scales.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DragTable {
    pub bc: f64,
    pub mach_list: MachList,
    pub curve: Curve,
}

impl DragTable {
    /// Validates that `mach_list`/`curve` are shaped correctly and `bc` is
    /// positive. A `Curve` needs exactly one fewer segment than breakpoint.
    pub fn validate(&self) -> Result<(), BcError> {
        if self.bc <= 0.0 {
            return Err(BcError::Value(format!("ballistic coefficient must be positive, got {}", self.bc)));
        }
        let n = self.mach_list.len();
        if n < 2 {
            return Err(BcError::Value(format!(
                "mach_list needs at least 2 breakpoints, got {n}"
            )));
        }
        if self.curve.len() != n - 1 {
            return Err(BcError::Value(format!(
                "curve has {} segments, expected {} for {n} mach breakpoints",
                self.curve.len(),
                n - 1
            )));
        }
        Ok(())
    }

    /// Drag retardation term at `mach`, i.e. `cd(mach) * DRAG_SCALE / bc`.
    pub fn drag_by_mach(&self, mach: f64) -> f64 {
        drag_by_mach(&self.mach_list, &self.curve, mach) * DRAG_SCALE / self.bc
    }
}

/// Finds the index of the segment `calculate_by_curve_and_mach_list` should
/// evaluate `mach` against: clamped to the first/last segment when `mach`
/// falls outside the breakpoint range, otherwise a linear scan for small
/// tables or a binary search for larger ones.
fn segment_index(mach_list: &[f64], mach: f64) -> usize {
    let n = mach_list.len();
    let last_segment = n - 2;

    if mach <= mach_list[0] {
        return 0;
    }
    if mach >= mach_list[n - 1] {
        return last_segment;
    }

    if n <= LINEAR_SCAN_THRESHOLD {
        let mut idx = 0;
        while idx < last_segment && mach_list[idx + 1] < mach {
            idx += 1;
        }
        idx
    } else {
        let mut lo = 0usize;
        let mut hi = n;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if mach_list[mid] >= mach {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo.saturating_sub(1).min(last_segment)
    }
}

/// Evaluates the fitted drag coefficient at `mach` using `mach_list`/`curve`
/// directly, without a `bc` scale factor. `mach_list.len()` must be
/// `curve.len() + 1` and at least 2; callers that hold a [`DragTable`]
/// should prefer [`DragTable::drag_by_mach`] instead.
pub fn drag_by_mach(mach_list: &[f64], curve: &[CurvePoint], mach: f64) -> f64 {
    let idx = segment_index(mach_list, mach);
    let seg = curve[idx];
    let dx = mach - mach_list[idx];
    seg.d + dx * (seg.c + dx * (seg.b + dx * seg.a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn flat_curve(mach_list: &[f64], cd: f64) -> Curve {
        (0..mach_list.len() - 1)
            .map(|_| CurvePoint { a: 0.0, b: 0.0, c: 0.0, d: cd })
            .collect()
    }

    #[test]
    fn flat_curve_returns_constant_cd() {
        let mach_list = vec![0.5, 1.0, 1.5, 2.0];
        let curve = flat_curve(&mach_list, 0.3);
        for mach in [0.4, 0.7, 1.2, 1.8, 2.5] {
            assert_abs_diff_eq!(drag_by_mach(&mach_list, &curve, mach), 0.3, epsilon = 1e-12);
        }
    }

    #[test]
    fn linear_segment_is_continuous_at_breakpoints() {
        let mach_list = vec![0.0, 1.0, 2.0];
        let curve = vec![
            CurvePoint { a: 0.0, b: 0.0, c: 1.0, d: 0.2 },
            CurvePoint { a: 0.0, b: 0.0, c: -0.5, d: 1.2 },
        ];
        let at_break = drag_by_mach(&mach_list, &curve, 1.0);
        assert_abs_diff_eq!(at_break, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn binary_search_matches_linear_scan_above_threshold() {
        let mach_list: Vec<f64> = (0..20).map(|i| i as f64 * 0.2).collect();
        let curve: Curve = flat_curve(&mach_list, 0.25);
        assert!(mach_list.len() > LINEAR_SCAN_THRESHOLD);
        for mach in [0.05, 1.0, 2.5, 3.9, 10.0] {
            assert_abs_diff_eq!(drag_by_mach(&mach_list, &curve, mach), 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn drag_table_validate_rejects_mismatched_shapes() {
        let table = DragTable {
            bc: 0.5,
            mach_list: vec![0.5, 1.0, 1.5],
            curve: vec![CurvePoint { a: 0.0, b: 0.0, c: 0.0, d: 0.3 }],
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn drag_table_scales_by_bc() {
        let mach_list = vec![0.5, 2.5];
        let curve = flat_curve(&mach_list, 0.3);
        let table = DragTable { bc: 0.5, mach_list, curve };
        table.validate().unwrap();
        let expected = 0.3 * DRAG_SCALE / 0.5;
        assert_abs_diff_eq!(table.drag_by_mach(1.0), expected, epsilon = 1e-12);
    }
}
