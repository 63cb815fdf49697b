//! Two-point linear and monotone three-point PCHIP (Fritsch-Carlson) Hermite
//! interpolation, evaluated in Horner form.

use crate::error::BcError;

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Linear interpolation between two points. Fails when `x0 == x1`.
pub fn interpolate_2pt(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<f64, BcError> {
    if x1 == x0 {
        return Err(BcError::Arithmetic(
            "interpolate_2pt: x0 == x1 (zero-width segment)".into(),
        ));
    }
    Ok(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}

/// Endpoint and interior slopes for the monotone Fritsch-Carlson PCHIP
/// construction over three (sorted) points.
fn pchip_slopes3(x0: f64, y0: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> (f64, f64, f64) {
    let h0 = x1 - x0;
    let h1 = x2 - x1;
    let d0 = (y1 - y0) / h0;
    let d1 = (y2 - y1) / h1;
    let h_sum = h0 + h1;

    let s0 = sign(d0);
    let s1 = sign(d1);

    let m1 = if s0 * s1 <= 0.0 {
        0.0
    } else {
        let w1 = 2.0 * h1 + h0;
        let w2 = h1 + 2.0 * h0;
        (w1 + w2) / (w1 / d0 + w2 / d1)
    };

    let m0l = ((2.0 * h0 + h1) * d0 - h0 * d1) / h_sum;
    let m0 = if s0 != sign(m0l) {
        0.0
    } else {
        let abs_d0 = d0.abs();
        if m0l.abs() > 3.0 * abs_d0 {
            3.0 * d0
        } else {
            m0l
        }
    };

    let m2l = ((2.0 * h1 + h0) * d1 - h1 * d0) / h_sum;
    let m2 = if s1 != sign(m2l) {
        0.0
    } else {
        let abs_d1 = d1.abs();
        if m2l.abs() > 3.0 * abs_d1 {
            3.0 * d1
        } else {
            m2l
        }
    };

    (m0, m1, m2)
}

/// Cubic Hermite basis evaluated in Horner form over `[xk, xk1]`.
fn hermite(x: f64, xk: f64, xk1: f64, yk: f64, yk1: f64, mk: f64, mk1: f64) -> f64 {
    let h = xk1 - xk;
    let t = (x - xk) / h;
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = (t - 2.0) * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = (t - 1.0) * t2;

    h00 * yk + h * (h10 * mk + h11 * mk1) + h01 * yk1
}

/// Monotone PCHIP interpolation for a single component using three support
/// points. Sorts `(x*, y*)` by `x*` (the points need not arrive pre-sorted),
/// computes PCHIP slopes, and evaluates the Hermite piece containing `x`.
/// `x0`, `x1`, `x2` must be pairwise distinct.
pub fn interpolate_3pt(
    x: f64,
    mut x0: f64,
    mut x1: f64,
    mut x2: f64,
    mut y0: f64,
    mut y1: f64,
    mut y2: f64,
) -> f64 {
    if x1 < x0 {
        std::mem::swap(&mut x0, &mut x1);
        std::mem::swap(&mut y0, &mut y1);
    }
    if x2 < x1 {
        if x2 < x0 {
            let (tx, ty) = (x2, y2);
            x2 = x1;
            x1 = x0;
            x0 = tx;
            y2 = y1;
            y1 = y0;
            y0 = ty;
        } else {
            let (tx, ty) = (x2, y2);
            x2 = x1;
            x1 = tx;
            y2 = y1;
            y1 = ty;
        }
    }

    let (m0, m1, m2) = pchip_slopes3(x0, y0, x1, y1, x2, y2);

    if x <= x1 {
        hermite(x, x0, x1, y0, y1, m0, m1)
    } else {
        hermite(x, x1, x2, y1, y2, m1, m2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn linear_2pt_matches_slope() {
        let y = interpolate_2pt(5.0, 0.0, 0.0, 10.0, 20.0).unwrap();
        assert_abs_diff_eq!(y, 10.0);
    }

    #[test]
    fn linear_2pt_zero_width_errors() {
        assert!(interpolate_2pt(1.0, 3.0, 0.0, 3.0, 1.0).is_err());
    }

    #[test]
    fn pchip_3pt_is_exact_on_a_line() {
        // A straight line through the three points should interpolate exactly
        // anywhere within the span, since PCHIP slopes reduce to the common
        // difference quotient when collinear.
        let y = interpolate_3pt(1.5, 0.0, 1.0, 2.0, 0.0, 2.0, 4.0);
        assert_abs_diff_eq!(y, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn pchip_3pt_hits_knots_exactly() {
        let y0 = interpolate_3pt(0.0, 0.0, 1.0, 3.0, 5.0, 2.0, 9.0);
        assert_abs_diff_eq!(y0, 5.0, epsilon = 1e-9);
        let y1 = interpolate_3pt(1.0, 0.0, 1.0, 3.0, 5.0, 2.0, 9.0);
        assert_abs_diff_eq!(y1, 2.0, epsilon = 1e-9);
        let y2 = interpolate_3pt(3.0, 0.0, 1.0, 3.0, 5.0, 2.0, 9.0);
        assert_abs_diff_eq!(y2, 9.0, epsilon = 1e-9);
    }

    #[test]
    fn pchip_3pt_sorts_unordered_input() {
        let sorted = interpolate_3pt(1.5, 0.0, 1.0, 2.0, 0.0, 2.0, 4.0);
        let unsorted = interpolate_3pt(1.5, 2.0, 0.0, 1.0, 4.0, 0.0, 2.0);
        assert_abs_diff_eq!(sorted, unsorted, epsilon = 1e-12);
    }
}
