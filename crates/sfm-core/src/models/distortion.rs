//! Lens distortion in normalized image coordinates.
//!
//! All functions are generic over [`RealField`] so they can be evaluated with
//! dual numbers. They map undistorted `(x, y)` to distorted coordinates.

use nalgebra::RealField;

#[inline]
fn two<T: RealField>() -> T {
    T::one() + T::one()
}

#[inline]
fn small<T: RealField>() -> T {
    nalgebra::convert(1e-12)
}

/// One-coefficient radial model: `x * (1 + k1 r²)`.
pub fn distort_radial_k1<T: RealField>(k1: T, x: T, y: T) -> (T, T) {
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let s = T::one() + k1 * r2;
    (x * s.clone(), y * s)
}

/// Three-coefficient radial model: `x * (1 + k1 r² + k2 r⁴ + k3 r⁶)`.
pub fn distort_radial_k3<T: RealField>(k1: T, k2: T, k3: T, x: T, y: T) -> (T, T) {
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();
    let s = T::one() + k1 * r2 + k2 * r4 + k3 * r6;
    (x * s.clone(), y * s)
}

/// Radial `k1..k3` plus tangential `t1, t2` (Brown).
///
/// `t_x = t2 (r² + 2x²) + 2 t1 x y`, `t_y = t1 (r² + 2y²) + 2 t2 x y`.
pub fn distort_brown_t2<T: RealField>(
    k1: T,
    k2: T,
    k3: T,
    t1: T,
    t2: T,
    x: T,
    y: T,
) -> (T, T) {
    let x2 = x.clone() * x.clone();
    let y2 = y.clone() * y.clone();
    let xy = x.clone() * y.clone();
    let r2 = x2.clone() + y2.clone();
    let r4 = r2.clone() * r2.clone();
    let r6 = r4.clone() * r2.clone();

    let k_diff = k1 * r2.clone() + k2 * r4 + k3 * r6;
    let t_x = t2.clone() * (r2.clone() + two::<T>() * x2) + two::<T>() * t1.clone() * xy.clone();
    let t_y = t1 * (r2 + two::<T>() * y2) + two::<T>() * t2 * xy;

    (
        x.clone() + x * k_diff.clone() + t_x,
        y.clone() + y * k_diff + t_y,
    )
}

/// Kannala-Brandt equidistant fisheye with four coefficients.
pub fn distort_fisheye_kb<T: RealField>(k1: T, k2: T, k3: T, k4: T, x: T, y: T) -> (T, T) {
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    if r2 < small::<T>() {
        return (x, y);
    }
    let r = r2.sqrt();
    let theta = r.clone().atan();
    let theta2 = theta.clone() * theta.clone();
    let theta4 = theta2.clone() * theta2.clone();
    let theta6 = theta4.clone() * theta2.clone();
    let theta8 = theta4.clone() * theta4.clone();
    let theta_d = theta * (T::one() + k1 * theta2 + k2 * theta4 + k3 * theta6 + k4 * theta8);
    let s = theta_d / r;
    (x * s.clone(), y * s)
}

/// Single-parameter field-of-view fisheye: `x * atan(2 r tan(k1 / 2)) / (k1 r)`.
pub fn distort_fisheye_fov<T: RealField>(k1: T, x: T, y: T) -> (T, T) {
    if k1.clone().abs() < small::<T>() {
        return (x, y);
    }
    let tan_half = (k1.clone() / two::<T>()).tan();
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let s = if r2 < small::<T>() {
        two::<T>() * tan_half / k1
    } else {
        let r = r2.sqrt();
        (two::<T>() * r.clone() * tan_half).atan() / (k1 * r)
    };
    (x * s.clone(), y * s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brown_tangential_terms_follow_convention() {
        let (x, y) = (0.1, -0.2);
        let (t1, t2) = (0.01, 0.02);
        let (xd, yd) = distort_brown_t2(0.0, 0.0, 0.0, t1, t2, x, y);
        let r2: f64 = x * x + y * y;
        let ex = x + t2 * (r2 + 2.0 * x * x) + 2.0 * t1 * x * y;
        let ey = y + t1 * (r2 + 2.0 * y * y) + 2.0 * t2 * x * y;
        assert!((xd - ex).abs() < 1e-15);
        assert!((yd - ey).abs() < 1e-15);
    }

    #[test]
    fn fisheye_fov_is_continuous_at_center() {
        let k1: f64 = 0.9;
        let (a, _) = distort_fisheye_fov(k1, 1e-9, 0.0);
        let (b, _) = distort_fisheye_fov(k1, 1e-4, 0.0);
        assert!((a / 1e-9 - b / 1e-4).abs() < 1e-6);
    }

    #[test]
    fn fisheye_kb_compresses_wide_angles() {
        let (xd, _) = distort_fisheye_kb(0.0, 0.0, 0.0, 0.0, 2.0, 0.0);
        assert!((xd - 2.0_f64.atan()).abs() < 1e-12);
    }
}
