use nalgebra::{RealField, Vector2, Vector3};

use super::{
    distort_brown_t2, distort_fisheye_fov, distort_fisheye_kb, distort_radial_k1,
    distort_radial_k3, CameraModelKind, ParamLayout,
};

/// Apply the distortion of `kind` to normalized coordinates.
///
/// `dist` holds only the distortion coefficients (layout indices `3..`).
/// Returns `None` for models outside the pinhole family or on a length mismatch.
pub fn distort_normalized<T: RealField>(
    kind: CameraModelKind,
    dist: &[T],
    x: T,
    y: T,
) -> Option<(T, T)> {
    let expected = kind.layout()?.num_distortion();
    if dist.len() != expected {
        return None;
    }
    let d = |i: usize| dist[i].clone();
    let out = match kind {
        CameraModelKind::Pinhole => (x, y),
        CameraModelKind::PinholeRadialK1 => distort_radial_k1(d(0), x, y),
        CameraModelKind::PinholeRadialK3 => distort_radial_k3(d(0), d(1), d(2), x, y),
        CameraModelKind::PinholeBrownT2 => distort_brown_t2(d(0), d(1), d(2), d(3), d(4), x, y),
        CameraModelKind::PinholeFisheye => distort_fisheye_kb(d(0), d(1), d(2), d(3), x, y),
        CameraModelKind::PinholeFisheye1 => distort_fisheye_fov(d(0), x, y),
        CameraModelKind::Spherical => return None,
    };
    Some(out)
}

/// Project a camera-frame point to pixels using a full intrinsic vector.
///
/// Depth is clamped to `1e-12` so the expression stays differentiable for
/// points that drift behind the camera during iterations. Such a point
/// projects to a pixel error on the order of `1e12 * focal`, which dominates
/// the cost unless a robust loss bounds it; no cheirality check is made.
pub fn project_pinhole_family<T: RealField>(
    kind: CameraModelKind,
    params: &[T],
    p_c: &Vector3<T>,
) -> Option<Vector2<T>> {
    let layout = kind.layout()?;
    if params.len() != layout.dim {
        return None;
    }

    let eps: T = nalgebra::convert(1e-12);
    let z = if p_c.z.clone() > eps.clone() {
        p_c.z.clone()
    } else {
        eps
    };
    let x = p_c.x.clone() / z.clone();
    let y = p_c.y.clone() / z;

    let (xd, yd) = distort_normalized(kind, &params[ParamLayout::DISTORTION_START..], x, y)?;
    let f = params[ParamLayout::FOCAL].clone();
    Some(Vector2::new(
        f.clone() * xd + params[1].clone(),
        f * yd + params[2].clone(),
    ))
}
