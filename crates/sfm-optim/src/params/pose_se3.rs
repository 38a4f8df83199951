//! SE(3) parameter conversions.

use anyhow::{ensure, Result};
use nalgebra::{DVector, DVectorView, Isometry3, Quaternion, UnitQuaternion, Vector3};
use sfm_core::Iso3;

pub const SE3_DIM: usize = 7;

/// Pose block storage: quaternion `[qx, qy, qz, qw]` then translation.
pub fn iso3_to_se3_dvec(pose: &Iso3) -> DVector<f64> {
    let quat = pose.rotation.as_ref().coords;
    let trans = pose.translation.vector;
    DVector::from_iterator(SE3_DIM, quat.iter().chain(trans.iter()).copied())
}

/// Inverse of [`iso3_to_se3_dvec`]; the quaternion part is renormalized.
pub fn se3_dvec_to_iso3(v: DVectorView<'_, f64>) -> Result<Iso3> {
    ensure!(
        v.len() == SE3_DIM,
        "expected se3 vector of length {}, got {}",
        SE3_DIM,
        v.len()
    );
    let quat = Quaternion::new(v[3], v[0], v[1], v[2]);
    ensure!(
        quat.norm() > 0.0 && v.iter().all(|x| x.is_finite()),
        "degenerate se3 vector"
    );
    let rot = UnitQuaternion::from_quaternion(quat);
    let trans = Vector3::new(v[4], v[5], v[6]);
    Ok(Iso3::from_parts(trans.into(), rot))
}

/// Apply a left increment `delta = [tx, ty, tz, rx, ry, rz]` to `pose`.
pub fn retract_se3(pose: &Iso3, delta: &[f64]) -> Iso3 {
    debug_assert_eq!(delta.len(), 6, "se3 increment must have 6 entries");
    let step = Isometry3::new(
        Vector3::new(delta[0], delta[1], delta[2]),
        Vector3::new(delta[3], delta[4], delta[5]),
    );
    step * pose
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Translation3;

    #[test]
    fn se3_vector_preserves_pose() {
        let pose = Iso3::from_parts(
            Translation3::new(1.0, -2.0, 0.5),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
        );
        let back = se3_dvec_to_iso3(iso3_to_se3_dvec(&pose).as_view()).unwrap();
        assert!((back.to_homogeneous() - pose.to_homogeneous()).amax() < 1e-12);
    }

    #[test]
    fn unnormalized_quaternion_is_renormalized() {
        let v = nalgebra::dvector![0.0, 0.0, 0.0, 2.0, 1.0, 2.0, 3.0];
        let pose = se3_dvec_to_iso3(v.as_view()).unwrap();
        assert!(pose.rotation.angle().abs() < 1e-12);
        assert_eq!(pose.translation.vector, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn zero_quaternion_is_rejected() {
        let v = DVector::<f64>::zeros(7);
        assert!(se3_dvec_to_iso3(v.as_view()).is_err());
        assert!(se3_dvec_to_iso3(DVector::<f64>::zeros(6).as_view()).is_err());
    }

    #[test]
    fn zero_increment_is_identity() {
        let pose = Iso3::translation(0.1, 0.2, 0.3);
        let same = retract_se3(&pose, &[0.0; 6]);
        assert!((same.to_homogeneous() - pose.to_homogeneous()).amax() < 1e-15);
        let moved = retract_se3(&pose, &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!((moved.translation.vector.x - 1.1).abs() < 1e-12);
    }
}
