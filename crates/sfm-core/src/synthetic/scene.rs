use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

use super::{unit_sample, UniformPixelNoise};
use crate::{
    Intrinsic, IntrinsicId, Landmark, LandmarkId, Pose, PoseId, Pt3, Real, Reconstruction, View,
    ViewId,
};

/// `n` world-to-camera poses on a horizontal circle, all looking at the origin.
pub fn ring_poses(n: usize, radius: Real, height: Real) -> Vec<Pose> {
    (0..n)
        .map(|i| {
            let a = std::f64::consts::TAU * i as Real / n.max(1) as Real;
            let eye = Point3::new(radius * a.cos(), height, radius * a.sin());
            Isometry3::face_towards(&eye, &Point3::origin(), &Vector3::y()).inverse()
        })
        .collect()
}

/// `n` points uniformly distributed in the cube `[-half_extent, half_extent]³`.
pub fn landmark_cloud(n: usize, half_extent: Real, seed: u64) -> Vec<Pt3> {
    (0..n)
        .map(|j| {
            let c = |lane| (unit_sample(seed, j, 0, lane) - 0.5) * 2.0 * half_extent;
            Pt3::new(c(0), c(1), c(2))
        })
        .collect()
}

/// Deterministically perturb `pose` by a rotation of at most `rot_rad` per axis
/// and a translation of at most `trans` per axis.
pub fn perturb_pose(pose: &Pose, rot_rad: Real, trans: Real, seed: u64, index: usize) -> Pose {
    let s = |lane| (unit_sample(seed, index, 1, lane) - 0.5) * 2.0;
    let dr = UnitQuaternion::from_scaled_axis(Vector3::new(s(0), s(1), s(2)) * rot_rad);
    let dt = Translation3::new(s(3) * trans, s(4) * trans, s(5) * trans);
    Isometry3::from_parts(dt, dr) * pose
}

/// Deterministically move `p` by at most `delta` per axis.
pub fn perturb_point(p: &Pt3, delta: Real, seed: u64, index: usize) -> Pt3 {
    let s = |lane| (unit_sample(seed, index, 2, lane) - 0.5) * 2.0 * delta;
    Pt3::new(p.x + s(0), p.y + s(1), p.z + s(2))
}

/// Assemble a reconstruction with one shared intrinsic (id 0).
///
/// Pose `i` is seen by view `i`. Landmark `j` gets an observation in every view
/// where it projects inside the image; `noise` is added to each observation.
pub fn build_reconstruction(
    intrinsic: Intrinsic,
    poses: &[Pose],
    points: &[Pt3],
    noise: UniformPixelNoise,
) -> Reconstruction {
    let mut scene = Reconstruction::new();
    let intr_id = IntrinsicId(0);
    scene.intrinsics.insert(intr_id, intrinsic);

    for (i, pose) in poses.iter().enumerate() {
        let id = i as u32;
        scene.poses.insert(PoseId(id), *pose);
        scene.views.insert(
            ViewId(id),
            View::new(format!("view_{id:03}.png"), PoseId(id), intr_id),
        );
    }

    let (w, h) = (intrinsic.width as Real, intrinsic.height as Real);
    for (j, pw) in points.iter().enumerate() {
        let mut landmark = Landmark::new(*pw);
        for (i, pose) in poses.iter().enumerate() {
            let p_c = pose.transform_point(pw);
            let Some(uv) = intrinsic.project(&p_c.coords) else {
                continue;
            };
            if uv.x < 0.0 || uv.y < 0.0 || uv.x >= w || uv.y >= h {
                continue;
            }
            landmark
                .observations
                .insert(ViewId(i as u32), noise.apply(i, j, uv));
        }
        scene.landmarks.insert(LandmarkId(j as u32), landmark);
    }
    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CameraModel;

    #[test]
    fn ring_cameras_see_the_origin_on_axis() {
        let intr = Intrinsic::new(
            640,
            480,
            CameraModel::Pinhole {
                focal: 500.0,
                ppx: 320.0,
                ppy: 240.0,
            },
        );
        for pose in ring_poses(5, 6.0, 1.0) {
            let p_c = pose.transform_point(&Pt3::origin());
            assert!(p_c.z > 5.0, "origin should be in front: {p_c:?}");
            let uv = intr.project(&p_c.coords).unwrap();
            assert!((uv.x - 320.0).abs() < 1e-9 && (uv.y - 240.0).abs() < 1e-9);
        }
    }

    #[test]
    fn noise_free_scene_reprojects_exactly() {
        let intr = Intrinsic::new(
            800,
            600,
            CameraModel::PinholeRadialK1 {
                focal: 700.0,
                ppx: 400.0,
                ppy: 300.0,
                k1: -0.05,
            },
        );
        let scene = build_reconstruction(
            intr,
            &ring_poses(4, 8.0, 0.5),
            &landmark_cloud(30, 1.5, 11),
            UniformPixelNoise::default(),
        );
        assert_eq!(scene.views.len(), 4);
        assert_eq!(scene.landmarks.len(), 30);
        let stats = scene.reprojection_errors();
        assert!(stats.count > 60, "too few observations: {}", stats.count);
        assert!(stats.max < 1e-9, "max={}", stats.max);
    }

    #[test]
    fn perturbations_are_bounded() {
        let pose = ring_poses(3, 5.0, 0.0)[1];
        let moved = perturb_pose(&pose, 0.01, 0.05, 42, 1);
        let delta = moved * pose.inverse();
        assert!(delta.rotation.angle() <= 0.01 * 3.0_f64.sqrt() + 1e-12);
        assert!(delta.translation.vector.amax() <= 0.05 + 1e-12);
        assert_ne!(moved, pose);

        let p = Pt3::new(1.0, 2.0, 3.0);
        let q = perturb_point(&p, 0.1, 42, 0);
        assert!((q - p).amax() <= 0.1);
    }

    #[test]
    fn landmark_cloud_is_seeded() {
        assert_eq!(landmark_cloud(5, 1.0, 3), landmark_cloud(5, 1.0, 3));
        assert_ne!(landmark_cloud(5, 1.0, 3), landmark_cloud(5, 1.0, 4));
        assert!(landmark_cloud(50, 2.0, 9)
            .iter()
            .all(|p| p.coords.amax() <= 2.0));
    }
}
