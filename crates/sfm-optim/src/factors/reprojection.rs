//! Pixel reprojection residual for the pinhole camera family.

use nalgebra::{Quaternion, RealField, UnitQuaternion, Vector2, Vector3};
use sfm_core::{project_pinhole_family, CameraModelKind, ModelError, Pose, Pt3, Vec2};

/// Reprojection error of one observation: `project(pose * X) - observed`.
///
/// Inputs are the pose block `[qx, qy, qz, qw, tx, ty, tz]`, the intrinsic
/// block in the model's layout and the world point. Construction fails for
/// camera models without a residual, which is how callers detect degraded
/// models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReprojectionResidual {
    model: CameraModelKind,
    uv: [f64; 2],
}

impl ReprojectionResidual {
    pub fn new(model: CameraModelKind, observed: Vec2) -> Result<Self, ModelError> {
        if !model.has_residual() {
            return Err(ModelError::Unsupported(model));
        }
        Ok(Self {
            model,
            uv: [observed.x, observed.y],
        })
    }

    pub fn model(&self) -> CameraModelKind {
        self.model
    }

    pub fn observed(&self) -> Vec2 {
        Vec2::new(self.uv[0], self.uv[1])
    }

    /// Length of the intrinsic block this residual reads.
    pub fn intrinsic_dim(&self) -> usize {
        self.model.layout().map_or(0, |l| l.dim)
    }

    /// Generic evaluation used for automatic differentiation.
    ///
    /// Returns `None` when a block has the wrong length.
    pub fn evaluate<T: RealField>(
        &self,
        pose: &[T],
        intrinsic: &[T],
        point: &Vector3<T>,
    ) -> Option<Vector2<T>> {
        if pose.len() != 7 {
            return None;
        }
        let quat = Quaternion::new(
            pose[3].clone(),
            pose[0].clone(),
            pose[1].clone(),
            pose[2].clone(),
        );
        let rot = UnitQuaternion::from_quaternion(quat);
        let t = Vector3::new(pose[4].clone(), pose[5].clone(), pose[6].clone());
        let p_c = rot.transform_vector(point) + t;

        let uv = project_pinhole_family(self.model, intrinsic, &p_c)?;
        let u_obs: T = nalgebra::convert(self.uv[0]);
        let v_obs: T = nalgebra::convert(self.uv[1]);
        Some(Vector2::new(uv.x.clone() - u_obs, uv.y.clone() - v_obs))
    }

    /// `f64` evaluation from a decoded pose.
    pub fn evaluate_pose(&self, pose: &Pose, intrinsic: &[f64], point: &Pt3) -> Option<Vec2> {
        let p_c = pose.transform_point(point);
        project_pinhole_family(self.model, intrinsic, &p_c.coords).map(|uv| uv - self.observed())
    }
}
