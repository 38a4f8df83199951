use serde::{Deserialize, Serialize};

use super::Reconstruction;
use crate::Real;

/// Pixel reprojection error statistics over all projectable observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionStats {
    pub count: usize,
    pub mean: Real,
    pub rms: Real,
    pub max: Real,
}

impl Reconstruction {
    /// Reprojection errors of every observation whose view, pose and intrinsic
    /// resolve to a refinable camera model with the point in front of the camera.
    pub fn reprojection_errors(&self) -> ReprojectionStats {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut max: Real = 0.0;

        for landmark in self.landmarks.values() {
            for (view_id, uv) in &landmark.observations {
                let Some(view) = self.views.get(view_id) else {
                    continue;
                };
                let (Some(pose), Some(intr)) = (
                    self.poses.get(&view.pose_id),
                    self.intrinsics.get(&view.intrinsic_id),
                ) else {
                    continue;
                };
                if !intr.model.kind().has_residual() {
                    continue;
                }
                let Some(r) = intr.residual(pose, &landmark.position, uv) else {
                    continue;
                };
                let e = r.norm();
                count += 1;
                sum += e;
                sum_sq += e * e;
                max = max.max(e);
            }
        }

        if count == 0 {
            return ReprojectionStats::default();
        }
        let n = count as Real;
        ReprojectionStats {
            count,
            mean: sum / n,
            rms: (sum_sq / n).sqrt(),
            max,
        }
    }
}
