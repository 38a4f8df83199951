use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts describing an assembled bundle adjustment problem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemStats {
    pub residual_blocks: usize,
    pub residual_rows: usize,
    pub free_pose_blocks: usize,
    pub constant_pose_blocks: usize,
    pub free_intrinsic_blocks: usize,
    pub constant_intrinsic_blocks: usize,
    pub free_landmark_blocks: usize,
    pub constant_landmark_blocks: usize,
    /// Observations whose view id is unknown.
    pub dropped_missing_view: usize,
    /// Observations whose view references an unknown pose.
    pub dropped_missing_pose: usize,
    /// Observations whose view references an unknown intrinsic.
    pub dropped_missing_intrinsic: usize,
    /// Observations whose camera model has no residual.
    pub dropped_unsupported_model: usize,
    /// Landmarks left without any usable observation.
    pub landmarks_without_observations: usize,
}

impl ProblemStats {
    pub fn dropped_observations(&self) -> usize {
        self.dropped_missing_view
            + self.dropped_missing_pose
            + self.dropped_missing_intrinsic
            + self.dropped_unsupported_model
    }

    pub fn free_blocks(&self) -> usize {
        self.free_pose_blocks + self.free_intrinsic_blocks + self.free_landmark_blocks
    }
}

impl fmt::Display for ProblemStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} residual blocks; poses {}/{} free, intrinsics {}/{} free, landmarks {}/{} free; \
             dropped {} observations (view {}, pose {}, intrinsic {}, model {}); \
             {} landmarks unobserved",
            self.residual_blocks,
            self.free_pose_blocks,
            self.free_pose_blocks + self.constant_pose_blocks,
            self.free_intrinsic_blocks,
            self.free_intrinsic_blocks + self.constant_intrinsic_blocks,
            self.free_landmark_blocks,
            self.free_landmark_blocks + self.constant_landmark_blocks,
            self.dropped_observations(),
            self.dropped_missing_view,
            self.dropped_missing_pose,
            self.dropped_missing_intrinsic,
            self.dropped_unsupported_model,
            self.landmarks_without_observations,
        )
    }
}
