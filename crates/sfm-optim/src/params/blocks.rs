use std::collections::BTreeMap;

use nalgebra::DVector;
use sfm_core::{Intrinsic, IntrinsicId, LandmarkId, Pose, PoseId, Reconstruction};

use super::{intrinsic_to_dvec, iso3_to_se3_dvec};

pub fn pose_block_name(id: PoseId) -> String {
    format!("pose/{id}")
}

pub fn intrinsic_block_name(id: IntrinsicId) -> String {
    format!("intrinsic/{id}")
}

pub fn landmark_block_name(id: LandmarkId) -> String {
    format!("landmark/{id}")
}

/// One 7-vector per pose.
pub fn extract_pose_parameters(poses: &BTreeMap<PoseId, Pose>) -> BTreeMap<PoseId, DVector<f64>> {
    poses
        .iter()
        .map(|(id, pose)| (*id, iso3_to_se3_dvec(pose)))
        .collect()
}

/// One layout vector per intrinsic; models without a layout map to an empty vector.
pub fn extract_intrinsic_parameters(
    intrinsics: &BTreeMap<IntrinsicId, Intrinsic>,
) -> BTreeMap<IntrinsicId, DVector<f64>> {
    intrinsics
        .iter()
        .map(|(id, intr)| (*id, intrinsic_to_dvec(intr)))
        .collect()
}

/// Serialized pose and intrinsic blocks of a reconstruction.
///
/// Every pose and intrinsic id of the source maps gets exactly one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBlocks {
    pub poses: BTreeMap<PoseId, DVector<f64>>,
    pub intrinsics: BTreeMap<IntrinsicId, DVector<f64>>,
}

impl ParameterBlocks {
    pub fn extract(scene: &Reconstruction) -> Self {
        Self {
            poses: extract_pose_parameters(&scene.poses),
            intrinsics: extract_intrinsic_parameters(&scene.intrinsics),
        }
    }
}
