use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{IntrinsicId, PoseId, View};

/// Poses and intrinsics touched by the most recent reconstruction step.
///
/// An empty graph means "no restriction" for partial refinement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructionGraph {
    pub poses: BTreeSet<PoseId>,
    pub intrinsics: BTreeSet<IntrinsicId>,
}

impl ReconstructionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty() && self.intrinsics.is_empty()
    }

    /// Mark the pose and intrinsic of `view` as touched.
    pub fn touch_view(&mut self, view: &View) {
        self.poses.insert(view.pose_id);
        self.intrinsics.insert(view.intrinsic_id);
    }

    pub fn contains_pose(&self, id: PoseId) -> bool {
        self.poses.contains(&id)
    }

    pub fn contains_intrinsic(&self, id: IntrinsicId) -> bool {
        self.intrinsics.contains(&id)
    }
}
