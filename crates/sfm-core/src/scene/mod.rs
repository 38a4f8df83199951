//! Reconstruction container.
//!
//! All maps are ordered so that iteration (and therefore problem assembly)
//! is deterministic.

mod graph;
mod ids;
mod metrics;

pub use graph::*;
pub use ids::*;
pub use metrics::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Intrinsic, Pose, Pt3, Vec2};

/// One image: which pose and which intrinsic it was taken with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub image: String,
    pub pose_id: PoseId,
    pub intrinsic_id: IntrinsicId,
}

impl View {
    pub fn new(image: impl Into<String>, pose_id: PoseId, intrinsic_id: IntrinsicId) -> Self {
        Self {
            image: image.into(),
            pose_id,
            intrinsic_id,
        }
    }
}

/// A 3D point with its 2D observations keyed by view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub position: Pt3,
    pub observations: BTreeMap<ViewId, Vec2>,
}

impl Landmark {
    pub fn new(position: Pt3) -> Self {
        Self {
            position,
            observations: BTreeMap::new(),
        }
    }

    pub fn with_observation(mut self, view: ViewId, uv: Vec2) -> Self {
        self.observations.insert(view, uv);
        self
    }
}

/// Views, poses, intrinsics and landmarks of a reconstruction.
///
/// Ids are not required to be consistent: a view may reference a pose or
/// intrinsic that does not exist, and observations may reference unknown views.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    pub views: BTreeMap<ViewId, View>,
    pub poses: BTreeMap<PoseId, Pose>,
    pub intrinsics: BTreeMap<IntrinsicId, Intrinsic>,
    pub landmarks: BTreeMap<LandmarkId, Landmark>,
}

impl Reconstruction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_observations(&self) -> usize {
        self.landmarks.values().map(|l| l.observations.len()).sum()
    }

    /// Pose of the camera that took `view`, if both exist.
    pub fn view_pose(&self, view: ViewId) -> Option<&Pose> {
        self.views
            .get(&view)
            .and_then(|v| self.poses.get(&v.pose_id))
    }

    /// Intrinsic of the camera that took `view`, if both exist.
    pub fn view_intrinsic(&self, view: ViewId) -> Option<&Intrinsic> {
        self.views
            .get(&view)
            .and_then(|v| self.intrinsics.get(&v.intrinsic_id))
    }
}
