use serde::{Deserialize, Serialize};
use sfm_core::{IntrinsicId, ParamLayout, PoseId, ReconstructionGraph};

use crate::ir::FixedMask;
use crate::params::SE3_DIM;

/// Which parameter categories are refined. `true` means "optimize".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineOptions {
    /// Camera rotations and translations.
    pub poses: bool,
    /// Intrinsic index 0.
    pub focal: bool,
    /// Intrinsic indices 1 and 2.
    pub principal_point: bool,
    /// Intrinsic indices 3 and above.
    pub distortion: bool,
    /// Landmark positions.
    pub structure: bool,
}

impl RefineOptions {
    pub const NONE: Self = Self {
        poses: false,
        focal: false,
        principal_point: false,
        distortion: false,
        structure: false,
    };

    pub const ALL: Self = Self {
        poses: true,
        focal: true,
        principal_point: true,
        distortion: true,
        structure: true,
    };

    /// Everything except landmark positions.
    pub const MOTION_AND_INTRINSICS: Self = Self {
        structure: false,
        ..Self::ALL
    };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    pub fn refines_intrinsics(&self) -> bool {
        self.focal || self.principal_point || self.distortion
    }

    /// Intrinsic indices held constant under these flags.
    pub fn intrinsic_fixed_indices(&self, layout: ParamLayout) -> Vec<usize> {
        let mut fixed = Vec::new();
        if !self.focal {
            fixed.push(ParamLayout::FOCAL);
        }
        if !self.principal_point {
            fixed.extend(ParamLayout::PRINCIPAL_POINT);
        }
        if !self.distortion {
            fixed.extend(layout.distortion());
        }
        fixed
    }
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self::ALL
    }
}

/// How the similarity gauge of a full refinement is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeAnchor {
    /// Leave the gauge to the solver's damping.
    #[default]
    None,
    /// Hold the lowest referenced pose id constant.
    FirstPose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FreeSet {
    All,
    Graph(ReconstructionGraph),
}

/// Decides the fixed mask of every parameter block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixityPolicy {
    refine: RefineOptions,
    free: FreeSet,
    gauge: GaugeAnchor,
}

impl FixityPolicy {
    /// Every block may move, subject to the category flags.
    pub fn full(refine: RefineOptions, gauge: GaugeAnchor) -> Self {
        Self {
            refine,
            free: FreeSet::All,
            gauge,
        }
    }

    /// Only poses and intrinsics listed in `graph` may move.
    /// An empty graph falls back to [`FixityPolicy::full`].
    pub fn partial(refine: RefineOptions, gauge: GaugeAnchor, graph: &ReconstructionGraph) -> Self {
        if graph.is_empty() {
            return Self::full(refine, gauge);
        }
        Self {
            refine,
            free: FreeSet::Graph(graph.clone()),
            gauge,
        }
    }

    pub fn refine(&self) -> RefineOptions {
        self.refine
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.free, FreeSet::Graph(_))
    }

    /// Pose held constant to fix the gauge, chosen among `referenced` poses.
    pub fn anchor(&self, referenced: impl IntoIterator<Item = PoseId>) -> Option<PoseId> {
        match self.gauge {
            GaugeAnchor::FirstPose if self.refine.poses && !self.is_partial() => {
                referenced.into_iter().min()
            }
            _ => None,
        }
    }

    pub fn pose_mask(&self, id: PoseId, anchor: Option<PoseId>) -> FixedMask {
        let in_set = match &self.free {
            FreeSet::All => true,
            FreeSet::Graph(graph) => graph.contains_pose(id),
        };
        if self.refine.poses && in_set && anchor != Some(id) {
            FixedMask::all_free()
        } else {
            FixedMask::all_fixed(SE3_DIM)
        }
    }

    pub fn intrinsic_mask(&self, id: IntrinsicId, layout: ParamLayout) -> FixedMask {
        let in_set = match &self.free {
            FreeSet::All => true,
            FreeSet::Graph(graph) => graph.contains_intrinsic(id),
        };
        if in_set {
            FixedMask::fix_indices(&self.refine.intrinsic_fixed_indices(layout))
        } else {
            FixedMask::all_fixed(layout.dim)
        }
    }

    pub fn landmark_mask(&self) -> FixedMask {
        if self.refine.structure {
            FixedMask::all_free()
        } else {
            FixedMask::all_fixed(3)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROWN: ParamLayout = ParamLayout { dim: 8 };

    #[test]
    fn intrinsic_flags_map_to_indices() {
        let only_focal = RefineOptions {
            focal: true,
            ..RefineOptions::NONE
        };
        assert_eq!(
            only_focal.intrinsic_fixed_indices(BROWN),
            vec![1, 2, 3, 4, 5, 6, 7]
        );
        assert!(RefineOptions::ALL.intrinsic_fixed_indices(BROWN).is_empty());
        assert_eq!(
            RefineOptions::NONE.intrinsic_fixed_indices(ParamLayout { dim: 3 }),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn partial_policy_frees_only_graph_members() {
        let mut graph = ReconstructionGraph::new();
        graph.poses.insert(PoseId(2));
        graph.intrinsics.insert(IntrinsicId(1));
        let policy = FixityPolicy::partial(RefineOptions::ALL, GaugeAnchor::FirstPose, &graph);

        assert!(policy.is_partial());
        assert!(policy.pose_mask(PoseId(2), None).is_empty());
        assert!(policy.pose_mask(PoseId(3), None).is_all_fixed(7));
        assert!(policy.intrinsic_mask(IntrinsicId(1), BROWN).is_empty());
        assert!(policy.intrinsic_mask(IntrinsicId(0), BROWN).is_all_fixed(8));
        assert_eq!(policy.anchor([PoseId(2), PoseId(5)]), None);
    }

    #[test]
    fn empty_graph_is_full_refinement() {
        let policy = FixityPolicy::partial(
            RefineOptions::ALL,
            GaugeAnchor::None,
            &ReconstructionGraph::new(),
        );
        assert_eq!(policy, FixityPolicy::full(RefineOptions::ALL, GaugeAnchor::None));
    }

    #[test]
    fn first_pose_anchor_fixes_lowest_id() {
        let policy = FixityPolicy::full(RefineOptions::ALL, GaugeAnchor::FirstPose);
        let anchor = policy.anchor([PoseId(4), PoseId(1), PoseId(9)]);
        assert_eq!(anchor, Some(PoseId(1)));
        assert!(policy.pose_mask(PoseId(1), anchor).is_all_fixed(7));
        assert!(policy.pose_mask(PoseId(4), anchor).is_empty());
    }

    #[test]
    fn refine_options_accept_partial_json() {
        let opts: RefineOptions = serde_json::from_str(r#"{"structure": false}"#).unwrap();
        assert_eq!(opts, RefineOptions::MOTION_AND_INTRINSICS);
    }
}
