//! Bundle adjustment problem assembly.
//!
//! One residual block per resolvable observation. Pose blocks are SE3,
//! intrinsic blocks Euclidean in the camera model's layout, and landmark
//! blocks (when structure is refined) 3D Euclidean.

use log::{debug, warn};
use nalgebra::DVector;
use sfm_core::{IntrinsicId, LandmarkId, ParamLayout, PoseId, Reconstruction};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::AdjustError;
use crate::factors::ReprojectionResidual;
use crate::ir::{FactorKind, ManifoldKind, ParamId, ProblemIR, ResidualBlock, RobustLoss};
use crate::params::{
    intrinsic_block_name, landmark_block_name, pose_block_name, FixityPolicy, ParameterBlocks,
};
use crate::problems::ProblemStats;

/// Assembled problem and the mapping from reconstruction ids to blocks.
#[derive(Debug, Clone)]
pub struct BundleAdjustmentProblem {
    pub ir: ProblemIR,
    pub initial: HashMap<String, DVector<f64>>,
    pub stats: ProblemStats,
    pub poses: BTreeMap<PoseId, ParamId>,
    pub intrinsics: BTreeMap<IntrinsicId, ParamId>,
    pub landmarks: BTreeMap<LandmarkId, ParamId>,
}

impl BundleAdjustmentProblem {
    pub fn is_free(&self, id: ParamId) -> bool {
        !self.ir.params[id.0].is_constant()
    }

    pub fn block_name(&self, id: ParamId) -> &str {
        &self.ir.params[id.0].name
    }
}

struct Observation {
    landmark: LandmarkId,
    pose: PoseId,
    intrinsic: IntrinsicId,
    residual: ReprojectionResidual,
}

/// Resolve every observation, dropping (and counting) the ones that cannot
/// produce a residual.
fn collect_observations(
    scene: &Reconstruction,
    blocks: &ParameterBlocks,
    stats: &mut ProblemStats,
) -> Vec<Observation> {
    let mut warned: BTreeSet<IntrinsicId> = BTreeSet::new();
    let mut out = Vec::new();

    for (landmark_id, landmark) in &scene.landmarks {
        let before = out.len();
        for (view_id, uv) in &landmark.observations {
            let Some(view) = scene.views.get(view_id) else {
                stats.dropped_missing_view += 1;
                continue;
            };
            if !blocks.poses.contains_key(&view.pose_id) {
                stats.dropped_missing_pose += 1;
                continue;
            }
            let Some(intr) = scene
                .intrinsics
                .get(&view.intrinsic_id)
                .filter(|_| blocks.intrinsics.contains_key(&view.intrinsic_id))
            else {
                stats.dropped_missing_intrinsic += 1;
                continue;
            };
            match ReprojectionResidual::new(intr.model.kind(), *uv) {
                Ok(residual) => out.push(Observation {
                    landmark: *landmark_id,
                    pose: view.pose_id,
                    intrinsic: view.intrinsic_id,
                    residual,
                }),
                Err(err) => {
                    stats.dropped_unsupported_model += 1;
                    if warned.insert(view.intrinsic_id) {
                        warn!(
                            "intrinsic {}: {err}; its observations are left out of bundle adjustment",
                            view.intrinsic_id
                        );
                    }
                }
            }
        }
        if out.len() == before {
            stats.landmarks_without_observations += 1;
        }
    }
    out
}

/// `(free, constant)` block counts.
fn split_free<'a>(ir: &ProblemIR, ids: impl Iterator<Item = &'a ParamId>) -> (usize, usize) {
    ids.fold((0, 0), |(free, constant), id| {
        if ir.params[id.0].is_constant() {
            (free, constant + 1)
        } else {
            (free + 1, constant)
        }
    })
}

/// Build the bundle adjustment problem for `scene`.
///
/// Only blocks referenced by at least one surviving observation are added.
/// Fails with [`AdjustError::Degenerate`] when no residual survives or every
/// referenced block is constant.
pub fn build_bundle_adjustment_problem(
    scene: &Reconstruction,
    blocks: &ParameterBlocks,
    policy: &FixityPolicy,
    loss: RobustLoss,
) -> Result<BundleAdjustmentProblem, AdjustError> {
    let mut stats = ProblemStats::default();
    let observations = collect_observations(scene, blocks, &mut stats);

    let mut ir = ProblemIR::new();
    let mut initial = HashMap::new();
    let mut poses = BTreeMap::new();
    let mut intrinsics = BTreeMap::new();
    let mut landmarks = BTreeMap::new();

    let referenced_poses: BTreeSet<PoseId> = observations.iter().map(|o| o.pose).collect();
    let anchor = policy.anchor(referenced_poses.iter().copied());
    for pose_id in &referenced_poses {
        let name = pose_block_name(*pose_id);
        let fixed = policy.pose_mask(*pose_id, anchor);
        let id = ir.add_param_block(&name, 7, ManifoldKind::SE3, fixed);
        initial.insert(name, blocks.poses[pose_id].clone());
        poses.insert(*pose_id, id);
    }

    let referenced_intrinsics: BTreeSet<IntrinsicId> =
        observations.iter().map(|o| o.intrinsic).collect();
    for intr_id in &referenced_intrinsics {
        let name = intrinsic_block_name(*intr_id);
        let values = &blocks.intrinsics[intr_id];
        let layout = ParamLayout { dim: values.len() };
        let fixed = policy.intrinsic_mask(*intr_id, layout);
        let id = ir.add_param_block(&name, layout.dim, ManifoldKind::Euclidean, fixed);
        initial.insert(name, values.clone());
        intrinsics.insert(*intr_id, id);
    }

    let refine_structure = policy.refine().structure;
    if refine_structure {
        let referenced: BTreeSet<LandmarkId> = observations.iter().map(|o| o.landmark).collect();
        for landmark_id in referenced {
            let name = landmark_block_name(landmark_id);
            let p = scene.landmarks[&landmark_id].position;
            let id = ir.add_param_block(&name, 3, ManifoldKind::Euclidean, policy.landmark_mask());
            initial.insert(name, nalgebra::dvector![p.x, p.y, p.z]);
            landmarks.insert(landmark_id, id);
        }
    }

    for obs in &observations {
        let mut params = vec![poses[&obs.pose], intrinsics[&obs.intrinsic]];
        let factor = if refine_structure {
            params.push(landmarks[&obs.landmark]);
            FactorKind::ReprojFreePoint {
                residual: obs.residual,
            }
        } else {
            let p = scene.landmarks[&obs.landmark].position;
            FactorKind::ReprojFixedPoint {
                residual: obs.residual,
                pw: [p.x, p.y, p.z],
            }
        };
        ir.add_residual_block(ResidualBlock {
            params,
            loss,
            residual_dim: factor.residual_dim(),
            factor,
        });
    }

    (stats.free_pose_blocks, stats.constant_pose_blocks) = split_free(&ir, poses.values());
    (stats.free_intrinsic_blocks, stats.constant_intrinsic_blocks) =
        split_free(&ir, intrinsics.values());
    (stats.free_landmark_blocks, stats.constant_landmark_blocks) =
        split_free(&ir, landmarks.values());
    stats.residual_blocks = ir.residuals.len();
    stats.residual_rows = ir.num_residual_rows();
    debug!("bundle adjustment problem: {stats}");

    if stats.residual_blocks == 0 {
        return Err(AdjustError::Degenerate {
            reason: "no observation produced a residual".to_string(),
            stats,
        });
    }
    if ir.num_free_blocks() == 0 {
        return Err(AdjustError::Degenerate {
            reason: "every referenced parameter block is constant".to_string(),
            stats,
        });
    }
    ir.validate()?;

    Ok(BundleAdjustmentProblem {
        ir,
        initial,
        stats,
        poses,
        intrinsics,
        landmarks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{GaugeAnchor, RefineOptions};
    use sfm_core::synthetic::{build_reconstruction, landmark_cloud, ring_poses, UniformPixelNoise};
    use sfm_core::{
        CameraModel, Intrinsic, Landmark, Pt3, ReconstructionGraph, Vec2, View, ViewId,
    };

    fn scene() -> Reconstruction {
        let intr = Intrinsic::new(
            640,
            480,
            CameraModel::PinholeRadialK1 {
                focal: 500.0,
                ppx: 320.0,
                ppy: 240.0,
                k1: -0.02,
            },
        );
        build_reconstruction(
            intr,
            &ring_poses(4, 6.0, 0.5),
            &landmark_cloud(12, 1.0, 5),
            UniformPixelNoise::default(),
        )
    }

    fn build(
        scene: &Reconstruction,
        policy: &FixityPolicy,
    ) -> Result<BundleAdjustmentProblem, AdjustError> {
        build_bundle_adjustment_problem(
            scene,
            &ParameterBlocks::extract(scene),
            policy,
            RobustLoss::None,
        )
    }

    #[test]
    fn full_problem_has_one_residual_per_observation() {
        let scene = scene();
        let problem = build(&scene, &FixityPolicy::full(RefineOptions::ALL, GaugeAnchor::None))
            .unwrap();
        assert_eq!(problem.stats.residual_blocks, scene.num_observations());
        assert_eq!(problem.stats.residual_rows, 2 * scene.num_observations());
        assert_eq!(problem.stats.free_pose_blocks, 4);
        assert_eq!(problem.stats.free_intrinsic_blocks, 1);
        assert_eq!(problem.stats.free_landmark_blocks, 12);
        assert_eq!(problem.stats.dropped_observations(), 0);
        assert_eq!(problem.block_name(problem.poses[&PoseId(2)]), "pose/2");
        assert_eq!(problem.initial.len(), problem.ir.params.len());
    }

    #[test]
    fn fixed_structure_folds_points_into_factors() {
        let scene = scene();
        let problem = build(
            &scene,
            &FixityPolicy::full(RefineOptions::MOTION_AND_INTRINSICS, GaugeAnchor::None),
        )
        .unwrap();
        assert!(problem.landmarks.is_empty());
        assert!(problem
            .ir
            .residuals
            .iter()
            .all(|r| matches!(r.factor, FactorKind::ReprojFixedPoint { .. })));
    }

    #[test]
    fn unresolvable_observations_are_counted() {
        let mut scene = scene();
        scene
            .views
            .insert(ViewId(10), View::new("orphan-pose.png", PoseId(99), IntrinsicId(0)));
        scene
            .views
            .insert(ViewId(11), View::new("orphan-intr.png", PoseId(0), IntrinsicId(42)));
        scene.intrinsics.insert(
            IntrinsicId(7),
            Intrinsic::new(2000, 1000, CameraModel::Spherical),
        );
        scene
            .views
            .insert(ViewId(12), View::new("pano.png", PoseId(1), IntrinsicId(7)));
        let p = Pt3::new(0.0, 0.0, 0.0);
        scene.landmarks.insert(
            LandmarkId(500),
            Landmark::new(p)
                .with_observation(ViewId(10), Vec2::new(1.0, 1.0))
                .with_observation(ViewId(11), Vec2::new(1.0, 1.0))
                .with_observation(ViewId(12), Vec2::new(1.0, 1.0))
                .with_observation(ViewId(77), Vec2::new(1.0, 1.0)),
        );
        scene.landmarks.insert(LandmarkId(501), Landmark::new(p));

        let problem = build(&scene, &FixityPolicy::full(RefineOptions::ALL, GaugeAnchor::None))
            .unwrap();
        let stats = &problem.stats;
        assert_eq!(stats.dropped_missing_pose, 1);
        assert_eq!(stats.dropped_missing_intrinsic, 1);
        assert_eq!(stats.dropped_unsupported_model, 1);
        assert_eq!(stats.dropped_missing_view, 1);
        assert_eq!(stats.landmarks_without_observations, 2);
        assert!(!problem.landmarks.contains_key(&LandmarkId(500)));
        assert!(!problem.intrinsics.contains_key(&IntrinsicId(7)));
    }

    #[test]
    fn partial_policy_fixes_poses_outside_graph() {
        let scene = scene();
        let mut graph = ReconstructionGraph::new();
        graph.poses.insert(PoseId(3));
        let problem = build(
            &scene,
            &FixityPolicy::partial(RefineOptions::ALL, GaugeAnchor::None, &graph),
        )
        .unwrap();
        assert_eq!(problem.stats.free_pose_blocks, 1);
        assert_eq!(problem.stats.constant_pose_blocks, 3);
        assert_eq!(problem.stats.constant_intrinsic_blocks, 1);
        assert!(problem.is_free(problem.poses[&PoseId(3)]));
    }

    #[test]
    fn first_pose_anchor_is_constant() {
        let scene = scene();
        let problem = build(
            &scene,
            &FixityPolicy::full(RefineOptions::ALL, GaugeAnchor::FirstPose),
        )
        .unwrap();
        assert!(!problem.is_free(problem.poses[&PoseId(0)]));
        assert_eq!(problem.stats.free_pose_blocks, 3);
    }

    #[test]
    fn empty_and_frozen_problems_are_degenerate() {
        let empty = Reconstruction::new();
        let err = build(&empty, &FixityPolicy::full(RefineOptions::ALL, GaugeAnchor::None))
            .unwrap_err();
        assert!(matches!(err, AdjustError::Degenerate { .. }), "{err}");

        let scene = scene();
        let err = build(&scene, &FixityPolicy::full(RefineOptions::NONE, GaugeAnchor::None))
            .unwrap_err();
        match err {
            AdjustError::Degenerate { stats, .. } => {
                assert_eq!(stats.residual_blocks, scene.num_observations());
                assert_eq!(stats.free_blocks(), 0);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
