//! Decoding solver output and writing it back into a reconstruction.
//!
//! Decoding and mutation are split: [`AdjustedParameters::from_outcome`] does
//! every fallible conversion up front, and [`AdjustedParameters::apply`] only
//! copies already-decoded values, so a failure never leaves partial state.

use anyhow::{anyhow, Context};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use sfm_core::{Intrinsic, IntrinsicId, LandmarkId, PoseId, Pt3, Pose, Reconstruction};
use std::collections::{BTreeMap, HashMap};

use crate::error::AdjustError;
use crate::ir::ParamId;
use crate::params::{intrinsic_from_dvec, se3_dvec_to_iso3};
use crate::problems::{BundleAdjustmentProblem, ProblemStats};
use crate::solver::{SolverOutcome, SolverSummary};

/// Diagnostics of a successful adjustment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustReport {
    pub stats: ProblemStats,
    /// `None` when nothing was solved (empty refinement).
    pub summary: Option<SolverSummary>,
}

/// Optimized values of every free block, ready to be applied.
#[derive(Debug, Clone)]
pub struct AdjustedParameters {
    pub poses: BTreeMap<PoseId, Pose>,
    pub intrinsics: BTreeMap<IntrinsicId, Intrinsic>,
    pub landmarks: BTreeMap<LandmarkId, Pt3>,
    pub stats: ProblemStats,
    pub summary: Option<SolverSummary>,
}

fn block_value<'a>(
    problem: &BundleAdjustmentProblem,
    values: &'a HashMap<String, DVector<f64>>,
    id: ParamId,
) -> anyhow::Result<&'a DVector<f64>> {
    let name = problem.block_name(id);
    values
        .get(name)
        .ok_or_else(|| anyhow!("solver output is missing block {name}"))
}

impl AdjustedParameters {
    /// Decode the free blocks of `outcome`.
    ///
    /// An unusable outcome becomes [`AdjustError::SolverFailed`].
    pub fn from_outcome(
        scene: &Reconstruction,
        problem: &BundleAdjustmentProblem,
        outcome: SolverOutcome,
    ) -> Result<Self, AdjustError> {
        if !outcome.usable {
            return Err(AdjustError::SolverFailed {
                summary: Box::new(outcome.summary),
                stats: problem.stats.clone(),
            });
        }
        let values = &outcome.params;

        let mut poses = BTreeMap::new();
        for (pose_id, &id) in problem.poses.iter().filter(|(_, id)| problem.is_free(**id)) {
            let v = block_value(problem, values, id)?;
            let pose = se3_dvec_to_iso3(v.as_view())
                .with_context(|| format!("decoding pose {pose_id}"))?;
            poses.insert(*pose_id, pose);
        }

        let mut intrinsics = BTreeMap::new();
        for (intr_id, &id) in problem.intrinsics.iter().filter(|(_, id)| problem.is_free(**id)) {
            let like = scene
                .intrinsics
                .get(intr_id)
                .ok_or_else(|| anyhow!("intrinsic {intr_id} vanished from the reconstruction"))?;
            let v = block_value(problem, values, id)?;
            let intr = intrinsic_from_dvec(like, v.as_view())
                .with_context(|| format!("decoding intrinsic {intr_id}"))?;
            intrinsics.insert(*intr_id, intr);
        }

        let mut landmarks = BTreeMap::new();
        for (landmark_id, &id) in problem.landmarks.iter().filter(|(_, id)| problem.is_free(**id)) {
            let v = block_value(problem, values, id)?;
            if v.len() != 3 || v.iter().any(|x| !x.is_finite()) {
                return Err(anyhow!("landmark {landmark_id} has an invalid position").into());
            }
            landmarks.insert(*landmark_id, Pt3::new(v[0], v[1], v[2]));
        }

        Ok(Self {
            poses,
            intrinsics,
            landmarks,
            stats: problem.stats.clone(),
            summary: Some(outcome.summary),
        })
    }

    /// Overwrite the adjusted entries of `scene`.
    ///
    /// Ids no longer present in `scene` are ignored.
    pub fn apply(self, scene: &mut Reconstruction) -> AdjustReport {
        for (id, pose) in self.poses {
            if let Some(slot) = scene.poses.get_mut(&id) {
                *slot = pose;
            }
        }
        for (id, intr) in self.intrinsics {
            if let Some(slot) = scene.intrinsics.get_mut(&id) {
                *slot = intr;
            }
        }
        for (id, position) in self.landmarks {
            if let Some(landmark) = scene.landmarks.get_mut(&id) {
                landmark.position = position;
            }
        }
        AdjustReport {
            stats: self.stats,
            summary: self.summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RobustLoss;
    use crate::params::{iso3_to_se3_dvec, FixityPolicy, GaugeAnchor, ParameterBlocks, RefineOptions};
    use crate::problems::build_bundle_adjustment_problem;
    use crate::solver::{SolverSummary, Termination};
    use sfm_core::synthetic::{build_reconstruction, landmark_cloud, ring_poses, UniformPixelNoise};
    use sfm_core::{CameraModel, Iso3};
    use std::time::Duration;

    fn scene() -> Reconstruction {
        let intr = Intrinsic::new(
            640,
            480,
            CameraModel::Pinhole {
                focal: 450.0,
                ppx: 320.0,
                ppy: 240.0,
            },
        );
        build_reconstruction(
            intr,
            &ring_poses(3, 6.0, 0.0),
            &landmark_cloud(8, 1.0, 3),
            UniformPixelNoise::default(),
        )
    }

    fn summary(termination: Termination) -> SolverSummary {
        SolverSummary {
            backend: "test".into(),
            linear_solver: "none".into(),
            num_parameter_blocks: 0,
            num_constant_parameter_blocks: 0,
            num_parameters: 0,
            num_effective_parameters: 0,
            num_residual_blocks: 0,
            num_residuals: 0,
            initial_cost: 1.0,
            final_cost: 0.5,
            initial_rms: 1.0,
            final_rms: 0.5,
            iterations: Some(1),
            termination,
            elapsed: Duration::ZERO,
        }
    }

    fn partial_problem(scene: &Reconstruction) -> BundleAdjustmentProblem {
        let mut graph = sfm_core::ReconstructionGraph::new();
        graph.poses.insert(PoseId(1));
        build_bundle_adjustment_problem(
            scene,
            &ParameterBlocks::extract(scene),
            &FixityPolicy::partial(RefineOptions::MOTION_AND_INTRINSICS, GaugeAnchor::None, &graph),
            RobustLoss::None,
        )
        .unwrap()
    }

    #[test]
    fn only_free_blocks_are_decoded_and_applied() {
        let mut scene = scene();
        let problem = partial_problem(&scene);
        let moved = Iso3::translation(0.0, 0.0, 0.25) * scene.poses[&PoseId(1)];

        let mut params = problem.initial.clone();
        params.insert("pose/1".into(), iso3_to_se3_dvec(&moved));
        // Constant blocks are never read back, whatever the solver returns.
        params.insert("pose/0".into(), DVector::zeros(7));

        let outcome = SolverOutcome {
            params,
            summary: summary(Termination::Converged),
            usable: true,
        };
        let adjusted = AdjustedParameters::from_outcome(&scene, &problem, outcome).unwrap();
        assert_eq!(adjusted.poses.len(), 1);
        assert!(adjusted.intrinsics.is_empty());

        let before_pose0 = scene.poses[&PoseId(0)];
        let report = adjusted.apply(&mut scene);
        assert_eq!(scene.poses[&PoseId(0)], before_pose0);
        let delta = scene.poses[&PoseId(1)].translation.vector - moved.translation.vector;
        assert!(delta.norm() < 1e-12);
        assert_eq!(report.stats, problem.stats);
        assert!(report.summary.is_some());
    }

    #[test]
    fn unusable_outcome_is_rejected() {
        let scene = scene();
        let problem = partial_problem(&scene);
        let outcome = SolverOutcome {
            params: problem.initial.clone(),
            summary: summary(Termination::NumericalFailure),
            usable: false,
        };
        let err = AdjustedParameters::from_outcome(&scene, &problem, outcome).unwrap_err();
        match err {
            AdjustError::SolverFailed { summary, stats } => {
                assert_eq!(summary.termination, Termination::NumericalFailure);
                assert_eq!(stats, problem.stats);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn missing_or_corrupt_blocks_fail_before_mutation() {
        let scene = scene();
        let problem = partial_problem(&scene);

        let mut params = problem.initial.clone();
        params.remove("pose/1");
        let outcome = SolverOutcome {
            params,
            summary: summary(Termination::Converged),
            usable: true,
        };
        let err = AdjustedParameters::from_outcome(&scene, &problem, outcome).unwrap_err();
        assert!(matches!(err, AdjustError::Internal(_)), "{err}");

        let mut params = problem.initial.clone();
        params.insert("pose/1".into(), DVector::from_element(7, f64::NAN));
        let outcome = SolverOutcome {
            params,
            summary: summary(Termination::Converged),
            usable: true,
        };
        assert!(AdjustedParameters::from_outcome(&scene, &problem, outcome).is_err());
    }
}
