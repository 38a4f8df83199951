//! Top-level bundle adjustment entry points.

use log::debug;
use serde::{Deserialize, Serialize};
use sfm_core::{Reconstruction, ReconstructionGraph};

use crate::error::AdjustError;
use crate::integrate::{AdjustReport, AdjustedParameters};
use crate::ir::RobustLoss;
use crate::params::{FixityPolicy, GaugeAnchor, ParameterBlocks, RefineOptions};
use crate::problems::build_bundle_adjustment_problem;
use crate::solver::{solve, SolverOptions};

/// Options of one bundle adjustment call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleAdjustmentOptions {
    pub solver: SolverOptions,
    /// Loss applied to every reprojection residual.
    pub robust_loss: RobustLoss,
    pub gauge: GaugeAnchor,
}

/// Runs bundle adjustment on reconstructions with a fixed configuration.
///
/// ```no_run
/// use sfm_optim::{BundleAdjuster, BundleAdjustmentOptions, RefineOptions, SolverOptions};
/// # fn run(scene: &mut sfm_core::Reconstruction) -> Result<(), sfm_optim::AdjustError> {
/// let adjuster = BundleAdjuster::new(BundleAdjustmentOptions {
///     solver: SolverOptions::dense(),
///     ..Default::default()
/// });
/// let report = adjuster.adjust(scene, RefineOptions::ALL)?;
/// println!("{}", report.stats);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct BundleAdjuster {
    options: BundleAdjustmentOptions,
}

impl BundleAdjuster {
    pub fn new(options: BundleAdjustmentOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BundleAdjustmentOptions {
        &self.options
    }

    /// Optimize `scene` without touching it.
    pub fn solve(
        &self,
        scene: &Reconstruction,
        refine: RefineOptions,
    ) -> Result<AdjustedParameters, AdjustError> {
        let policy = FixityPolicy::full(refine, self.options.gauge);
        self.solve_with_policy(scene, &policy)
    }

    /// Like [`BundleAdjuster::solve`] with [`RefineOptions::ALL`], freeing only
    /// the poses and intrinsics listed in `graph` (all of them if it is empty).
    pub fn solve_partial(
        &self,
        scene: &Reconstruction,
        graph: &ReconstructionGraph,
    ) -> Result<AdjustedParameters, AdjustError> {
        let policy = FixityPolicy::partial(RefineOptions::ALL, self.options.gauge, graph);
        self.solve_with_policy(scene, &policy)
    }

    /// Optimize `scene` and write the result back on success.
    ///
    /// On error `scene` is left unchanged.
    pub fn adjust(
        &self,
        scene: &mut Reconstruction,
        refine: RefineOptions,
    ) -> Result<AdjustReport, AdjustError> {
        if refine.is_none() {
            debug!("nothing to refine; bundle adjustment skipped");
            return Ok(AdjustReport::default());
        }
        let adjusted = self.solve(scene, refine)?;
        Ok(adjusted.apply(scene))
    }

    /// Incremental refinement: only what the last reconstruction step touched
    /// may move.
    pub fn adjust_partial_reconstruction(
        &self,
        scene: &mut Reconstruction,
        graph: &ReconstructionGraph,
    ) -> Result<AdjustReport, AdjustError> {
        let adjusted = self.solve_partial(scene, graph)?;
        Ok(adjusted.apply(scene))
    }

    fn solve_with_policy(
        &self,
        scene: &Reconstruction,
        policy: &FixityPolicy,
    ) -> Result<AdjustedParameters, AdjustError> {
        let blocks = ParameterBlocks::extract(scene);
        let problem =
            build_bundle_adjustment_problem(scene, &blocks, policy, self.options.robust_loss)?;
        let outcome = solve(&problem.ir, &problem.initial, &self.options.solver)?;
        AdjustedParameters::from_outcome(scene, &problem, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_accept_partial_json() {
        let opts: BundleAdjustmentOptions = serde_json::from_str(
            r#"{ "robust_loss": { "kind": "huber", "scale": 2.0 }, "gauge": "first_pose" }"#,
        )
        .unwrap();
        assert_eq!(opts.robust_loss, RobustLoss::Huber { scale: 2.0 });
        assert_eq!(opts.gauge, GaugeAnchor::FirstPose);
        assert_eq!(opts.solver, SolverOptions::default());
    }

    #[test]
    fn empty_refinement_skips_everything() {
        let mut scene = Reconstruction::new();
        let report = BundleAdjuster::default()
            .adjust(&mut scene, RefineOptions::NONE)
            .unwrap();
        assert!(report.summary.is_none());
        assert_eq!(report.stats.residual_blocks, 0);
    }

    #[test]
    fn empty_reconstruction_is_degenerate() {
        let mut scene = Reconstruction::new();
        let err = BundleAdjuster::default()
            .adjust(&mut scene, RefineOptions::ALL)
            .unwrap_err();
        assert!(matches!(err, AdjustError::Degenerate { .. }));
    }
}
