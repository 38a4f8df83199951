use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::factors::ReprojectionResidual;

/// Index of a parameter block inside its [`ProblemIR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub usize);

/// Local parametrization of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifoldKind {
    /// Plain vector, updated additively.
    Euclidean,
    /// Rigid transform, stored as `[qx, qy, qz, qw, tx, ty, tz]`.
    SE3,
}

impl ManifoldKind {
    /// Whether a block of `dim` stored values can carry this manifold.
    pub fn storage_matches(self, dim: usize) -> bool {
        match self {
            ManifoldKind::Euclidean => dim > 0,
            ManifoldKind::SE3 => dim == 7,
        }
    }

    /// Dimension of the local update space.
    pub fn tangent_dim(self, dim: usize) -> usize {
        match self {
            ManifoldKind::Euclidean => dim,
            ManifoldKind::SE3 => 6,
        }
    }
}

/// Coordinates of a block held at their initial values.
///
/// SE3 blocks only accept the empty mask or the full one; Euclidean blocks
/// can hold any subset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedMask {
    held: BTreeSet<usize>,
}

impl FixedMask {
    pub fn all_free() -> Self {
        Self::default()
    }

    /// Hold coordinates `0..dim`.
    pub fn all_fixed(dim: usize) -> Self {
        (0..dim).collect()
    }

    pub fn fix_indices(indices: &[usize]) -> Self {
        indices.iter().copied().collect()
    }

    pub fn holds(&self, coord: usize) -> bool {
        self.held.contains(&coord)
    }

    pub fn is_all_fixed(&self, dim: usize) -> bool {
        self.held.range(..dim).count() == dim
    }

    /// Held coordinates, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.held.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Coordinates in `0..dim` left to the solver.
    pub fn free_indices(&self, dim: usize) -> Vec<usize> {
        (0..dim).filter(|&c| !self.holds(c)).collect()
    }
}

impl FromIterator<usize> for FixedMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            held: iter.into_iter().collect(),
        }
    }
}

/// Loss wrapped around each observation's squared reprojection error.
///
/// Every observation is its own residual block, so the loss never mixes
/// observations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RobustLoss {
    #[default]
    None,
    Huber {
        scale: f64,
    },
    Cauchy {
        scale: f64,
    },
    Arctan {
        scale: f64,
    },
}

impl RobustLoss {
    fn scale(self) -> Option<f64> {
        match self {
            RobustLoss::None => None,
            RobustLoss::Huber { scale }
            | RobustLoss::Cauchy { scale }
            | RobustLoss::Arctan { scale } => Some(scale),
        }
    }
}

/// Residual functions a backend has to know how to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorKind {
    /// Blocks `[pose, intrinsic]`; the world point travels with the factor.
    ReprojFixedPoint {
        residual: ReprojectionResidual,
        pw: [f64; 3],
    },
    /// Blocks `[pose, intrinsic, landmark]`.
    ReprojFreePoint { residual: ReprojectionResidual },
}

impl FactorKind {
    /// Rows contributed by one factor (pixel error in x and y).
    pub fn residual_dim(&self) -> usize {
        2
    }

    pub fn residual(&self) -> &ReprojectionResidual {
        match self {
            FactorKind::ReprojFixedPoint { residual, .. }
            | FactorKind::ReprojFreePoint { residual } => residual,
        }
    }

    /// Number of parameter blocks the factor reads.
    pub fn num_params(&self) -> usize {
        match self {
            FactorKind::ReprojFixedPoint { .. } => 2,
            FactorKind::ReprojFreePoint { .. } => 3,
        }
    }
}

/// One named block of unknowns.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub dim: usize,
    pub manifold: ManifoldKind,
    pub fixed: FixedMask,
}

impl ParamBlock {
    /// `true` when every coordinate is held constant.
    pub fn is_constant(&self) -> bool {
        self.fixed.is_all_fixed(self.dim)
    }

    fn check(&self, index: usize) -> Result<()> {
        ensure!(
            self.id == ParamId(index),
            "block at position {index} carries id {:?}",
            self.id
        );
        ensure!(
            self.manifold.storage_matches(self.dim),
            "block {}: {:?} storage cannot have {} values",
            self.name,
            self.manifold,
            self.dim
        );
        if let Some(bad) = self.fixed.iter().find(|&c| c >= self.dim) {
            bail!("block {}: held coordinate {bad} exceeds dim {}", self.name, self.dim);
        }
        ensure!(
            self.manifold != ManifoldKind::SE3 || self.fixed.is_empty() || self.is_constant(),
            "block {}: SE3 blocks are either fully free or fully held",
            self.name
        );
        Ok(())
    }
}

/// One factor and the blocks it reads, in the factor's order.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub params: Vec<ParamId>,
    pub loss: RobustLoss,
    pub factor: FactorKind,
    pub residual_dim: usize,
}

/// Solver-independent problem: parameter blocks plus residual blocks.
///
/// Each backend lowers this into its own problem type.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block; ids are handed out in insertion order.
    pub fn add_param_block(
        &mut self,
        name: impl Into<String>,
        dim: usize,
        manifold: ManifoldKind,
        fixed: FixedMask,
    ) -> ParamId {
        let block = ParamBlock {
            id: ParamId(self.params.len()),
            name: name.into(),
            dim,
            manifold,
            fixed,
        };
        let id = block.id;
        self.params.push(block);
        id
    }

    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    pub fn param_by_name(&self, name: &str) -> Option<ParamId> {
        self.params
            .iter()
            .position(|p| p.name == name)
            .map(ParamId)
    }

    /// Number of parameter blocks with at least one free coordinate.
    pub fn num_free_blocks(&self) -> usize {
        self.params.iter().filter(|p| !p.is_constant()).count()
    }

    /// Total number of scalar residuals.
    pub fn num_residual_rows(&self) -> usize {
        self.residuals.iter().map(|r| r.residual_dim).sum()
    }

    /// Sum of ambient block dimensions.
    pub fn num_parameters(&self) -> usize {
        self.params.iter().map(|p| p.dim).sum()
    }

    /// Number of free coordinates in the local (tangent) parametrization.
    pub fn num_effective_parameters(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.is_constant())
            .map(|p| match p.manifold {
                ManifoldKind::SE3 => p.manifold.tangent_dim(p.dim),
                ManifoldKind::Euclidean => p.fixed.free_indices(p.dim).len(),
            })
            .sum()
    }

    /// Check block ids, masks, and that every residual reads blocks of the
    /// shape its factor expects.
    pub fn validate(&self) -> Result<()> {
        for (index, block) in self.params.iter().enumerate() {
            block.check(index)?;
        }
        for (index, residual) in self.residuals.iter().enumerate() {
            self.check_residual(index, residual)?;
        }
        Ok(())
    }

    fn check_residual(&self, index: usize, residual: &ResidualBlock) -> Result<()> {
        let factor = &residual.factor;
        ensure!(
            residual.residual_dim == factor.residual_dim(),
            "residual {index}: declared {} rows, factor yields {}",
            residual.residual_dim,
            factor.residual_dim()
        );
        if let Some(scale) = residual.loss.scale() {
            ensure!(
                scale.is_finite() && scale > 0.0,
                "residual {index}: loss scale {scale} is not a positive number"
            );
        }
        ensure!(
            residual.params.len() == factor.num_params(),
            "residual {index}: factor reads {} blocks, {} given",
            factor.num_params(),
            residual.params.len()
        );
        let blocks = residual
            .params
            .iter()
            .map(|id| {
                self.params
                    .get(id.0)
                    .ok_or_else(|| anyhow::anyhow!("residual {index}: unknown block {id:?}"))
            })
            .collect::<Result<Vec<_>>>()?;

        ensure!(
            blocks[0].manifold == ManifoldKind::SE3,
            "residual {index}: first block {} must be an SE3 pose",
            blocks[0].name
        );
        let want = factor.residual().intrinsic_dim();
        ensure!(
            blocks[1].dim == want && blocks[1].manifold == ManifoldKind::Euclidean,
            "residual {index}: {:?} needs {want}D Euclidean intrinsics, block {} has {} values ({:?})",
            factor.residual().model(),
            blocks[1].name,
            blocks[1].dim,
            blocks[1].manifold
        );
        if let Some(point) = blocks.get(2) {
            ensure!(
                point.dim == 3 && point.manifold == ManifoldKind::Euclidean,
                "residual {index}: landmark block {} must be a 3D point",
                point.name
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfm_core::{CameraModelKind, Vec2};

    fn residual(model: CameraModelKind) -> ReprojectionResidual {
        ReprojectionResidual::new(model, Vec2::new(10.0, 20.0)).unwrap()
    }

    fn small_ir() -> ProblemIR {
        let mut ir = ProblemIR::new();
        let pose = ir.add_param_block("pose/0", 7, ManifoldKind::SE3, FixedMask::all_free());
        let intr = ir.add_param_block(
            "intrinsic/0",
            4,
            ManifoldKind::Euclidean,
            FixedMask::fix_indices(&[1, 2]),
        );
        let lm = ir.add_param_block("landmark/0", 3, ManifoldKind::Euclidean, FixedMask::all_free());
        ir.add_residual_block(ResidualBlock {
            params: vec![pose, intr, lm],
            loss: RobustLoss::Huber { scale: 2.0 },
            factor: FactorKind::ReprojFreePoint {
                residual: residual(CameraModelKind::PinholeRadialK1),
            },
            residual_dim: 2,
        });
        ir
    }

    #[test]
    fn valid_ir_passes_and_counts_parameters() {
        let ir = small_ir();
        ir.validate().unwrap();
        assert_eq!(ir.num_free_blocks(), 3);
        assert_eq!(ir.num_residual_rows(), 2);
        assert_eq!(ir.num_parameters(), 14);
        assert_eq!(ir.num_effective_parameters(), 6 + 2 + 3);
        assert_eq!(ir.param_by_name("intrinsic/0"), Some(ParamId(1)));
    }

    #[test]
    fn intrinsic_dim_must_match_model() {
        let mut ir = small_ir();
        ir.residuals[0].factor = FactorKind::ReprojFreePoint {
            residual: residual(CameraModelKind::PinholeBrownT2),
        };
        let err = ir.validate().unwrap_err().to_string();
        assert!(err.contains("8D Euclidean intrinsics"), "{err}");
    }

    #[test]
    fn partially_fixed_se3_is_rejected() {
        let mut ir = small_ir();
        ir.params[0].fixed = FixedMask::fix_indices(&[0]);
        assert!(ir.validate().is_err());
        ir.params[0].fixed = FixedMask::all_fixed(7);
        ir.validate().unwrap();
        assert_eq!(ir.num_free_blocks(), 2);
    }

    #[test]
    fn non_positive_loss_scale_is_rejected() {
        let mut ir = small_ir();
        ir.residuals[0].loss = RobustLoss::Cauchy { scale: 0.0 };
        assert!(ir.validate().is_err());
    }

    #[test]
    fn robust_loss_serializes_with_kind_tag() {
        let json = serde_json::to_string(&RobustLoss::Huber { scale: 1.5 }).unwrap();
        assert_eq!(json, r#"{"kind":"huber","scale":1.5}"#);
        let none: RobustLoss = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(none, RobustLoss::None);
    }
}
