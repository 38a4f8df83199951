//! Dense Levenberg-Marquardt over a flat vector of free local coordinates.
//!
//! Free SE3 blocks contribute a 6D left increment, free Euclidean coordinates
//! an additive offset. The Jacobian is assembled block by block with central
//! differences and scattered into one dense matrix.

use anyhow::{anyhow, Result};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use rayon::prelude::*;
use sfm_core::{Iso3, Vec2};
use std::collections::HashMap;

use crate::backend::eval::{ordered_values, residual_value};
use crate::backend::{BackendSolution, OptimBackend};
use crate::ir::{ManifoldKind, ProblemIR};
use crate::params::{iso3_to_se3_dvec, retract_se3, se3_dvec_to_iso3};
use crate::robust::RobustKernel;
use crate::solver::{Preconditioner, SolverOptions, Termination};

const RELATIVE_STEP: f64 = 1e-6;

#[derive(Debug, Clone)]
struct BlockLayout {
    base: DVector<f64>,
    /// Set for free SE3 blocks.
    base_pose: Option<Iso3>,
    /// Free ambient indices (Euclidean) or `0..6` (free SE3).
    free: Vec<usize>,
    /// First column of this block in the free vector.
    offset: usize,
}

impl BlockLayout {
    fn value(&self, local: &[f64]) -> DVector<f64> {
        match &self.base_pose {
            Some(pose) => iso3_to_se3_dvec(&retract_se3(pose, local)),
            None => {
                let mut v = self.base.clone();
                for (k, &i) in self.free.iter().enumerate() {
                    v[i] += local[k];
                }
                v
            }
        }
    }

    fn step(&self, k: usize, local: &[f64]) -> f64 {
        match self.base_pose {
            Some(_) => RELATIVE_STEP,
            None => RELATIVE_STEP * (self.base[self.free[k]] + local[k]).abs().max(1.0),
        }
    }
}

#[derive(Debug, Clone)]
struct DenseLayout {
    blocks: Vec<BlockLayout>,
    num_free: usize,
}

impl DenseLayout {
    fn new(ir: &ProblemIR, initial: &HashMap<String, DVector<f64>>) -> Result<Self> {
        let ordered = ordered_values(ir, initial)?;
        let mut blocks = Vec::with_capacity(ir.params.len());
        let mut offset = 0;
        for (param, base) in ir.params.iter().zip(ordered) {
            let (base_pose, free) = match param.manifold {
                ManifoldKind::SE3 if param.fixed.is_empty() => {
                    (Some(se3_dvec_to_iso3(base.as_view())?), (0..6).collect())
                }
                ManifoldKind::SE3 => (None, Vec::new()),
                ManifoldKind::Euclidean => (None, param.fixed.free_indices(param.dim)),
            };
            let n = free.len();
            blocks.push(BlockLayout {
                base: base.clone(),
                base_pose,
                free,
                offset,
            });
            offset += n;
        }
        Ok(Self {
            blocks,
            num_free: offset,
        })
    }

    fn local<'x>(&self, block: usize, x: &'x DVector<f64>) -> &'x [f64] {
        let b = &self.blocks[block];
        &x.as_slice()[b.offset..b.offset + b.free.len()]
    }

    fn values(&self, x: &DVector<f64>) -> Vec<DVector<f64>> {
        (0..self.blocks.len())
            .map(|b| self.blocks[b].value(self.local(b, x)))
            .collect()
    }
}

struct DenseProblem<'a> {
    ir: &'a ProblemIR,
    layout: &'a DenseLayout,
    kernels: Vec<RobustKernel>,
    x: DVector<f64>,
}

impl DenseProblem<'_> {
    /// Residual scaled so that its squared norm is the robust cost term.
    fn robust_residual(&self, r_idx: usize, blocks: &[DVector<f64>]) -> Result<Vec2> {
        let refs: Vec<&DVector<f64>> = blocks.iter().collect();
        let r = residual_value(&self.ir.residuals[r_idx].factor, &refs)?;
        Ok(r * self.kernels[r_idx].row_scale(r.norm_squared()))
    }

    fn block_inputs(&self, r_idx: usize, values: &[DVector<f64>]) -> Vec<DVector<f64>> {
        self.ir.residuals[r_idx]
            .params
            .iter()
            .map(|id| values[id.0].clone())
            .collect()
    }

    fn residual_vector(&self) -> Result<DVector<f64>> {
        let values = self.layout.values(&self.x);
        let rows = (0..self.ir.residuals.len())
            .into_par_iter()
            .map(|i| self.robust_residual(i, &self.block_inputs(i, &values)))
            .collect::<Result<Vec<_>>>()?;

        let mut out = DVector::zeros(2 * rows.len());
        for (i, r) in rows.iter().enumerate() {
            out[2 * i] = r.x;
            out[2 * i + 1] = r.y;
        }
        Ok(out)
    }

    /// Central-difference columns `(col, d r / d x_col)` of one residual block.
    fn block_jacobian(&self, r_idx: usize, values: &[DVector<f64>]) -> Result<Vec<(usize, Vec2)>> {
        let params = &self.ir.residuals[r_idx].params;
        let mut inputs = self.block_inputs(r_idx, values);
        let mut entries = Vec::new();

        for (slot, id) in params.iter().enumerate() {
            let block = &self.layout.blocks[id.0];
            if block.free.is_empty() {
                continue;
            }
            let mut local = self.layout.local(id.0, &self.x).to_vec();
            for k in 0..block.free.len() {
                let h = block.step(k, &local);
                let x0 = local[k];

                local[k] = x0 + h;
                inputs[slot] = block.value(&local);
                let plus = self.robust_residual(r_idx, &inputs)?;

                local[k] = x0 - h;
                inputs[slot] = block.value(&local);
                let minus = self.robust_residual(r_idx, &inputs)?;

                local[k] = x0;
                entries.push((block.offset + k, (plus - minus) / (2.0 * h)));
            }
            inputs[slot] = values[id.0].clone();
        }
        Ok(entries)
    }

    fn jacobian_matrix(&self) -> Result<DMatrix<f64>> {
        let values = self.layout.values(&self.x);
        let blocks = (0..self.ir.residuals.len())
            .into_par_iter()
            .map(|i| self.block_jacobian(i, &values))
            .collect::<Result<Vec<_>>>()?;

        let mut jac = DMatrix::zeros(2 * blocks.len(), self.layout.num_free);
        for (i, entries) in blocks.iter().enumerate() {
            for (col, d) in entries {
                jac[(2 * i, *col)] = d.x;
                jac[(2 * i + 1, *col)] = d.y;
            }
        }
        Ok(jac)
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for DenseProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.x.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.x.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.residual_vector()
            .map_err(|e| debug!("dense residual evaluation failed: {e:#}"))
            .ok()
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        self.jacobian_matrix()
            .map_err(|e| debug!("dense jacobian evaluation failed: {e:#}"))
            .ok()
    }
}

fn termination_of(reason: &TerminationReason) -> Termination {
    match reason {
        TerminationReason::LostPatience => Termination::IterationLimit,
        TerminationReason::NoImprovementPossible(_) => Termination::Converged,
        r if r.was_successful() => Termination::Converged,
        _ => Termination::NumericalFailure,
    }
}

/// Dense LM backend built on the `levenberg-marquardt` crate.
#[derive(Debug, Clone, Copy)]
pub struct DenseLmBackend;

impl OptimBackend for DenseLmBackend {
    fn name(&self) -> &'static str {
        "dense-lm"
    }

    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &SolverOptions,
    ) -> Result<BackendSolution> {
        ir.validate()?;
        let layout = DenseLayout::new(ir, initial)?;
        if layout.num_free == 0 {
            return Err(anyhow!("dense backend needs at least one free coordinate"));
        }

        let problem = DenseProblem {
            ir,
            layout: &layout,
            kernels: ir.residuals.iter().map(|r| r.loss.into()).collect(),
            x: DVector::zeros(layout.num_free),
        };

        let lm = LevenbergMarquardt::new()
            .with_ftol(opts.function_tolerance)
            .with_xtol(opts.parameter_tolerance)
            .with_gtol(opts.gradient_tolerance)
            .with_patience(opts.max_iterations.max(1))
            .with_scale_diag(opts.preconditioner == Preconditioner::Jacobi);

        let (problem, report) = lm.minimize(problem);
        debug!(
            "dense LM finished after {} evaluations: {:?}",
            report.number_of_evaluations, report.termination
        );

        let params = ir
            .params
            .iter()
            .zip(layout.values(&problem.x))
            .map(|(param, value)| (param.name.clone(), value))
            .collect();

        Ok(BackendSolution {
            params,
            termination: termination_of(&report.termination),
            iterations: Some(report.number_of_evaluations),
        })
    }
}
