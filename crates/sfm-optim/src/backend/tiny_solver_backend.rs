use anyhow::{anyhow, ensure, Result};
use log::debug;
use nalgebra::{DVector, Vector2, Vector3};
use std::collections::HashMap;
use std::sync::Arc;
use tiny_solver::factors::Factor;
use tiny_solver::loss_functions::{ArctanLoss, CauchyLoss, HuberLoss, Loss};
use tiny_solver::manifold::se3::SE3Manifold;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

use crate::backend::{evaluate_cost, BackendSolution, OptimBackend};
use crate::factors::ReprojectionResidual;
use crate::ir::{FactorKind, ManifoldKind, ProblemIR, ResidualBlock, RobustLoss};
use crate::solver::{Preconditioner, SolverOptions, SparseBackend, Termination};

/// Sparse Levenberg-Marquardt through `tiny-solver`.
#[derive(Debug, Clone, Copy)]
pub struct TinySolverBackend;

impl TinySolverBackend {
    fn compile(&self, ir: &ProblemIR, initial: &HashMap<String, DVector<f64>>) -> Result<Problem> {
        ir.validate()?;

        let mut problem = Problem::new();

        for param in &ir.params {
            let start = initial
                .get(&param.name)
                .ok_or_else(|| anyhow!("no starting value for block {}", param.name))?;
            ensure!(
                start.len() == param.dim,
                "block {} starts with {} values, expected {}",
                param.name,
                start.len(),
                param.dim
            );

            // validate() guarantees SE3 blocks are fully free or fully fixed;
            // a fully fixed block is plain data without a manifold.
            if param.manifold == ManifoldKind::SE3 && param.fixed.is_empty() {
                problem.set_variable_manifold(&param.name, Arc::new(SE3Manifold));
            }

            for coord in param.fixed.iter() {
                problem.fix_variable(&param.name, coord);
            }
        }

        for residual in &ir.residuals {
            let (factor, loss) = compile_factor(residual);
            let param_names: Vec<&str> = residual
                .params
                .iter()
                .map(|id| ir.params[id.0].name.as_str())
                .collect();
            problem.add_residual_block(residual.residual_dim, &param_names, factor, loss);
        }

        Ok(problem)
    }
}

impl OptimBackend for TinySolverBackend {
    fn name(&self) -> &'static str {
        "tiny-solver"
    }

    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &SolverOptions,
    ) -> Result<BackendSolution> {
        let problem = self.compile(ir, initial)?;
        if opts.preconditioner != Preconditioner::Identity {
            debug!(
                "tiny-solver backend ignores preconditioner {:?}",
                opts.preconditioner
            );
        }

        let optimizer = LevenbergMarquardtOptimizer::default();
        let Some(params) = optimizer.optimize(&problem, initial, Some(to_optimizer_options(opts)))
        else {
            return Ok(BackendSolution {
                params: initial.clone(),
                termination: Termination::NoSolution,
                iterations: None,
            });
        };
        let termination = stop_reason(&optimizer, &problem, ir, &params, opts);

        Ok(BackendSolution {
            params,
            termination,
            iterations: None,
        })
    }
}

/// tiny-solver returns the same way whether its decrease thresholds fired or
/// `max_iteration` ran out. One more step from the returned point tells the two
/// apart: a converged run cannot decrease the cost past the same thresholds.
fn stop_reason(
    optimizer: &LevenbergMarquardtOptimizer,
    problem: &Problem,
    ir: &ProblemIR,
    params: &HashMap<String, DVector<f64>>,
    opts: &SolverOptions,
) -> Termination {
    let cost = match evaluate_cost(ir, params) {
        Ok(eval) if eval.cost.is_finite() => eval.cost,
        _ => return Termination::NumericalFailure,
    };
    if cost < opts.min_cost {
        return Termination::Converged;
    }

    let one_step = OptimizerOptions {
        max_iteration: 1,
        verbosity_level: 0,
        ..to_optimizer_options(opts)
    };
    let Some(next) = optimizer.optimize(problem, params, Some(one_step)) else {
        debug!("extra step from the returned point failed; keeping the solver's stop");
        return Termination::Converged;
    };
    let decrease = evaluate_cost(ir, &next).map_or(0.0, |eval| cost - eval.cost);
    debug!("tiny-solver stopped at cost {cost:.6e}; one more step gains {decrease:.3e}");

    let stalled = decrease < opts.absolute_tolerance || decrease / cost < opts.function_tolerance;
    if stalled {
        Termination::Converged
    } else {
        Termination::IterationLimit
    }
}

fn to_optimizer_options(opts: &SolverOptions) -> OptimizerOptions {
    OptimizerOptions {
        max_iteration: opts.max_iterations,
        verbosity_level: usize::from(opts.verbose),
        linear_solver_type: match opts.sparse_backend {
            SparseBackend::Cholesky => LinearSolverType::SparseCholesky,
            SparseBackend::Qr => LinearSolverType::SparseQR,
        },
        min_abs_error_decrease_threshold: opts.absolute_tolerance,
        min_rel_error_decrease_threshold: opts.function_tolerance,
        min_error_threshold: opts.min_cost,
        ..OptimizerOptions::default()
    }
}

fn compile_loss(loss: RobustLoss) -> Option<Box<dyn Loss + Send>> {
    match loss {
        RobustLoss::None => None,
        RobustLoss::Huber { scale } => Some(Box::new(HuberLoss::new(scale))),
        RobustLoss::Cauchy { scale } => Some(Box::new(CauchyLoss::new(scale))),
        RobustLoss::Arctan { scale } => Some(Box::new(ArctanLoss::new(scale))),
    }
}

type CompiledFactor = (
    Box<dyn tiny_solver::factors::FactorImpl + Send>,
    Option<Box<dyn Loss + Send>>,
);

fn compile_factor(residual: &ResidualBlock) -> CompiledFactor {
    let factor = match &residual.factor {
        FactorKind::ReprojFixedPoint { residual, pw } => TinyReprojFactor {
            residual: *residual,
            pw: Some(*pw),
        },
        FactorKind::ReprojFreePoint { residual } => TinyReprojFactor {
            residual: *residual,
            pw: None,
        },
    };
    (Box::new(factor), compile_loss(residual.loss))
}

/// Parameter blocks: `[pose, intrinsic]` with a fixed point, else `[pose, intrinsic, landmark]`.
#[derive(Debug, Clone)]
struct TinyReprojFactor {
    residual: ReprojectionResidual,
    pw: Option<[f64; 3]>,
}

impl<T: nalgebra::RealField> Factor<T> for TinyReprojFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        let point = match self.pw {
            Some(pw) => Vector3::new(
                nalgebra::convert(pw[0]),
                nalgebra::convert(pw[1]),
                nalgebra::convert(pw[2]),
            ),
            None => {
                debug_assert_eq!(params.len(), 3, "expected [pose, intrinsic, landmark]");
                let p = &params[2];
                Vector3::new(p[0].clone(), p[1].clone(), p[2].clone())
            }
        };
        let r = self
            .residual
            .evaluate(params[0].as_slice(), params[1].as_slice(), &point);
        debug_assert!(r.is_some(), "parameter block length mismatch");
        let r = r.unwrap_or_else(Vector2::zeros);
        DVector::from_row_slice(r.as_slice())
    }
}
