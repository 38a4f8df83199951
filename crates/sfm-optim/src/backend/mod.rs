//! Solver adapters.
//!
//! Each adapter lowers a [`ProblemIR`] into its solver's native problem, honours
//! manifolds and held coordinates, and hands back every block by name.

mod dense_lm_backend;
mod eval;
mod tiny_solver_backend;

use anyhow::Result;
use nalgebra::DVector;
use std::collections::HashMap;

use crate::ir::ProblemIR;
use crate::solver::{LinearSolverStrategy, SolverOptions, Termination};

pub use dense_lm_backend::DenseLmBackend;
pub use eval::{evaluate_cost, CostEvaluation};
pub use tiny_solver_backend::TinySolverBackend;

/// What an adapter returns after a run.
///
/// The `params` map uses the IR parameter block names and holds every block,
/// constant ones included.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    pub params: HashMap<String, DVector<f64>>,
    pub termination: Termination,
    /// Iterations or function evaluations, when the backend reports them.
    pub iterations: Option<usize>,
}

/// Common interface of the solver adapters.
pub trait OptimBackend {
    /// Human-readable backend name for summaries.
    fn name(&self) -> &'static str;

    /// Run the solver from `initial`, keyed by block name.
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &SolverOptions,
    ) -> Result<BackendSolution>;
}

/// Adapter selection, derived from the linear solver strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// tiny-solver sparse Levenberg-Marquardt.
    TinySolver,
    /// Dense MINPACK-style Levenberg-Marquardt.
    DenseLm,
}

impl BackendKind {
    pub fn for_options(opts: &SolverOptions) -> Self {
        match opts.linear_solver {
            LinearSolverStrategy::Sparse => BackendKind::TinySolver,
            LinearSolverStrategy::Dense => BackendKind::DenseLm,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::TinySolver => TinySolverBackend.name(),
            BackendKind::DenseLm => DenseLmBackend.name(),
        }
    }
}

/// Dispatch to the adapter named by `backend`.
pub fn solve_with_backend(
    backend: BackendKind,
    ir: &ProblemIR,
    initial: &HashMap<String, DVector<f64>>,
    opts: &SolverOptions,
) -> Result<BackendSolution> {
    match backend {
        BackendKind::TinySolver => TinySolverBackend.solve(ir, initial, opts),
        BackendKind::DenseLm => DenseLmBackend.solve(ir, initial, opts),
    }
}
