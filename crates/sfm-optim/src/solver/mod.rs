//! Solver driver: runs a backend on a compiled problem and summarizes the outcome.

mod options;
mod summary;

pub use options::*;
pub use summary::*;

use anyhow::Result;
use log::{debug, info};
use nalgebra::DVector;
use std::collections::HashMap;
use std::time::Instant;

use crate::backend::{evaluate_cost, solve_with_backend, BackendKind};
use crate::ir::ProblemIR;

/// Optimized parameters plus the solve diagnostics.
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    /// Values of every block keyed by block name.
    pub params: HashMap<String, DVector<f64>>,
    pub summary: SolverSummary,
    /// Whether the parameters may be written back.
    pub usable: bool,
}

fn linear_solver_label(opts: &SolverOptions) -> String {
    match opts.linear_solver {
        LinearSolverStrategy::Sparse => match opts.sparse_backend {
            SparseBackend::Cholesky => "sparse cholesky".to_string(),
            SparseBackend::Qr => "sparse qr".to_string(),
        },
        LinearSolverStrategy::Dense => match opts.preconditioner {
            Preconditioner::Identity => "dense qr".to_string(),
            Preconditioner::Jacobi => "dense qr, jacobi scaling".to_string(),
        },
    }
}

fn run_with_threads<R: Send>(num_threads: usize, f: impl FnOnce() -> R + Send) -> Result<R> {
    if num_threads == 0 {
        return Ok(f());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()?;
    Ok(pool.install(f))
}

/// Solve `ir` from `initial` with the backend selected by `opts`.
///
/// Errors are reserved for malformed input; a solver that fails to improve
/// the problem yields an outcome with `usable == false`.
pub fn solve(
    ir: &ProblemIR,
    initial: &HashMap<String, DVector<f64>>,
    opts: &SolverOptions,
) -> Result<SolverOutcome> {
    opts.validate()?;
    ir.validate()?;

    let start = Instant::now();
    let before = evaluate_cost(ir, initial)?;
    let backend = BackendKind::for_options(opts);
    debug!(
        "solving {} residual blocks over {} parameter blocks with {}",
        ir.residuals.len(),
        ir.params.len(),
        backend.name()
    );

    let solution = run_with_threads(opts.num_threads, || {
        solve_with_backend(backend, ir, initial, opts)
    })??;

    let (final_cost, final_rms, termination) = match evaluate_cost(ir, &solution.params) {
        Ok(after) => (after.cost, after.rms, solution.termination),
        Err(err) => {
            debug!("final parameters could not be evaluated: {err:#}");
            (f64::NAN, f64::NAN, Termination::NumericalFailure)
        }
    };

    let summary = SolverSummary {
        backend: backend.name().to_string(),
        linear_solver: linear_solver_label(opts),
        num_parameter_blocks: ir.params.len(),
        num_constant_parameter_blocks: ir.params.len() - ir.num_free_blocks(),
        num_parameters: ir.num_parameters(),
        num_effective_parameters: ir.num_effective_parameters(),
        num_residual_blocks: ir.residuals.len(),
        num_residuals: ir.num_residual_rows(),
        initial_cost: before.cost,
        final_cost,
        initial_rms: before.rms,
        final_rms,
        iterations: solution.iterations,
        termination,
        elapsed: start.elapsed(),
    };
    let usable = summary.is_usable(opts.require_convergence);

    if opts.verbose {
        info!("{summary}");
    }
    if opts.print_full_summary {
        info!("{}", summary.full_report());
    }

    Ok(SolverOutcome {
        params: solution.params,
        summary,
        usable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_strategy() {
        assert_eq!(linear_solver_label(&SolverOptions::sparse()), "sparse cholesky");
        assert_eq!(linear_solver_label(&SolverOptions::dense()), "dense qr");
    }

    #[test]
    fn dedicated_pool_runs_closure() {
        let threads = run_with_threads(3, rayon::current_num_threads).unwrap();
        assert_eq!(threads, 3);
        assert_eq!(run_with_threads(0, || 7).unwrap(), 7);
    }
}
