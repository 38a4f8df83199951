use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Dense or sparse normal-equation strategy; selects the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverStrategy {
    Dense,
    #[default]
    Sparse,
}

/// Sparse factorization used by the sparse strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparseBackend {
    #[default]
    Cholesky,
    Qr,
}

/// Column scaling of the damped system.
///
/// Only the dense backend honors this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preconditioner {
    Identity,
    #[default]
    Jacobi,
}

/// Solver configuration.
///
/// Build once per call; see [`SolverOptions::dense`] and [`SolverOptions::sparse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Log a one-line summary at `info` level.
    pub verbose: bool,
    /// Worker threads; 0 uses the global rayon pool.
    pub num_threads: usize,
    /// Log the full multi-line report at `info` level.
    pub print_full_summary: bool,
    pub linear_solver: LinearSolverStrategy,
    pub sparse_backend: SparseBackend,
    pub preconditioner: Preconditioner,
    /// Iteration cap (sparse) or evaluation patience factor (dense).
    pub max_iterations: usize,
    /// Relative cost decrease below which the solver stops.
    pub function_tolerance: f64,
    /// Absolute cost decrease below which the sparse solver stops.
    pub absolute_tolerance: f64,
    /// Gradient orthogonality tolerance (dense).
    pub gradient_tolerance: f64,
    /// Relative step size tolerance (dense).
    pub parameter_tolerance: f64,
    /// Cost below which the sparse solver stops.
    pub min_cost: f64,
    /// Reject solutions that stopped on the iteration limit.
    pub require_convergence: bool,
}

impl SolverOptions {
    /// Dense strategy without column scaling.
    pub fn dense() -> Self {
        Self {
            linear_solver: LinearSolverStrategy::Dense,
            preconditioner: Preconditioner::Identity,
            ..Self::sparse()
        }
    }

    /// Sparse Cholesky with Jacobi scaling.
    pub fn sparse() -> Self {
        Self {
            verbose: false,
            num_threads: 0,
            print_full_summary: false,
            linear_solver: LinearSolverStrategy::Sparse,
            sparse_backend: SparseBackend::Cholesky,
            preconditioner: Preconditioner::Jacobi,
            max_iterations: 500,
            function_tolerance: 1e-6,
            absolute_tolerance: 1e-10,
            gradient_tolerance: 1e-10,
            parameter_tolerance: 1e-8,
            min_cost: 1e-12,
            require_convergence: false,
        }
    }

    /// Switch to the dense strategy, keeping everything else.
    pub fn set_dense(&mut self) {
        self.linear_solver = LinearSolverStrategy::Dense;
        self.preconditioner = Preconditioner::Identity;
    }

    /// Switch to the sparse strategy, keeping everything else.
    pub fn set_sparse(&mut self) {
        self.linear_solver = LinearSolverStrategy::Sparse;
        self.sparse_backend = SparseBackend::Cholesky;
        self.preconditioner = Preconditioner::Jacobi;
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("function_tolerance", self.function_tolerance),
            ("absolute_tolerance", self.absolute_tolerance),
            ("gradient_tolerance", self.gradient_tolerance),
            ("parameter_tolerance", self.parameter_tolerance),
            ("min_cost", self.min_cost),
        ] {
            ensure!(v.is_finite() && v >= 0.0, "{name} must be a non-negative number, got {v}");
        }
        ensure!(self.max_iterations > 0, "max_iterations must be positive");
        Ok(())
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::sparse()
    }
}
