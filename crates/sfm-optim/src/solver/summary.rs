use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    IterationLimit,
    NumericalFailure,
    /// The backend returned no parameters at all.
    NoSolution,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::Converged => "converged",
            Termination::IterationLimit => "iteration limit",
            Termination::NumericalFailure => "numerical failure",
            Termination::NoSolution => "no solution",
        };
        f.write_str(s)
    }
}

/// Diagnostic record of one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSummary {
    pub backend: String,
    pub linear_solver: String,
    pub num_parameter_blocks: usize,
    pub num_constant_parameter_blocks: usize,
    pub num_parameters: usize,
    pub num_effective_parameters: usize,
    pub num_residual_blocks: usize,
    pub num_residuals: usize,
    /// `0.5 * sum(rho(|r|²))` at the initial parameters.
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Pixel RMS of the raw residuals.
    pub initial_rms: f64,
    pub final_rms: f64,
    pub iterations: Option<usize>,
    pub termination: Termination,
    pub elapsed: Duration,
}

impl SolverSummary {
    /// A solution is usable when its cost is finite and did not increase, and
    /// the solver converged (or hit the iteration limit when that is allowed).
    pub fn is_usable(&self, require_convergence: bool) -> bool {
        let termination_ok = match self.termination {
            Termination::Converged => true,
            Termination::IterationLimit => !require_convergence,
            Termination::NumericalFailure | Termination::NoSolution => false,
        };
        termination_ok && self.final_cost.is_finite() && self.final_cost <= self.initial_cost
    }

    pub fn full_report(&self) -> String {
        let iterations = self
            .iterations
            .map_or_else(|| "n/a".to_string(), |n| n.to_string());
        format!(
            "Bundle adjustment report\n\
             {:<28}{}\n\
             {:<28}{}\n\
             {:<28}{} ({} constant)\n\
             {:<28}{} ({} effective)\n\
             {:<28}{} ({} rows)\n\
             {:<28}{:.6e}\n\
             {:<28}{:.6e}\n\
             {:<28}{:.6} px\n\
             {:<28}{:.6} px\n\
             {:<28}{}\n\
             {:<28}{}\n\
             {:<28}{:.3} s",
            "backend",
            self.backend,
            "linear solver",
            self.linear_solver,
            "parameter blocks",
            self.num_parameter_blocks,
            self.num_constant_parameter_blocks,
            "parameters",
            self.num_parameters,
            self.num_effective_parameters,
            "residual blocks",
            self.num_residual_blocks,
            self.num_residuals,
            "initial cost",
            self.initial_cost,
            "final cost",
            self.final_cost,
            "initial RMSE",
            self.initial_rms,
            "final RMSE",
            self.final_rms,
            "iterations",
            iterations,
            "termination",
            self.termination,
            "time",
            self.elapsed.as_secs_f64(),
        )
    }
}

impl fmt::Display for SolverSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} residual blocks, cost {:.6e} -> {:.6e}, RMSE {:.4} -> {:.4} px, {}",
            self.backend,
            self.linear_solver,
            self.num_residual_blocks,
            self.initial_cost,
            self.final_cost,
            self.initial_rms,
            self.final_rms,
            self.termination
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(termination: Termination, initial: f64, final_cost: f64) -> SolverSummary {
        SolverSummary {
            backend: "tiny-solver".into(),
            linear_solver: "sparse cholesky".into(),
            num_parameter_blocks: 3,
            num_constant_parameter_blocks: 1,
            num_parameters: 17,
            num_effective_parameters: 9,
            num_residual_blocks: 4,
            num_residuals: 8,
            initial_cost: initial,
            final_cost,
            initial_rms: 2.0,
            final_rms: 0.5,
            iterations: None,
            termination,
            elapsed: Duration::from_millis(12),
        }
    }

    #[test]
    fn usability_rule() {
        assert!(summary(Termination::Converged, 10.0, 1.0).is_usable(true));
        assert!(summary(Termination::Converged, 1.0, 1.0).is_usable(true));
        assert!(!summary(Termination::Converged, 1.0, 2.0).is_usable(false));
        assert!(!summary(Termination::Converged, 1.0, f64::NAN).is_usable(false));
        assert!(summary(Termination::IterationLimit, 10.0, 1.0).is_usable(false));
        assert!(!summary(Termination::IterationLimit, 10.0, 1.0).is_usable(true));
        assert!(!summary(Termination::NumericalFailure, 10.0, 1.0).is_usable(false));
        assert!(!summary(Termination::NoSolution, 10.0, 10.0).is_usable(false));
    }

    #[test]
    fn reports_mention_backend_and_termination() {
        let s = summary(Termination::IterationLimit, 10.0, 1.0);
        let line = s.to_string();
        assert!(line.starts_with("tiny-solver (sparse cholesky)"), "{line}");
        assert!(line.ends_with("iteration limit"), "{line}");
        let full = s.full_report();
        assert!(full.contains("9 effective"), "{full}");
        assert!(full.contains("n/a"), "{full}");
        assert_eq!(full.lines().count(), 13);
    }
}
