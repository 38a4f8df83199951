use thiserror::Error;

use crate::problems::ProblemStats;
use crate::solver::SolverSummary;

/// Errors returned by bundle adjustment.
///
/// Every variant leaves the reconstruction untouched.
#[derive(Debug, Error)]
pub enum AdjustError {
    /// Nothing to optimize: no residuals survived, or every block is constant.
    #[error("degenerate bundle adjustment problem: {reason}")]
    Degenerate { reason: String, stats: ProblemStats },
    /// The solver ran but its result is not usable.
    #[error("bundle adjustment solution rejected: {summary}")]
    SolverFailed {
        summary: Box<SolverSummary>,
        stats: ProblemStats,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AdjustError {
    /// Problem statistics when the failure happened after assembly.
    pub fn stats(&self) -> Option<&ProblemStats> {
        match self {
            AdjustError::Degenerate { stats, .. } | AdjustError::SolverFailed { stats, .. } => {
                Some(stats)
            }
            AdjustError::Internal(_) => None,
        }
    }
}
