//! Bundle adjustment of structure-from-motion reconstructions.
//!
//! The crate turns a [`sfm_core::Reconstruction`] into a backend-independent
//! problem IR, solves it with one of two Levenberg-Marquardt backends, and
//! writes the optimized poses, intrinsics and landmarks back:
//!
//! 1. [`params`] serializes poses and intrinsics into parameter blocks and
//!    decides which coordinates stay constant ([`FixityPolicy`]).
//! 2. [`problems`] assembles one reprojection residual per resolvable
//!    observation ([`build_bundle_adjustment_problem`]).
//! 3. [`solver`] runs the chosen backend and summarizes the run.
//! 4. [`integrate`] decodes the free blocks and applies them.
//!
//! [`BundleAdjuster`] chains the four steps. Nothing is written to the
//! reconstruction unless the whole chain succeeds.

pub mod adjuster;
pub mod backend;
pub mod error;
pub mod factors;
pub mod integrate;
pub mod ir;
pub mod params;
pub mod problems;
pub mod robust;
pub mod solver;

pub use crate::adjuster::{BundleAdjuster, BundleAdjustmentOptions};
pub use crate::error::AdjustError;
pub use crate::integrate::{AdjustReport, AdjustedParameters};
pub use crate::ir::RobustLoss;
pub use crate::params::{FixityPolicy, GaugeAnchor, ParameterBlocks, RefineOptions};
pub use crate::problems::{build_bundle_adjustment_problem, BundleAdjustmentProblem, ProblemStats};
pub use crate::solver::{
    LinearSolverStrategy, Preconditioner, SolverOptions, SolverSummary, SparseBackend, Termination,
};
