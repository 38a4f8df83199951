//! Entry crate for `sfm` bundle adjustment.
//!
//! Refines the camera poses, intrinsics and (optionally) the 3D landmarks of a
//! structure-from-motion reconstruction by minimizing reprojection error.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), sfm::optim::AdjustError> {
//! # let mut scene: sfm::core::Reconstruction = unimplemented!();
//! use sfm::prelude::*;
//!
//! let adjuster = BundleAdjuster::new(BundleAdjustmentOptions {
//!     solver: SolverOptions::sparse(),
//!     robust_loss: RobustLoss::Huber { scale: 4.0 },
//!     ..Default::default()
//! });
//! let report = adjuster.adjust(&mut scene, RefineOptions::ALL)?;
//! if let Some(summary) = &report.summary {
//!     println!("{summary}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Incremental pipelines refine only what the last step added:
//!
//! ```no_run
//! # fn main() -> Result<(), sfm::optim::AdjustError> {
//! # let mut scene: sfm::core::Reconstruction = unimplemented!();
//! use sfm::prelude::*;
//!
//! let mut graph = ReconstructionGraph::new();
//! graph.poses.insert(PoseId(12));
//! BundleAdjuster::default().adjust_partial_reconstruction(&mut scene, &graph)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`core`] - Reconstruction data model, camera models, math aliases
//! - [`optim`] - Problem assembly, solver backends, orchestration
//! - [`synthetic`] - Deterministic synthetic scenes for testing

/// Reconstruction data model and camera models.
///
/// Re-exports everything from `sfm_core`.
pub mod core {
    pub use sfm_core::*;
}

/// Bundle adjustment problems, solver backends and orchestration.
///
/// Re-exports everything from `sfm_optim`.
pub mod optim {
    pub use sfm_optim::*;
}

/// Deterministic synthetic data generation for testing.
pub mod synthetic {
    pub use sfm_core::synthetic::*;
}

pub use sfm_core::{
    CameraModel, CameraModelKind, Intrinsic, IntrinsicId, Landmark, LandmarkId, Pose, PoseId,
    Pt3, Reconstruction, ReconstructionGraph, Vec2, View, ViewId,
};
pub use sfm_optim::{
    AdjustError, AdjustReport, BundleAdjuster, BundleAdjustmentOptions, RefineOptions, RobustLoss,
    SolverOptions,
};

/// Convenient re-exports for common use cases.
///
/// ```no_run
/// use sfm::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AdjustError, AdjustReport, BundleAdjuster, BundleAdjustmentOptions, CameraModel,
        Intrinsic, IntrinsicId, Landmark, LandmarkId, Pose, PoseId, Pt3, Reconstruction,
        ReconstructionGraph, RefineOptions, RobustLoss, SolverOptions, Vec2, View, ViewId,
    };
    pub use sfm_optim::GaugeAnchor;
}
