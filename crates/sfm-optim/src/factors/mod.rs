//! Residual factories shared by every backend.

mod reprojection;

pub use reprojection::ReprojectionResidual;
