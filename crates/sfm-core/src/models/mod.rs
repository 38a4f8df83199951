//! Camera model catalogue.
//!
//! Every projectable model shares one parameter layout convention:
//! `[focal, ppx, ppy, distortion...]`. The generic projection in
//! [`project_pinhole_family`] is written over [`nalgebra::RealField`] so the
//! same code drives plain `f64` evaluation and automatic differentiation.

mod camera;
mod distortion;
mod layout;
mod projection;

pub use camera::*;
pub use distortion::*;
pub use layout::*;
pub use projection::*;

use thiserror::Error;

/// Errors raised when converting between camera models and parameter vectors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("camera model {0:?} has no reprojection residual")]
    Unsupported(CameraModelKind),
    #[error("camera model {kind:?} expects {expected} parameters, got {actual}")]
    ParamCount {
        kind: CameraModelKind,
        expected: usize,
        actual: usize,
    },
}
