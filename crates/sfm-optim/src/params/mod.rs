//! Parameter blocks: serialization of poses and intrinsics into flat vectors,
//! block naming, and the policy deciding which coordinates stay constant.
//!
//! - [`iso3_to_se3_dvec`] / [`se3_dvec_to_iso3`]: pose blocks `[qx, qy, qz, qw, tx, ty, tz]`
//! - [`intrinsic_to_dvec`] / [`intrinsic_from_dvec`]: intrinsic blocks `[f, ppx, ppy, dist...]`
//! - [`ParameterBlocks`]: extracted blocks for a whole reconstruction
//! - [`FixityPolicy`]: refine flags and partial-refinement free sets as fixed masks

mod blocks;
mod intrinsics;
mod pose_se3;
mod refine;

pub use blocks::*;
pub use intrinsics::*;
pub use pose_se3::*;
pub use refine::*;
