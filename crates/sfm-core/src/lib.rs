//! Core data model for `sfm` bundle adjustment.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, `Iso3`, ...),
//! - the camera model catalogue with projection generic over [`nalgebra::RealField`],
//! - the reconstruction container (views, poses, intrinsics, landmarks),
//! - deterministic synthetic scene helpers used by tests and demos.
//!
//! Camera pipeline for the pinhole family:
//! `pixel = f * distortion(x / z, y / z) + (ppx, ppy)`

/// Linear algebra type aliases.
pub mod math;
/// Camera models, parameter layouts and projection.
pub mod models;
/// Reconstruction container and identifiers.
pub mod scene;
/// Deterministic synthetic scenes.
pub mod synthetic;

pub use math::*;
pub use models::*;
pub use scene::*;
