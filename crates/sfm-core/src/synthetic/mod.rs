//! Deterministic synthetic reconstructions for tests and demos.
//!
//! Nothing here uses thread-local randomness: every sample is a pure function
//! of a seed and an index, so datasets are stable across platforms.

mod noise;
mod scene;

pub use noise::*;
pub use scene::*;
