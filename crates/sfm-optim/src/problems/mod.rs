//! Problem builders.

mod bundle_adjustment;
mod stats;

pub use bundle_adjustment::*;
pub use stats::ProblemStats;
