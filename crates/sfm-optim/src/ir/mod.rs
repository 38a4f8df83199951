//! Backend-independent intermediate representation of a bundle adjustment problem.

mod types;

pub use types::{
    FactorKind, FixedMask, ManifoldKind, ParamBlock, ParamId, ProblemIR, ResidualBlock,
    RobustLoss,
};
