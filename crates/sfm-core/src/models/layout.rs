use std::ops::Range;

/// Index layout of an intrinsic parameter vector: `[focal, ppx, ppy, distortion...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamLayout {
    /// Total number of parameters.
    pub dim: usize,
}

impl ParamLayout {
    pub const FOCAL: usize = 0;
    pub const PRINCIPAL_POINT: Range<usize> = 1..3;
    pub const DISTORTION_START: usize = 3;

    /// Indices of the distortion coefficients (possibly empty).
    pub fn distortion(&self) -> Range<usize> {
        Self::DISTORTION_START..self.dim
    }

    pub fn num_distortion(&self) -> usize {
        self.dim.saturating_sub(Self::DISTORTION_START)
    }
}
