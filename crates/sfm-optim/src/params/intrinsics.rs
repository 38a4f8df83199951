//! Intrinsic parameter blocks.

use anyhow::{ensure, Result};
use nalgebra::{DVector, DVectorView};
use sfm_core::{CameraModel, Intrinsic};

/// Flatten an intrinsic into `[focal, ppx, ppy, distortion...]`.
///
/// Models without a layout produce an empty vector.
pub fn intrinsic_to_dvec(intr: &Intrinsic) -> DVector<f64> {
    DVector::from_vec(intr.model.params())
}

/// Rebuild an intrinsic of the same model and image size as `like` from `v`.
pub fn intrinsic_from_dvec(like: &Intrinsic, v: DVectorView<'_, f64>) -> Result<Intrinsic> {
    ensure!(
        v.iter().all(|x| x.is_finite()),
        "non-finite intrinsic parameters"
    );
    let params: Vec<f64> = v.iter().copied().collect();
    let model = CameraModel::from_params(like.model.kind(), &params)?;
    Ok(Intrinsic::new(like.width, like.height, model))
}
