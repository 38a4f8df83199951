//! Backend-independent residual and cost evaluation.

use anyhow::{anyhow, ensure, Result};
use nalgebra::DVector;
use sfm_core::{Pt3, Vec2};
use std::collections::HashMap;

use crate::ir::{FactorKind, ProblemIR};
use crate::params::se3_dvec_to_iso3;
use crate::robust::RobustKernel;

/// Robustified cost and plain pixel RMS of a parameter assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostEvaluation {
    /// `0.5 * sum(rho(|r|²))`.
    pub cost: f64,
    /// Root mean square of the unweighted residual norms, in pixels.
    pub rms: f64,
}

/// Block values in IR order, checked against the declared dimensions.
pub(crate) fn ordered_values<'a>(
    ir: &ProblemIR,
    values: &'a HashMap<String, DVector<f64>>,
) -> Result<Vec<&'a DVector<f64>>> {
    ir.params
        .iter()
        .map(|param| {
            let v = values
                .get(&param.name)
                .ok_or_else(|| anyhow!("missing values for parameter block {}", param.name))?;
            ensure!(
                v.len() == param.dim,
                "dimension mismatch for {}: expected {}, got {}",
                param.name,
                param.dim,
                v.len()
            );
            Ok(v)
        })
        .collect()
}

/// Raw pixel residual of a factor given its own parameter blocks in order.
pub(crate) fn residual_value(factor: &FactorKind, blocks: &[&DVector<f64>]) -> Result<Vec2> {
    ensure!(
        blocks.len() == factor.num_params(),
        "factor expects {} blocks, got {}",
        factor.num_params(),
        blocks.len()
    );
    let pose = se3_dvec_to_iso3(blocks[0].as_view())?;
    let point = match factor {
        FactorKind::ReprojFixedPoint { pw, .. } => Pt3::new(pw[0], pw[1], pw[2]),
        FactorKind::ReprojFreePoint { .. } => {
            let p = blocks[2];
            Pt3::new(p[0], p[1], p[2])
        }
    };
    factor
        .residual()
        .evaluate_pose(&pose, blocks[1].as_slice(), &point)
        .ok_or_else(|| anyhow!("intrinsic block does not match {:?}", factor.residual().model()))
}

pub fn evaluate_cost(ir: &ProblemIR, values: &HashMap<String, DVector<f64>>) -> Result<CostEvaluation> {
    let ordered = ordered_values(ir, values)?;
    let mut cost = 0.0;
    let mut sum_sq = 0.0;
    for residual in &ir.residuals {
        let blocks: Vec<&DVector<f64>> = residual.params.iter().map(|id| ordered[id.0]).collect();
        let r2 = residual_value(&residual.factor, &blocks)?.norm_squared();
        cost += 0.5 * RobustKernel::from(residual.loss).rho(r2);
        sum_sq += r2;
    }
    let rms = if ir.residuals.is_empty() {
        0.0
    } else {
        (sum_sq / ir.residuals.len() as f64).sqrt()
    };
    Ok(CostEvaluation { cost, rms })
}
