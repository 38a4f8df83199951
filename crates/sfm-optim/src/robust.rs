use crate::ir::RobustLoss;

/// Loss kernel evaluated on the squared reprojection error.
///
/// `rho` follows the squared-norm convention: `rho(s) = s` for plain least
/// squares, where `s = |r|²`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum RobustKernel {
    /// Plain squared error.
    #[default]
    None,
    /// Quadratic up to `delta` pixels, linear beyond.
    Huber { delta: f64 },
    /// Logarithmic growth past `c`.
    Cauchy { c: f64 },
    /// Arctan loss, bounded by `a * pi / 2`.
    Arctan { a: f64 },
}

impl From<RobustLoss> for RobustKernel {
    fn from(loss: RobustLoss) -> Self {
        match loss {
            RobustLoss::None => RobustKernel::None,
            RobustLoss::Huber { scale } => RobustKernel::Huber { delta: scale },
            RobustLoss::Cauchy { scale } => RobustKernel::Cauchy { c: scale },
            RobustLoss::Arctan { scale } => RobustKernel::Arctan { a: scale },
        }
    }
}

impl RobustKernel {
    /// Return the robust loss `rho(s)` and the IRLS weight `rho'(s)` for a squared residual.
    pub fn rho_and_weight(self, r2: f64) -> (f64, f64) {
        match self {
            RobustKernel::None => (r2, 1.0),
            RobustKernel::Huber { delta } => {
                let r = r2.sqrt();
                if r <= delta {
                    (r2, 1.0)
                } else {
                    (2.0 * delta * r - delta * delta, delta / r)
                }
            }
            RobustKernel::Cauchy { c } => {
                let t = r2 / (c * c);
                (c * c * (1.0 + t).ln(), 1.0 / (1.0 + t))
            }
            RobustKernel::Arctan { a } => {
                let t = r2 / a;
                (a * t.atan(), 1.0 / (1.0 + t * t))
            }
        }
    }

    pub fn rho(self, r2: f64) -> f64 {
        self.rho_and_weight(r2).0
    }

    /// Row scale `sqrt(rho(s) / s)` that turns a residual into one whose squared
    /// norm equals the robust cost.
    pub fn row_scale(self, r2: f64) -> f64 {
        if r2 <= f64::EPSILON {
            return 1.0;
        }
        (self.rho(r2) / r2).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual} (tol {tol})"
        );
    }

    #[test]
    fn huber_inside_threshold_is_quadratic() {
        let kernel = RobustKernel::Huber { delta: 2.0 };
        let r2 = 1.5 * 1.5;
        let (rho, weight) = kernel.rho_and_weight(r2);
        assert_close(rho, r2, 1e-12);
        assert_close(weight, 1.0, 1e-12);
        assert_close(kernel.row_scale(r2), 1.0, 1e-12);
    }

    #[test]
    fn huber_outside_threshold_grows_linearly() {
        let kernel = RobustKernel::Huber { delta: 2.0 };
        let rho_8 = kernel.rho(8.0 * 8.0);
        let rho_9 = kernel.rho(9.0 * 9.0);
        // slope 2 * delta per pixel
        assert_close(rho_9 - rho_8, 4.0, 1e-9);
        let (_, weight) = kernel.rho_and_weight(8.0 * 8.0);
        assert_close(weight, 0.25, 1e-12);
    }

    #[test]
    fn arctan_is_bounded() {
        let kernel = RobustKernel::Arctan { a: 2.0 };
        let (rho_small, w_small) = kernel.rho_and_weight(1e-4);
        assert_close(rho_small, 1e-4, 1e-9);
        assert_close(w_small, 1.0, 1e-6);
        let rho_huge = kernel.rho(1e12);
        assert!(rho_huge < 2.0 * std::f64::consts::FRAC_PI_2 + 1e-9);
    }

    #[test]
    fn row_scale_squares_to_robust_cost() {
        for kernel in [
            RobustKernel::None,
            RobustKernel::Huber { delta: 0.5 },
            RobustKernel::Cauchy { c: 2.0 },
            RobustKernel::Arctan { a: 3.0 },
        ] {
            let r2 = 7.3;
            let s = kernel.row_scale(r2);
            assert_close(s * s * r2, kernel.rho(r2), 1e-9);
        }
    }

    #[test]
    fn kernel_follows_loss_configuration() {
        assert_eq!(
            RobustKernel::from(RobustLoss::Cauchy { scale: 4.0 }),
            RobustKernel::Cauchy { c: 4.0 }
        );
        assert_eq!(RobustKernel::from(RobustLoss::None), RobustKernel::None);
    }

    /// Weighted-mean location estimate, reweighted `rounds` times.
    fn reweighted_location(samples: &[f64], kernel: RobustKernel, rounds: usize) -> f64 {
        let mut estimate = samples.iter().sum::<f64>() / samples.len() as f64;
        for _ in 0..rounds {
            let (weighted, total) = samples.iter().fold((0.0, 0.0), |(acc, tot), &v| {
                let (_, w) = kernel.rho_and_weight((estimate - v).powi(2));
                (acc + w * v, tot + w)
            });
            if total > 0.0 {
                estimate = weighted / total;
            }
        }
        estimate
    }

    #[test]
    fn cauchy_weights_pull_estimate_toward_inliers() {
        let samples = [2.1, 1.9, 2.0, 2.05, 1.95, 9.0, -6.0, 8.0];
        let truth = 2.0;

        let plain = reweighted_location(&samples, RobustKernel::None, 5);
        let robust = reweighted_location(&samples, RobustKernel::Cauchy { c: 0.3 }, 25);

        assert!(
            (robust - truth).abs() < (plain - truth).abs(),
            "plain {plain}, cauchy {robust}"
        );
    }
}
