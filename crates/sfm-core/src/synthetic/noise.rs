use crate::{Real, Vec2};

/// Reproducible per-observation pixel jitter, uniform in `[-max_abs_px, max_abs_px]` on each axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UniformPixelNoise {
    /// Stream seed.
    pub seed: u64,
    /// Half-width of the jitter, pixels.
    pub max_abs_px: Real,
}

impl UniformPixelNoise {
    pub fn new(seed: u64, max_abs_px: Real) -> Self {
        Self { seed, max_abs_px }
    }

    /// Sample a 2D noise vector for a `(view, landmark)` key.
    #[inline]
    pub fn sample(&self, view_idx: usize, point_idx: usize) -> Vec2 {
        let half_width = self.max_abs_px.abs();
        if half_width == 0.0 {
            return Vec2::zeros();
        }
        let lane = |k| 2.0 * unit_sample(self.seed, view_idx, point_idx, k) - 1.0;
        Vec2::new(lane(0), lane(1)) * half_width
    }

    #[inline]
    pub fn apply(&self, view_idx: usize, point_idx: usize, pixel: Vec2) -> Vec2 {
        pixel + self.sample(view_idx, point_idx)
    }
}

/// Uniform sample in `[0, 1)` for the stream `(seed, a, b)` and component `lane`.
#[inline]
pub(crate) fn unit_sample(seed: u64, a: usize, b: usize, lane: u64) -> Real {
    let key = mix_key(seed, a, b) ^ lane.wrapping_mul(0x94D0_49BB_1331_11EB);
    u64_to_unit_f64(splitmix64(key))
}

#[inline]
fn mix_key(seed: u64, a: usize, b: usize) -> u64 {
    seed ^ (a as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (b as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn u64_to_unit_f64(x: u64) -> Real {
    // top 53 bits
    let mantissa = x >> 11;
    (mantissa as Real) * (1.0 / ((1u64 << 53) as Real))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_noise_is_deterministic_and_bounded() {
        let noise = UniformPixelNoise::new(123, 0.5);

        assert_eq!(noise.sample(2, 5), noise.sample(2, 5));
        assert_ne!(noise.sample(2, 5), noise.sample(2, 6));
        assert_ne!(noise.sample(2, 5), noise.sample(5, 2));
        for i in 0..64 {
            let s = noise.sample(i, 3 * i + 1);
            assert!(s.x.abs() <= 0.5 && s.y.abs() <= 0.5, "{s:?}");
        }
    }

    #[test]
    fn zero_amplitude_is_exact() {
        let noise = UniformPixelNoise::new(7, 0.0);
        let uv = Vec2::new(10.0, 20.0);
        assert_eq!(noise.apply(3, 4, uv), uv);
    }
}
