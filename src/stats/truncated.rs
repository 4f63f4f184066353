//! Univariate Gaussian truncated to `[lower, +inf)`.
//!
//! Used by the road filter for the arc-length dimension: predictions are
//! restricted to nonnegative arc length, and the truncated moments replace
//! the raw Gaussian moments when probability mass falls below the bound.

use rand::Rng;
use rand_distr::{Distribution, Exp1, Normal, StandardNormal};

const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// Complementary error function, Chebyshev-fitted rational approximation
/// (absolute error < 1.2e-7). Private to the stats module; only the moment
/// formulas need a normal CDF.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.26551223
        + t * (1.00002368
            + t * (0.37409196
                + t * (0.09678418
                    + t * (-0.18628806
                        + t * (0.27886807
                            + t * (-1.13520398
                                + t * (1.48851587 + t * (-0.82215223 + t * 0.17087277))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

#[derive(Clone, Copy, Debug)]
pub struct TruncatedGaussian {
    /// Mean of the untruncated parent.
    pub mean: f64,
    /// Standard deviation of the untruncated parent.
    pub std_dev: f64,
    pub lower: f64,
}

impl TruncatedGaussian {
    pub fn new(mean: f64, std_dev: f64, lower: f64) -> Self {
        TruncatedGaussian {
            mean,
            std_dev,
            lower,
        }
    }

    /// Inverse Mills ratio at the standardized bound.
    fn hazard(&self) -> f64 {
        let alpha = (self.lower - self.mean) / self.std_dev;
        let tail = 1.0 - normal_cdf(alpha);
        if tail < 1e-300 {
            // Entire mass below the bound: the hazard approaches alpha.
            return alpha;
        }
        normal_pdf(alpha) / tail
    }

    /// Mean of the truncated distribution.
    pub fn truncated_mean(&self) -> f64 {
        if self.std_dev <= 0.0 {
            return self.mean.max(self.lower);
        }
        self.mean + self.std_dev * self.hazard()
    }

    /// Variance of the truncated distribution.
    pub fn truncated_variance(&self) -> f64 {
        if self.std_dev <= 0.0 {
            return 0.0;
        }
        let alpha = (self.lower - self.mean) / self.std_dev;
        let lambda = self.hazard();
        let factor = (1.0 + alpha * lambda - lambda * lambda).max(0.0);
        self.std_dev * self.std_dev * factor
    }

    /// Draw one sample.
    ///
    /// Near the bulk a plain resampling loop is cheap; once the bound sits
    /// deep in the upper tail it switches to Robert's translated-exponential
    /// rejection, which stays efficient for any truncation point.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.std_dev <= 0.0 {
            return self.mean.max(self.lower);
        }
        let alpha = (self.lower - self.mean) / self.std_dev;
        if alpha < 2.0 {
            let normal = Normal::new(self.mean, self.std_dev)
                .expect("std_dev checked positive above");
            loop {
                let x = normal.sample(rng);
                if x >= self.lower {
                    return x;
                }
            }
        }
        // Robert (1995): proposal alpha + Exp(rate), rate = (alpha + sqrt(alpha^2 + 4)) / 2.
        let rate = 0.5 * (alpha + (alpha * alpha + 4.0).sqrt());
        loop {
            let e: f64 = Exp1.sample(rng);
            let z = alpha + e / rate;
            let rho = (-0.5 * (z - rate) * (z - rate)).exp();
            if rng.gen::<f64>() <= rho {
                return self.mean + self.std_dev * z;
            }
        }
    }
}

/// Unbounded standard-normal draw helper shared by the samplers.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    StandardNormal.sample(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cdf_reference_values() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-7);
        assert_relative_eq!(normal_cdf(1.0), 0.8413447, epsilon = 1e-6);
        assert_relative_eq!(normal_cdf(-1.96), 0.0249979, epsilon = 1e-6);
    }

    #[test]
    fn test_untruncated_limit() {
        // Bound far below the mean: moments match the parent.
        let t = TruncatedGaussian::new(5.0, 1.0, -100.0);
        assert_relative_eq!(t.truncated_mean(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(t.truncated_variance(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_half_normal_moments() {
        // Bound at the mean: the classic half-normal values.
        let t = TruncatedGaussian::new(0.0, 1.0, 0.0);
        let expected_mean = (2.0 / std::f64::consts::PI).sqrt();
        assert_relative_eq!(t.truncated_mean(), expected_mean, epsilon = 1e-6);
        assert_relative_eq!(
            t.truncated_variance(),
            1.0 - 2.0 / std::f64::consts::PI,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_samples_respect_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let t = TruncatedGaussian::new(0.2, 2.0, 0.0);
        for _ in 0..500 {
            assert!(t.sample(&mut rng) >= 0.0);
        }
    }

    #[test]
    fn test_far_tail_sampler() {
        let mut rng = StdRng::seed_from_u64(11);
        let t = TruncatedGaussian::new(0.0, 1.0, 6.0);
        let mut acc = 0.0;
        for _ in 0..200 {
            let x = t.sample(&mut rng);
            assert!(x >= 6.0);
            acc += x;
        }
        // Tail samples concentrate just above the bound.
        assert!(acc / 200.0 < 6.5);
    }

    #[test]
    fn test_sample_mean_matches_moment() {
        let mut rng = StdRng::seed_from_u64(3);
        let t = TruncatedGaussian::new(1.0, 1.5, 0.0);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| t.sample(&mut rng)).sum::<f64>() / n as f64;
        assert_relative_eq!(mean, t.truncated_mean(), epsilon = 0.05);
    }
}
