//! Dirichlet/multinomial conjugate pair over a binary outcome.
//!
//! Backs the on/off-edge transition model: one pair for free-motion starts,
//! one for edge-motion starts. Sampling draws a probability vector from the
//! Dirichlet via Gamma variates, except when the posterior has collapsed
//! onto a single outcome, where the outcome is returned exactly.

use crate::config::ZERO_TOLERANCE;
use rand::Rng;
use rand_distr::{Distribution, Gamma};

#[derive(Clone, Debug)]
pub struct DirichletMultinomial {
    concentration: [f64; 2],
}

impl DirichletMultinomial {
    pub fn new(concentration: [f64; 2]) -> Self {
        DirichletMultinomial { concentration }
    }

    /// Posterior-predictive mean, a point in the 2-simplex.
    pub fn mean(&self) -> [f64; 2] {
        let total = self.concentration[0] + self.concentration[1];
        [
            self.concentration[0] / total,
            self.concentration[1] / total,
        ]
    }

    /// Outcome with the largest predictive mass.
    pub fn argmax(&self) -> usize {
        if self.concentration[0] >= self.concentration[1] {
            0
        } else {
            1
        }
    }

    /// Index of the collapsed outcome, if the predictive mean concentrates
    /// all but `ZERO_TOLERANCE` of its mass on one entry.
    pub fn collapsed_outcome(&self) -> Option<usize> {
        let mean = self.mean();
        if mean[0] >= 1.0 - ZERO_TOLERANCE {
            Some(0)
        } else if mean[1] >= 1.0 - ZERO_TOLERANCE {
            Some(1)
        } else {
            None
        }
    }

    /// Draw a probability vector from the Dirichlet posterior.
    pub fn sample_probs<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 2] {
        if let Some(i) = self.collapsed_outcome() {
            let mut p = [0.0, 0.0];
            p[i] = 1.0;
            return p;
        }
        let g0 = Gamma::new(self.concentration[0], 1.0)
            .expect("concentration must be positive")
            .sample(rng);
        let g1 = Gamma::new(self.concentration[1], 1.0)
            .expect("concentration must be positive")
            .sample(rng);
        let total = g0 + g1;
        if total <= 0.0 {
            // Both Gamma draws underflowed; fall back to the mean.
            return self.mean();
        }
        [g0 / total, g1 / total]
    }

    /// Sample one outcome from the posterior predictive.
    pub fn sample_outcome<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if let Some(i) = self.collapsed_outcome() {
            return i;
        }
        let p = self.sample_probs(rng);
        if rng.gen::<f64>() < p[0] {
            0
        } else {
            1
        }
    }

    /// Fold one observed outcome into the posterior.
    pub fn observe(&mut self, outcome: usize) {
        self.concentration[outcome.min(1)] += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_mean_normalizes() {
        let d = DirichletMultinomial::new([3.0, 1.0]);
        let m = d.mean();
        assert_relative_eq!(m[0], 0.75);
        assert_relative_eq!(m[1], 0.25);
    }

    #[test]
    fn test_collapse_bypasses_gamma() {
        // (1 - eps, eps) with eps far below the tolerance: outcome 0 always.
        let d = DirichletMultinomial::new([1e9, 1e-8]);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(d.sample_outcome(&mut rng), 0);
            assert_eq!(d.sample_probs(&mut rng), [1.0, 0.0]);
        }
    }

    #[test]
    fn test_observe_shifts_mean() {
        let mut d = DirichletMultinomial::new([1.0, 1.0]);
        for _ in 0..8 {
            d.observe(1);
        }
        assert_eq!(d.argmax(), 1);
        assert_relative_eq!(d.mean()[1], 0.9);
    }

    #[test]
    fn test_sampled_outcomes_track_mean() {
        let d = DirichletMultinomial::new([8.0, 2.0]);
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let ones: usize = (0..n).map(|_| d.sample_outcome(&mut rng)).sum();
        let frac = ones as f64 / n as f64;
        assert!((frac - 0.2).abs() < 0.02, "outcome-1 fraction {}", frac);
    }
}
