//! Dual-mode linear-Gaussian filters.
//!
//! One trait, two implementors: a 4-D planar filter for free motion and a
//! 2-D arc-length filter for on-road motion. Both are rebuilt per step from
//! the current time delta; covariances stay in SVD form end to end.

pub mod ground;
pub mod road;

pub use ground::GroundFilter;
pub use road::RoadFilter;

use crate::error::{Result, TrackError};
use crate::types::SvdMatrix;
use nalgebra::{DMatrix, DVector};

/// A multivariate Gaussian belief with SVD-backed covariance.
#[derive(Clone, Debug)]
pub struct GaussianState {
    pub mean: DVector<f64>,
    pub covariance: SvdMatrix,
}

impl GaussianState {
    pub fn new(mean: DVector<f64>, covariance: SvdMatrix) -> Result<Self> {
        if mean.len() != covariance.dim() {
            return Err(TrackError::Contract(format!(
                "mean dim {} against covariance dim {}",
                mean.len(),
                covariance.dim()
            )));
        }
        if mean.iter().any(|x| x.is_nan()) {
            return Err(TrackError::Numeric("NaN in state mean".into()));
        }
        Ok(GaussianState { mean, covariance })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Draw one state from the belief via its square-root factor.
    pub fn sample<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        let factor = self.covariance.sqrt_factor();
        let z = DVector::from_fn(factor.ncols(), |_, _| {
            crate::stats::truncated::standard_normal(rng)
        });
        &self.mean + factor * z
    }
}

/// The filter surface shared by the ground and road models: construction of
/// an initial belief, Kalman predict, and Kalman measure. Implementors are
/// cheap per-step values; cloning one clones its `dt`-bound matrices.
pub trait MotionFilter: Send {
    fn state_dim(&self) -> usize;
    fn obs_dim(&self) -> usize;

    /// State transition `A(dt)`.
    fn transition(&self) -> &DMatrix<f64>;

    /// Process covariance `F(dt)·Q·F(dt)ᵀ` in SVD form.
    fn process_covariance(&self) -> &SvdMatrix;

    /// Observation matrix `O`.
    fn observation_matrix(&self) -> &DMatrix<f64>;

    /// Measurement covariance `R`.
    fn measurement_covariance(&self) -> DMatrix<f64>;

    /// Initial belief around a first observation.
    fn create_initial(&self, obs: &DVector<f64>) -> Result<GaussianState>;

    /// Kalman predict: `x' = A·x`, `P' = A·P·Aᵀ + Σ`.
    fn predict(&self, prior: &GaussianState) -> Result<GaussianState> {
        if prior.dim() != self.state_dim() {
            return Err(TrackError::Contract(format!(
                "predict on state dim {} with filter dim {}",
                prior.dim(),
                self.state_dim()
            )));
        }
        let a = self.transition();
        let mean = a * &prior.mean;
        let covariance = prior
            .covariance
            .transform(a)?
            .add(self.process_covariance())?;
        GaussianState::new(mean, covariance)
    }

    /// Kalman measure, Joseph form. Both covariance terms go through the
    /// SVD transform so the posterior is PSD by construction; a singular
    /// innovation covariance is reported as a numeric error, never retried.
    fn measure(&self, prior: &GaussianState, obs: &DVector<f64>) -> Result<GaussianState> {
        if prior.dim() != self.state_dim() {
            return Err(TrackError::Contract(format!(
                "measure on state dim {} with filter dim {}",
                prior.dim(),
                self.state_dim()
            )));
        }
        if obs.len() != self.obs_dim() {
            return Err(TrackError::Contract(format!(
                "observation dim {} with filter obs dim {}",
                obs.len(),
                self.obs_dim()
            )));
        }
        let h = self.observation_matrix();
        let r = self.measurement_covariance();
        let p = prior.covariance.to_matrix();

        let s = h * &p * h.transpose() + &r;
        let s_inv = nalgebra::linalg::Cholesky::new(s)
            .ok_or_else(|| {
                TrackError::Numeric("innovation covariance not positive definite".into())
            })?
            .inverse();
        let gain = &p * h.transpose() * s_inv;

        let innovation = obs - h * &prior.mean;
        let mean = &prior.mean + &gain * innovation;

        let i_kh = DMatrix::identity(self.state_dim(), self.state_dim()) - &gain * h;
        let left = prior.covariance.transform(&i_kh)?;
        let gain_noise = SvdMatrix::from_symmetric(&r)?.transform(&gain)?;
        let covariance = left.add(&gain_noise)?;

        GaussianState::new(mean, covariance)
    }

    /// Log density of an observation under the predicted observation
    /// distribution, for particle weighting.
    fn observation_log_likelihood(
        &self,
        belief: &GaussianState,
        obs: &DVector<f64>,
    ) -> Result<f64> {
        let h = self.observation_matrix();
        let p = belief.covariance.to_matrix();
        let s = h * &p * h.transpose() + self.measurement_covariance();
        let chol = nalgebra::linalg::Cholesky::new(s.clone()).ok_or_else(|| {
            TrackError::Numeric("innovation covariance not positive definite".into())
        })?;
        let residual = obs - h * &belief.mean;
        let maha = (chol.inverse() * &residual).dot(&residual);
        let log_det = s.determinant().max(f64::MIN_POSITIVE).ln();
        let k = self.obs_dim() as f64;
        Ok(-0.5 * (k * (2.0 * std::f64::consts::PI).ln() + log_det + maha))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dimension_contract() {
        let cov = SvdMatrix::from_diagonal(&[1.0, 1.0]);
        let bad = GaussianState::new(DVector::from_vec(vec![0.0, 0.0, 0.0]), cov);
        assert!(matches!(bad, Err(TrackError::Contract(_))));
    }

    #[test]
    fn test_nan_mean_rejected() {
        let cov = SvdMatrix::from_diagonal(&[1.0, 1.0]);
        let bad = GaussianState::new(DVector::from_vec(vec![f64::NAN, 0.0]), cov);
        assert!(matches!(bad, Err(TrackError::Numeric(_))));
    }
}
