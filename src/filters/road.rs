//! 2-D arc-length filter for on-road motion.
//!
//! State `[s, v_s]`: signed arc length along the current path and scalar
//! velocity. The arc-length dimension lives on a truncated domain: after a
//! predict, mass below zero is reflected onto the bound via the
//! truncated-Gaussian moments, and mass past the path end is mirrored onto
//! the total length the same way.

use super::{GaussianState, MotionFilter};
use crate::error::{Result, TrackError};
use crate::stats::TruncatedGaussian;
use crate::types::linalg::{
    road_noise_factor, road_transition, ROAD_DIM, ROAD_MEASUREMENT_ERROR, ROAD_OBS_MATRIX,
};
use crate::types::SvdMatrix;
use nalgebra::{DMatrix, DVector};

#[derive(Clone)]
pub struct RoadFilter {
    transition: DMatrix<f64>,
    process_covariance: SvdMatrix,
    initial_position_variance: f64,
    initial_velocity_variance: f64,
}

impl RoadFilter {
    /// Build the filter for one step. `accel_var` is the scalar white
    /// acceleration variance from the on-road process-noise posterior.
    pub fn new(
        dt: f64,
        accel_var: f64,
        initial_position_variance: f64,
        initial_velocity_variance: f64,
    ) -> Result<Self> {
        if dt <= 0.0 {
            return Err(TrackError::Contract(format!(
                "road filter requires positive dt, got {dt}"
            )));
        }
        if accel_var < 0.0 {
            return Err(TrackError::Contract(format!(
                "negative on-road acceleration variance {accel_var}"
            )));
        }
        let factor = road_noise_factor(dt) * accel_var.sqrt();
        Ok(RoadFilter {
            transition: road_transition(dt),
            process_covariance: SvdMatrix::from_factor(&factor)?,
            initial_position_variance,
            initial_velocity_variance,
        })
    }

    /// Predict and then restrict the arc-length marginal to
    /// `[0, total_length]` (expressed in positive form).
    pub fn predict_truncated(
        &self,
        prior: &GaussianState,
        total_length: f64,
    ) -> Result<GaussianState> {
        let predicted = self.predict(prior)?;
        truncate_arc_length(&predicted, total_length)
    }
}

/// Restrict the arc-length marginal of a road belief to `[0, total]`.
///
/// Below-zero mass is replaced by the moments of the Gaussian truncated at
/// zero; past-the-end mass by the mirror-image truncation at `total`. The
/// covariance row/column is rescaled by the variance ratio, a congruence
/// that keeps the matrix PSD.
pub fn truncate_arc_length(belief: &GaussianState, total: f64) -> Result<GaussianState> {
    if belief.dim() != ROAD_DIM {
        return Err(TrackError::Contract(format!(
            "arc-length truncation expects a road state, got dim {}",
            belief.dim()
        )));
    }
    let s = belief.mean[0];
    let var_s = belief.covariance.variance(0).max(0.0);
    let std_s = var_s.sqrt();

    let (new_s, new_var) = if s < 0.0 {
        let tg = TruncatedGaussian::new(s, std_s, 0.0);
        (0.0, tg.truncated_variance())
    } else if s > total {
        // Mirror: truncating N(s, sigma) to (-inf, total] is truncating
        // N(-s, sigma) to [-total, inf).
        let tg = TruncatedGaussian::new(-s, std_s, -total);
        (total, tg.truncated_variance())
    } else {
        return Ok(belief.clone());
    };

    let mut mean = belief.mean.clone();
    mean[0] = new_s;

    let scale = if var_s > 0.0 {
        (new_var / var_s).sqrt()
    } else {
        1.0
    };
    let congruence = DMatrix::from_diagonal(&DVector::from_vec(vec![scale, 1.0]));
    let covariance = belief.covariance.transform(&congruence)?;
    GaussianState::new(mean, covariance)
}

impl MotionFilter for RoadFilter {
    fn state_dim(&self) -> usize {
        ROAD_DIM
    }

    fn obs_dim(&self) -> usize {
        1
    }

    fn transition(&self) -> &DMatrix<f64> {
        &self.transition
    }

    fn process_covariance(&self) -> &SvdMatrix {
        &self.process_covariance
    }

    fn observation_matrix(&self) -> &DMatrix<f64> {
        &*ROAD_OBS_MATRIX
    }

    /// The observable block of the fixed road measurement error
    /// `diag(50, 0)`.
    fn measurement_covariance(&self) -> DMatrix<f64> {
        let full = &*ROAD_MEASUREMENT_ERROR;
        &*ROAD_OBS_MATRIX * full * ROAD_OBS_MATRIX.transpose()
    }

    fn create_initial(&self, obs: &DVector<f64>) -> Result<GaussianState> {
        if obs.len() != 1 {
            return Err(TrackError::Contract(format!(
                "road initial observation must be 1-D, got {}",
                obs.len()
            )));
        }
        GaussianState::new(
            DVector::from_vec(vec![obs[0], 0.0]),
            SvdMatrix::from_diagonal(&[
                self.initial_position_variance,
                self.initial_velocity_variance,
            ]),
        )
    }
}
