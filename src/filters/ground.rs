//! 4-D planar filter for free (off-road) motion.
//!
//! State `[x, vx, y, vy]` in meters and meters per second. Rebuilt every
//! step for the current time delta and process-noise posterior.

use super::{GaussianState, MotionFilter};
use crate::error::{Result, TrackError};
use crate::types::linalg::{
    ground_noise_factor, ground_transition, GROUND_DIM, GROUND_OBS_MATRIX, OBS_DIM,
};
use crate::types::SvdMatrix;
use nalgebra::{DMatrix, DVector};

#[derive(Clone)]
pub struct GroundFilter {
    transition: DMatrix<f64>,
    process_covariance: SvdMatrix,
    /// Isotropic observation variance, from the observation-covariance
    /// posterior [m²].
    obs_variance: f64,
    initial_position_variance: f64,
    initial_velocity_variance: f64,
}

impl GroundFilter {
    /// Build the filter for one step.
    ///
    /// `accel_cov` is the 2x2 white-acceleration covariance `Q` from the
    /// off-road process-noise posterior.
    pub fn new(
        dt: f64,
        accel_cov: &DMatrix<f64>,
        obs_variance: f64,
        initial_position_variance: f64,
        initial_velocity_variance: f64,
    ) -> Result<Self> {
        if dt <= 0.0 {
            return Err(TrackError::Contract(format!(
                "ground filter requires positive dt, got {dt}"
            )));
        }
        if accel_cov.nrows() != 2 || accel_cov.ncols() != 2 {
            return Err(TrackError::Contract(format!(
                "ground acceleration covariance must be 2x2, got {}x{}",
                accel_cov.nrows(),
                accel_cov.ncols()
            )));
        }
        let q_sqrt = SvdMatrix::from_symmetric(accel_cov)?.sqrt_factor();
        let process_covariance = SvdMatrix::from_factor(&(ground_noise_factor(dt) * q_sqrt))?;
        Ok(GroundFilter {
            transition: ground_transition(dt),
            process_covariance,
            obs_variance,
            initial_position_variance,
            initial_velocity_variance,
        })
    }

    /// Initial belief around a first fix, optionally seeded with a velocity
    /// estimate from the previous observation.
    pub fn initial_belief(
        &self,
        position: (f64, f64),
        velocity: Option<(f64, f64)>,
    ) -> Result<GaussianState> {
        let (vx, vy) = velocity.unwrap_or((0.0, 0.0));
        let mean = DVector::from_vec(vec![position.0, vx, position.1, vy]);
        let block = SvdMatrix::from_diagonal(&[
            self.initial_position_variance,
            self.initial_velocity_variance,
        ]);
        let covariance = block.block_stack()?;
        GaussianState::new(mean, covariance)
    }
}

impl MotionFilter for GroundFilter {
    fn state_dim(&self) -> usize {
        GROUND_DIM
    }

    fn obs_dim(&self) -> usize {
        OBS_DIM
    }

    fn transition(&self) -> &DMatrix<f64> {
        &self.transition
    }

    fn process_covariance(&self) -> &SvdMatrix {
        &self.process_covariance
    }

    fn observation_matrix(&self) -> &DMatrix<f64> {
        &*GROUND_OBS_MATRIX
    }

    fn measurement_covariance(&self) -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_element(OBS_DIM, self.obs_variance))
    }

    fn create_initial(&self, obs: &DVector<f64>) -> Result<GaussianState> {
        if obs.len() != OBS_DIM {
            return Err(TrackError::Contract(format!(
                "ground initial observation must be 2-D, got {}",
                obs.len()
            )));
        }
        self.initial_belief((obs[0], obs[1]), None)
    }
}
