//! Inverse-Wishart conjugate updater for process-noise covariances.

use crate::error::{Result, TrackError};
use nalgebra::{DMatrix, DVector};

/// Conjugate prior over an unknown covariance matrix.
///
/// Each reconstructed state-transition residual contributes its outer
/// product to the scale matrix and one degree of freedom.
#[derive(Clone, Debug)]
pub struct InverseWishart {
    scale: DMatrix<f64>,
    dof: f64,
}

impl InverseWishart {
    pub fn new(scale: DMatrix<f64>, dof: f64) -> Result<Self> {
        if scale.nrows() != scale.ncols() {
            return Err(TrackError::Contract(format!(
                "inverse-Wishart scale must be square, got {}x{}",
                scale.nrows(),
                scale.ncols()
            )));
        }
        Ok(InverseWishart { scale, dof })
    }

    /// Isotropic prior `diag(v, ..., v)` with the given degrees of freedom.
    pub fn isotropic(dim: usize, variance: f64, dof: f64) -> Self {
        InverseWishart {
            scale: DMatrix::from_diagonal(&DVector::from_element(dim, variance)),
            dof,
        }
    }

    pub fn dim(&self) -> usize {
        self.scale.nrows()
    }

    pub fn update(&mut self, residual: &DVector<f64>) -> Result<()> {
        if residual.len() != self.dim() {
            return Err(TrackError::Contract(format!(
                "residual dim {} against scale dim {}",
                residual.len(),
                self.dim()
            )));
        }
        self.scale += residual * residual.transpose();
        self.dof += 1.0;
        Ok(())
    }

    /// Posterior mean `scale / (dof - d - 1)`; while the prior is too flat
    /// for a mean, the scale-per-dof ratio stands in.
    pub fn mean(&self) -> DMatrix<f64> {
        let d = self.dim() as f64;
        let denom = self.dof - d - 1.0;
        if denom > 0.0 {
            &self.scale / denom
        } else {
            &self.scale / self.dof
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_isotropic_prior_mean() {
        let iw = InverseWishart::isotropic(2, 1.0, 4.0);
        let m = iw.mean();
        // dof - d - 1 = 1
        assert_relative_eq!(m[(0, 0)], 1.0);
        assert_relative_eq!(m[(1, 1)], 1.0);
        assert_relative_eq!(m[(0, 1)], 0.0);
    }

    #[test]
    fn test_update_adds_outer_product() {
        let mut iw = InverseWishart::isotropic(2, 1.0, 4.0);
        iw.update(&DVector::from_vec(vec![2.0, 0.0])).unwrap();
        let m = iw.mean();
        // scale = diag(1,1) + [[4,0],[0,0]], denom = 2
        assert_relative_eq!(m[(0, 0)], 2.5);
        assert_relative_eq!(m[(1, 1)], 0.5);
    }

    #[test]
    fn test_mean_tracks_residual_spread() {
        let mut iw = InverseWishart::isotropic(1, 1.0, 3.0);
        for _ in 0..10_000 {
            iw.update(&DVector::from_vec(vec![3.0])).unwrap();
        }
        assert_relative_eq!(iw.mean()[(0, 0)], 9.0, epsilon = 0.05);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut iw = InverseWishart::isotropic(2, 1.0, 4.0);
        assert!(iw.update(&DVector::from_vec(vec![1.0])).is_err());
    }
}
