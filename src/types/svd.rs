//! SVD-backed covariance matrices.
//!
//! A covariance is carried as the triple `(U, S, Vᵀ)` with `C = U·diag(S)·Vᵀ`
//! and `S` nonnegative. Linear transforms `M·C·Mᵀ` are evaluated on the
//! square-root factor and re-factorized, so the result is symmetric PSD by
//! construction regardless of conditioning.

use crate::config::SVD_FLOOR;
use crate::error::{Result, TrackError};
use nalgebra::{DMatrix, DVector};

#[derive(Clone, Debug)]
pub struct SvdMatrix {
    u: DMatrix<f64>,
    /// Singular values, nonnegative.
    s: DVector<f64>,
    vt: DMatrix<f64>,
}

impl SvdMatrix {
    /// Covariance from a diagonal of variances.
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let n = diag.len();
        SvdMatrix {
            u: DMatrix::identity(n, n),
            s: DVector::from_row_slice(diag),
            vt: DMatrix::identity(n, n),
        }
    }

    /// Covariance `Σ = A·Aᵀ` from a square-root factor `A`.
    ///
    /// Factorizes `SVD(Aᵀ) = (U₁, S₁, V₁ᵀ)` so that
    /// `A·Aᵀ = V₁·diag(S₁²)·V₁ᵀ`, exactly symmetric PSD.
    pub fn from_factor(factor: &DMatrix<f64>) -> Result<Self> {
        let svd = factor.transpose().svd(true, true);
        let vt = svd
            .v_t
            .ok_or_else(|| TrackError::Numeric("SVD did not converge".into()))?;
        let s = svd.singular_values.map(|x| x * x);
        Ok(SvdMatrix {
            u: vt.transpose(),
            s,
            vt,
        })
    }

    /// Covariance from a symmetric matrix. Fails on asymmetry beyond the
    /// floor or on eigenvalues below `-SVD_FLOOR`.
    pub fn from_symmetric(m: &DMatrix<f64>) -> Result<Self> {
        if m.nrows() != m.ncols() {
            return Err(TrackError::Contract(format!(
                "covariance must be square, got {}x{}",
                m.nrows(),
                m.ncols()
            )));
        }
        if m.iter().any(|x| x.is_nan()) {
            return Err(TrackError::Numeric("NaN in covariance".into()));
        }
        let sym = (m + m.transpose()) * 0.5;
        let eig = sym.symmetric_eigen();
        if eig.eigenvalues.iter().any(|&l| l < -SVD_FLOOR) {
            return Err(TrackError::Numeric(format!(
                "covariance not PSD (min eigenvalue {:.3e})",
                eig.eigenvalues.min()
            )));
        }
        // Eigendecomposition of a PSD matrix is its SVD with U = V.
        let u = eig.eigenvectors;
        let s = eig.eigenvalues.map(|l| l.max(0.0));
        let vt = u.transpose();
        Ok(SvdMatrix { u, s, vt })
    }

    pub fn dim(&self) -> usize {
        self.u.nrows()
    }

    /// Linear transform `C → M·C·Mᵀ`.
    ///
    /// Forms `M' = diag(√S)·Vᵀ·Mᵀ` and refactorizes, which is
    /// `from_factor(M·V·diag(√S))`.
    pub fn transform(&self, m: &DMatrix<f64>) -> Result<Self> {
        if m.ncols() != self.dim() {
            return Err(TrackError::Contract(format!(
                "transform dimension mismatch: {} columns against covariance dim {}",
                m.ncols(),
                self.dim()
            )));
        }
        let factor = m * self.vt.transpose() * DMatrix::from_diagonal(&self.sqrt_s());
        Self::from_factor(&factor)
    }

    /// Stack a 2x2 covariance onto the `(0..1, 0..1)` and `(2..3, 2..3)`
    /// blocks of a 4x4, preserving the SVD structure.
    pub fn block_stack(&self) -> Result<Self> {
        if self.dim() != 2 {
            return Err(TrackError::Contract(format!(
                "block_stack expects a 2x2 covariance, got {}x{}",
                self.dim(),
                self.dim()
            )));
        }
        let k = self.s.len();
        let mut u = DMatrix::zeros(4, 2 * k);
        let mut vt = DMatrix::zeros(2 * k, 4);
        let mut s = DVector::zeros(2 * k);
        for j in 0..k {
            for i in 0..2 {
                u[(i, j)] = self.u[(i, j)];
                u[(2 + i, k + j)] = self.u[(i, j)];
                vt[(j, i)] = self.vt[(j, i)];
                vt[(k + j, 2 + i)] = self.vt[(j, i)];
            }
            s[j] = self.s[j];
            s[k + j] = self.s[j];
        }
        Ok(SvdMatrix { u, s, vt })
    }

    /// Sum of two covariances, refactorized.
    pub fn add(&self, other: &SvdMatrix) -> Result<Self> {
        if self.dim() != other.dim() {
            return Err(TrackError::Contract(format!(
                "covariance sum dimension mismatch: {} vs {}",
                self.dim(),
                other.dim()
            )));
        }
        Self::from_symmetric(&(self.to_matrix() + other.to_matrix()))
    }

    /// Diagonal square root `√S`, floored at `SVD_FLOOR` so downstream
    /// factors stay numerically meaningful.
    pub fn sqrt_s(&self) -> DVector<f64> {
        self.s.map(|x| x.max(0.0).sqrt().max(SVD_FLOOR))
    }

    /// Square-root factor `U·diag(√S)`, with `Σ = factor·factorᵀ`.
    pub fn sqrt_factor(&self) -> DMatrix<f64> {
        &self.u * DMatrix::from_diagonal(&self.sqrt_s())
    }

    pub fn singular_values(&self) -> &DVector<f64> {
        &self.s
    }

    /// Dense reconstruction `U·diag(S)·Vᵀ`.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        &self.u * DMatrix::from_diagonal(&self.s) * &self.vt
    }

    /// Marginal variance of component `i`.
    pub fn variance(&self, i: usize) -> f64 {
        let mut acc = 0.0;
        for j in 0..self.s.len() {
            acc += self.u[(i, j)] * self.s[j] * self.vt[(j, i)];
        }
        acc
    }

    /// Frobenius norm of the reconstructed covariance.
    pub fn frobenius_norm(&self) -> f64 {
        // Singular values carry the Frobenius norm directly.
        self.s.iter().map(|x| x * x).sum::<f64>().sqrt()
    }
}
