//! Scaled-inverse-gamma conjugate updater for the observation variance.

/// Conjugate prior over an unknown variance.
///
/// Each observation residual `e` contributes half a degree of freedom and
/// half its squared norm: `shape += 0.5`, `scale += 0.5 * ||e||^2`.
#[derive(Clone, Copy, Debug)]
pub struct ScaledInverseGamma {
    pub shape: f64,
    pub scale: f64,
}

impl ScaledInverseGamma {
    pub fn new(shape: f64, scale: f64) -> Self {
        ScaledInverseGamma { shape, scale }
    }

    pub fn update(&mut self, error_norm_sq: f64) {
        self.shape += 0.5;
        self.scale += 0.5 * error_norm_sq;
    }

    /// Posterior mean `scale / (shape - 1)`; falls back to the mode-like
    /// ratio `scale / shape` while the prior is too flat for a mean.
    pub fn mean(&self) -> f64 {
        if self.shape > 1.0 {
            self.scale / (self.shape - 1.0)
        } else {
            self.scale / self.shape
        }
    }
}
