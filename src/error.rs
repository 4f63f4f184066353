use thiserror::Error;

/// Failure taxonomy for the tracking core.
///
/// `Numeric` and `Geometry` are recoverable at the particle level: the outer
/// filter marks the particle failed and drops it at the next resample.
/// `Topology` and `Contract` indicate an implementation or data bug and are
/// surfaced to the caller unchanged.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Non-PSD covariance after a projection or update, SVD failure, or a
    /// NaN component in a state vector.
    #[error("numeric failure: {0}")]
    Numeric(String),

    /// Snapping returned no valid location, or an extracted subline was
    /// unexpectedly empty.
    #[error("geometry failure: {0}")]
    Geometry(String),

    /// `state_diff` matched none of the canonical cases, or a required path
    /// merge found no overlap.
    #[error("topology failure: {0}")]
    Topology(String),

    /// Caller violated an interface contract: non-positive time delta, wrong
    /// state dimensionality, or a null where a value is required.
    #[error("contract violation: {0}")]
    Contract(String),
}

impl TrackError {
    /// Whether the outer filter may recover by dropping the particle.
    pub fn is_particle_recoverable(&self) -> bool {
        matches!(self, TrackError::Numeric(_) | TrackError::Geometry(_))
    }
}

pub type Result<T> = std::result::Result<T, TrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability_split() {
        assert!(TrackError::Numeric("nan".into()).is_particle_recoverable());
        assert!(TrackError::Geometry("no snap".into()).is_particle_recoverable());
        assert!(!TrackError::Topology("no case".into()).is_particle_recoverable());
        assert!(!TrackError::Contract("dt <= 0".into()).is_particle_recoverable());
    }
}
