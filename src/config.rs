// config.rs — tracker constants and tunable parameters
//
// Everything the numeric core needs in one place, so particles can be
// constructed from a single config value and tests can override individual
// knobs without touching the filters.

/// Arc-length values within this many meters of a path endpoint are treated
/// as on-path.
pub const EDGE_LENGTH_ERROR_TOLERANCE: f64 = 1.0;

/// Probability-vector collapse threshold for deterministic sampling.
pub const ZERO_TOLERANCE: f64 = 1e-6;

/// Floor applied to singular values before taking square roots.
pub const SVD_FLOOR: f64 = 1e-7;

/// Road-mode measurement variance on the arc-length component, modeling
/// inaccuracy in the edge geometry itself. Velocity is not measured directly
/// on-road, so its entry is zero.
pub const ROAD_MEASUREMENT_VARIANCE: f64 = 50.0;

/// Mahalanobis inflation for the off-road edge-search radius
/// (~95% normal quantile).
pub const DOMAIN_RADIUS_MULTIPLIER: f64 = 1.98;

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    // ── Observation covariance prior (scaled inverse gamma, mean 1) ──
    pub obs_covariance_prior_shape: f64,
    pub obs_covariance_prior_scale: f64,

    // ── Process covariance priors (inverse Wishart) ──
    /// Diagonal of the 2x2 off-road (ground) acceleration-noise prior scale.
    pub off_road_noise_prior_diag: f64,
    pub off_road_noise_prior_dof: f64,
    /// Scalar on-road (arc-length) acceleration-noise prior scale.
    pub on_road_noise_prior: f64,
    pub on_road_noise_prior_dof: f64,

    // ── Edge transition priors (Dirichlet concentrations) ──
    /// (stay off-road, move onto an edge)
    pub free_motion_concentration: [f64; 2],
    /// (stay on an edge, leave the network)
    pub edge_motion_concentration: [f64; 2],

    // ── Initial state uncertainty ──
    pub initial_position_variance: f64,
    pub initial_velocity_variance: f64,

    // ── Reproducibility ──
    pub rng_seed: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            obs_covariance_prior_shape: 2.0,
            obs_covariance_prior_scale: 1.0,
            off_road_noise_prior_diag: 1.0,
            off_road_noise_prior_dof: 4.0,
            on_road_noise_prior: 1.0,
            on_road_noise_prior_dof: 3.0,
            free_motion_concentration: [15.0, 1.0],
            edge_motion_concentration: [30.0, 1.0],
            initial_position_variance: 100.0,
            initial_velocity_variance: 10.0,
            rng_seed: 0,
        }
    }
}
