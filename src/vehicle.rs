// vehicle.rs — one particle and its per-step predictor.
//
// Everything here is pure computation over owned data: the particle owns its
// Bayesian parameters, borrows the graph read-only for the duration of a
// step, and carries its own deterministically-seeded RNG. The outer particle
// filter clones survivors, drops the rest, and never reaches back in.

use crate::config::TrackerConfig;
use crate::error::{Result, TrackError};
use crate::filters::{GaussianState, GroundFilter, MotionFilter, RoadFilter};
use crate::graph::{Edge, RoadEdge, RoadGraph};
use crate::paths::{ground_from_road, road_from_ground, Path, PathState};
use crate::stats::{InverseWishart, ScaledInverseGamma};
use crate::transition::{EdgeTransitionModel, TransitionType};
use crate::types::linalg::GROUND_OBS_MATRIX;
use crate::types::{Observation, SvdMatrix};
use geo::Coord;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;

/// Per-step output for one particle, flattened for downstream consumers
/// (route inference, travel-time estimation, anomaly detection).
#[derive(Clone, Debug, Serialize)]
pub struct StateSnapshot {
    pub particle_id: u64,
    pub record_number: u64,
    pub timestamp: f64,
    pub on_road: bool,
    /// Id of the edge currently traveled, if any.
    pub edge_id: Option<u64>,
    /// Mode-dependent motion state: `[s, v_s]` on-road, `[x, vx, y, vy]` off.
    pub motion_state: Vec<f64>,
    pub ground_mean: Vec<f64>,
    pub ground_variance_diag: Vec<f64>,
    pub observation_variance: f64,
    pub log_likelihood: f64,
}

/// One particle of the outer filter: the current path state, its beliefs,
/// and the Bayesian parameters learned alongside.
#[derive(Clone)]
pub struct VehicleState {
    particle_id: u64,
    observation: Arc<Observation>,
    path_state: PathState,
    /// Belief in the current mode's coordinates (2-D on-road, 4-D off).
    motion_belief: GaussianState,
    /// Planar belief, maintained in both modes.
    ground_belief: GaussianState,
    obs_covariance: ScaledInverseGamma,
    on_road_noise: InverseWishart,
    off_road_noise: InverseWishart,
    transition_model: EdgeTransitionModel,
    parent: Option<Arc<VehicleState>>,
    rng: StdRng,
    log_likelihood: f64,
}

impl VehicleState {
    /// First particle for a source: off-road around the first fix, velocity
    /// seeded from the linked previous observation when present.
    pub fn initial(
        config: &TrackerConfig,
        particle_id: u64,
        observation: Arc<Observation>,
    ) -> Result<Self> {
        let obs_variance = ScaledInverseGamma::new(
            config.obs_covariance_prior_shape,
            config.obs_covariance_prior_scale,
        );
        let off_road_noise = InverseWishart::isotropic(
            2,
            config.off_road_noise_prior_diag,
            config.off_road_noise_prior_dof,
        );
        let on_road_noise =
            InverseWishart::isotropic(1, config.on_road_noise_prior, config.on_road_noise_prior_dof);

        // dt is irrelevant for the initial belief; any positive value builds
        // a valid filter.
        let ground = GroundFilter::new(
            1.0,
            &off_road_noise.mean(),
            obs_variance.mean(),
            config.initial_position_variance,
            config.initial_velocity_variance,
        )?;
        let position = (observation.projected_x, observation.projected_y);
        let ground_belief = ground.initial_belief(position, observation.velocity_from_previous())?;
        let path_state = PathState::off_road(ground_belief.mean.clone())?;

        Ok(VehicleState {
            rng: seeded_rng(config.rng_seed, particle_id, observation.record_number),
            particle_id,
            observation,
            motion_belief: ground_belief.clone(),
            ground_belief,
            path_state,
            obs_covariance: obs_variance,
            on_road_noise,
            off_road_noise,
            transition_model: EdgeTransitionModel::new(
                config.free_motion_concentration,
                config.edge_motion_concentration,
            ),
            parent: None,
            log_likelihood: 0.0,
        })
    }

    pub fn particle_id(&self) -> u64 {
        self.particle_id
    }

    pub fn observation(&self) -> &Arc<Observation> {
        &self.observation
    }

    pub fn path_state(&self) -> &PathState {
        &self.path_state
    }

    pub fn motion_belief(&self) -> &GaussianState {
        &self.motion_belief
    }

    pub fn ground_belief(&self) -> &GaussianState {
        &self.ground_belief
    }

    pub fn observation_variance(&self) -> f64 {
        self.obs_covariance.mean()
    }

    pub fn transition_model(&self) -> &EdgeTransitionModel {
        &self.transition_model
    }

    pub fn parent(&self) -> Option<&Arc<VehicleState>> {
        self.parent.as_ref()
    }

    /// Accumulated observation log likelihood, for resample weighting.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Drop the parent chain, typically after resampling.
    pub fn detach_parent(&mut self) {
        self.parent = None;
    }

    /// Flattened per-step output.
    pub fn snapshot(&self) -> StateSnapshot {
        let ground = &self.ground_belief;
        StateSnapshot {
            particle_id: self.particle_id,
            record_number: self.observation.record_number,
            timestamp: self.observation.timestamp,
            on_road: self.path_state.is_on_road(),
            edge_id: self
                .path_state
                .path()
                .last_edge()
                .map(|pe| pe.edge.id),
            motion_state: self.path_state.state().iter().copied().collect(),
            ground_mean: ground.mean.iter().copied().collect(),
            ground_variance_diag: (0..ground.dim())
                .map(|i| ground.covariance.variance(i))
                .collect(),
            observation_variance: self.obs_covariance.mean(),
            log_likelihood: self.log_likelihood,
        }
    }

    fn current_edge(&self) -> Edge {
        match self.path_state.path().last_edge() {
            Some(pe) => Edge::Real(pe.edge.clone()),
            None => Edge::Null,
        }
    }
}

fn seeded_rng(global_seed: u64, particle_id: u64, record_number: u64) -> StdRng {
    let mixed = global_seed
        ^ particle_id.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ record_number.wrapping_mul(0xD1B5_4A32_D192_ED03);
    StdRng::seed_from_u64(mixed)
}

/// Runs one step of the C-sequence for one particle. Borrows the graph for
/// the duration of the step and retains nothing.
pub struct VehicleStatePredictor<'a> {
    graph: &'a dyn RoadGraph,
    config: &'a TrackerConfig,
}

impl<'a> VehicleStatePredictor<'a> {
    pub fn new(graph: &'a dyn RoadGraph, config: &'a TrackerConfig) -> Self {
        VehicleStatePredictor { graph, config }
    }

    /// Advance `parent` to `obs`, producing the child particle.
    ///
    /// Numeric and geometry failures are recoverable: the caller marks the
    /// particle failed and drops it at the next resample. Contract and
    /// topology failures indicate a bug and must surface.
    pub fn step(&self, parent: &VehicleState, obs: Arc<Observation>) -> Result<VehicleState> {
        let dt = obs.timestamp - parent.observation.timestamp;
        if dt <= 0.0 {
            return Err(TrackError::Contract(format!(
                "non-positive time delta {dt:.3}s for source {}",
                obs.source_id
            )));
        }

        // Rebuild both filters for this dt from the current posteriors.
        let ground_filter = GroundFilter::new(
            dt,
            &parent.off_road_noise.mean(),
            parent.obs_covariance.mean(),
            self.config.initial_position_variance,
            self.config.initial_velocity_variance,
        )?;
        let road_filter = RoadFilter::new(
            dt,
            parent.on_road_noise.mean()[(0, 0)],
            self.config.initial_position_variance,
            self.config.initial_velocity_variance,
        )?;

        let mut child = parent.clone();
        child.parent = Some(Arc::new(parent.clone()));
        child.rng = seeded_rng(self.config.rng_seed, parent.particle_id, obs.record_number);

        let prior_motion = parent.motion_belief.clone();
        let on_road = parent.path_state.is_on_road();

        // Predict in the current mode's coordinates. The untruncated road
        // prediction is kept separately: its overshoot drives the
        // reachability walk of the transition domain.
        let (predicted_raw, predicted_ground) = if on_road {
            let path = parent.path_state.path();
            let raw = road_filter.predict(&prior_motion)?;
            let truncated = crate::filters::road::truncate_arc_length(&raw, path.total_length())?;
            let lifted =
                ground_from_road(path, &truncated, false, Some(&parent.ground_belief.mean))?;
            (raw, lifted)
        } else {
            let predicted = ground_filter.predict(&prior_motion)?;
            (predicted.clone(), predicted)
        };

        // Fold the observation into the planar belief.
        let obs_vec = DVector::from_vec(vec![obs.projected_x, obs.projected_y]);
        let measured_ground = ground_filter.measure(&predicted_ground, &obs_vec)?;
        child.log_likelihood +=
            ground_filter.observation_log_likelihood(&predicted_ground, &obs_vec)?;

        // Relift to road when staying on the network.
        let measured_motion = if on_road {
            let prev = parent.path_state.ground_point().ok();
            road_from_ground(parent.path_state.path(), &measured_ground, prev, Some(dt))?
        } else {
            measured_ground.clone()
        };

        // Sample the next edge and re-project if the mode or edge changed.
        let previous_edge = parent.current_edge();
        let obs_cov = SvdMatrix::from_diagonal(&[
            parent.obs_covariance.mean(),
            parent.obs_covariance.mean(),
        ]);
        let sampled_edge = if on_road {
            let interim = PathState::new(
                parent.path_state.path().clone(),
                predicted_raw.mean.clone(),
            )?;
            let domain = child.transition_model.on_road_domain(self.graph, &interim)?;
            child.transition_model.sample_on_road(&mut child.rng, &domain)
        } else {
            let position = Coord {
                x: measured_ground.mean[0],
                y: measured_ground.mean[2],
            };
            let domain = child
                .transition_model
                .off_road_domain(self.graph, position, &obs_cov);
            child.transition_model.sample_off_road(&mut child.rng, &domain)
        };
        let transition = TransitionType::of(&previous_edge, &sampled_edge);

        match &sampled_edge {
            Edge::Null => {
                child.path_state = PathState::off_road(measured_ground.mean.clone())?;
                child.motion_belief = measured_ground.clone();
            }
            Edge::Real(edge) => {
                let same_edge = previous_edge
                    .as_real()
                    .map_or(false, |current| current.same_geometry(edge));
                if on_road && same_edge {
                    // Staying on the current edge: keep the path and the
                    // relifted belief.
                    child.path_state = PathState::new(
                        parent.path_state.path().clone(),
                        measured_motion.mean.clone(),
                    )?;
                    child.motion_belief = measured_motion.clone();
                } else {
                    let backward = orient_against_velocity(edge, &measured_ground);
                    let path = Path::from_edge(edge.clone(), backward)?;
                    let road_belief = road_from_ground(
                        &path,
                        &measured_ground,
                        parent.path_state.ground_point().ok(),
                        Some(dt),
                    )?;
                    child.path_state = PathState::new(path, road_belief.mean.clone())?;
                    child.motion_belief = road_belief;
                }
            }
        }
        child.ground_belief = measured_ground.clone();
        child.observation = obs.clone();

        self.update_parameters(
            &mut child,
            parent,
            &ground_filter,
            &road_filter,
            &prior_motion,
            &obs_vec,
            transition,
            dt,
        )?;

        debug!(
            "particle {} step {}: {:?}, s/x {:.2}, log-lik {:.3}",
            child.particle_id,
            obs.record_number,
            transition,
            child.motion_belief.mean[0],
            child.log_likelihood
        );

        Ok(child)
    }

    /// Step wrapper encoding the propagation policy: numeric and geometry
    /// failures drop the particle (`None`, with a warning), topology and
    /// contract failures propagate to the caller.
    pub fn try_step(
        &self,
        parent: &VehicleState,
        obs: Arc<Observation>,
    ) -> Result<Option<VehicleState>> {
        match self.step(parent, obs) {
            Ok(child) => Ok(Some(child)),
            Err(e) if e.is_particle_recoverable() => {
                warn!("particle {} dropped: {e}", parent.particle_id());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Conjugate parameter updates (observation variance, process noise,
    /// transition probabilities).
    #[allow(clippy::too_many_arguments)]
    fn update_parameters(
        &self,
        child: &mut VehicleState,
        parent: &VehicleState,
        ground_filter: &GroundFilter,
        road_filter: &RoadFilter,
        prior_motion: &GaussianState,
        obs_vec: &DVector<f64>,
        transition: TransitionType,
        dt: f64,
    ) -> Result<()> {
        // Observation variance: residual against a sampled posterior state
        // propagated through the ground observation matrix.
        let sampled_state = child.ground_belief.sample(&mut child.rng);
        let sampled_obs = &*GROUND_OBS_MATRIX * sampled_state;
        let err = obs_vec - sampled_obs;
        child.obs_covariance.update(err.norm_squared());

        // Process noise: acceleration-level residual reconstructed through
        // the pseudo-inverse of the noise factor, in the frame that carried
        // the prediction. A mode flip mid-step leaves no comparable frames.
        let same_mode = parent.path_state.is_on_road() == child.path_state.is_on_road();
        if same_mode {
            if child.path_state.is_on_road() {
                let residual = &child.motion_belief.mean
                    - road_filter.transition() * &prior_motion.mean;
                if let Some(w) = factor_residual(&crate::types::linalg::road_noise_factor(dt), &residual)
                {
                    child.on_road_noise.update(&w)?;
                }
            } else {
                let residual = &child.motion_belief.mean
                    - ground_filter.transition() * &prior_motion.mean;
                if let Some(w) =
                    factor_residual(&crate::types::linalg::ground_noise_factor(dt), &residual)
                {
                    child.off_road_noise.update(&w)?;
                }
            }
        }

        child.transition_model.observe(transition);
        Ok(())
    }
}

/// Least-squares solve `F·w ≈ residual` through the SVD pseudo-inverse.
fn factor_residual(factor: &DMatrix<f64>, residual: &DVector<f64>) -> Option<DVector<f64>> {
    let pinv = factor.clone().pseudo_inverse(1e-9).ok()?;
    Some(pinv * residual)
}

/// Traverse backward when the planar velocity opposes the edge direction at
/// the snap point.
fn orient_against_velocity(edge: &Arc<RoadEdge>, ground: &GaussianState) -> bool {
    let position = Coord {
        x: ground.mean[0],
        y: ground.mean[2],
    };
    let Ok(snapped) = crate::geometry::snap(&edge.geometry, position) else {
        return false;
    };
    let segments = edge.segments();
    let Some(segment) = segments.get(snapped.segment) else {
        return false;
    };
    let (ux, uy) = segment.unit_direction();
    ux * ground.mean[1] + uy * ground.mean[3] < 0.0
}
