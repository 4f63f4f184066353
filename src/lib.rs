//! On-line map-matched vehicle tracking.
//!
//! Maintains a probabilistic estimate of a vehicle's pose — position,
//! velocity, and which road edge (if any) it travels on — from a stream of
//! noisy planar GPS fixes and a static road network. The estimate is carried
//! by independent particles, each holding a dual-mode Kalman filter:
//!
//! - a 4-D *ground* model `[x, vx, y, vy]` for free motion, and
//! - a 2-D *road* model `[s, v_s]` in arc-length coordinates along a path,
//!
//! with bidirectional projection between them and an on/off-road transition
//! model sampled each step. Covariances are carried in SVD form so every
//! projection stays symmetric positive semidefinite.
//!
//! The outer particle filter (predict → measure → resample), GPS ingestion,
//! and graph loading are external collaborators; this crate is the numeric
//! core they drive.

pub mod config;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod graph;
pub mod paths;
pub mod stats;
pub mod transition;
pub mod types;
pub mod vehicle;

pub use config::TrackerConfig;
pub use error::{Result, TrackError};
pub use filters::{GaussianState, GroundFilter, MotionFilter, RoadFilter};
pub use graph::{Edge, RoadEdge, RoadGraph, RoadNetwork};
pub use paths::{state_diff, merge_paths, Path, PathState};
pub use transition::{EdgeTransitionModel, TransitionType};
pub use types::{Observation, SvdMatrix};
pub use vehicle::{StateSnapshot, VehicleState, VehicleStatePredictor};
