//! Path states: a path paired with a motion state of matching mode.

use super::path::Path;
use crate::error::{Result, TrackError};
use crate::geometry::point_at_length;
use crate::types::linalg::{GROUND_DIM, ROAD_DIM};
use geo::Coord;
use nalgebra::DVector;

/// `(path, motion_state)` with the dimensional invariant
/// `state.dim == 4 ⇔ path is null`.
///
/// The raw state is kept as supplied; the clamped accessor confines the
/// arc-length component to the path, carrying the path's sign.
#[derive(Clone, Debug)]
pub struct PathState {
    path: Path,
    raw_state: DVector<f64>,
}

impl PathState {
    pub fn new(path: Path, state: DVector<f64>) -> Result<Self> {
        let expected = if path.is_null() { GROUND_DIM } else { ROAD_DIM };
        if state.len() != expected {
            return Err(TrackError::Contract(format!(
                "path state dimension {} does not match mode (expected {})",
                state.len(),
                expected
            )));
        }
        if state.iter().any(|x| x.is_nan()) {
            return Err(TrackError::Numeric("NaN in path state".into()));
        }
        Ok(PathState {
            path,
            raw_state: state,
        })
    }

    pub fn off_road(state: DVector<f64>) -> Result<Self> {
        PathState::new(Path::null(), state)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_on_road(&self) -> bool {
        !self.path.is_null()
    }

    /// State as supplied, unclamped.
    pub fn raw_state(&self) -> &DVector<f64> {
        &self.raw_state
    }

    /// State with the arc-length component clamped onto the path.
    pub fn state(&self) -> DVector<f64> {
        if self.path.is_null() {
            return self.raw_state.clone();
        }
        let mut s = self.raw_state.clone();
        s[0] = self.path.clamp_distance(s[0]);
        s
    }

    /// Arc length in positive form (measured along the travel direction).
    pub fn arc_length(&self) -> f64 {
        self.path.direction_sign() * self.state()[0]
    }

    /// Scalar velocity along the travel direction (sign removed from the
    /// path-signed component).
    pub fn travel_velocity(&self) -> f64 {
        if self.path.is_null() {
            return 0.0;
        }
        self.path.direction_sign() * self.raw_state[1]
    }

    /// Planar position of the state.
    pub fn ground_point(&self) -> Result<Coord<f64>> {
        if self.path.is_null() {
            return Ok(Coord {
                x: self.raw_state[0],
                y: self.raw_state[2],
            });
        }
        let line = self.path.polyline()?;
        point_at_length(&line, self.arc_length())
    }
}
