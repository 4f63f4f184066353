pub mod linalg;
pub mod svd;

pub use linalg::*;
pub use svd::SvdMatrix;

use geo::Coord;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// One GPS fix, immutable once created.
///
/// `previous` is a severable back-reference used only to seed an initial
/// velocity estimate; call [`Observation::reset_previous`] once it is no
/// longer needed so dropped parents can be reclaimed.
#[derive(Debug, Serialize, Deserialize)]
pub struct Observation {
    pub source_id: String,
    /// Epoch seconds.
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Planar projection of the fix [meters], isotropic.
    pub projected_x: f64,
    pub projected_y: f64,
    /// Reported speed [m/s], if the receiver supplies one.
    pub velocity: Option<f64>,
    /// Reported heading [radians], if the receiver supplies one.
    pub heading: Option<f64>,
    /// Reported accuracy [meters], if the receiver supplies one.
    pub accuracy: Option<f64>,
    pub record_number: u64,
    #[serde(skip)]
    previous: RwLock<Option<Arc<Observation>>>,
}

impl Observation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_id: impl Into<String>,
        timestamp: f64,
        lat_lon: (f64, f64),
        projected_xy: (f64, f64),
        velocity: Option<f64>,
        heading: Option<f64>,
        accuracy: Option<f64>,
        record_number: u64,
        previous: Option<Arc<Observation>>,
    ) -> Arc<Self> {
        Arc::new(Observation {
            source_id: source_id.into(),
            timestamp,
            latitude: lat_lon.0,
            longitude: lat_lon.1,
            projected_x: projected_xy.0,
            projected_y: projected_xy.1,
            velocity,
            heading,
            accuracy,
            record_number,
            previous: RwLock::new(previous),
        })
    }

    pub fn projected_xy(&self) -> Coord<f64> {
        Coord {
            x: self.projected_x,
            y: self.projected_y,
        }
    }

    pub fn previous(&self) -> Option<Arc<Observation>> {
        self.previous.read().expect("observation lock poisoned").clone()
    }

    /// Sever the back-reference.
    pub fn reset_previous(&self) {
        *self.previous.write().expect("observation lock poisoned") = None;
    }

    /// Velocity estimate `(vx, vy)` from the previous fix, if one is linked
    /// and strictly older.
    pub fn velocity_from_previous(&self) -> Option<(f64, f64)> {
        let prev = self.previous()?;
        let dt = self.timestamp - prev.timestamp;
        if dt <= 0.0 {
            return None;
        }
        Some((
            (self.projected_x - prev.projected_x) / dt,
            (self.projected_y - prev.projected_y) / dt,
        ))
    }
}
