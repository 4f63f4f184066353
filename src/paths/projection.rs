//! Bidirectional projection between ground and road beliefs.
//!
//! Each straight segment of a path induces a projection pair `(P, a)`:
//! `P` is the 4x2 matrix `U·[[P₁, 0], [0, P₁]]` built from the segment's
//! unit direction `P₁` and the coordinate-swap permutation `U`, and `a` is
//! the offset `U·stack(p₀ − P₁·d, 0)` with `d` the distance from the path
//! start to the segment start. `P` has orthonormal columns, so lifting a
//! road belief and projecting it back is the identity.

use super::path::Path;
use crate::config::EDGE_LENGTH_ERROR_TOLERANCE;
use crate::error::{Result, TrackError};
use crate::filters::GaussianState;
use crate::geometry::{locate, snap};
use geo::Coord;
use nalgebra::{DMatrix, DVector};

/// Projection pair for one straight segment of a path.
#[derive(Clone, Debug)]
pub struct SegmentProjection {
    /// 4x2, maps `[s, v_s]` (positive form) into `[x, vx, y, vy]`.
    pub matrix: DMatrix<f64>,
    /// 4-vector offset.
    pub offset: DVector<f64>,
}

impl SegmentProjection {
    fn new(p0: Coord<f64>, p1: Coord<f64>, dist_to_segment_start: f64) -> Result<Self> {
        let dx = p1.x - p0.x;
        let dy = p1.y - p0.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len <= 0.0 {
            return Err(TrackError::Geometry(
                "projection onto a degenerate segment".into(),
            ));
        }
        let (ux, uy) = (dx / len, dy / len);
        // Rows in state order [x, vx, y, vy].
        let matrix = DMatrix::from_row_slice(
            4,
            2,
            &[
                ux, 0.0, //
                0.0, ux, //
                uy, 0.0, //
                0.0, uy,
            ],
        );
        let d = dist_to_segment_start;
        let offset = DVector::from_vec(vec![p0.x - ux * d, 0.0, p0.y - uy * d, 0.0]);
        Ok(SegmentProjection { matrix, offset })
    }
}

/// Build the projection pair for the segment containing positive-form arc
/// length `arc_length` on `path`.
pub fn segment_projection(path: &Path, arc_length: f64) -> Result<SegmentProjection> {
    if path.is_null() {
        return Err(TrackError::Contract(
            "projection requires a real path".into(),
        ));
    }
    let components = path.directed_components();
    let loc = locate(&components, arc_length)?;
    let coords: Vec<Coord<f64>> = components[loc.component].coords().copied().collect();
    let p0 = coords[loc.segment];
    let p1 = coords[loc.segment + 1];
    // Distance from the path start to the segment start.
    let seg_start = crate::geometry::location_to_length(
        &components,
        &crate::geometry::PolylineLocation {
            component: loc.component,
            segment: loc.segment,
            fraction: 0.0,
        },
    );
    SegmentProjection::new(p0, p1, seg_start)
}

/// Ground ← road: lift a road belief on `path` into planar coordinates.
///
/// When `use_abs_velocity` is set and a prior ground velocity direction is
/// supplied, the lifted velocity keeps that direction rescaled to `|v_s|`
/// instead of the segment direction.
pub fn ground_from_road(
    path: &Path,
    road: &GaussianState,
    use_abs_velocity: bool,
    prior_ground: Option<&DVector<f64>>,
) -> Result<GaussianState> {
    if road.dim() != 2 {
        return Err(TrackError::Contract(format!(
            "road belief must be 2-D, got {}",
            road.dim()
        )));
    }
    let sign = path.direction_sign();
    let total = path.total_length();
    // Positive form; the covariance is invariant under the sign flip.
    let s_pos = (sign * road.mean[0]).clamp(0.0, total);
    let v_pos = sign * road.mean[1];

    let proj = segment_projection(path, s_pos)?;
    let mut mean = &proj.matrix * DVector::from_vec(vec![s_pos, v_pos]) + &proj.offset;

    if use_abs_velocity {
        if let Some(prior) = prior_ground {
            let (pvx, pvy) = (prior[1], prior[3]);
            let norm = (pvx * pvx + pvy * pvy).sqrt();
            if norm > 0.0 {
                let speed = v_pos.abs();
                mean[1] = pvx / norm * speed;
                mean[3] = pvy / norm * speed;
            }
        }
    }

    let covariance = road.covariance.transform(&proj.matrix)?;
    GaussianState::new(mean, covariance)
}

/// Road ← ground: snap a ground belief onto `path`.
///
/// The position snaps orthogonally to the nearest segment; the velocity is
/// projected onto the segment direction, which preserves the along-road
/// component. When `previous_location` and `dt` are supplied, the scalar
/// velocity magnitude is overwritten by the chord speed, keeping its sign.
pub fn road_from_ground(
    path: &Path,
    ground: &GaussianState,
    previous_location: Option<Coord<f64>>,
    dt: Option<f64>,
) -> Result<GaussianState> {
    if ground.dim() != 4 {
        return Err(TrackError::Contract(format!(
            "ground belief must be 4-D, got {}",
            ground.dim()
        )));
    }
    let line = path.polyline()?;
    let position = Coord {
        x: ground.mean[0],
        y: ground.mean[2],
    };
    let snapped = snap(&line, position)?;
    let total = path.total_length();
    if snapped.distance_along < -EDGE_LENGTH_ERROR_TOLERANCE
        || snapped.distance_along > total + EDGE_LENGTH_ERROR_TOLERANCE
    {
        return Err(TrackError::Geometry(format!(
            "snap produced arc length {:.3} outside [0, {:.3}]",
            snapped.distance_along, total
        )));
    }
    let s_pos = snapped.distance_along.clamp(0.0, total);

    let proj = segment_projection(path, s_pos)?;
    let projected = proj.matrix.transpose() * (&ground.mean - &proj.offset);
    let mut v_pos = projected[1];

    if let (Some(prev), Some(dt)) = (previous_location, dt) {
        if dt > 0.0 {
            let chord = ((snapped.point.x - prev.x).powi(2)
                + (snapped.point.y - prev.y).powi(2))
            .sqrt();
            v_pos = (chord / dt).copysign(if v_pos != 0.0 { v_pos } else { 1.0 });
        }
    }

    let sign = path.direction_sign();
    let mean = DVector::from_vec(vec![sign * s_pos, sign * v_pos]);
    let covariance = ground.covariance.transform(&proj.matrix.transpose())?;
    GaussianState::new(mean, covariance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RoadEdge;
    use crate::types::SvdMatrix;
    use approx::assert_relative_eq;
    use geo::LineString;
    use std::sync::Arc;

    fn edge(coords: &[(f64, f64)]) -> Arc<RoadEdge> {
        Arc::new(RoadEdge::new(
            1,
            LineString::new(coords.iter().map(|&(x, y)| Coord { x, y }).collect()),
            false,
        ))
    }

    fn x_axis_path() -> Path {
        Path::from_edge(edge(&[(0.0, 0.0), (100.0, 0.0)]), false).unwrap()
    }

    fn road_belief(s: f64, v: f64) -> GaussianState {
        GaussianState::new(
            DVector::from_vec(vec![s, v]),
            SvdMatrix::from_diagonal(&[1.0, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_lift_positions_on_segment() {
        let path = x_axis_path();
        let ground = ground_from_road(&path, &road_belief(30.0, 2.0), false, None).unwrap();
        assert_relative_eq!(ground.mean[0], 30.0);
        assert_relative_eq!(ground.mean[1], 2.0);
        assert_relative_eq!(ground.mean[2], 0.0);
        assert_relative_eq!(ground.mean[3], 0.0);
    }

    #[test]
    fn test_lift_backward_path() {
        let path = Path::from_edge(edge(&[(0.0, 0.0), (100.0, 0.0)]), true).unwrap();
        // Signed arc length -30 on the backward path: 30 m from (100, 0)
        // heading toward the origin at 5 m/s.
        let ground = ground_from_road(&path, &road_belief(-30.0, -5.0), false, None).unwrap();
        assert_relative_eq!(ground.mean[0], 70.0);
        assert_relative_eq!(ground.mean[1], -5.0);
        assert_relative_eq!(ground.mean[2], 0.0);
    }

    #[test]
    fn test_project_snaps_and_keeps_velocity() {
        let path = x_axis_path();
        let ground = GaussianState::new(
            DVector::from_vec(vec![30.0, 2.0, 40.0, 1.0]),
            SvdMatrix::from_diagonal(&[1.0, 1.0, 1.0, 1.0]),
        )
        .unwrap();
        let road = road_from_ground(&path, &ground, None, None).unwrap();
        assert_relative_eq!(road.mean[0], 30.0);
        // Velocity keeps its along-road component only.
        assert_relative_eq!(road.mean[1], 2.0);
    }

    #[test]
    fn test_round_trip_road_to_ground_to_road() {
        let path = x_axis_path();
        let road = road_belief(30.0, 2.0);
        let ground = ground_from_road(&path, &road, false, None).unwrap();
        let back = road_from_ground(&path, &ground, None, None).unwrap();
        assert_relative_eq!(back.mean[0], road.mean[0], epsilon = 1e-6);
        assert_relative_eq!(back.mean[1], road.mean[1], epsilon = 1e-6);
        let diff = (back.covariance.to_matrix() - road.covariance.to_matrix()).norm();
        assert!(diff <= 1e-5, "covariance round-trip drift {diff}");
    }

    #[test]
    fn test_round_trip_on_bent_path() {
        let path = Path::from_edges(
            vec![
                edge(&[(0.0, 0.0), (100.0, 0.0)]),
                edge(&[(100.0, 0.0), (100.0, 80.0)]),
            ],
            false,
        )
        .unwrap();
        // On the second leg, 20 m past the bend.
        let road = road_belief(120.0, 3.0);
        let ground = ground_from_road(&path, &road, false, None).unwrap();
        assert_relative_eq!(ground.mean[0], 100.0);
        assert_relative_eq!(ground.mean[2], 20.0);
        assert_relative_eq!(ground.mean[3], 3.0);
        let back = road_from_ground(&path, &ground, None, None).unwrap();
        assert_relative_eq!(back.mean[0], 120.0, epsilon = 1e-6);
        assert_relative_eq!(back.mean[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_projection_covariance_psd() {
        let path = x_axis_path();
        let ground = ground_from_road(&path, &road_belief(30.0, 2.0), false, None).unwrap();
        let eig = ground.covariance.to_matrix().symmetric_eigen();
        assert!(eig
            .eigenvalues
            .iter()
            .all(|&l| l >= -crate::config::SVD_FLOOR));
    }

    #[test]
    fn test_chord_velocity_override() {
        let path = x_axis_path();
        let ground = GaussianState::new(
            DVector::from_vec(vec![50.0, 1.0, 0.0, 0.0]),
            SvdMatrix::from_diagonal(&[1.0, 1.0, 1.0, 1.0]),
        )
        .unwrap();
        let road = road_from_ground(
            &path,
            &ground,
            Some(Coord { x: 40.0, y: 0.0 }),
            Some(2.0),
        )
        .unwrap();
        // Chord speed 10 m / 2 s = 5 m/s, sign kept from the projection.
        assert_relative_eq!(road.mean[1], 5.0);
    }

    #[test]
    fn test_abs_velocity_rescale() {
        let path = x_axis_path();
        let prior = DVector::from_vec(vec![0.0, 3.0, 0.0, 4.0]);
        let ground =
            ground_from_road(&path, &road_belief(30.0, 10.0), true, Some(&prior)).unwrap();
        // Direction from the prior (3, 4)/5, magnitude from |v_s| = 10.
        assert_relative_eq!(ground.mean[1], 6.0);
        assert_relative_eq!(ground.mean[3], 8.0);
    }

    #[test]
    fn test_snap_far_off_path_is_geometry_error() {
        // A point fine in x but the snap itself is always valid on this
        // straight edge, so construct a state past the end instead.
        let path = x_axis_path();
        let ground = GaussianState::new(
            DVector::from_vec(vec![500.0, 0.0, 0.0, 0.0]),
            SvdMatrix::from_diagonal(&[1.0, 1.0, 1.0, 1.0]),
        )
        .unwrap();
        // Snap clamps to the end point: arc length stays valid.
        let road = road_from_ground(&path, &ground, None, None).unwrap();
        assert_relative_eq!(road.mean[0], 100.0);
    }
}
