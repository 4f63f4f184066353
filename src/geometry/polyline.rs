//! Arc-length indexing over planar polylines.
//!
//! All coordinates are projected planar meters. Polylines may be split into
//! components (a path's edges); distances address the concatenation.

use crate::config::EDGE_LENGTH_ERROR_TOLERANCE;
use crate::error::{Result, TrackError};
use geo::{Coord, EuclideanLength, LineString};

/// Address of a point on a multi-component polyline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolylineLocation {
    pub component: usize,
    pub segment: usize,
    /// Position within the segment, `[0, 1]`.
    pub fraction: f64,
}

/// Result of snapping a point onto a polyline.
#[derive(Clone, Copy, Debug)]
pub struct SnapResult {
    /// Closest point on the polyline.
    pub point: Coord<f64>,
    /// Arc length from the polyline start to the snapped point [m].
    pub distance_along: f64,
    /// Index of the segment the snap landed on.
    pub segment: usize,
    /// Euclidean distance from the query to the snapped point [m].
    pub distance_to: f64,
}

pub fn polyline_length(line: &LineString<f64>) -> f64 {
    line.euclidean_length()
}

pub fn components_length(components: &[LineString<f64>]) -> f64 {
    components.iter().map(polyline_length).sum()
}

fn segment_len(a: Coord<f64>, b: Coord<f64>) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Map an arc length to a location on the concatenation of `components`.
///
/// Boundary policy: a distance landing exactly on a component endpoint
/// resolves to the start of the next component when one follows. Distances
/// within `EDGE_LENGTH_ERROR_TOLERANCE` beyond the total are clamped to the
/// final endpoint; anything farther is a geometry error.
pub fn locate(components: &[LineString<f64>], distance: f64) -> Result<PolylineLocation> {
    if components.is_empty() {
        return Err(TrackError::Geometry("locate on empty polyline".into()));
    }
    if distance < -EDGE_LENGTH_ERROR_TOLERANCE {
        return Err(TrackError::Geometry(format!(
            "negative arc length {distance:.3}"
        )));
    }
    let mut remaining = distance.max(0.0);
    for (ci, line) in components.iter().enumerate() {
        let coords: Vec<Coord<f64>> = line.coords().copied().collect();
        for si in 0..coords.len().saturating_sub(1) {
            let len = segment_len(coords[si], coords[si + 1]);
            if remaining < len {
                return Ok(PolylineLocation {
                    component: ci,
                    segment: si,
                    fraction: if len > 0.0 { remaining / len } else { 0.0 },
                });
            }
            remaining -= len;
        }
        // Landed exactly on this component's endpoint: prefer the start of
        // the next component when one follows.
        if remaining == 0.0 {
            if ci + 1 < components.len() {
                return Ok(PolylineLocation {
                    component: ci + 1,
                    segment: 0,
                    fraction: 0.0,
                });
            }
            let last = coords.len().saturating_sub(2);
            return Ok(PolylineLocation {
                component: ci,
                segment: last,
                fraction: 1.0,
            });
        }
    }
    if remaining <= EDGE_LENGTH_ERROR_TOLERANCE {
        let ci = components.len() - 1;
        let last = components[ci].coords().count().saturating_sub(2);
        return Ok(PolylineLocation {
            component: ci,
            segment: last,
            fraction: 1.0,
        });
    }
    Err(TrackError::Geometry(format!(
        "arc length {distance:.3} exceeds polyline length by {remaining:.3}"
    )))
}

/// Arc length from the start of the concatenation to `loc`.
pub fn location_to_length(components: &[LineString<f64>], loc: &PolylineLocation) -> f64 {
    let mut acc = 0.0;
    for (ci, line) in components.iter().enumerate() {
        let coords: Vec<Coord<f64>> = line.coords().copied().collect();
        for si in 0..coords.len().saturating_sub(1) {
            let len = segment_len(coords[si], coords[si + 1]);
            if ci == loc.component && si == loc.segment {
                return acc + loc.fraction * len;
            }
            acc += len;
        }
        if ci == loc.component {
            break;
        }
    }
    acc
}

/// Clamp an arc length onto `[0, total]`.
pub fn clamp_to_length(components: &[LineString<f64>], distance: f64) -> f64 {
    distance.clamp(0.0, components_length(components))
}

/// Orthogonally project `point` onto the nearest segment of `line`.
pub fn snap(line: &LineString<f64>, point: Coord<f64>) -> Result<SnapResult> {
    let coords: Vec<Coord<f64>> = line.coords().copied().collect();
    if coords.len() < 2 {
        return Err(TrackError::Geometry(
            "snap target has fewer than two coordinates".into(),
        ));
    }
    let mut best: Option<SnapResult> = None;
    let mut acc = 0.0;
    for si in 0..coords.len() - 1 {
        let a = coords[si];
        let b = coords[si + 1];
        let len = segment_len(a, b);
        let (proj, along) = if len > 0.0 {
            let t = ((point.x - a.x) * (b.x - a.x) + (point.y - a.y) * (b.y - a.y))
                / (len * len);
            let t = t.clamp(0.0, 1.0);
            (
                Coord {
                    x: a.x + t * (b.x - a.x),
                    y: a.y + t * (b.y - a.y),
                },
                t * len,
            )
        } else {
            (a, 0.0)
        };
        let dist = segment_len(point, proj);
        if best.as_ref().map_or(true, |b| dist < b.distance_to) {
            best = Some(SnapResult {
                point: proj,
                distance_along: acc + along,
                segment: si,
                distance_to: dist,
            });
        }
        acc += len;
    }
    best.ok_or_else(|| TrackError::Geometry("snap found no segment".into()))
}

/// Point at arc length `distance` on `line`.
pub fn point_at_length(line: &LineString<f64>, distance: f64) -> Result<Coord<f64>> {
    let components = std::slice::from_ref(line);
    let loc = locate(components, distance)?;
    let coords: Vec<Coord<f64>> = line.coords().copied().collect();
    let a = coords[loc.segment];
    let b = coords[loc.segment + 1];
    Ok(Coord {
        x: a.x + loc.fraction * (b.x - a.x),
        y: a.y + loc.fraction * (b.y - a.y),
    })
}

/// Extract the subline between two arc lengths. Reversed bounds yield the
/// reversed subline.
pub fn extract_subline(line: &LineString<f64>, from: f64, to: f64) -> Result<LineString<f64>> {
    if from > to {
        return Ok(reverse(&extract_subline(line, to, from)?));
    }
    let total = polyline_length(line);
    let from = from.clamp(0.0, total);
    let to = to.clamp(0.0, total);
    let start = point_at_length(line, from)?;
    let end = point_at_length(line, to)?;
    let mut out = vec![start];
    let coords: Vec<Coord<f64>> = line.coords().copied().collect();
    let mut acc = 0.0;
    for si in 0..coords.len() - 1 {
        let len = segment_len(coords[si], coords[si + 1]);
        let vertex_len = acc + len;
        if vertex_len > from && vertex_len < to {
            out.push(coords[si + 1]);
        }
        acc = vertex_len;
    }
    out.push(end);
    out.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    if out.len() < 2 {
        // Degenerate extraction: duplicate the point so the result is a
        // valid (zero-length) polyline.
        let p = out[0];
        out.push(p);
    }
    Ok(LineString::new(out))
}

pub fn reverse(line: &LineString<f64>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = line.coords().copied().collect();
    coords.reverse();
    LineString::new(coords)
}
