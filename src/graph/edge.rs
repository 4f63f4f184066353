//! Road edges and their straight segments.
//!
//! Edge identity is the geometry: equality and hashing use exact coordinate
//! equality, ordering is the lexicographic compare of coordinate sequences.
//! The null edge stands for free (off-road) motion, carries no geometry, and
//! is equal only to itself.

use crate::geometry::{polyline_length, reverse};
use geo::{Coord, LineString};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RoadEdge {
    pub id: u64,
    pub geometry: LineString<f64>,
    /// Polyline length [m].
    pub length: f64,
    /// Whether the graph carries a companion edge with reversed geometry.
    pub has_reverse: bool,
}

impl RoadEdge {
    pub fn new(id: u64, geometry: LineString<f64>, has_reverse: bool) -> Self {
        let length = polyline_length(&geometry);
        RoadEdge {
            id,
            geometry,
            length,
            has_reverse,
        }
    }

    pub fn start_point(&self) -> Coord<f64> {
        *self.geometry.coords().next().expect("edge geometry is non-empty")
    }

    pub fn end_point(&self) -> Coord<f64> {
        *self
            .geometry
            .coords()
            .last()
            .expect("edge geometry is non-empty")
    }

    /// Straight segments of the polyline, each with its start offset within
    /// the edge.
    pub fn segments(&self) -> Vec<EdgeSegment> {
        let coords: Vec<Coord<f64>> = self.geometry.coords().copied().collect();
        let mut out = Vec::with_capacity(coords.len().saturating_sub(1));
        let mut offset = 0.0;
        for w in coords.windows(2) {
            let seg = EdgeSegment {
                start: w[0],
                end: w[1],
                offset,
            };
            offset += seg.length();
            out.push(seg);
        }
        out
    }

    /// Exact coordinate equality of geometries.
    pub fn same_geometry(&self, other: &RoadEdge) -> bool {
        coords_eq(&self.geometry, &other.geometry)
    }

    /// Topological equality: `other` runs over this geometry reversed.
    pub fn is_reverse_of(&self, other: &RoadEdge) -> bool {
        coords_eq(&self.geometry, &reverse(&other.geometry))
    }
}

fn coords_eq(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    a.coords().count() == b.coords().count() && a.coords().zip(b.coords()).all(|(p, q)| p == q)
}

fn coords_cmp(a: &LineString<f64>, b: &LineString<f64>) -> Ordering {
    for (p, q) in a.coords().zip(b.coords()) {
        match p.x.total_cmp(&q.x).then(p.y.total_cmp(&q.y)) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    a.coords().count().cmp(&b.coords().count())
}

impl PartialEq for RoadEdge {
    fn eq(&self, other: &Self) -> bool {
        self.same_geometry(other)
    }
}

impl Eq for RoadEdge {}

impl Hash for RoadEdge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.geometry.coords() {
            c.x.to_bits().hash(state);
            c.y.to_bits().hash(state);
        }
    }
}

impl PartialOrd for RoadEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RoadEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        coords_cmp(&self.geometry, &other.geometry)
    }
}

/// One straight piece of an edge polyline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeSegment {
    pub start: Coord<f64>,
    pub end: Coord<f64>,
    /// Distance from the edge start to this segment's start [m].
    pub offset: f64,
}

impl EdgeSegment {
    pub fn length(&self) -> f64 {
        ((self.end.x - self.start.x).powi(2) + (self.end.y - self.start.y).powi(2)).sqrt()
    }

    /// Unit direction vector, zero for degenerate segments.
    pub fn unit_direction(&self) -> (f64, f64) {
        let len = self.length();
        if len <= 0.0 {
            return (0.0, 0.0);
        }
        ((self.end.x - self.start.x) / len, (self.end.y - self.start.y) / len)
    }
}

/// A road edge or the free-motion sentinel.
#[derive(Clone, Debug)]
pub enum Edge {
    Real(Arc<RoadEdge>),
    Null,
}

impl Edge {
    pub fn is_null(&self) -> bool {
        matches!(self, Edge::Null)
    }

    pub fn as_real(&self) -> Option<&Arc<RoadEdge>> {
        match self {
            Edge::Real(e) => Some(e),
            Edge::Null => None,
        }
    }

    pub fn length(&self) -> f64 {
        match self {
            Edge::Real(e) => e.length,
            Edge::Null => 0.0,
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Edge::Null, Edge::Null) => true,
            (Edge::Real(a), Edge::Real(b)) => a.same_geometry(b),
            _ => false,
        }
    }
}

impl Eq for Edge {}

impl Hash for Edge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Edge::Null => 0u8.hash(state),
            Edge::Real(e) => {
                1u8.hash(state);
                e.hash(state);
            }
        }
    }
}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Edge::Null, Edge::Null) => Ordering::Equal,
            (Edge::Null, Edge::Real(_)) => Ordering::Less,
            (Edge::Real(_), Edge::Null) => Ordering::Greater,
            (Edge::Real(a), Edge::Real(b)) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: u64, coords: &[(f64, f64)]) -> Arc<RoadEdge> {
        Arc::new(RoadEdge::new(
            id,
            LineString::new(coords.iter().map(|&(x, y)| Coord { x, y }).collect()),
            false,
        ))
    }

    #[test]
    fn test_equality_by_geometry_not_id() {
        let a = edge(1, &[(0.0, 0.0), (10.0, 0.0)]);
        let b = edge(2, &[(0.0, 0.0), (10.0, 0.0)]);
        let c = edge(1, &[(0.0, 0.0), (20.0, 0.0)]);
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn test_null_edge_equal_only_to_itself() {
        let e = Edge::Real(edge(1, &[(0.0, 0.0), (10.0, 0.0)]));
        assert_eq!(Edge::Null, Edge::Null);
        assert_ne!(Edge::Null, e);
        assert_ne!(e, Edge::Null);
    }

    #[test]
    fn test_ordering_lexicographic() {
        let a = Edge::Real(edge(1, &[(0.0, 0.0), (10.0, 0.0)]));
        let b = Edge::Real(edge(2, &[(0.0, 1.0), (10.0, 0.0)]));
        assert!(a < b);
        assert!(Edge::Null < a);
    }

    #[test]
    fn test_segments_carry_offsets() {
        let e = edge(1, &[(0.0, 0.0), (10.0, 0.0), (10.0, 5.0)]);
        let segs = e.segments();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].offset, 0.0);
        assert_eq!(segs[1].offset, 10.0);
        assert_eq!(segs[1].unit_direction(), (0.0, 1.0));
    }

    #[test]
    fn test_reverse_detection() {
        let a = edge(1, &[(0.0, 0.0), (10.0, 0.0)]);
        let b = edge(2, &[(10.0, 0.0), (0.0, 0.0)]);
        assert!(a.is_reverse_of(&b));
        assert!(!a.is_reverse_of(&a));
    }
}
