//! Read-only road graph surface and its in-memory implementation.

use super::edge::RoadEdge;
use geo::{Coord, EuclideanDistance, LineString, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;
use std::sync::Arc;

/// Pure query surface over the road network. Implementations must be
/// immutable after load so particles can share them across threads.
pub trait RoadGraph: Send + Sync {
    /// Edges whose geometry comes within `radius` meters of `point`,
    /// nearest first.
    fn nearby_edges(&self, point: Coord<f64>, radius: f64) -> Vec<Arc<RoadEdge>>;

    /// Edges legally reachable from the end of `edge`.
    fn outgoing_transferable(&self, edge: &RoadEdge) -> Vec<Arc<RoadEdge>>;

    /// Edges from whose end `edge` is legally reachable.
    fn incoming_transferable(&self, edge: &RoadEdge) -> Vec<Arc<RoadEdge>>;

    /// Whether the graph carries an edge with exactly this geometry reversed.
    fn edge_has_reverse(&self, geometry: &LineString<f64>) -> bool;
}

/// Wrapper tying an edge to its bounding box for spatial indexing.
#[derive(Clone)]
struct SpatialEdge {
    edge: Arc<RoadEdge>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SpatialEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn compute_envelope(line: &LineString<f64>) -> AABB<[f64; 2]> {
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
    );
    for c in line.coords() {
        min_x = min_x.min(c.x);
        max_x = max_x.max(c.x);
        min_y = min_y.min(c.y);
        max_y = max_y.max(c.y);
    }
    AABB::from_corners([min_x, min_y], [max_x, max_y])
}

fn coord_key(c: Coord<f64>) -> (u64, u64) {
    (c.x.to_bits(), c.y.to_bits())
}

/// Immutable in-memory road network: an R-tree over edge envelopes plus
/// endpoint-derived adjacency.
///
/// Adjacency joins edges at shared endpoints; the exact reverse of an edge
/// is never a transfer target (no in-place U-turns). One-way restrictions
/// are expressed by simply not loading the reverse edge.
pub struct RoadNetwork {
    tree: RTree<SpatialEdge>,
    outgoing: HashMap<u64, Vec<Arc<RoadEdge>>>,
    incoming: HashMap<u64, Vec<Arc<RoadEdge>>>,
    edge_count: usize,
}

impl RoadNetwork {
    pub fn from_edges(edges: Vec<Arc<RoadEdge>>) -> Self {
        let mut by_start: HashMap<(u64, u64), Vec<Arc<RoadEdge>>> = HashMap::new();
        let mut by_end: HashMap<(u64, u64), Vec<Arc<RoadEdge>>> = HashMap::new();
        for e in &edges {
            by_start.entry(coord_key(e.start_point())).or_default().push(e.clone());
            by_end.entry(coord_key(e.end_point())).or_default().push(e.clone());
        }

        let mut outgoing = HashMap::new();
        let mut incoming = HashMap::new();
        for e in &edges {
            let out: Vec<Arc<RoadEdge>> = by_start
                .get(&coord_key(e.end_point()))
                .map(|v| {
                    v.iter()
                        .filter(|n| n.id != e.id && !n.is_reverse_of(e))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let inc: Vec<Arc<RoadEdge>> = by_end
                .get(&coord_key(e.start_point()))
                .map(|v| {
                    v.iter()
                        .filter(|n| n.id != e.id && !n.is_reverse_of(e))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            outgoing.insert(e.id, out);
            incoming.insert(e.id, inc);
        }

        let spatial: Vec<SpatialEdge> = edges
            .iter()
            .map(|edge| SpatialEdge {
                envelope: compute_envelope(&edge.geometry),
                edge: edge.clone(),
            })
            .collect();
        let edge_count = spatial.len();

        RoadNetwork {
            tree: RTree::bulk_load(spatial),
            outgoing,
            incoming,
            edge_count,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}

impl RoadGraph for RoadNetwork {
    fn nearby_edges(&self, point: Coord<f64>, radius: f64) -> Vec<Arc<RoadEdge>> {
        let envelope = AABB::from_corners(
            [point.x - radius, point.y - radius],
            [point.x + radius, point.y + radius],
        );
        let query = Point::new(point.x, point.y);
        let mut candidates: Vec<(Arc<RoadEdge>, f64)> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|se| {
                let dist = query.euclidean_distance(&se.edge.geometry);
                (se.edge.clone(), dist)
            })
            .filter(|(_, dist)| *dist <= radius)
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.into_iter().map(|(e, _)| e).collect()
    }

    fn outgoing_transferable(&self, edge: &RoadEdge) -> Vec<Arc<RoadEdge>> {
        self.outgoing.get(&edge.id).cloned().unwrap_or_default()
    }

    fn incoming_transferable(&self, edge: &RoadEdge) -> Vec<Arc<RoadEdge>> {
        self.incoming.get(&edge.id).cloned().unwrap_or_default()
    }

    fn edge_has_reverse(&self, geometry: &LineString<f64>) -> bool {
        let reversed = crate::geometry::reverse(geometry);
        let probe = RoadEdge::new(u64::MAX, reversed, false);
        let envelope = compute_envelope(&probe.geometry);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .any(|se| se.edge.same_geometry(&probe))
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

    fn grid() -> RoadNetwork {
        // Two edges meeting at (100, 0), plus the reverse of the first and a
        // distant stray.
        RoadNetwork::from_edges(vec![
            edge(1, &[(0.0, 0.0), (100.0, 0.0)]),
            edge(2, &[(100.0, 0.0), (200.0, 0.0)]),
            edge(3, &[(100.0, 0.0), (0.0, 0.0)]),
            edge(4, &[(500.0, 500.0), (600.0, 500.0)]),
        ])
    }

    #[test]
    fn test_nearby_edges_radius_and_order() {
        let net = grid();
        let found = net.nearby_edges(Coord { x: 50.0, y: 5.0 }, 20.0);
        assert_eq!(found.len(), 2, "edge 1 and its reverse are both within 5m");
        let found = net.nearby_edges(Coord { x: 50.0, y: 5.0 }, 1.0);
        assert!(found.is_empty());
        let found = net.nearby_edges(Coord { x: 120.0, y: 1.0 }, 30.0);
        assert_eq!(found[0].id, 2, "nearest edge first");
    }

    #[test]
    fn test_adjacency_joins_endpoints() {
        let net = grid();
        let e1 = edge(1, &[(0.0, 0.0), (100.0, 0.0)]);
        let out = net.outgoing_transferable(&e1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2, "transfer continues past the joint, no U-turn");

        let e2 = edge(2, &[(100.0, 0.0), (200.0, 0.0)]);
        let inc = net.incoming_transferable(&e2);
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].id, 1);
    }

    #[test]
    fn test_edge_has_reverse() {
        let net = grid();
        let line = LineString::new(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 100.0, y: 0.0 },
        ]);
        assert!(net.edge_has_reverse(&line), "edge 3 is the exact reverse");
        let lone = LineString::new(vec![
            Coord { x: 500.0, y: 500.0 },
            Coord { x: 600.0, y: 500.0 },
        ]);
        assert!(!net.edge_has_reverse(&lone));
    }

    #[test]
    fn test_edge_count() {
        assert_eq!(grid().edge_count(), 4);
    }
}
