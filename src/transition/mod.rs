//! On/off-edge transition distribution.
//!
//! Categorical transitions between free and edge-bound motion, backed by
//! two Dirichlet/multinomial pairs: one conditioned on a free-motion start,
//! one on an edge-motion start. The candidate domain depends on the current
//! pose uncertainty (off-road) or on graph reachability (on-road).

use crate::config::{DOMAIN_RADIUS_MULTIPLIER, EDGE_LENGTH_ERROR_TOLERANCE};
use crate::error::{Result, TrackError};
use crate::graph::{Edge, RoadEdge, RoadGraph};
use crate::paths::PathState;
use crate::stats::DirichletMultinomial;
use crate::types::SvdMatrix;
use geo::Coord;
use rand::Rng;
use std::sync::Arc;

/// The four categorical transition kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionType {
    OffToOff,
    OffToOn,
    OnToOn,
    OnToOff,
}

impl TransitionType {
    pub fn of(from: &Edge, to: &Edge) -> Self {
        match (from.is_null(), to.is_null()) {
            (true, true) => TransitionType::OffToOff,
            (true, false) => TransitionType::OffToOn,
            (false, false) => TransitionType::OnToOn,
            (false, true) => TransitionType::OnToOff,
        }
    }
}

/// Mahalanobis-inflated search radius from the observation covariance
/// (~95% normal quantile).
pub fn large_normal_cov_radius(obs_covariance: &SvdMatrix) -> f64 {
    DOMAIN_RADIUS_MULTIPLIER * obs_covariance.frobenius_norm().sqrt()
}

#[derive(Clone, Debug)]
pub struct EdgeTransitionModel {
    /// (off->off, off->on).
    free_motion: DirichletMultinomial,
    /// (on->on, on->off).
    edge_motion: DirichletMultinomial,
}

impl EdgeTransitionModel {
    pub fn new(free_concentration: [f64; 2], edge_concentration: [f64; 2]) -> Self {
        EdgeTransitionModel {
            free_motion: DirichletMultinomial::new(free_concentration),
            edge_motion: DirichletMultinomial::new(edge_concentration),
        }
    }

    pub fn free_motion_probs(&self) -> [f64; 2] {
        self.free_motion.mean()
    }

    pub fn edge_motion_probs(&self) -> [f64; 2] {
        self.edge_motion.mean()
    }

    /// Candidate domain for a free-motion start: edges near the mean
    /// position within the covariance-inflated radius, plus the null edge.
    pub fn off_road_domain(
        &self,
        graph: &dyn RoadGraph,
        mean_location: Coord<f64>,
        obs_covariance: &SvdMatrix,
    ) -> Vec<Edge> {
        let radius = large_normal_cov_radius(obs_covariance);
        let mut domain: Vec<Edge> = graph
            .nearby_edges(mean_location, radius)
            .into_iter()
            .map(Edge::Real)
            .collect();
        domain.push(Edge::Null);
        domain
    }

    /// Candidate domain for an edge-motion start: edges reachable by
    /// traveling the state's arc length along the graph from the current
    /// edge, plus the null edge.
    ///
    /// The walk follows outgoing adjacency while distance remains ahead of
    /// the edge end and incoming adjacency when the prediction overshot the
    /// edge start in reverse.
    pub fn on_road_domain(&self, graph: &dyn RoadGraph, state: &PathState) -> Result<Vec<Edge>> {
        let path = state.path();
        if path.edges().is_empty() {
            return Err(TrackError::Contract(
                "on-road domain requires an on-road state".into(),
            ));
        }
        // Locate the state's edge and its travel offset within it.
        let s_pos = path.direction_sign() * state.raw_state()[0];
        let mut pe = &path.edges()[0];
        for candidate in path.edges() {
            if candidate.dist_to_start.abs() <= s_pos {
                pe = candidate;
            }
        }
        let travel_offset = s_pos - pe.dist_to_start.abs();
        // Convert the travel offset into the edge's native frame.
        let native_distance = if pe.is_backward {
            pe.edge.length - travel_offset
        } else {
            travel_offset
        };

        let mut found: Vec<Arc<RoadEdge>> = Vec::new();
        collect_reachable(graph, &pe.edge, native_distance, 0, &mut found);

        let mut domain: Vec<Edge> = Vec::with_capacity(found.len() + 1);
        for e in found {
            let edge = Edge::Real(e);
            if !domain.contains(&edge) {
                domain.push(edge);
            }
        }
        domain.push(Edge::Null);
        Ok(domain)
    }

    /// Sample the next edge from a free-motion start.
    pub fn sample_off_road<R: Rng + ?Sized>(&self, rng: &mut R, domain: &[Edge]) -> Edge {
        let outcome = self.free_motion.sample_outcome(rng);
        if outcome == 1 {
            let candidates: Vec<&Edge> = domain.iter().filter(|e| !e.is_null()).collect();
            if !candidates.is_empty() {
                return candidates[rng.gen_range(0..candidates.len())].clone();
            }
        }
        Edge::Null
    }

    /// Sample the next edge from an edge-motion start.
    pub fn sample_on_road<R: Rng + ?Sized>(&self, rng: &mut R, domain: &[Edge]) -> Edge {
        let has_null = domain.iter().any(|e| e.is_null());
        let outcome = if has_null {
            self.edge_motion.sample_outcome(rng)
        } else {
            // No free-motion candidate: staying on the network is certain.
            0
        };
        if outcome == 1 {
            return Edge::Null;
        }
        let candidates: Vec<&Edge> = domain.iter().filter(|e| !e.is_null()).collect();
        if candidates.is_empty() {
            return Edge::Null;
        }
        candidates[rng.gen_range(0..candidates.len())].clone()
    }

    /// Most probable transition resolved against the domain.
    pub fn mean(&self, currently_on_road: bool, domain: &[Edge]) -> Edge {
        let first_real = domain.iter().find(|e| !e.is_null());
        let stay_index = if currently_on_road {
            self.edge_motion.argmax()
        } else {
            1 - self.free_motion.argmax()
        };
        // stay_index 0 resolves to an edge, 1 to free motion.
        match (stay_index, first_real) {
            (0, Some(edge)) => edge.clone(),
            _ => Edge::Null,
        }
    }

    /// Fold an observed transition into the matching posterior.
    pub fn observe(&mut self, transition: TransitionType) {
        match transition {
            TransitionType::OffToOff => self.free_motion.observe(0),
            TransitionType::OffToOn => self.free_motion.observe(1),
            TransitionType::OnToOn => self.edge_motion.observe(0),
            TransitionType::OnToOff => self.edge_motion.observe(1),
        }
    }
}

/// Depth-bounded reachability walk, native edge frames.
fn collect_reachable(
    graph: &dyn RoadGraph,
    edge: &Arc<RoadEdge>,
    distance: f64,
    depth: usize,
    out: &mut Vec<Arc<RoadEdge>>,
) {
    const MAX_DEPTH: usize = 32;
    if depth > MAX_DEPTH {
        return;
    }
    if distance >= -EDGE_LENGTH_ERROR_TOLERANCE
        && distance <= edge.length + EDGE_LENGTH_ERROR_TOLERANCE
    {
        out.push(edge.clone());
        return;
    }
    if distance > edge.length {
        for next in graph.outgoing_transferable(edge) {
            if next.length > 0.0 {
                collect_reachable(graph, &next, distance - edge.length, depth + 1, out);
            }
        }
    } else {
        for prev in graph.incoming_transferable(edge) {
            if prev.length > 0.0 {
                collect_reachable(graph, &prev, distance + prev.length, depth + 1, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RoadNetwork;
    use crate::paths::Path;
    use geo::LineString;
    use nalgebra::DVector;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn edge(id: u64, coords: &[(f64, f64)]) -> Arc<RoadEdge> {
        Arc::new(RoadEdge::new(
            id,
            LineString::new(coords.iter().map(|&(x, y)| Coord { x, y }).collect()),
            false,
        ))
    }

    fn network() -> RoadNetwork {
        RoadNetwork::from_edges(vec![
            edge(1, &[(0.0, 0.0), (100.0, 0.0)]),
            edge(2, &[(100.0, 0.0), (200.0, 0.0)]),
            edge(3, &[(100.0, 0.0), (100.0, 100.0)]),
        ])
    }

    fn model() -> EdgeTransitionModel {
        EdgeTransitionModel::new([15.0, 1.0], [30.0, 1.0])
    }

    #[test]
    fn test_transition_type_table() {
        let e1 = Edge::Real(edge(1, &[(0.0, 0.0), (100.0, 0.0)]));
        let e2 = Edge::Real(edge(2, &[(100.0, 0.0), (200.0, 0.0)]));
        assert_eq!(TransitionType::of(&e1, &Edge::Null), TransitionType::OnToOff);
        assert_eq!(TransitionType::of(&Edge::Null, &e1), TransitionType::OffToOn);
        assert_eq!(
            TransitionType::of(&Edge::Null, &Edge::Null),
            TransitionType::OffToOff
        );
        assert_eq!(TransitionType::of(&e1, &e2), TransitionType::OnToOn);
    }

    #[test]
    fn test_off_road_domain_radius() {
        let net = network();
        let m = model();
        // Frobenius norm 200 -> radius 1.98 * sqrt(200) = 28 m.
        let q = SvdMatrix::from_diagonal(&[100.0, 100.0]);
        let domain = m.off_road_domain(&net, Coord { x: 50.0, y: 20.0 }, &q);
        assert!(domain.iter().any(|e| e.is_null()));
        assert!(
            domain.iter().any(|e| e.as_real().map(|r| r.id) == Some(1)),
            "edge 1 is 20 m away, inside the 28 m radius"
        );
        // A tight covariance keeps only the null edge.
        let tight = SvdMatrix::from_diagonal(&[1.0, 1.0]);
        let domain = m.off_road_domain(&net, Coord { x: 50.0, y: 20.0 }, &tight);
        assert_eq!(domain.len(), 1);
        assert!(domain[0].is_null());
    }

    #[test]
    fn test_on_road_domain_overshoot_forward() {
        let net = network();
        let m = model();
        let path = Path::from_edge(edge(1, &[(0.0, 0.0), (100.0, 0.0)]), false).unwrap();
        // Predicted 130 m along a 100 m edge: successors of edge 1.
        let state = PathState::new(path, DVector::from_vec(vec![130.0, 10.0])).unwrap();
        let domain = m.on_road_domain(&net, &state).unwrap();
        let ids: Vec<u64> = domain.iter().filter_map(|e| e.as_real().map(|r| r.id)).collect();
        assert!(ids.contains(&2));
        assert!(ids.contains(&3));
        assert!(!ids.contains(&1));
        assert!(domain.iter().any(|e| e.is_null()));
    }

    #[test]
    fn test_on_road_domain_within_edge() {
        let net = network();
        let m = model();
        let path = Path::from_edge(edge(1, &[(0.0, 0.0), (100.0, 0.0)]), false).unwrap();
        let state = PathState::new(path, DVector::from_vec(vec![40.0, 10.0])).unwrap();
        let domain = m.on_road_domain(&net, &state).unwrap();
        let ids: Vec<u64> = domain.iter().filter_map(|e| e.as_real().map(|r| r.id)).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_on_road_domain_reverse_overshoot() {
        let net = network();
        let m = model();
        let path = Path::from_edge(edge(2, &[(100.0, 0.0), (200.0, 0.0)]), false).unwrap();
        // Predicted 20 m behind the edge start: predecessors of edge 2.
        let state = PathState::new(path, DVector::from_vec(vec![-20.0, -5.0])).unwrap();
        let domain = m.on_road_domain(&net, &state).unwrap();
        let ids: Vec<u64> = domain.iter().filter_map(|e| e.as_real().map(|r| r.id)).collect();
        assert!(ids.contains(&1), "edge 1 ends where edge 2 starts: {ids:?}");
        assert!(!ids.contains(&2));
    }

    #[test]
    fn test_sample_off_road_mostly_stays_off() {
        let net = network();
        let m = model();
        let q = SvdMatrix::from_diagonal(&[100.0, 100.0]);
        let domain = m.off_road_domain(&net, Coord { x: 50.0, y: 20.0 }, &q);
        let mut rng = StdRng::seed_from_u64(5);
        let nulls = (0..1000)
            .filter(|_| m.sample_off_road(&mut rng, &domain).is_null())
            .count();
        // Prior (15, 1): ~94% stay off-road.
        assert!(nulls > 850, "null count {nulls}");
        assert!(nulls < 990, "some on-road transitions expected, got {nulls}");
    }

    #[test]
    fn test_sample_on_road_without_null_is_deterministic() {
        let m = model();
        let e = Edge::Real(edge(1, &[(0.0, 0.0), (100.0, 0.0)]));
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            let sampled = m.sample_on_road(&mut rng, std::slice::from_ref(&e));
            assert_eq!(sampled, e);
        }
    }

    #[test]
    fn test_sample_collapse_is_exact() {
        // Free-motion probabilities (1 - eps, eps): the off-road branch must
        // come back with probability one, bypassing the Gamma sampler.
        let m = EdgeTransitionModel::new([1e9, 1e-8], [30.0, 1.0]);
        let net = network();
        let q = SvdMatrix::from_diagonal(&[100.0, 100.0]);
        let domain = m.off_road_domain(&net, Coord { x: 50.0, y: 20.0 }, &q);
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..200 {
            assert!(m.sample_off_road(&mut rng, &domain).is_null());
        }
    }

    #[test]
    fn test_mean_resolution() {
        let m = model();
        let e = Edge::Real(edge(1, &[(0.0, 0.0), (100.0, 0.0)]));
        let domain = vec![e.clone(), Edge::Null];
        // Edge-motion argmax is on->on: resolve to the first real edge.
        assert_eq!(m.mean(true, &domain), e);
        // Free-motion argmax is off->off: resolve to null.
        assert_eq!(m.mean(false, &domain), Edge::Null);
    }

    #[test]
    fn test_observe_updates_posterior() {
        let mut m = EdgeTransitionModel::new([1.0, 1.0], [1.0, 1.0]);
        for _ in 0..10 {
            m.observe(TransitionType::OffToOn);
        }
        assert!(m.free_motion_probs()[1] > 0.8);
        for _ in 0..10 {
            m.observe(TransitionType::OnToOff);
        }
        assert!(m.edge_motion_probs()[1] > 0.8);
    }
}
