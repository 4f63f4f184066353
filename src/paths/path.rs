//! Directed paths over the road graph.
//!
//! A path is an ordered concatenation of edges, all traversed the same way.
//! Arc lengths along a path are signed: positive on a forward path, negative
//! on a backward one, with magnitude measured from the path start along the
//! travel direction.

use crate::error::{Result, TrackError};
use crate::geometry::reverse;
use crate::graph::RoadEdge;
use geo::{Coord, LineString};
use std::sync::Arc;

/// One edge within a path.
#[derive(Clone, Debug)]
pub struct PathEdge {
    pub edge: Arc<RoadEdge>,
    /// Signed distance from the path start to this edge's start; negative
    /// iff the path traverses the edge against its native direction. Always
    /// zero for the first edge.
    pub dist_to_start: f64,
    pub is_backward: bool,
}

impl PathEdge {
    /// Edge geometry oriented along the traversal direction.
    pub fn directed_geometry(&self) -> LineString<f64> {
        if self.is_backward {
            reverse(&self.edge.geometry)
        } else {
            self.edge.geometry.clone()
        }
    }
}

/// A directed path or the free-motion sentinel.
#[derive(Clone, Debug)]
pub enum Path {
    Real {
        edges: Vec<PathEdge>,
        /// Signed: magnitude is the concatenated polyline length, sign is
        /// the path direction.
        total_distance: f64,
    },
    Null,
}

impl Path {
    pub fn null() -> Self {
        Path::Null
    }

    /// Build a path from edges and a traversal direction.
    ///
    /// Validates the path invariants: consecutive directed geometries must
    /// join end-to-start, and every edge shares the direction flag.
    pub fn from_edges(edges: Vec<Arc<RoadEdge>>, is_backward: bool) -> Result<Self> {
        if edges.is_empty() {
            return Err(TrackError::Contract(
                "a real path requires at least one edge".into(),
            ));
        }
        let sign = if is_backward { -1.0 } else { 1.0 };
        let mut path_edges = Vec::with_capacity(edges.len());
        let mut cumulative = 0.0;
        let mut prev_end: Option<Coord<f64>> = None;
        for (i, edge) in edges.into_iter().enumerate() {
            let directed = if is_backward {
                reverse(&edge.geometry)
            } else {
                edge.geometry.clone()
            };
            let start = *directed.coords().next().ok_or_else(|| {
                TrackError::Contract("path edge has empty geometry".into())
            })?;
            if let Some(prev) = prev_end {
                if prev != start {
                    return Err(TrackError::Contract(format!(
                        "path edges do not join: ({}, {}) then ({}, {})",
                        prev.x, prev.y, start.x, start.y
                    )));
                }
            }
            prev_end = directed.coords().last().copied();
            path_edges.push(PathEdge {
                dist_to_start: if i == 0 { 0.0 } else { sign * cumulative },
                is_backward,
                edge: edge.clone(),
            });
            cumulative += edge.length;
        }
        Ok(Path::Real {
            edges: path_edges,
            total_distance: sign * cumulative,
        })
    }

    pub fn from_edge(edge: Arc<RoadEdge>, is_backward: bool) -> Result<Self> {
        Path::from_edges(vec![edge], is_backward)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Path::Null)
    }

    pub fn is_backward(&self) -> bool {
        match self {
            Path::Real { total_distance, .. } => *total_distance < 0.0,
            Path::Null => false,
        }
    }

    /// +1 on a forward path, -1 on a backward one.
    pub fn direction_sign(&self) -> f64 {
        if self.is_backward() {
            -1.0
        } else {
            1.0
        }
    }

    pub fn edges(&self) -> &[PathEdge] {
        match self {
            Path::Real { edges, .. } => edges,
            Path::Null => &[],
        }
    }

    pub fn first_edge(&self) -> Option<&PathEdge> {
        self.edges().first()
    }

    pub fn last_edge(&self) -> Option<&PathEdge> {
        self.edges().last()
    }

    /// Signed total distance.
    pub fn total_distance(&self) -> f64 {
        match self {
            Path::Real { total_distance, .. } => *total_distance,
            Path::Null => 0.0,
        }
    }

    /// Concatenated polyline length.
    pub fn total_length(&self) -> f64 {
        self.total_distance().abs()
    }

    /// Per-edge geometries oriented along the travel direction.
    pub fn directed_components(&self) -> Vec<LineString<f64>> {
        self.edges().iter().map(|pe| pe.directed_geometry()).collect()
    }

    /// Whole-path polyline in travel orientation.
    pub fn polyline(&self) -> Result<LineString<f64>> {
        let components = self.directed_components();
        if components.is_empty() {
            return Err(TrackError::Contract(
                "null path carries no geometry".into(),
            ));
        }
        let mut coords: Vec<Coord<f64>> = Vec::new();
        for line in &components {
            for c in line.coords() {
                if coords.last() != Some(c) {
                    coords.push(*c);
                }
            }
        }
        Ok(LineString::new(coords))
    }

    /// Clamp a signed arc length onto the path, within tolerance at the
    /// ends.
    pub fn clamp_distance(&self, s: f64) -> f64 {
        let total = self.total_length();
        let sign = self.direction_sign();
        sign * (sign * s).clamp(0.0, total)
    }
}
