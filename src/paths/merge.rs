//! Path merging under orientation ambiguity.
//!
//! Joins two paths whose geometries share a colinear run, reorienting the
//! second when its native direction disagrees. Callers that require an
//! overlap treat `None` as a topology error.

use super::path::Path;
use crate::error::Result;
use crate::geometry::{merge_lines, reverse};
use geo::LineString;

/// Result of merging `to` onto `from`.
#[derive(Clone, Debug)]
pub struct MergedPath {
    /// Union polyline, oriented along `from`.
    pub geometry: LineString<f64>,
    /// Whether `to` was reversed to align the overlap.
    pub to_is_reversed: bool,
}

/// Merge the geometries of two paths over their shared colinear run.
///
/// When one path's non-overlapping remainder is empty, the other path's
/// geometry is returned wholesale. When the first orientation pass finds no
/// overlap, `to` is reversed outright and the match retried once before
/// giving up. Returns `None` for disjoint or null paths.
pub fn merge_paths(from: &Path, to: &Path) -> Result<Option<MergedPath>> {
    if from.is_null() || to.is_null() {
        return Ok(None);
    }
    let from_line = from.polyline()?;
    let to_line = to.polyline()?;

    if let Some(overlap) = merge_lines(&from_line, &to_line) {
        let geometry = if overlap.a_remainder_empty {
            // from is contained in to: take to wholesale, oriented with from.
            if overlap.b_reversed {
                reverse(&to_line)
            } else {
                to_line
            }
        } else if overlap.b_remainder_empty {
            from_line
        } else {
            overlap.merged
        };
        return Ok(Some(MergedPath {
            geometry,
            to_is_reversed: overlap.b_reversed,
        }));
    }

    // Last-resort reversal of `to`. merge_lines already tries the reversed
    // orientation against from's tail, so this only catches overlaps hidden
    // from the suffix scan by from's own orientation.
    let to_reversed = reverse(&to_line);
    if let Some(overlap) = merge_lines(&to_reversed, &from_line) {
        return Ok(Some(MergedPath {
            geometry: overlap.merged,
            to_is_reversed: true,
        }));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polyline_length;
    use crate::graph::RoadEdge;
    use approx::assert_relative_eq;
    use geo::Coord;
    use std::sync::Arc;

    fn edge(id: u64, coords: &[(f64, f64)]) -> Arc<RoadEdge> {
        Arc::new(RoadEdge::new(
            id,
            LineString::new(coords.iter().map(|&(x, y)| Coord { x, y }).collect()),
            false,
        ))
    }

    #[test]
    fn test_merge_continuation() {
        let from = Path::from_edge(edge(1, &[(0.0, 0.0), (100.0, 0.0)]), false).unwrap();
        let to = Path::from_edge(edge(2, &[(100.0, 0.0), (200.0, 0.0)]), false).unwrap();
        let m = merge_paths(&from, &to).unwrap().unwrap();
        assert!(!m.to_is_reversed);
        assert_relative_eq!(polyline_length(&m.geometry), 200.0);
    }

    #[test]
    fn test_merge_opposite_orientation() {
        // from = A -> B, to = B -> A over the same geometry: the union is the
        // single span with to reversed.
        let from = Path::from_edge(edge(1, &[(0.0, 0.0), (100.0, 0.0)]), false).unwrap();
        let to = Path::from_edge(edge(2, &[(100.0, 0.0), (0.0, 0.0)]), false).unwrap();
        let m = merge_paths(&from, &to).unwrap().unwrap();
        assert!(m.to_is_reversed);
        assert_relative_eq!(polyline_length(&m.geometry), 100.0);
    }

    #[test]
    fn test_merge_wholesale_when_contained() {
        let from = Path::from_edge(edge(1, &[(100.0, 0.0), (200.0, 0.0)]), false).unwrap();
        let to = Path::from_edges(
            vec![
                edge(2, &[(0.0, 0.0), (100.0, 0.0)]),
                edge(3, &[(100.0, 0.0), (200.0, 0.0)]),
                edge(4, &[(200.0, 0.0), (300.0, 0.0)]),
            ],
            false,
        )
        .unwrap();
        let m = merge_paths(&from, &to).unwrap().unwrap();
        assert_relative_eq!(polyline_length(&m.geometry), 300.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_overlap_returns_none() {
        let from = Path::from_edge(edge(1, &[(0.0, 0.0), (100.0, 0.0)]), false).unwrap();
        let to = Path::from_edge(edge(2, &[(500.0, 500.0), (600.0, 500.0)]), false).unwrap();
        assert!(merge_paths(&from, &to).unwrap().is_none());
    }

    #[test]
    fn test_null_path_returns_none() {
        let from = Path::from_edge(edge(1, &[(0.0, 0.0), (100.0, 0.0)]), false).unwrap();
        assert!(merge_paths(&from, &Path::null()).unwrap().is_none());
        assert!(merge_paths(&Path::null(), &from).unwrap().is_none());
    }
}
