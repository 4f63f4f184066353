//! Colinear line-merge: union of two polylines sharing a coordinate run.
//!
//! Shared runs are matched by exact coordinate equality, the same equality
//! edges are keyed by. Used only by path merging.

use geo::{Coord, LineString};

use super::polyline::reverse;

/// Outcome of merging polyline `b` onto polyline `a`.
#[derive(Clone, Debug)]
pub struct LineOverlap {
    /// Union polyline, oriented along `a`.
    pub merged: LineString<f64>,
    /// Whether `b` had to be reversed to align with `a`.
    pub b_reversed: bool,
    /// Number of coordinates in the shared run.
    pub shared: usize,
    /// `a` is wholly contained in `b`.
    pub a_remainder_empty: bool,
    /// `b` is wholly contained in `a`.
    pub b_remainder_empty: bool,
}

fn coords(line: &LineString<f64>) -> Vec<Coord<f64>> {
    line.coords().copied().collect()
}

/// Longest `k` with `a`'s k-suffix equal to `b`'s k-prefix.
fn suffix_prefix_overlap(a: &[Coord<f64>], b: &[Coord<f64>]) -> usize {
    let max = a.len().min(b.len());
    for k in (1..=max).rev() {
        if a[a.len() - k..] == b[..k] {
            return k;
        }
    }
    0
}

/// Whether `needle` appears as a contiguous coordinate run inside `hay`.
fn contains_run(hay: &[Coord<f64>], needle: &[Coord<f64>]) -> bool {
    if needle.len() > hay.len() {
        return false;
    }
    hay.windows(needle.len()).any(|w| w == needle)
}

fn try_orientation(a: &[Coord<f64>], b: &[Coord<f64>], b_reversed: bool) -> Option<LineOverlap> {
    if contains_run(a, b) {
        return Some(LineOverlap {
            merged: LineString::new(a.to_vec()),
            b_reversed,
            shared: b.len(),
            a_remainder_empty: false,
            b_remainder_empty: true,
        });
    }
    if contains_run(b, a) {
        return Some(LineOverlap {
            merged: LineString::new(b.to_vec()),
            b_reversed,
            shared: a.len(),
            a_remainder_empty: true,
            b_remainder_empty: false,
        });
    }
    let k = suffix_prefix_overlap(a, b);
    if k >= 1 {
        let mut merged = a.to_vec();
        merged.extend_from_slice(&b[k..]);
        return Some(LineOverlap {
            merged: LineString::new(merged),
            b_reversed,
            shared: k,
            a_remainder_empty: false,
            b_remainder_empty: false,
        });
    }
    None
}

/// Merge `b` onto the tail of `a`, reversing `b` when its native orientation
/// does not align. Returns `None` when the polylines share no coordinates.
pub fn merge_lines(a: &LineString<f64>, b: &LineString<f64>) -> Option<LineOverlap> {
    let ac = coords(a);
    let bc = coords(b);
    if ac.is_empty() || bc.is_empty() {
        return None;
    }
    if let Some(overlap) = try_orientation(&ac, &bc, false) {
        return Some(overlap);
    }
    let b_rev = coords(&reverse(b));
    try_orientation(&ac, &b_rev, true)
}
