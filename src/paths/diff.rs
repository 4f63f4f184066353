//! Path-state differencing.
//!
//! Expresses `to - from` for two on-road states whose paths overlap in one
//! of five canonical ways, resolved by comparing the directed geometries of
//! their boundary edges. The result `[Δs, Δv]` lives in `to`'s frame. Two
//! off-road states subtract directly in ground coordinates; a mix of modes
//! is a contract violation, and paths matching no case are a topology error.

use super::path::PathEdge;
use super::state::PathState;
use crate::error::{Result, TrackError};
use crate::geometry::reverse;
use geo::LineString;
use nalgebra::DVector;

fn geom_eq(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    a.coords().count() == b.coords().count() && a.coords().zip(b.coords()).all(|(p, q)| p == q)
}

fn geom_rev_eq(a: &LineString<f64>, b: &LineString<f64>) -> bool {
    geom_eq(a, &reverse(b))
}

/// Positive-form `(s, v)` of a path state: arc length from the path start
/// along the travel direction, velocity positive in the travel direction.
fn positive_form(ps: &PathState, use_raw: bool) -> (f64, f64) {
    let state = if use_raw {
        ps.raw_state().clone()
    } else {
        ps.state()
    };
    let sign = ps.path().direction_sign();
    (sign * state[0], sign * state[1])
}

fn abs_dist_to_start(pe: &PathEdge) -> f64 {
    pe.dist_to_start.abs()
}

/// Difference `to - from` between two path states.
pub fn state_diff(from: &PathState, to: &PathState, use_raw: bool) -> Result<DVector<f64>> {
    match (from.is_on_road(), to.is_on_road()) {
        (false, false) => {
            // Free motion on both sides: plain ground subtraction.
            return Ok(to.raw_state() - from.raw_state());
        }
        (true, true) => {}
        _ => {
            return Err(TrackError::Contract(
                "state_diff requires both states on-road or both off-road".into(),
            ));
        }
    }

    let from_path = from.path();
    let to_path = to.path();
    let from_first = from_path.first_edge().expect("on-road path has edges");
    let from_last = from_path.last_edge().expect("on-road path has edges");
    let to_first = to_path.first_edge().expect("on-road path has edges");
    let to_last = to_path.last_edge().expect("on-road path has edges");

    let ff = from_first.directed_geometry();
    let fl = from_last.directed_geometry();
    let tf = to_first.directed_geometry();
    let tl = to_last.directed_geometry();

    let (s_from, v_from) = positive_form(from, use_raw);
    let (s_to, v_to) = positive_form(to, use_raw);

    let sum_max = from_path.total_length() + to_path.total_length();
    let shared_max = from_path.total_length().max(to_path.total_length());

    let (ds, dv, distance_max) = if geom_eq(&fl, &tf) && !geom_eq(&fl, &tl) {
        // Head to tail, same direction: to's origin sits at the start of
        // from's last edge.
        let d = abs_dist_to_start(from_last);
        (s_to - s_from + d, v_to - v_from, sum_max)
    } else if geom_eq(&ff, &tf) {
        // Shared origin, same direction.
        (s_to - s_from, v_to - v_from, shared_max)
    } else if geom_rev_eq(&fl, &tf) {
        // Head to tail, reversed: to's origin is the far end of from's last
        // edge and to runs the other way.
        let d = abs_dist_to_start(from_last);
        let len = from_last.edge.length;
        (s_to + s_from - d - len, v_to + v_from, sum_max)
    } else if geom_rev_eq(&ff, &tf) {
        // Shared origin edge, reversed coordinate.
        let len = from_first.edge.length;
        (s_to + s_from - len, v_to + v_from, sum_max)
    } else if geom_eq(&ff, &tl) {
        // Reversed roles: from starts on to's last edge.
        let e = abs_dist_to_start(to_last);
        (s_to - e - s_from, v_to - v_from, sum_max)
    } else if geom_eq(&fl, &tf) {
        // Head to tail where the paths also end on the same edge; the
        // offset formula is unchanged.
        let d = abs_dist_to_start(from_last);
        (s_to - s_from + d, v_to - v_from, sum_max)
    } else {
        return Err(TrackError::Topology(format!(
            "paths share no boundary edge: from [{} edges] to [{} edges]",
            from_path.edges().len(),
            to_path.edges().len()
        )));
    };

    let result = DVector::from_vec(vec![ds, dv]);

    // Raw states may sit past the path ends, so the bound only holds for
    // clamped states.
    debug_assert!(
        use_raw || ds.abs() <= distance_max + 1.0,
        "arc-length difference {ds} exceeds case bound {distance_max}"
    );
    #[cfg(debug_assertions)]
    {
        if let (Ok(fg), Ok(tg)) = (from.ground_point(), to.ground_point()) {
            let chord_sq = (tg.x - fg.x).powi(2) + (tg.y - fg.y).powi(2);
            let along_sq = result.norm_squared();
            debug_assert!(
                chord_sq - along_sq <= 1.0,
                "chord {chord_sq} exceeds along-path difference {along_sq}"
            );
        }
    }

    Ok(result)
}
