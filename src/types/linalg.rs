//! Linear algebra constants for the dual-mode tracking filters.
//!
//! Dimension constants, the fixed observation/permutation matrices shared by
//! every particle, and the time-varying transition / noise-factor builders.
//! Ground states are ordered `[x, vx, y, vy]`; road states `[s, v_s]`.

use nalgebra::{DMatrix, DVector};
use std::sync::LazyLock;

// ===== State Dimensions =====
pub const GROUND_DIM: usize = 4;
pub const ROAD_DIM: usize = 2;
pub const OBS_DIM: usize = 2;

/// Ground observation matrix `O_g`: picks `(x, y)` out of `[x, vx, y, vy]`.
pub static GROUND_OBS_MATRIX: LazyLock<DMatrix<f64>> = LazyLock::new(|| {
    DMatrix::from_row_slice(
        OBS_DIM,
        GROUND_DIM,
        &[
            1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0,
        ],
    )
});

/// Road observation matrix `O_r`: picks arc-length out of `[s, v_s]`.
pub static ROAD_OBS_MATRIX: LazyLock<DMatrix<f64>> =
    LazyLock::new(|| DMatrix::from_row_slice(1, ROAD_DIM, &[1.0, 0.0]));

/// Coordinate-swap permutation mapping world order `(x, y, vx, vy)` to state
/// order `(x, vx, y, vy)`. Orthogonal, so its transpose inverts the swap.
pub static COORD_SWAP: LazyLock<DMatrix<f64>> = LazyLock::new(|| {
    DMatrix::from_row_slice(
        GROUND_DIM,
        GROUND_DIM,
        &[
            1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    )
});

/// Road-mode measurement error `diag(50, 0)`: the edge geometry itself is
/// inaccurate; velocity is never measured directly on-road.
pub static ROAD_MEASUREMENT_ERROR: LazyLock<DMatrix<f64>> = LazyLock::new(|| {
    DMatrix::from_diagonal(&DVector::from_vec(vec![
        crate::config::ROAD_MEASUREMENT_VARIANCE,
        0.0,
    ]))
});

/// Ground transition `A_g(dt)`: identity with `A[0,1] = A[2,3] = dt`.
pub fn ground_transition(dt: f64) -> DMatrix<f64> {
    let mut a = DMatrix::identity(GROUND_DIM, GROUND_DIM);
    a[(0, 1)] = dt;
    a[(2, 3)] = dt;
    a
}

/// Road transition `A_r(dt)`: identity with `A[0,1] = dt`.
pub fn road_transition(dt: f64) -> DMatrix<f64> {
    let mut a = DMatrix::identity(ROAD_DIM, ROAD_DIM);
    a[(0, 1)] = dt;
    a
}

/// Ground process-noise factor `F_g(dt)` (4x2): maps white acceleration in
/// `(ax, ay)` onto the `[x, vx, y, vy]` state.
pub fn ground_noise_factor(dt: f64) -> DMatrix<f64> {
    let dt2 = 0.5 * dt * dt;
    DMatrix::from_row_slice(
        GROUND_DIM,
        2,
        &[
            dt2, 0.0, //
            dt, 0.0, //
            0.0, dt2, //
            0.0, dt,
        ],
    )
}

/// Road process-noise factor `F_r(dt)` (2x1).
pub fn road_noise_factor(dt: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(ROAD_DIM, 1, &[0.5 * dt * dt, dt])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transitions_unit_diagonal_upper_triangular() {
        for &dt in &[0.1, 1.0, 2.5] {
            let ag = ground_transition(dt);
            let ar = road_transition(dt);
            for i in 0..GROUND_DIM {
                assert_relative_eq!(ag[(i, i)], 1.0);
                for j in 0..i {
                    assert_relative_eq!(ag[(i, j)], 0.0);
                }
            }
            for i in 0..ROAD_DIM {
                assert_relative_eq!(ar[(i, i)], 1.0);
            }
            assert_relative_eq!(ag[(0, 1)], dt);
            assert_relative_eq!(ag[(2, 3)], dt);
            assert_relative_eq!(ar[(0, 1)], dt);
        }
    }

    #[test]
    fn test_noise_factor_gramian() {
        // F * F^T must equal the limiting process-noise Gramian (unit Q).
        let dt = 0.5;
        let f = ground_noise_factor(dt);
        let gram = &f * f.transpose();
        let dt2 = 0.5 * dt * dt;
        assert_relative_eq!(gram[(0, 0)], dt2 * dt2);
        assert_relative_eq!(gram[(0, 1)], dt2 * dt);
        assert_relative_eq!(gram[(1, 1)], dt * dt);
        // x and y blocks are decoupled
        assert_relative_eq!(gram[(0, 2)], 0.0);
        assert_relative_eq!(gram[(1, 3)], 0.0);
    }

    #[test]
    fn test_coord_swap_is_involution() {
        let u = &*COORD_SWAP;
        let id = u * u;
        assert_relative_eq!(id, DMatrix::identity(GROUND_DIM, GROUND_DIM));
    }

    #[test]
    fn test_ground_obs_picks_position() {
        let state = DVector::from_vec(vec![3.0, 1.0, 4.0, 2.0]);
        let obs = &*GROUND_OBS_MATRIX * &state;
        assert_relative_eq!(obs[0], 3.0);
        assert_relative_eq!(obs[1], 4.0);
    }
}
