//! In-place lower Cholesky factorization with a jitter tolerance.
//!
//! The crate needs exactly one dense factorization: turning a coefficient
//! innovation covariance into its square-root factor. A small local kernel
//! covers all practical sizes (a handful of regression variables) without
//! reaching for a LAPACK binding.

use ndarray::Array2;

use crate::error::SsfError;

/// Default jitter tolerance for near-singular covariance inputs.
pub(crate) const ZERO: f64 = 1e-12;

/// Factorizes `m` in place into its lower Cholesky factor `L` (`L·Lᵗ = m`).
///
/// A diagonal pivot in `[-zero, zero]` is treated as exactly zero, provided
/// the reduced column below it is also negligible — that is the semi-definite
/// case, and the pivot and column are zeroed so positive semi-definite inputs
/// (and inputs within `zero` of one) still factorize. A pivot below `-zero`,
/// or a zero pivot with non-negligible mass below it (an indefinite matrix,
/// e.g. `[[0, 1], [1, 0]]`), aborts with [`SsfError::IllConditioned`].
///
/// The strict upper triangle of `m` is zeroed on success.
pub(crate) fn lcholesky(m: &mut Array2<f64>, zero: f64) -> Result<(), SsfError> {
    let n = m.nrows();
    debug_assert_eq!(n, m.ncols());

    for j in 0..n {
        let mut pivot = m[[j, j]];
        for k in 0..j {
            pivot -= m[[j, k]] * m[[j, k]];
        }
        if pivot < -zero {
            return Err(SsfError::IllConditioned { index: j, pivot });
        }
        if pivot <= zero {
            // A zero pivot is only admissible when the reduced column below
            // it vanishes too; otherwise the matrix is indefinite and a zero
            // factor would silently drop that mass.
            for i in (j + 1)..n {
                let mut s = m[[i, j]];
                for k in 0..j {
                    s -= m[[i, k]] * m[[j, k]];
                }
                if s.abs() > zero {
                    return Err(SsfError::IllConditioned { index: j, pivot });
                }
            }
            m[[j, j]] = 0.0;
            for i in (j + 1)..n {
                m[[i, j]] = 0.0;
            }
        } else {
            let l_jj = pivot.sqrt();
            m[[j, j]] = l_jj;
            for i in (j + 1)..n {
                let mut s = m[[i, j]];
                for k in 0..j {
                    s -= m[[i, k]] * m[[j, k]];
                }
                m[[i, j]] = s / l_jj;
            }
        }
        for i in 0..j {
            m[[i, j]] = 0.0;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn reconstruct(l: &Array2<f64>) -> Array2<f64> {
        l.dot(&l.t())
    }

    #[test]
    fn identity_is_its_own_factor() {
        let mut m = Array2::eye(3);
        lcholesky(&mut m, ZERO).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(m[[i, j]], expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn two_by_two_known_factor() {
        let mut m = array![[4.0, 2.0], [2.0, 5.0]];
        lcholesky(&mut m, ZERO).unwrap();
        assert_abs_diff_eq!(m[[0, 0]], 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(m[[1, 0]], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(m[[1, 1]], 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(m[[0, 1]], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn random_spd_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 1..=5 {
            // A·Aᵗ + I is symmetric positive definite.
            let a = Array2::from_shape_fn((n, n), |_| rng.gen_range(-1.0..1.0));
            let sigma = a.dot(&a.t()) + Array2::<f64>::eye(n);
            let mut l = sigma.clone();
            lcholesky(&mut l, ZERO).unwrap();
            let back = reconstruct(&l);
            for i in 0..n {
                for j in 0..n {
                    assert_abs_diff_eq!(back[[i, j]], sigma[[i, j]], epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn singular_rank_one_succeeds() {
        // Outer product of [1, 2] with itself: rank 1, smallest eigenvalue 0.
        let sigma = array![[1.0, 2.0], [2.0, 4.0]];
        let mut l = sigma.clone();
        lcholesky(&mut l, ZERO).unwrap();
        let back = reconstruct(&l);
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(back[[i, j]], sigma[[i, j]], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn near_singular_within_jitter_succeeds() {
        let eps = 1e-13;
        let sigma = array![[1.0, 1.0], [1.0, 1.0 + eps]];
        let mut l = sigma.clone();
        lcholesky(&mut l, ZERO).unwrap();
        let back = reconstruct(&l);
        for i in 0..2 {
            for j in 0..2 {
                assert!((back[[i, j]] - sigma[[i, j]]).abs() <= 10.0 * ZERO);
            }
        }
    }

    #[test]
    fn negative_definite_fails() {
        let mut m = array![[-1.0]];
        let err = lcholesky(&mut m, ZERO).unwrap_err();
        assert!(matches!(err, SsfError::IllConditioned { index: 0, .. }));
    }

    #[test]
    fn indefinite_zero_pivot_rejected() {
        // Eigenvalues ±1 but a zero leading pivot: must not factorize.
        let mut m = array![[0.0, 1.0], [1.0, 0.0]];
        let err = lcholesky(&mut m, ZERO).unwrap_err();
        assert!(matches!(err, SsfError::IllConditioned { index: 0, .. }));
    }

    #[test]
    fn indefinite_interior_zero_pivot_rejected() {
        // First column factorizes cleanly; the trailing 2x2 corner is the
        // indefinite [[0, 1], [1, 0]] block.
        let mut m = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]];
        let err = lcholesky(&mut m, ZERO).unwrap_err();
        assert!(matches!(err, SsfError::IllConditioned { index: 1, .. }));
    }

    #[test]
    fn indefinite_fails_past_jitter() {
        // Leading block fine, trailing pivot decisively negative.
        let mut m = array![[1.0, 0.0], [0.0, -1.0e-6]];
        let err = lcholesky(&mut m, ZERO).unwrap_err();
        assert!(matches!(err, SsfError::IllConditioned { index: 1, .. }));
    }

    #[test]
    fn upper_triangle_zeroed() {
        let mut m = array![[4.0, 2.0], [2.0, 5.0]];
        lcholesky(&mut m, ZERO).unwrap();
        assert_eq!(m[[0, 1]], 0.0);
    }
}
