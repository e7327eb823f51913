//! Initial-condition description of a state block.

use ndarray::{Array1, Array2, ArrayViewMut1, ArrayViewMut2};

/// Initial condition of one state block at time zero.
///
/// The initial state splits into a *finite* part (mean `a0`, covariance
/// `Pf0`) and a *diffuse* part: directions whose initial variance is
/// unbounded, used to represent unknown constants. `diffuse_constraints`
/// spans the diffuse subspace and `pi0` is its indicator covariance.
///
/// All fill methods expect zero-initialized buffers and write only the
/// entries they own; this is what lets a block-diagonal composite delegate
/// each block to a window of the full buffer.
///
/// Implementations are immutable and shared read-only across threads.
pub trait Initialization: Send + Sync {
    /// Dimension of this state block.
    fn state_dim(&self) -> usize;

    /// Whether any direction has unbounded initial variance.
    fn is_diffuse(&self) -> bool {
        self.diffuse_dim() > 0
    }

    /// Number of diffuse directions (`0..=state_dim`).
    fn diffuse_dim(&self) -> usize;

    /// Fills the `state_dim x diffuse_dim` matrix whose columns span the
    /// diffuse subspace.
    fn diffuse_constraints(&self, b: ArrayViewMut2<f64>);

    /// Fills the finite part of the initial state mean.
    fn a0(&self, a: ArrayViewMut1<f64>);

    /// Fills the finite part of the initial state covariance
    /// (`state_dim x state_dim`).
    fn pf0(&self, p: ArrayViewMut2<f64>);

    /// Fills the diffuse indicator covariance: identity on the diffuse
    /// subspace, zero elsewhere.
    fn pi0(&self, p: ArrayViewMut2<f64>);
}

/// Initial condition with finite mean and covariance on every direction.
#[derive(Clone, Debug)]
pub struct ProperInitialization {
    a0: Array1<f64>,
    pf0: Array2<f64>,
}

impl ProperInitialization {
    /// Creates a proper initial condition from a mean vector and covariance.
    ///
    /// # Panics
    ///
    /// Panics if `pf0` is not `a0.len() x a0.len()` — a programmer error,
    /// these are crate-assembled values.
    pub fn new(a0: Array1<f64>, pf0: Array2<f64>) -> Self {
        assert_eq!(
            (a0.len(), a0.len()),
            pf0.dim(),
            "initial covariance must be square of the mean dimension"
        );
        Self { a0, pf0 }
    }

    /// A zero-mean, zero-covariance initial condition of dimension `dim`.
    pub fn zero(dim: usize) -> Self {
        Self {
            a0: Array1::zeros(dim),
            pf0: Array2::zeros((dim, dim)),
        }
    }
}

impl Initialization for ProperInitialization {
    fn state_dim(&self) -> usize {
        self.a0.len()
    }

    fn diffuse_dim(&self) -> usize {
        0
    }

    fn diffuse_constraints(&self, _b: ArrayViewMut2<f64>) {}

    fn a0(&self, mut a: ArrayViewMut1<f64>) {
        a.assign(&self.a0);
    }

    fn pf0(&self, mut p: ArrayViewMut2<f64>) {
        p.assign(&self.pf0);
    }

    fn pi0(&self, _p: ArrayViewMut2<f64>) {}
}

/// Initial condition where every direction is diffuse.
///
/// The finite part is zero; `pi0` and `diffuse_constraints` are identity.
#[derive(Clone, Copy, Debug)]
pub struct DiffuseInitialization {
    dim: usize,
}

impl DiffuseInitialization {
    /// Creates a fully diffuse initial condition of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Initialization for DiffuseInitialization {
    fn state_dim(&self) -> usize {
        self.dim
    }

    fn diffuse_dim(&self) -> usize {
        self.dim
    }

    fn diffuse_constraints(&self, mut b: ArrayViewMut2<f64>) {
        for i in 0..self.dim {
            b[[i, i]] = 1.0;
        }
    }

    fn a0(&self, _a: ArrayViewMut1<f64>) {}

    fn pf0(&self, _p: ArrayViewMut2<f64>) {}

    fn pi0(&self, mut p: ArrayViewMut2<f64>) {
        for i in 0..self.dim {
            p[[i, i]] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn proper_fills_mean_and_covariance() {
        let init = ProperInitialization::new(array![1.0, -2.0], array![[2.0, 0.5], [0.5, 3.0]]);
        assert_eq!(init.state_dim(), 2);
        assert_eq!(init.diffuse_dim(), 0);
        assert!(!init.is_diffuse());

        let mut a = Array1::zeros(2);
        init.a0(a.view_mut());
        assert_abs_diff_eq!(a[0], 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(a[1], -2.0, epsilon = 1e-14);

        let mut p = Array2::zeros((2, 2));
        init.pf0(p.view_mut());
        assert_abs_diff_eq!(p[[0, 1]], 0.5, epsilon = 1e-14);

        let mut pi = Array2::zeros((2, 2));
        init.pi0(pi.view_mut());
        assert_eq!(pi.sum(), 0.0);
    }

    #[test]
    fn proper_zero() {
        let init = ProperInitialization::zero(3);
        assert_eq!(init.state_dim(), 3);
        let mut a = Array1::zeros(3);
        init.a0(a.view_mut());
        assert_eq!(a.sum(), 0.0);
    }

    #[test]
    #[should_panic(expected = "square")]
    fn proper_rejects_mismatched_covariance() {
        ProperInitialization::new(array![0.0, 0.0], Array2::zeros((3, 3)));
    }

    #[test]
    fn diffuse_spans_everything() {
        let init = DiffuseInitialization::new(2);
        assert_eq!(init.state_dim(), 2);
        assert_eq!(init.diffuse_dim(), 2);
        assert!(init.is_diffuse());

        let mut b = Array2::zeros((2, 2));
        init.diffuse_constraints(b.view_mut());
        let mut pi = Array2::zeros((2, 2));
        init.pi0(pi.view_mut());
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(b[[i, j]], expected, epsilon = 1e-14);
                assert_abs_diff_eq!(pi[[i, j]], expected, epsilon = 1e-14);
            }
        }

        let mut pf = Array2::from_elem((2, 2), 0.0);
        init.pf0(pf.view_mut());
        assert_eq!(pf.sum(), 0.0);
    }

    #[test]
    fn implementations_are_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<ProperInitialization>();
        assert_impl::<DiffuseInitialization>();
    }
}
