//! Materialized caches for time-invariant dynamics and loadings.

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::cholesky::{lcholesky, ZERO};
use crate::dynamics::Dynamics;
use crate::error::SsfError;
use crate::loading::{Coefficients, Loading};

/// Time-invariant dynamics with eagerly materialized matrices.
///
/// Wraps any time-invariant transition/innovation law into explicit `T` and
/// `V` matrices (plus a Cholesky factor of `V`), trading one materialization
/// at construction for the elimination of repeated per-position recomputation.
/// A pure optimization: every operation agrees numerically with the wrapped
/// instance.
#[derive(Clone, Debug)]
pub struct TimeInvariantDynamics {
    t: Array2<f64>,
    v: Array2<f64>,
    l: Array2<f64>,
    has_innovations: bool,
}

impl TimeInvariantDynamics {
    /// Creates time-invariant dynamics from explicit `T` and `V` matrices.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`SsfError::CovarianceNotSquare`] | `t` or `v` not square, or sizes differ |
    /// | [`SsfError::IllConditioned`] | `v` not positive semi-definite within the jitter tolerance |
    pub fn new(t: Array2<f64>, v: Array2<f64>) -> Result<Self, SsfError> {
        let n = t.nrows();
        if t.ncols() != n {
            return Err(SsfError::CovarianceNotSquare {
                nrows: t.nrows(),
                ncols: t.ncols(),
            });
        }
        if v.dim() != (n, n) {
            return Err(SsfError::CovarianceNotSquare {
                nrows: v.nrows(),
                ncols: v.ncols(),
            });
        }
        let mut l = v.clone();
        lcholesky(&mut l, ZERO)?;
        let has_innovations = v.iter().any(|x| *x != 0.0);
        Ok(Self {
            t,
            v,
            l,
            has_innovations,
        })
    }

    /// Materializes any time-invariant dynamics at position 0.
    ///
    /// # Errors
    ///
    /// Propagates [`SsfError::IllConditioned`] from the factorization of the
    /// materialized innovation covariance.
    pub fn of<D: Dynamics + ?Sized>(inner: &D) -> Result<Self, SsfError> {
        let n = inner.state_dim();
        let mut t = Array2::zeros((n, n));
        inner.t(0, t.view_mut());
        let mut v = Array2::zeros((n, n));
        inner.v(0, v.view_mut());
        Self::new(t, v)
    }

    /// The materialized transition matrix.
    pub fn transition(&self) -> &Array2<f64> {
        &self.t
    }

    /// The materialized innovation covariance.
    pub fn innovation_covariance(&self) -> &Array2<f64> {
        &self.v
    }
}

impl Dynamics for TimeInvariantDynamics {
    fn state_dim(&self) -> usize {
        self.t.nrows()
    }

    fn innovations_dim(&self) -> usize {
        if self.has_innovations {
            self.t.nrows()
        } else {
            0
        }
    }

    fn t(&self, _pos: usize, mut m: ArrayViewMut2<f64>) {
        m.assign(&self.t);
    }

    fn tx(&self, _pos: usize, mut x: ArrayViewMut1<f64>) {
        let y = self.t.dot(&x);
        x.assign(&y);
    }

    fn xt(&self, _pos: usize, mut x: ArrayViewMut1<f64>) {
        let y = self.t.t().dot(&x);
        x.assign(&y);
    }

    fn v(&self, _pos: usize, mut q: ArrayViewMut2<f64>) {
        q.assign(&self.v);
    }

    fn add_v(&self, _pos: usize, mut p: ArrayViewMut2<f64>) {
        p += &self.v;
    }

    fn s(&self, _pos: usize, mut s: ArrayViewMut2<f64>) {
        if self.has_innovations {
            s.assign(&self.l);
        }
    }

    fn add_su(&self, _pos: usize, mut x: ArrayViewMut1<f64>, u: ArrayView1<f64>) {
        if self.has_innovations {
            x += &self.l.dot(&u);
        }
    }

    fn xs(&self, _pos: usize, x: ArrayView1<f64>, mut xs: ArrayViewMut1<f64>) {
        if self.has_innovations {
            xs.assign(&self.l.t().dot(&x));
        }
    }

    fn has_innovations(&self, _pos: usize) -> bool {
        self.has_innovations
    }

    fn is_time_invariant(&self) -> bool {
        true
    }

    fn are_innovations_time_invariant(&self) -> bool {
        true
    }
}

/// Time-invariant loading with an eagerly materialized row.
///
/// Wraps any time-invariant loading into an explicit weight row; delegates
/// everything to [`Coefficients`].
#[derive(Clone, Debug)]
pub struct TimeInvariantLoading {
    inner: Coefficients,
}

impl TimeInvariantLoading {
    /// Materializes a time-invariant loading of dimension `dim` at position 0.
    pub fn of<L: Loading + ?Sized>(loading: &L, dim: usize) -> Self {
        let mut z = Array1::zeros(dim);
        loading.z(0, z.view_mut());
        Self {
            inner: Coefficients::new(z),
        }
    }

    /// The materialized weight row.
    pub fn weights(&self) -> &Array1<f64> {
        self.inner.weights()
    }
}

impl Loading for TimeInvariantLoading {
    fn z(&self, pos: usize, z: ArrayViewMut1<f64>) {
        self.inner.z(pos, z);
    }

    fn zx(&self, pos: usize, x: ArrayView1<f64>) -> f64 {
        self.inner.zx(pos, x)
    }

    fn zvz(&self, pos: usize, v: ndarray::ArrayView2<f64>) -> f64 {
        self.inner.zvz(pos, v)
    }

    fn vp_zdz(&self, pos: usize, v: ArrayViewMut2<f64>, d: f64) {
        self.inner.vp_zdz(pos, v, d);
    }

    fn xp_zd(&self, pos: usize, x: ArrayViewMut1<f64>, d: f64) {
        self.inner.xp_zd(pos, x, d);
    }

    fn is_time_invariant(&self) -> bool {
        true
    }
}
