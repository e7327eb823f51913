//! Loading decorators: temporal shifts and externally-estimated effects.

use std::sync::Arc;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

use crate::error::SsfError;
use crate::loading::Loading;
use crate::regression::DesignLoading;

/// Evaluates a wrapped loading at `pos + shift`.
///
/// Reuses one block's measurement definition for a lead/lag view, e.g.
/// reading a seasonal block one period ahead. A negative effective position
/// clamps to 0 — an explicit policy, tested below; out-of-range on the far
/// end remains the wrapped loading's concern.
#[derive(Clone)]
pub struct ShiftedLoading {
    inner: Arc<dyn Loading>,
    shift: i64,
}

impl ShiftedLoading {
    /// Wraps `inner`, shifting every evaluation by `shift` periods.
    pub fn new(inner: Arc<dyn Loading>, shift: i64) -> Self {
        Self { inner, shift }
    }

    fn at(&self, pos: usize) -> usize {
        (pos as i64 + self.shift).max(0) as usize
    }
}

impl std::fmt::Debug for ShiftedLoading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShiftedLoading")
            .field("shift", &self.shift)
            .finish()
    }
}

impl Loading for ShiftedLoading {
    fn z(&self, pos: usize, z: ArrayViewMut1<f64>) {
        self.inner.z(self.at(pos), z);
    }

    fn zx(&self, pos: usize, x: ArrayView1<f64>) -> f64 {
        self.inner.zx(self.at(pos), x)
    }

    fn zvz(&self, pos: usize, v: ArrayView2<f64>) -> f64 {
        self.inner.zvz(self.at(pos), v)
    }

    fn vp_zdz(&self, pos: usize, v: ArrayViewMut2<f64>, d: f64) {
        self.inner.vp_zdz(self.at(pos), v, d);
    }

    fn xp_zd(&self, pos: usize, x: ArrayViewMut1<f64>, d: f64) {
        self.inner.xp_zd(self.at(pos), x, d);
    }

    fn is_time_invariant(&self) -> bool {
        self.inner.is_time_invariant()
    }
}

/// Regression effects whose coefficients were estimated elsewhere.
///
/// Extends a loading of dimension `dim` with the rows of a design matrix,
/// exactly like a fixed-coefficient augmentation's loading, but without
/// adding state: the extra directions are expected to be filled with the
/// externally supplied coefficient values rather than filtered.
#[derive(Clone)]
pub struct ExternalEffects {
    inner: Arc<dyn Loading>,
    dim: usize,
    design: Arc<DesignLoading>,
    nx: usize,
    rows_one: bool,
}

impl ExternalEffects {
    /// Wraps `inner` (a loading over a `dim`-dimensional block) with the
    /// effect columns of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`SsfError::EmptyDesign`] when `x` has no rows or columns.
    pub fn new(inner: Arc<dyn Loading>, dim: usize, x: Array2<f64>) -> Result<Self, SsfError> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(SsfError::EmptyDesign);
        }
        let nx = x.ncols();
        let rows_one = x.nrows() == 1;
        Ok(Self {
            inner,
            dim,
            design: Arc::new(DesignLoading::new(x)),
            nx,
            rows_one,
        })
    }

    /// Total dimension observed by this loading.
    pub fn dim(&self) -> usize {
        self.dim + self.nx
    }

    fn materialize(&self, pos: usize) -> Array1<f64> {
        let mut z = Array1::zeros(self.dim + self.nx);
        self.inner.z(pos, z.slice_mut(s![..self.dim]));
        self.design.z(pos, z.slice_mut(s![self.dim..]));
        z
    }
}

impl std::fmt::Debug for ExternalEffects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalEffects")
            .field("dim", &self.dim)
            .field("nx", &self.nx)
            .finish()
    }
}

impl Loading for ExternalEffects {
    fn z(&self, pos: usize, mut z: ArrayViewMut1<f64>) {
        self.inner.z(pos, z.slice_mut(s![..self.dim]));
        self.design.z(pos, z.slice_mut(s![self.dim..]));
    }

    fn zx(&self, pos: usize, x: ArrayView1<f64>) -> f64 {
        self.inner.zx(pos, x.slice(s![..self.dim]))
            + self.design.zx(pos, x.slice(s![self.dim..]))
    }

    fn zvz(&self, pos: usize, v: ArrayView2<f64>) -> f64 {
        // Cross terms between the block and the effect columns matter.
        let z = self.materialize(pos);
        z.dot(&v.dot(&z))
    }

    fn vp_zdz(&self, pos: usize, mut v: ArrayViewMut2<f64>, d: f64) {
        let z = self.materialize(pos);
        for (i, zi) in z.iter().enumerate() {
            if *zi == 0.0 {
                continue;
            }
            for (j, zj) in z.iter().enumerate() {
                v[[i, j]] += d * zi * zj;
            }
        }
    }

    fn xp_zd(&self, pos: usize, mut x: ArrayViewMut1<f64>, d: f64) {
        self.inner.xp_zd(pos, x.slice_mut(s![..self.dim]), d);
        self.design.xp_zd(pos, x.slice_mut(s![self.dim..]), d);
    }

    fn is_time_invariant(&self) -> bool {
        self.inner.is_time_invariant() && self.rows_one
    }
}
