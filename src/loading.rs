//! Observation operator of a state block.

use ndarray::{Array1, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

/// Observation operator mapping a state block to a scalar measurement.
///
/// For a block of dimension `n` the loading is a `1 x n` row `z`, and the
/// expected observation is `z · x`. As with [`crate::Dynamics`], every
/// operation exists in a materialized form (`z`) and operator forms
/// (`zx`, `zvz`, `vp_zdz`, `xp_zd`) that must agree exactly.
///
/// `z` expects a zero-initialized buffer and writes only the entries it owns.
pub trait Loading: Send + Sync {
    /// Fills the `1 x n` loading row at position `pos`.
    fn z(&self, pos: usize, z: ArrayViewMut1<f64>);

    /// Returns `z(pos) · x`.
    fn zx(&self, pos: usize, x: ArrayView1<f64>) -> f64;

    /// Returns `z(pos) · V · z(pos)ᵗ`.
    fn zvz(&self, pos: usize, v: ArrayView2<f64>) -> f64;

    /// Rank-one covariance update in place: `V <- V + d · zᵗ·z`.
    fn vp_zdz(&self, pos: usize, v: ArrayViewMut2<f64>, d: f64);

    /// In-place `x <- x + d · z`.
    fn xp_zd(&self, pos: usize, x: ArrayViewMut1<f64>, d: f64);

    /// Whether the loading row is the same at every position.
    fn is_time_invariant(&self) -> bool;
}

/// Time-invariant loading holding an explicit weight row.
///
/// The workhorse loading: a fixed linear combination of the block's state.
/// [`Coefficients::at_position`] builds the common "read one state element"
/// case (e.g. the level of a local-level block).
#[derive(Clone, Debug)]
pub struct Coefficients {
    z: Array1<f64>,
}

impl Coefficients {
    /// Creates a loading from an explicit weight row.
    pub fn new(z: Array1<f64>) -> Self {
        Self { z }
    }

    /// Creates a unit loading reading state element `index` of a block of
    /// dimension `dim`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= dim` (programmer error).
    pub fn at_position(dim: usize, index: usize) -> Self {
        assert!(index < dim, "loading index {index} out of range for dim {dim}");
        let mut z = Array1::zeros(dim);
        z[index] = 1.0;
        Self { z }
    }

    /// Returns the weight row.
    pub fn weights(&self) -> &Array1<f64> {
        &self.z
    }

    /// Dimension of the block this loading observes.
    pub fn dim(&self) -> usize {
        self.z.len()
    }
}

impl Loading for Coefficients {
    fn z(&self, _pos: usize, mut z: ArrayViewMut1<f64>) {
        z.assign(&self.z);
    }

    fn zx(&self, _pos: usize, x: ArrayView1<f64>) -> f64 {
        self.z.dot(&x)
    }

    fn zvz(&self, _pos: usize, v: ArrayView2<f64>) -> f64 {
        self.z.dot(&v.dot(&self.z))
    }

    fn vp_zdz(&self, _pos: usize, mut v: ArrayViewMut2<f64>, d: f64) {
        for (i, zi) in self.z.iter().enumerate() {
            if *zi == 0.0 {
                continue;
            }
            for (j, zj) in self.z.iter().enumerate() {
                v[[i, j]] += d * zi * zj;
            }
        }
    }

    fn xp_zd(&self, _pos: usize, mut x: ArrayViewMut1<f64>, d: f64) {
        x.scaled_add(d, &self.z);
    }

    fn is_time_invariant(&self) -> bool {
        true
    }
}
