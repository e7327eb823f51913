//! Deterministic (innovation-free) identity dynamics.

use ndarray::{ArrayViewMut1, ArrayViewMut2};

use crate::dynamics::Dynamics;

/// Identity transition with no innovations: a fixed, non-stochastic block.
///
/// Used for deterministic levels and for the appended block of a
/// fixed-coefficient regression augmentation, where the coefficients are
/// unknown constants carried unchanged through time.
#[derive(Clone, Copy, Debug)]
pub struct ConstantDynamics {
    dim: usize,
}

impl ConstantDynamics {
    /// Creates identity dynamics of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Dynamics for ConstantDynamics {
    fn state_dim(&self) -> usize {
        self.dim
    }

    fn innovations_dim(&self) -> usize {
        0
    }

    fn t(&self, _pos: usize, mut m: ArrayViewMut2<f64>) {
        for i in 0..self.dim {
            m[[i, i]] = 1.0;
        }
    }

    fn tx(&self, _pos: usize, _x: ArrayViewMut1<f64>) {}

    fn xt(&self, _pos: usize, _x: ArrayViewMut1<f64>) {}

    fn tm(&self, _pos: usize, _m: ArrayViewMut2<f64>) {}

    fn tvt(&self, _pos: usize, _v: ArrayViewMut2<f64>) {}

    fn v(&self, _pos: usize, _q: ArrayViewMut2<f64>) {}

    fn add_v(&self, _pos: usize, _p: ArrayViewMut2<f64>) {}

    fn has_innovations(&self, _pos: usize) -> bool {
        false
    }

    fn is_time_invariant(&self) -> bool {
        true
    }

    fn are_innovations_time_invariant(&self) -> bool {
        true
    }
}
