//! Heteroskedastic noise modelled as a latent state.

use std::sync::Arc;

use ndarray::{ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::dynamics::Dynamics;
use crate::initialization::ProperInitialization;
use crate::loading::Coefficients;
use crate::system::{Ssf, StateComponent};

/// One-dimensional noise-as-state block with per-period scale factors.
///
/// The block carries no memory (zero transition); at position `pos` its
/// innovation variance is `(scale * std[pos])^2`. Once the `std` schedule is
/// exhausted the variance falls back to `scale^2` alone — an explicit policy,
/// matching the tail recycling of [`crate::MeasurementError`]. An empty
/// schedule gives homoskedastic noise of variance `scale^2` everywhere.
///
/// Used to model time-varying observation noise inside the state vector,
/// e.g. for weighted temporal disaggregation.
#[derive(Clone, Debug)]
pub struct VarNoise {
    scale: f64,
    std: Vec<f64>,
}

impl VarNoise {
    /// Creates a noise block with overall `scale` and per-period standard
    /// deviations `std`.
    pub fn new(scale: f64, std: Vec<f64>) -> Self {
        Self { scale, std }
    }

    /// Standard deviation at position `pos` (`scale` alone past the schedule).
    fn sd(&self, pos: usize) -> f64 {
        match self.std.get(pos) {
            Some(s) => self.scale * s,
            None => self.scale,
        }
    }

    /// Innovation variance at position `pos`.
    pub fn variance(&self, pos: usize) -> f64 {
        let sd = self.sd(pos);
        sd * sd
    }

    /// Wraps this block into a ready-to-compose component: zero initial mean,
    /// initial variance `variance(0)`, observed directly.
    pub fn component(self) -> (StateComponent, Arc<Coefficients>) {
        let pf0 = ndarray::Array2::from_elem((1, 1), self.variance(0));
        let init = ProperInitialization::new(ndarray::Array1::zeros(1), pf0);
        let component = StateComponent::new(Arc::new(init), Arc::new(self));
        (component, Arc::new(Coefficients::at_position(1, 0)))
    }

    /// Wraps this block into a complete single-block system.
    pub fn system(self) -> Ssf {
        let (component, loading) = self.component();
        Ssf::new(component, loading)
    }
}

impl Dynamics for VarNoise {
    fn state_dim(&self) -> usize {
        1
    }

    fn innovations_dim(&self) -> usize {
        1
    }

    fn t(&self, _pos: usize, _m: ArrayViewMut2<f64>) {
        // Zero transition: the block is redrawn each period.
    }

    fn tx(&self, _pos: usize, mut x: ArrayViewMut1<f64>) {
        x[0] = 0.0;
    }

    fn xt(&self, _pos: usize, mut x: ArrayViewMut1<f64>) {
        x[0] = 0.0;
    }

    fn v(&self, pos: usize, mut q: ArrayViewMut2<f64>) {
        q[[0, 0]] = self.variance(pos);
    }

    fn add_v(&self, pos: usize, mut p: ArrayViewMut2<f64>) {
        p[[0, 0]] += self.variance(pos);
    }

    fn s(&self, pos: usize, mut s: ArrayViewMut2<f64>) {
        s[[0, 0]] = self.sd(pos);
    }

    fn add_su(&self, pos: usize, mut x: ArrayViewMut1<f64>, u: ArrayView1<f64>) {
        x[0] += self.sd(pos) * u[0];
    }

    fn xs(&self, pos: usize, x: ArrayView1<f64>, mut xs: ArrayViewMut1<f64>) {
        xs[0] = self.sd(pos) * x[0];
    }

    fn has_innovations(&self, _pos: usize) -> bool {
        true
    }

    fn is_time_invariant(&self) -> bool {
        true
    }

    fn are_innovations_time_invariant(&self) -> bool {
        self.std.is_empty()
    }
}
