//! Transition/innovation law of a state block.

use ndarray::{Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2, Axis};

/// Transition and innovation law of one state block.
///
/// The state of a block of dimension `n` evolves as
///
/// ```text
/// x[t+1] = T(t) * x[t] + S(t) * u[t],   u[t] ~ N(0, I_m)
/// ```
///
/// where `T` is the `n x n` transition matrix and `S` the `n x m` innovation
/// square root (`S·Sᵗ = V`, the innovation covariance).
///
/// Every operation exists in a matrix form (`t`, `v`, `s`) and an operator
/// form (`tx`, `xt`, `tm`, `tvt`, `add_v`, `add_su`, `xs`) that never
/// materializes the matrix. The two forms must agree exactly: callers pick
/// the matrix form for clarity and the operator form for speed, and may mix
/// them freely. The default operator methods are derived from `tx`/`xt`/`v`
/// and satisfy this automatically; overriding implementations carry the
/// obligation themselves.
///
/// Matrix fill methods expect zero-initialized buffers and write only the
/// entries they own.
pub trait Dynamics: Send + Sync {
    /// Dimension of this state block.
    fn state_dim(&self) -> usize;

    /// Dimension of the innovation vector (`m`, possibly zero).
    fn innovations_dim(&self) -> usize;

    /// Fills the `n x n` transition matrix at position `pos`.
    fn t(&self, pos: usize, m: ArrayViewMut2<f64>);

    /// Applies the transition in place: `x <- T(pos) * x`.
    fn tx(&self, pos: usize, x: ArrayViewMut1<f64>);

    /// Applies the transposed transition in place: `x <- T(pos)ᵗ * x`.
    fn xt(&self, pos: usize, x: ArrayViewMut1<f64>);

    /// Applies the transition to every column of `m` in place: `M <- T * M`.
    fn tm(&self, pos: usize, mut m: ArrayViewMut2<f64>) {
        for col in m.axis_iter_mut(Axis(1)) {
            self.tx(pos, col);
        }
    }

    /// Propagates a covariance in place: `V <- T * V * Tᵗ`.
    fn tvt(&self, pos: usize, mut v: ArrayViewMut2<f64>) {
        for col in v.axis_iter_mut(Axis(1)) {
            self.tx(pos, col);
        }
        // Row i of (T·V)·Tᵗ is T applied to row i of T·V.
        for row in v.axis_iter_mut(Axis(0)) {
            self.tx(pos, row);
        }
    }

    /// Fills the `n x n` innovation covariance at position `pos`.
    fn v(&self, pos: usize, q: ArrayViewMut2<f64>);

    /// Adds the innovation covariance into `p`: `P <- P + V(pos)`.
    ///
    /// Used by the covariance propagation `P <- T·P·Tᵗ + V`.
    fn add_v(&self, pos: usize, mut p: ArrayViewMut2<f64>) {
        let n = self.state_dim();
        let mut q = Array2::zeros((n, n));
        self.v(pos, q.view_mut());
        p += &q;
    }

    /// Fills the `n x m` innovation square-root factor (`S·Sᵗ = V`).
    ///
    /// The default is a no-op for innovation-free blocks and a capability
    /// panic otherwise.
    fn s(&self, pos: usize, s: ArrayViewMut2<f64>) {
        let _ = (pos, s);
        if self.innovations_dim() > 0 {
            panic!("innovation square root not supported by this dynamics");
        }
    }

    /// Applies the factor without materializing it: `x <- x + S(pos) * u`.
    ///
    /// Defaults like [`Dynamics::s`]: no-op without innovations, capability
    /// panic with them.
    fn add_su(&self, pos: usize, x: ArrayViewMut1<f64>, u: ArrayView1<f64>) {
        let _ = (pos, x, u);
        if self.innovations_dim() > 0 {
            panic!("innovation square root not supported by this dynamics");
        }
    }

    /// Applies the transposed factor: `xs <- S(pos)ᵗ * x`.
    ///
    /// Defaults like [`Dynamics::s`]: no-op without innovations, capability
    /// panic with them.
    fn xs(&self, pos: usize, x: ArrayView1<f64>, xs: ArrayViewMut1<f64>) {
        let _ = (pos, x, xs);
        if self.innovations_dim() > 0 {
            panic!("innovation square root not supported by this dynamics");
        }
    }

    /// Whether the block receives an innovation at position `pos`.
    fn has_innovations(&self, pos: usize) -> bool {
        let _ = pos;
        self.innovations_dim() > 0
    }

    /// Whether the transition is the same at every position.
    fn is_time_invariant(&self) -> bool;

    /// Whether the innovation covariance is the same at every position.
    fn are_innovations_time_invariant(&self) -> bool;
}
