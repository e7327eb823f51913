//! Block-diagonal composition of state components.

use std::sync::Arc;

use ndarray::{s, Array1, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use tracing::debug;

use crate::dynamics::Dynamics;
use crate::initialization::Initialization;
use crate::loading::{Coefficients, Loading};
use crate::measurement_error::MeasurementError;
use crate::system::{Ssf, StateComponent};

/// Builder collecting ordered (component, loading) pairs.
///
/// # Example
///
/// ```ignore
/// let composite = CompositeBuilder::new()
///     .add(level, level_loading)
///     .add(seasonal, seasonal_loading)
///     .with_measurement_error(MeasurementError::constant(0.1))
///     .build()
///     .expect("at least one block");
/// ```
#[derive(Default)]
pub struct CompositeBuilder {
    items: Vec<(StateComponent, Arc<dyn Loading>)>,
    measurement_error: Option<MeasurementError>,
}

impl CompositeBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block and its loading. Order determines the block's offset
    /// in the composite state vector.
    pub fn add(mut self, component: StateComponent, loading: Arc<dyn Loading>) -> Self {
        self.items.push((component, loading));
        self
    }

    /// Attaches a scalar measurement-error variance to the built system.
    pub fn with_measurement_error(mut self, error: MeasurementError) -> Self {
        self.measurement_error = Some(error);
        self
    }

    /// Assembles the composite. Returns `None` when no blocks were added —
    /// the explicit "no model" outcome; callers must check before use.
    ///
    /// When every sub-loading is time-invariant the stacked loading is
    /// collapsed into a single flat weight row, removing a per-position
    /// measurement-equation evaluation for long series.
    pub fn build(self) -> Option<CompositeSsf> {
        if self.items.is_empty() {
            return None;
        }

        let dims: Vec<usize> = self.items.iter().map(|(c, _)| c.dim()).collect();
        let mut pos = Vec::with_capacity(dims.len());
        let mut total = 0;
        for d in &dims {
            pos.push(total);
            total += d;
        }

        let components: Vec<StateComponent> =
            self.items.iter().map(|(c, _)| c.clone()).collect();
        let loadings: Vec<Arc<dyn Loading>> =
            self.items.iter().map(|(_, l)| Arc::clone(l)).collect();

        let loading: Arc<dyn Loading> = if loadings.iter().all(|l| l.is_time_invariant()) {
            // Collapse to one flat row materialized at position 0.
            let mut z = Array1::zeros(total);
            for ((l, &p), &d) in loadings.iter().zip(&pos).zip(&dims) {
                l.z(0, z.slice_mut(s![p..p + d]));
            }
            Arc::new(Coefficients::new(z))
        } else if loadings.len() == 1 {
            Arc::clone(&loadings[0])
        } else {
            Arc::new(CompositeLoading {
                blocks: loadings,
                pos: pos.clone(),
                dims: dims.clone(),
                total,
            })
        };

        let (initialization, dynamics): (Arc<dyn Initialization>, Arc<dyn Dynamics>) =
            if components.len() == 1 {
                // Single block: delegate directly, no windowing layer.
                (
                    Arc::clone(components[0].initialization()),
                    Arc::clone(components[0].dynamics()),
                )
            } else {
                let inits: Vec<Arc<dyn Initialization>> = components
                    .iter()
                    .map(|c| Arc::clone(c.initialization()))
                    .collect();
                let dyns: Vec<Arc<dyn Dynamics>> = components
                    .iter()
                    .map(|c| Arc::clone(c.dynamics()))
                    .collect();
                let inn_dims: Vec<usize> = dyns.iter().map(|d| d.innovations_dim()).collect();
                let mut inn_pos = Vec::with_capacity(inn_dims.len());
                let mut inn_total = 0;
                for m in &inn_dims {
                    inn_pos.push(inn_total);
                    inn_total += m;
                }
                (
                    Arc::new(CompositeInitialization {
                        blocks: inits,
                        pos: pos.clone(),
                        dims: dims.clone(),
                        total,
                    }),
                    Arc::new(CompositeDynamics {
                        blocks: dyns,
                        pos: pos.clone(),
                        dims: dims.clone(),
                        total,
                        inn_pos,
                        inn_dims,
                        inn_total,
                    }),
                )
            };

        debug!(
            blocks = dims.len(),
            state_dim = total,
            "composite state-space model built"
        );

        Some(CompositeSsf {
            pos,
            dims,
            total,
            component: StateComponent::new(initialization, dynamics),
            loading,
            measurement_error: self.measurement_error,
        })
    }
}

/// A block-diagonal state-space system assembled from several components.
///
/// The composite transition is block-diagonal — block `i` occupies rows and
/// columns `[offset(i), offset(i) + block_dim(i))` and equals component `i`'s
/// own transition, with no cross terms. The composite loading is the direct
/// sum of the sub-loadings.
#[derive(Clone)]
pub struct CompositeSsf {
    pos: Vec<usize>,
    dims: Vec<usize>,
    total: usize,
    component: StateComponent,
    loading: Arc<dyn Loading>,
    measurement_error: Option<MeasurementError>,
}

impl CompositeSsf {
    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.dims.len()
    }

    /// Total state dimension (sum of the block dimensions).
    pub fn dim(&self) -> usize {
        self.total
    }

    /// Offset of block `i` in the composite state vector (exclusive prefix
    /// sum of the block dimensions).
    pub fn offset(&self, i: usize) -> usize {
        self.pos[i]
    }

    /// Dimension of block `i`.
    pub fn block_dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// The composite loading (flat when all sub-loadings are time-invariant).
    pub fn loading(&self) -> &Arc<dyn Loading> {
        &self.loading
    }

    /// Turns the composite into a complete system.
    pub fn ssf(&self) -> Ssf {
        let ssf = Ssf::new(self.component.clone(), Arc::clone(&self.loading));
        match &self.measurement_error {
            Some(me) => ssf.with_measurement_error(me.clone()),
            None => ssf,
        }
    }
}

impl std::fmt::Debug for CompositeSsf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeSsf")
            .field("blocks", &self.dims)
            .field("dim", &self.total)
            .finish()
    }
}

/// Block-diagonal initial condition: each block fills its own window.
struct CompositeInitialization {
    blocks: Vec<Arc<dyn Initialization>>,
    pos: Vec<usize>,
    dims: Vec<usize>,
    total: usize,
}

impl Initialization for CompositeInitialization {
    fn state_dim(&self) -> usize {
        self.total
    }

    fn diffuse_dim(&self) -> usize {
        self.blocks.iter().map(|b| b.diffuse_dim()).sum()
    }

    fn diffuse_constraints(&self, mut b: ArrayViewMut2<f64>) {
        let mut col = 0;
        for ((block, &p), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            let nd = block.diffuse_dim();
            if nd > 0 {
                block.diffuse_constraints(b.slice_mut(s![p..p + d, col..col + nd]));
                col += nd;
            }
        }
    }

    fn a0(&self, mut a: ArrayViewMut1<f64>) {
        for ((block, &p), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.a0(a.slice_mut(s![p..p + d]));
        }
    }

    fn pf0(&self, mut p: ArrayViewMut2<f64>) {
        for ((block, &o), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.pf0(p.slice_mut(s![o..o + d, o..o + d]));
        }
    }

    fn pi0(&self, mut p: ArrayViewMut2<f64>) {
        for ((block, &o), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.pi0(p.slice_mut(s![o..o + d, o..o + d]));
        }
    }
}

/// Block-diagonal dynamics: every operation delegates to per-block windows.
///
/// The operator forms (`tx`, `xt`) apply each block to its own slice, so the
/// inherited `tm`/`tvt` defaults stay correct on full cross-covariance
/// matrices: `(T·V·Tᵗ)[i,j] = T_i · V[i,j] · T_jᵗ` falls out of applying the
/// block-diagonal operator to whole columns and rows.
struct CompositeDynamics {
    blocks: Vec<Arc<dyn Dynamics>>,
    pos: Vec<usize>,
    dims: Vec<usize>,
    total: usize,
    inn_pos: Vec<usize>,
    inn_dims: Vec<usize>,
    inn_total: usize,
}

impl Dynamics for CompositeDynamics {
    fn state_dim(&self) -> usize {
        self.total
    }

    fn innovations_dim(&self) -> usize {
        self.inn_total
    }

    fn t(&self, pos: usize, mut m: ArrayViewMut2<f64>) {
        for ((block, &o), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.t(pos, m.slice_mut(s![o..o + d, o..o + d]));
        }
    }

    fn tx(&self, pos: usize, mut x: ArrayViewMut1<f64>) {
        for ((block, &o), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.tx(pos, x.slice_mut(s![o..o + d]));
        }
    }

    fn xt(&self, pos: usize, mut x: ArrayViewMut1<f64>) {
        for ((block, &o), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.xt(pos, x.slice_mut(s![o..o + d]));
        }
    }

    fn v(&self, pos: usize, mut q: ArrayViewMut2<f64>) {
        for ((block, &o), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.v(pos, q.slice_mut(s![o..o + d, o..o + d]));
        }
    }

    fn add_v(&self, pos: usize, mut p: ArrayViewMut2<f64>) {
        for ((block, &o), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.add_v(pos, p.slice_mut(s![o..o + d, o..o + d]));
        }
    }

    fn s(&self, pos: usize, mut out: ArrayViewMut2<f64>) {
        for (i, block) in self.blocks.iter().enumerate() {
            let m = self.inn_dims[i];
            if m > 0 {
                let (o, d, ip) = (self.pos[i], self.dims[i], self.inn_pos[i]);
                block.s(pos, out.slice_mut(s![o..o + d, ip..ip + m]));
            }
        }
    }

    fn add_su(&self, pos: usize, mut x: ArrayViewMut1<f64>, u: ArrayView1<f64>) {
        for (i, block) in self.blocks.iter().enumerate() {
            let m = self.inn_dims[i];
            if m > 0 {
                let (o, d, ip) = (self.pos[i], self.dims[i], self.inn_pos[i]);
                block.add_su(pos, x.slice_mut(s![o..o + d]), u.slice(s![ip..ip + m]));
            }
        }
    }

    fn xs(&self, pos: usize, x: ArrayView1<f64>, mut xs: ArrayViewMut1<f64>) {
        for (i, block) in self.blocks.iter().enumerate() {
            let m = self.inn_dims[i];
            if m > 0 {
                let (o, d, ip) = (self.pos[i], self.dims[i], self.inn_pos[i]);
                block.xs(pos, x.slice(s![o..o + d]), xs.slice_mut(s![ip..ip + m]));
            }
        }
    }

    fn has_innovations(&self, pos: usize) -> bool {
        self.blocks.iter().any(|b| b.has_innovations(pos))
    }

    fn is_time_invariant(&self) -> bool {
        self.blocks.iter().all(|b| b.is_time_invariant())
    }

    fn are_innovations_time_invariant(&self) -> bool {
        self.blocks.iter().all(|b| b.are_innovations_time_invariant())
    }
}

/// Stacked loading: the direct sum of the sub-loadings.
struct CompositeLoading {
    blocks: Vec<Arc<dyn Loading>>,
    pos: Vec<usize>,
    dims: Vec<usize>,
    total: usize,
}

impl CompositeLoading {
    fn materialize(&self, pos: usize) -> Array1<f64> {
        let mut z = Array1::zeros(self.total);
        for ((block, &p), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.z(pos, z.slice_mut(s![p..p + d]));
        }
        z
    }
}

impl Loading for CompositeLoading {
    fn z(&self, pos: usize, mut z: ArrayViewMut1<f64>) {
        for ((block, &p), &d) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.z(pos, z.slice_mut(s![p..p + d]));
        }
    }

    fn zx(&self, pos: usize, x: ArrayView1<f64>) -> f64 {
        self.blocks
            .iter()
            .zip(&self.pos)
            .zip(&self.dims)
            .map(|((block, &p), &d)| block.zx(pos, x.slice(s![p..p + d])))
            .sum()
    }

    fn zvz(&self, pos: usize, v: ArrayView2<f64>) -> f64 {
        // Cross-block covariance terms matter: go through the stacked row.
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
        for ((block, &p), &dim) in self.blocks.iter().zip(&self.pos).zip(&self.dims) {
            block.xp_zd(pos, x.slice_mut(s![p..p + dim]), d);
        }
    }

    fn is_time_invariant(&self) -> bool {
        self.blocks.iter().all(|b| b.is_time_invariant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ConstantDynamics;
    use crate::initialization::DiffuseInitialization;
    use crate::time_varying::TimeVaryingDynamics;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn level(q: f64) -> (StateComponent, Arc<dyn Loading>) {
        (
            StateComponent::new(
                Arc::new(DiffuseInitialization::new(1)),
                Arc::new(TimeVaryingDynamics::scalar(1, q)),
            ),
            Arc::new(Coefficients::at_position(1, 0)),
        )
    }

    fn fixed_pair(dim: usize) -> (StateComponent, Arc<dyn Loading>) {
        (
            StateComponent::new(
                Arc::new(DiffuseInitialization::new(dim)),
                Arc::new(ConstantDynamics::new(dim)),
            ),
            Arc::new(Coefficients::at_position(dim, 0)),
        )
    }

    #[test]
    fn empty_builder_is_no_model() {
        assert!(CompositeBuilder::new().build().is_none());
    }

    #[test]
    fn offsets_are_prefix_sums() {
        let (c1, l1) = level(1.0);
        let (c2, l2) = fixed_pair(3);
        let (c3, l3) = level(2.0);
        let composite = CompositeBuilder::new()
            .add(c1, l1)
            .add(c2, l2)
            .add(c3, l3)
            .build()
            .unwrap();
        assert_eq!(composite.block_count(), 3);
        assert_eq!(composite.dim(), 5);
        assert_eq!(composite.offset(0), 0);
        assert_eq!(composite.offset(1), 1);
        assert_eq!(composite.offset(2), 4);
        assert_eq!(composite.block_dim(1), 3);
    }

    #[test]
    fn transition_is_block_diagonal() {
        let (c1, l1) = level(1.0);
        let (c2, l2) = fixed_pair(2);
        let ssf = CompositeBuilder::new()
            .add(c1, l1)
            .add(c2, l2)
            .build()
            .unwrap()
            .ssf();
        let mut t = Array2::zeros((3, 3));
        ssf.dynamics().t(0, t.view_mut());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(t[[i, j]], expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn diffuse_dimension_accumulates() {
        let (c1, l1) = level(1.0);
        let (c2, l2) = fixed_pair(2);
        let ssf = CompositeBuilder::new()
            .add(c1, l1)
            .add(c2, l2)
            .build()
            .unwrap()
            .ssf();
        assert_eq!(ssf.diffuse_dim(), 3);

        let mut b = Array2::zeros((3, 3));
        ssf.initialization().diffuse_constraints(b.view_mut());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(b[[i, j]], expected, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn innovation_table_skips_deterministic_blocks() {
        let (c1, l1) = level(4.0);
        let (c2, l2) = fixed_pair(2);
        let (c3, l3) = level(9.0);
        let ssf = CompositeBuilder::new()
            .add(c1, l1)
            .add(c2, l2)
            .add(c3, l3)
            .build()
            .unwrap()
            .ssf();
        assert_eq!(ssf.innovations_dim(), 2);

        // S is 4x2: sqrt(4) in row 0 column 0, sqrt(9) in row 3 column 1.
        let mut s_mat = Array2::zeros((4, 2));
        ssf.dynamics().s(0, s_mat.view_mut());
        assert_abs_diff_eq!(s_mat[[0, 0]], 2.0, epsilon = 1e-14);
        assert_abs_diff_eq!(s_mat[[3, 1]], 3.0, epsilon = 1e-14);
        assert_abs_diff_eq!(s_mat[[1, 0]], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(s_mat[[2, 1]], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn flat_loading_collapse_when_time_invariant() {
        let (c1, l1) = level(1.0);
        let (c2, l2) = fixed_pair(2);
        let composite = CompositeBuilder::new().add(c1, l1).add(c2, l2).build().unwrap();
        assert!(composite.loading().is_time_invariant());

        let mut z = Array1::zeros(3);
        composite.loading().z(11, z.view_mut());
        assert_eq!(z.to_vec(), vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn stacked_zx_sums_blocks() {
        let (c1, l1) = level(1.0);
        let (c2, l2) = fixed_pair(2);
        let ssf = CompositeBuilder::new()
            .add(c1, l1)
            .add(c2, l2)
            .build()
            .unwrap()
            .ssf();
        let x = array![2.0, 3.0, 4.0];
        assert_abs_diff_eq!(ssf.loading().zx(0, x.view()), 5.0, epsilon = 1e-14);
    }

    #[test]
    fn measurement_error_flows_to_system() {
        let (c1, l1) = level(1.0);
        let ssf = CompositeBuilder::new()
            .add(c1, l1)
            .with_measurement_error(MeasurementError::constant(0.3))
            .build()
            .unwrap()
            .ssf();
        assert_abs_diff_eq!(ssf.measurement_error().unwrap().at(5), 0.3, epsilon = 1e-14);
    }
}
