//! Regression augmentation: appending coefficient directions to a system.
//!
//! Two modes, one key modelling decision:
//!
//! - *fixed*: coefficients are unknown constants. The appended block has an
//!   identity transition, no innovations, and a fully diffuse initial
//!   condition, so a diffuse filter estimates the coefficients jointly with
//!   the rest of the state.
//! - *time-varying*: coefficients drift as a multivariate random walk with
//!   innovation covariance `sigma`. The appended block is proper (finite
//!   initial variance) and the innovation dimension grows instead.
//!
//! Either way the augmented loading reads row `pos` of the design matrix as
//! the weights on the appended directions.

use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use tracing::debug;

use crate::composite::CompositeBuilder;
use crate::constant::ConstantDynamics;
use crate::error::SsfError;
use crate::initialization::{DiffuseInitialization, ProperInitialization};
use crate::loading::Loading;
use crate::system::{Ssf, StateComponent};
use crate::time_varying::TimeVaryingDynamics;

/// Loading of a coefficient block: row `pos` of the design matrix.
///
/// Positions past the last design row reuse the last row (the same tail
/// recycling policy as [`crate::MeasurementError`]); consumers are expected
/// to stay within the span the matrix was built for.
pub(crate) struct DesignLoading {
    x: Array2<f64>,
}

impl DesignLoading {
    pub(crate) fn new(x: Array2<f64>) -> Self {
        Self { x }
    }

    fn row(&self, pos: usize) -> ArrayView1<f64> {
        self.x.row(pos.min(self.x.nrows() - 1))
    }
}

impl Loading for DesignLoading {
    fn z(&self, pos: usize, mut z: ArrayViewMut1<f64>) {
        z.assign(&self.row(pos));
    }

    fn zx(&self, pos: usize, x: ArrayView1<f64>) -> f64 {
        self.row(pos).dot(&x)
    }

    fn zvz(&self, pos: usize, v: ArrayView2<f64>) -> f64 {
        let z = self.row(pos);
        z.dot(&v.dot(&z))
    }

    fn vp_zdz(&self, pos: usize, mut v: ArrayViewMut2<f64>, d: f64) {
        let z = self.row(pos);
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
        x.scaled_add(d, &self.row(pos));
    }

    fn is_time_invariant(&self) -> bool {
        self.x.nrows() == 1
    }
}

fn validate_design(base: &Ssf, x: &Array2<f64>) -> Result<(), SsfError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(SsfError::EmptyDesign);
    }
    if let Some(len) = base.len() {
        if x.nrows() != len {
            return Err(SsfError::DesignRowMismatch {
                rows: x.nrows(),
                len,
            });
        }
    }
    Ok(())
}

fn validate_covariance(sigma: &Array2<f64>, nx: usize) -> Result<(), SsfError> {
    let (nrows, ncols) = sigma.dim();
    if nrows != ncols {
        return Err(SsfError::CovarianceNotSquare { nrows, ncols });
    }
    if nrows != nx {
        return Err(SsfError::CovarianceDimMismatch { dim: nrows, nx });
    }
    Ok(())
}

/// Assembles the augmented system from the base and the appended coefficient
/// block, preserving the base measurement error and pinning the series
/// length to the design row count.
fn assemble(base: &Ssf, x: Array2<f64>, coefficients: StateComponent) -> Ssf {
    let rows = x.nrows();
    let mut builder = CompositeBuilder::new()
        .add(base.component().clone(), Arc::clone(base.loading()))
        .add(coefficients, Arc::new(DesignLoading::new(x)));
    if let Some(me) = base.measurement_error() {
        builder = builder.with_measurement_error(me.clone());
    }
    // Two blocks were just added, so the build cannot be empty.
    builder
        .build()
        .expect("augmented composite has two blocks")
        .ssf()
        .with_len(rows)
}

pub(crate) fn fixed(base: &Ssf, x: Array2<f64>) -> Result<Ssf, SsfError> {
    validate_design(base, &x)?;
    let nx = x.ncols();
    let coefficients = StateComponent::new(
        Arc::new(DiffuseInitialization::new(nx)),
        Arc::new(ConstantDynamics::new(nx)),
    );
    debug!(nx, rows = x.nrows(), mode = "fixed", "regression augmentation");
    Ok(assemble(base, x, coefficients))
}

pub(crate) fn time_varying(base: &Ssf, x: Array2<f64>, sigma: Array2<f64>) -> Result<Ssf, SsfError> {
    validate_design(base, &x)?;
    let nx = x.ncols();
    validate_covariance(&sigma, nx)?;
    let dynamics = TimeVaryingDynamics::full(sigma.clone())?;
    // Coefficients start at zero with one walk step of variance.
    let init = ProperInitialization::new(Array1::zeros(nx), sigma);
    let coefficients = StateComponent::new(Arc::new(init), Arc::new(dynamics));
    debug!(
        nx,
        rows = x.nrows(),
        mode = "time-varying",
        "regression augmentation"
    );
    Ok(assemble(base, x, coefficients))
}

pub(crate) fn time_varying_from_factor(
    base: &Ssf,
    x: Array2<f64>,
    l: Array2<f64>,
) -> Result<Ssf, SsfError> {
    validate_design(base, &x)?;
    let nx = x.ncols();
    validate_covariance(&l, nx)?;
    let sigma = l.dot(&l.t());
    let dynamics = TimeVaryingDynamics::from_factor(l)?;
    let init = ProperInitialization::new(Array1::zeros(nx), sigma);
    let coefficients = StateComponent::new(Arc::new(init), Arc::new(dynamics));
    debug!(
        nx,
        rows = x.nrows(),
        mode = "time-varying (supplied factor)",
        "regression augmentation"
    );
    Ok(assemble(base, x, coefficients))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loading::Coefficients;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn local_level(q: f64) -> Ssf {
        let component = StateComponent::new(
            Arc::new(DiffuseInitialization::new(1)),
            Arc::new(TimeVaryingDynamics::scalar(1, q)),
        );
        Ssf::new(component, Arc::new(Coefficients::at_position(1, 0)))
    }

    #[test]
    fn design_loading_reads_rows() {
        let loading = DesignLoading::new(array![[1.0, 2.0], [3.0, 4.0]]);
        let mut z = Array1::zeros(2);
        loading.z(1, z.view_mut());
        assert_eq!(z.to_vec(), vec![3.0, 4.0]);
        assert!(!loading.is_time_invariant());
    }

    #[test]
    fn design_loading_recycles_last_row() {
        let loading = DesignLoading::new(array![[1.0], [5.0]]);
        assert_abs_diff_eq!(loading.zx(9, array![2.0].view()), 10.0, epsilon = 1e-14);
    }

    #[test]
    fn single_row_design_is_time_invariant() {
        let loading = DesignLoading::new(array![[1.0, 2.0]]);
        assert!(loading.is_time_invariant());
    }

    #[test]
    fn fixed_mode_adds_diffuse_directions() {
        let base = local_level(2.0);
        let augmented = base
            .with_fixed_regression(array![[1.0], [1.0], [1.0]])
            .unwrap();
        assert_eq!(augmented.state_dim(), 2);
        assert_eq!(augmented.diffuse_dim(), 2);
        assert_eq!(augmented.innovations_dim(), 1);
        assert_eq!(augmented.len(), Some(3));
    }

    #[test]
    fn time_varying_mode_adds_innovations() {
        let base = local_level(2.0);
        let augmented = base
            .with_time_varying_regression(array![[1.0], [1.0], [1.0]], array![[0.5]])
            .unwrap();
        assert_eq!(augmented.state_dim(), 2);
        assert_eq!(augmented.diffuse_dim(), 1);
        assert_eq!(augmented.innovations_dim(), 2);

        // Appended block is proper with pf0 = sigma.
        let mut p = Array2::zeros((2, 2));
        augmented.initialization().pf0(p.view_mut());
        assert_abs_diff_eq!(p[[1, 1]], 0.5, epsilon = 1e-14);
    }

    #[test]
    fn factor_form_matches_covariance_form() {
        let base = local_level(1.0);
        let l = array![[2.0, 0.0], [1.0, 2.0]];
        let sigma = l.dot(&l.t());
        let x = array![[1.0, 0.0], [0.0, 1.0]];

        let from_sigma = base
            .with_time_varying_regression(x.clone(), sigma.clone())
            .unwrap();
        let from_factor = base.with_time_varying_regression_factor(x, l).unwrap();

        let mut va = Array2::zeros((3, 3));
        let mut vb = Array2::zeros((3, 3));
        from_sigma.dynamics().v(0, va.view_mut());
        from_factor.dynamics().v(0, vb.view_mut());
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(va[[i, j]], vb[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn empty_design_rejected() {
        let base = local_level(1.0);
        let err = base
            .with_fixed_regression(Array2::zeros((0, 1)))
            .unwrap_err();
        assert!(matches!(err, SsfError::EmptyDesign));

        let err = base
            .with_fixed_regression(Array2::zeros((3, 0)))
            .unwrap_err();
        assert!(matches!(err, SsfError::EmptyDesign));
    }

    #[test]
    fn pinned_length_enforced() {
        let base = local_level(1.0).with_len(4);
        let err = base
            .with_fixed_regression(Array2::ones((3, 1)))
            .unwrap_err();
        assert!(matches!(err, SsfError::DesignRowMismatch { rows: 3, len: 4 }));
    }

    #[test]
    fn second_augmentation_validates_against_pinned_length() {
        let base = local_level(1.0);
        let once = base.with_fixed_regression(Array2::ones((5, 1))).unwrap();
        assert_eq!(once.len(), Some(5));
        let err = once
            .with_fixed_regression(Array2::ones((4, 1)))
            .unwrap_err();
        assert!(matches!(err, SsfError::DesignRowMismatch { rows: 4, len: 5 }));

        let twice = once.with_fixed_regression(Array2::ones((5, 2))).unwrap();
        assert_eq!(twice.state_dim(), 4);
        assert_eq!(twice.diffuse_dim(), 4);
    }

    #[test]
    fn covariance_shape_validated() {
        let base = local_level(1.0);
        let x = Array2::ones((3, 2));

        let err = base
            .with_time_varying_regression(x.clone(), Array2::zeros((2, 3)))
            .unwrap_err();
        assert!(matches!(err, SsfError::CovarianceNotSquare { .. }));

        let err = base
            .with_time_varying_regression(x, Array2::eye(3))
            .unwrap_err();
        assert!(matches!(err, SsfError::CovarianceDimMismatch { dim: 3, nx: 2 }));
    }

    #[test]
    fn measurement_error_survives_augmentation() {
        let base = local_level(1.0)
            .with_measurement_error(crate::MeasurementError::constant(0.25));
        let augmented = base.with_fixed_regression(Array2::ones((3, 1))).unwrap();
        assert_abs_diff_eq!(
            augmented.measurement_error().unwrap().at(0),
            0.25,
            epsilon = 1e-14
        );
    }
}
