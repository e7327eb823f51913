//! Assembled state-space systems.

use std::sync::Arc;

use ndarray::Array2;

use crate::dynamics::Dynamics;
use crate::error::SsfError;
use crate::initialization::Initialization;
use crate::loading::Loading;
use crate::measurement_error::MeasurementError;
use crate::regression;

/// One block of the state vector: an initial condition paired with a
/// transition/innovation law.
///
/// Value-like and cheap to clone; the underlying trait objects are shared.
#[derive(Clone)]
pub struct StateComponent {
    initialization: Arc<dyn Initialization>,
    dynamics: Arc<dyn Dynamics>,
}

impl StateComponent {
    /// Pairs an initial condition with a dynamics law.
    ///
    /// # Panics
    ///
    /// Panics if the two disagree on the block dimension (programmer error).
    pub fn new(initialization: Arc<dyn Initialization>, dynamics: Arc<dyn Dynamics>) -> Self {
        assert_eq!(
            initialization.state_dim(),
            dynamics.state_dim(),
            "initialization and dynamics disagree on the block dimension"
        );
        Self {
            initialization,
            dynamics,
        }
    }

    /// Dimension of this block.
    pub fn dim(&self) -> usize {
        self.dynamics.state_dim()
    }

    /// The initial condition.
    pub fn initialization(&self) -> &Arc<dyn Initialization> {
        &self.initialization
    }

    /// The transition/innovation law.
    pub fn dynamics(&self) -> &Arc<dyn Dynamics> {
        &self.dynamics
    }
}

impl std::fmt::Debug for StateComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateComponent")
            .field("dim", &self.dim())
            .field("diffuse_dim", &self.initialization.diffuse_dim())
            .field("innovations_dim", &self.dynamics.innovations_dim())
            .finish()
    }
}

/// A complete univariate state-space system: a state component, its
/// observation loading, optional measurement error, and an optional pinned
/// series length.
///
/// Immutable once built; safe to share read-only across threads. Handed as-is
/// to an external filter/smoother together with the observed data.
#[derive(Clone)]
pub struct Ssf {
    component: StateComponent,
    loading: Arc<dyn Loading>,
    measurement_error: Option<MeasurementError>,
    len: Option<usize>,
}

impl Ssf {
    /// Assembles a system from a component and its loading.
    pub fn new(component: StateComponent, loading: Arc<dyn Loading>) -> Self {
        Self {
            component,
            loading,
            measurement_error: None,
            len: None,
        }
    }

    /// Attaches a scalar measurement-error variance.
    pub fn with_measurement_error(mut self, error: MeasurementError) -> Self {
        self.measurement_error = Some(error);
        self
    }

    /// Pins the series length this system describes.
    ///
    /// Primitive systems are span-agnostic; a pinned length lets regression
    /// augmentation validate its design matrix at construction.
    pub fn with_len(mut self, len: usize) -> Self {
        self.len = Some(len);
        self
    }

    /// The state component.
    pub fn component(&self) -> &StateComponent {
        &self.component
    }

    /// The initial condition.
    pub fn initialization(&self) -> &Arc<dyn Initialization> {
        self.component.initialization()
    }

    /// The transition/innovation law.
    pub fn dynamics(&self) -> &Arc<dyn Dynamics> {
        self.component.dynamics()
    }

    /// The observation loading.
    pub fn loading(&self) -> &Arc<dyn Loading> {
        &self.loading
    }

    /// The measurement-error variance, when present.
    pub fn measurement_error(&self) -> Option<&MeasurementError> {
        self.measurement_error.as_ref()
    }

    /// The pinned series length, when one exists.
    pub fn len(&self) -> Option<usize> {
        self.len
    }

    /// Total state dimension.
    pub fn state_dim(&self) -> usize {
        self.component.dim()
    }

    /// Number of diffuse state directions.
    pub fn diffuse_dim(&self) -> usize {
        self.initialization().diffuse_dim()
    }

    /// Dimension of the innovation vector.
    pub fn innovations_dim(&self) -> usize {
        self.dynamics().innovations_dim()
    }

    /// Appends `x.ncols()` regression coefficients as unknown constants:
    /// identity sub-transition, no innovations, fully diffuse initial
    /// condition. The consuming diffuse filter estimates them jointly with
    /// the rest of the state.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`SsfError::EmptyDesign`] | `x` has no rows or no columns |
    /// | [`SsfError::DesignRowMismatch`] | the system has a pinned length and `x.nrows()` differs |
    pub fn with_fixed_regression(&self, x: Array2<f64>) -> Result<Ssf, SsfError> {
        regression::fixed(self, x)
    }

    /// Appends `x.ncols()` regression coefficients following a multivariate
    /// random walk with innovation covariance `sigma`. The coefficients are
    /// proper (finite-variance) state directions; the innovation dimension
    /// grows by `x.ncols()`.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`SsfError::EmptyDesign`] | `x` has no rows or no columns |
    /// | [`SsfError::DesignRowMismatch`] | the system has a pinned length and `x.nrows()` differs |
    /// | [`SsfError::CovarianceNotSquare`] | `sigma` is not square |
    /// | [`SsfError::CovarianceDimMismatch`] | `sigma` size differs from `x.ncols()` |
    /// | [`SsfError::IllConditioned`] | `sigma` fails jittered factorization |
    pub fn with_time_varying_regression(
        &self,
        x: Array2<f64>,
        sigma: Array2<f64>,
    ) -> Result<Ssf, SsfError> {
        regression::time_varying(self, x, sigma)
    }

    /// Like [`Ssf::with_time_varying_regression`], from a pre-computed lower
    /// Cholesky factor `l` (`sigma = l·lᵗ`).
    ///
    /// # Errors
    ///
    /// Same as [`Ssf::with_time_varying_regression`], minus the factorization
    /// failure.
    pub fn with_time_varying_regression_factor(
        &self,
        x: Array2<f64>,
        l: Array2<f64>,
    ) -> Result<Ssf, SsfError> {
        regression::time_varying_from_factor(self, x, l)
    }
}

impl std::fmt::Debug for Ssf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ssf")
            .field("state_dim", &self.state_dim())
            .field("diffuse_dim", &self.diffuse_dim())
            .field("innovations_dim", &self.innovations_dim())
            .field("len", &self.len)
            .field("measurement_error", &self.measurement_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::DiffuseInitialization;
    use crate::loading::Coefficients;
    use crate::time_varying::TimeVaryingDynamics;
    use ndarray::array;

    fn local_level(q: f64) -> Ssf {
        let component = StateComponent::new(
            Arc::new(DiffuseInitialization::new(1)),
            Arc::new(TimeVaryingDynamics::scalar(1, q)),
        );
        Ssf::new(component, Arc::new(Coefficients::at_position(1, 0)))
    }

    #[test]
    fn dimensions_flow_through() {
        let ssf = local_level(2.0);
        assert_eq!(ssf.state_dim(), 1);
        assert_eq!(ssf.diffuse_dim(), 1);
        assert_eq!(ssf.innovations_dim(), 1);
        assert_eq!(ssf.len(), None);
        assert!(ssf.measurement_error().is_none());
    }

    #[test]
    fn measurement_error_and_len_attach() {
        let ssf = local_level(1.0)
            .with_measurement_error(MeasurementError::constant(0.5))
            .with_len(12);
        assert_eq!(ssf.len(), Some(12));
        assert_eq!(ssf.measurement_error().unwrap().at(3), 0.5);
    }

    #[test]
    #[should_panic(expected = "disagree")]
    fn component_rejects_dimension_mismatch() {
        StateComponent::new(
            Arc::new(DiffuseInitialization::new(2)),
            Arc::new(TimeVaryingDynamics::scalar(1, 1.0)),
        );
    }

    #[test]
    fn clones_share_structure() {
        let ssf = local_level(1.0);
        let copy = ssf.clone();
        assert_eq!(copy.state_dim(), ssf.state_dim());

        let x = array![3.0];
        assert_eq!(
            copy.loading().zx(0, x.view()),
            ssf.loading().zx(0, x.view())
        );
    }

    #[test]
    fn systems_are_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<Ssf>();
        assert_impl::<StateComponent>();
    }

    #[test]
    fn debug_formats() {
        let s = format!("{:?}", local_level(1.0));
        assert!(s.contains("Ssf"));
        assert!(s.contains("diffuse_dim"));
    }
}
