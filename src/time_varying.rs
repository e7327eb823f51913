//! Random-walk coefficient dynamics.

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::cholesky::{lcholesky, ZERO};
use crate::dynamics::Dynamics;
use crate::error::SsfError;

/// Innovation structure of a random-walk block.
#[derive(Clone, Debug)]
enum Innovations {
    /// `V = q · I`: independent walks with a common variance.
    Scalar { dim: usize, q: f64 },
    /// `V = diag(q)`: independent walks.
    Diagonal { q: Array1<f64> },
    /// Full covariance: correlated walks, factorized once at construction.
    Full { sigma: Array2<f64>, l: Array2<f64> },
}

/// Identity transition with time-invariant, non-zero innovation covariance.
///
/// Models coefficients that follow a multivariate random walk: the diagonal
/// variants give independent walks, the full variant correlated walks whose
/// covariance is Cholesky-factorized once at construction (with the jitter
/// tolerance of the crate, so near-singular covariances are accepted).
#[derive(Clone, Debug)]
pub struct TimeVaryingDynamics {
    inn: Innovations,
}

impl TimeVaryingDynamics {
    /// Independent walks of dimension `dim`, each with variance `q`.
    pub fn scalar(dim: usize, q: f64) -> Self {
        Self {
            inn: Innovations::Scalar { dim, q },
        }
    }

    /// Independent walks with per-direction variances `q`.
    pub fn diagonal(q: Array1<f64>) -> Self {
        Self {
            inn: Innovations::Diagonal { q },
        }
    }

    /// Correlated walks with covariance `sigma`.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`SsfError::CovarianceNotSquare`] | `sigma` is not square |
    /// | [`SsfError::IllConditioned`] | `sigma` is not positive semi-definite within the jitter tolerance |
    pub fn full(sigma: Array2<f64>) -> Result<Self, SsfError> {
        let (nrows, ncols) = sigma.dim();
        if nrows != ncols {
            return Err(SsfError::CovarianceNotSquare { nrows, ncols });
        }
        let mut l = sigma.clone();
        lcholesky(&mut l, ZERO)?;
        Ok(Self {
            inn: Innovations::Full { sigma, l },
        })
    }

    /// Correlated walks from a pre-computed lower factor `l` (`sigma = l·lᵗ`).
    ///
    /// # Errors
    ///
    /// Returns [`SsfError::CovarianceNotSquare`] when `l` is not square.
    pub fn from_factor(l: Array2<f64>) -> Result<Self, SsfError> {
        let (nrows, ncols) = l.dim();
        if nrows != ncols {
            return Err(SsfError::CovarianceNotSquare { nrows, ncols });
        }
        let sigma = l.dot(&l.t());
        Ok(Self {
            inn: Innovations::Full { sigma, l },
        })
    }

    fn dim(&self) -> usize {
        match &self.inn {
            Innovations::Scalar { dim, .. } => *dim,
            Innovations::Diagonal { q } => q.len(),
            Innovations::Full { sigma, .. } => sigma.nrows(),
        }
    }
}

impl Dynamics for TimeVaryingDynamics {
    fn state_dim(&self) -> usize {
        self.dim()
    }

    fn innovations_dim(&self) -> usize {
        self.dim()
    }

    fn t(&self, _pos: usize, mut m: ArrayViewMut2<f64>) {
        for i in 0..self.dim() {
            m[[i, i]] = 1.0;
        }
    }

    fn tx(&self, _pos: usize, _x: ArrayViewMut1<f64>) {}

    fn xt(&self, _pos: usize, _x: ArrayViewMut1<f64>) {}

    fn tm(&self, _pos: usize, _m: ArrayViewMut2<f64>) {}

    fn tvt(&self, _pos: usize, _v: ArrayViewMut2<f64>) {}

    fn v(&self, _pos: usize, mut out: ArrayViewMut2<f64>) {
        match &self.inn {
            Innovations::Scalar { dim, q } => {
                for i in 0..*dim {
                    out[[i, i]] = *q;
                }
            }
            Innovations::Diagonal { q } => {
                for (i, qi) in q.iter().enumerate() {
                    out[[i, i]] = *qi;
                }
            }
            Innovations::Full { sigma, .. } => out.assign(sigma),
        }
    }

    fn add_v(&self, _pos: usize, mut p: ArrayViewMut2<f64>) {
        match &self.inn {
            Innovations::Scalar { dim, q } => {
                for i in 0..*dim {
                    p[[i, i]] += *q;
                }
            }
            Innovations::Diagonal { q } => {
                for (i, qi) in q.iter().enumerate() {
                    p[[i, i]] += *qi;
                }
            }
            Innovations::Full { sigma, .. } => p += sigma,
        }
    }

    fn s(&self, _pos: usize, mut out: ArrayViewMut2<f64>) {
        match &self.inn {
            Innovations::Scalar { dim, q } => {
                let s = q.sqrt();
                for i in 0..*dim {
                    out[[i, i]] = s;
                }
            }
            Innovations::Diagonal { q } => {
                for (i, qi) in q.iter().enumerate() {
                    out[[i, i]] = qi.sqrt();
                }
            }
            Innovations::Full { l, .. } => out.assign(l),
        }
    }

    fn add_su(&self, _pos: usize, mut x: ArrayViewMut1<f64>, u: ArrayView1<f64>) {
        match &self.inn {
            Innovations::Scalar { dim, q } => {
                let s = q.sqrt();
                for i in 0..*dim {
                    x[i] += s * u[i];
                }
            }
            Innovations::Diagonal { q } => {
                for (i, qi) in q.iter().enumerate() {
                    x[i] += qi.sqrt() * u[i];
                }
            }
            Innovations::Full { l, .. } => x += &l.dot(&u),
        }
    }

    fn xs(&self, _pos: usize, x: ArrayView1<f64>, mut xs: ArrayViewMut1<f64>) {
        match &self.inn {
            Innovations::Scalar { dim, q } => {
                let s = q.sqrt();
                for i in 0..*dim {
                    xs[i] = s * x[i];
                }
            }
            Innovations::Diagonal { q } => {
                for (i, qi) in q.iter().enumerate() {
                    xs[i] = qi.sqrt() * x[i];
                }
            }
            Innovations::Full { l, .. } => xs.assign(&l.t().dot(&x)),
        }
    }

    fn is_time_invariant(&self) -> bool {
        true
    }

    fn are_innovations_time_invariant(&self) -> bool {
        true
    }
}
