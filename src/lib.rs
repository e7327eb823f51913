//! # ssf
//!
//! Composable linear-Gaussian state-space models: reusable state blocks,
//! observation loadings, block-diagonal composition, and regression
//! augmentation, with exact diffuse-dimension bookkeeping for a consuming
//! (diffuse) Kalman filter/smoother.
//!
//! This crate describes models; it runs no recursion over time. A consumer
//! builds a system, hands it to an external filter together with the
//! observed data, and reads the smoothed state back.
//!
//! ## Assembly Workflow
//!
//! ```mermaid
//! graph LR
//!     A["StateComponent (Initialization + Dynamics)"] -->|"CompositeBuilder::add"| B["CompositeSsf"]
//!     B -->|".ssf()"| C["Ssf"]
//!     C -->|".with_fixed_regression(X)?"| D["Ssf (+nx diffuse)"]
//!     C -->|".with_time_varying_regression(X, sigma)?"| E["Ssf (+nx innovations)"]
//!     D --> F["external Kalman filter/smoother"]
//!     E --> F
//! ```
//!
//! ## Two Regression Modes
//!
//! **Fixed** (coefficients are unknown constants):
//! ```ignore
//! let augmented = ssf.with_fixed_regression(x)?;   // diffuse_dim += nx
//! ```
//!
//! **Time-varying** (coefficients drift as a random walk):
//! ```ignore
//! let augmented = ssf.with_time_varying_regression(x, sigma)?;  // innovations_dim += nx
//! ```
//!
//! ## Mathematical Glossary
//!
//! | Symbol | Accessor | Meaning |
//! |--------|----------|---------|
//! | T | [`Dynamics::t`] | state transition matrix |
//! | V, S | [`Dynamics::v`], [`Dynamics::s`] | innovation covariance and its square-root factor (`S·Sᵗ = V`) |
//! | Z | [`Loading::z`] | observation row mapping state to the expected measurement |
//! | a0, Pf0 | [`Initialization::a0`], [`Initialization::pf0`] | finite part of the initial state |
//! | Pi0 | [`Initialization::pi0`] | diffuse (unbounded-variance) part of the initial state |
//!
//! Every dynamics/loading operation exists in a matrix form and an operator
//! form that never materializes the matrix; the two must agree exactly, and
//! the tests in `tests/` exercise that contract on randomized inputs.

mod cholesky;
mod composite;
mod constant;
mod decorators;
mod dynamics;
mod error;
mod initialization;
mod loading;
mod measurement_error;
mod regression;
mod system;
mod time_invariant;
mod time_varying;
mod var_noise;

pub use composite::{CompositeBuilder, CompositeSsf};
pub use constant::ConstantDynamics;
pub use decorators::{ExternalEffects, ShiftedLoading};
pub use dynamics::Dynamics;
pub use error::SsfError;
pub use initialization::{DiffuseInitialization, Initialization, ProperInitialization};
pub use loading::{Coefficients, Loading};
pub use measurement_error::MeasurementError;
pub use system::{Ssf, StateComponent};
pub use time_invariant::{TimeInvariantDynamics, TimeInvariantLoading};
pub use time_varying::TimeVaryingDynamics;
pub use var_noise::VarNoise;
