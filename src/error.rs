//! Error types for the ssf crate.

/// Error type for all fallible operations in the ssf crate.
///
/// Every variant is a configuration or numerical error detected at model
/// construction time; built systems are immutable and their per-position
/// operations are infallible.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsfError {
    /// Returned when a regression design matrix has no rows or no columns.
    #[error("regression design matrix is empty")]
    EmptyDesign,

    /// Returned when a design matrix row count disagrees with the series
    /// length the base system was built for.
    #[error("design matrix has {rows} rows, base system spans {len} periods")]
    DesignRowMismatch {
        /// Number of rows in the design matrix.
        rows: usize,
        /// Series length pinned by the base system.
        len: usize,
    },

    /// Returned when a coefficient innovation covariance is not square.
    #[error("covariance matrix is not square: {nrows}x{ncols}")]
    CovarianceNotSquare {
        /// Number of rows supplied.
        nrows: usize,
        /// Number of columns supplied.
        ncols: usize,
    },

    /// Returned when a coefficient innovation covariance does not match the
    /// design matrix column count.
    #[error("covariance is {dim}x{dim} but the design matrix has {nx} columns")]
    CovarianceDimMismatch {
        /// Size of the covariance matrix.
        dim: usize,
        /// Number of regression variables.
        nx: usize,
    },

    /// Returned when Cholesky factorization fails even after the jitter
    /// tolerance is applied (the matrix is not positive semi-definite).
    #[error("ill-conditioned covariance: pivot {pivot:.3e} at index {index} below tolerance")]
    IllConditioned {
        /// Index of the offending diagonal pivot.
        index: usize,
        /// Value of the offending pivot.
        pivot: f64,
    },
}
