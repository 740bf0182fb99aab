//! Failures of the numerical routines.

use thiserror::Error;

/// Result of a numerical routine.
pub type MathResult<T> = Result<T, MathError>;

/// Why a solver or factorization gave up.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// The iteration budget ran out before the tolerance was met.
    #[error("root search did not converge in {iterations} iterations, |f| = {residual:.2e}")]
    ConvergenceFailed {
        /// Iterations spent.
        iterations: u32,
        /// Objective magnitude at the last iterate.
        residual: f64,
    },

    /// The objective does not change sign on `[a, b]`.
    #[error("no sign change on [{a}, {b}]: f(a) = {fa:.2e}, f(b) = {fb:.2e}")]
    InvalidBracket {
        /// Lower end.
        a: f64,
        /// Upper end.
        b: f64,
        /// Objective at `a`.
        fa: f64,
        /// Objective at `b`.
        fb: f64,
    },

    /// A pivot vanished during factorization.
    #[error("singular system")]
    SingularMatrix,

    /// Operand shapes do not line up.
    #[error("shape mismatch: {rows1}x{cols1} against {rows2}x{cols2}")]
    DimensionMismatch {
        /// Rows of the left operand.
        rows1: usize,
        /// Columns of the left operand.
        cols1: usize,
        /// Rows of the right operand.
        rows2: usize,
        /// Columns of the right operand.
        cols2: usize,
    },

    /// Too few rows or points.
    #[error("{actual} given where at least {required} are needed")]
    InsufficientData {
        /// Minimum count.
        required: usize,
        /// Count supplied.
        actual: usize,
    },

    /// An argument is out of its domain.
    #[error("invalid argument: {reason}")]
    InvalidInput {
        /// What is wrong with it.
        reason: String,
    },
}

impl MathError {
    /// [`MathError::ConvergenceFailed`].
    #[must_use]
    pub fn convergence_failed(iterations: u32, residual: f64) -> Self {
        Self::ConvergenceFailed {
            iterations,
            residual,
        }
    }

    /// [`MathError::InvalidInput`].
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// [`MathError::InsufficientData`].
    #[must_use]
    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }
}
