//! Error types for linear algebra operations.

use thiserror::Error;

/// A specialized Result type for linear algebra operations.
pub type MathResult<T> = Result<T, MathError>;

/// Errors that can occur during linear algebra operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// Matrix is not positive definite, even after diagonal regularization.
    #[error("Matrix is not positive definite (last diagonal shift: {shift:.2e})")]
    NotPositiveDefinite {
        /// Largest diagonal shift that was tried.
        shift: f64,
    },

    /// Matrix dimensions are incompatible.
    #[error("Incompatible dimensions: ({rows1}x{cols1}) and ({rows2}x{cols2})")]
    DimensionMismatch {
        /// Rows in first operand.
        rows1: usize,
        /// Columns in first operand.
        cols1: usize,
        /// Rows in second operand.
        rows2: usize,
        /// Columns in second operand.
        cols2: usize,
    },

    /// Matrix or vector contains NaN or infinite entries.
    #[error("Non-finite value encountered in {operation}")]
    NonFinite {
        /// The operation that saw the non-finite value.
        operation: String,
    },

    /// Invalid input parameter.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Description of the invalid input.
        reason: String,
    },
}

impl MathError {
    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates a non-finite value error.
    #[must_use]
    pub fn non_finite(operation: impl Into<String>) -> Self {
        Self::NonFinite {
            operation: operation.into(),
        }
    }

    /// Creates a dimension mismatch error between a square system and a right-hand side.
    #[must_use]
    pub fn rhs_mismatch(n: usize, rhs_len: usize) -> Self {
        Self::DimensionMismatch {
            rows1: n,
            cols1: n,
            rows2: rhs_len,
            cols2: 1,
        }
    }
}
