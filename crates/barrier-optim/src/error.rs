//! Error types for the optimization engine.
//!
//! Errors fall into four families:
//!
//! - **Setup** errors are raised before any iteration and are never retried.
//! - **Numerical stalls** and **line-search failures** are recoverable; the
//!   solver absorbs them and reports a non-converged status.
//! - **Dual infeasibility** is a post-solve check failure.

use barrier_math::MathError;
use thiserror::Error;

/// A specialized Result type for optimization operations.
pub type OptimResult<T> = Result<T, OptimError>;

/// Errors that can occur while setting up or running an optimization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimError {
    /// The starting point violates an inequality constraint.
    #[error("Infeasible starting point: inequality {index} has g(x0) = {value:.3e} (must be > 0)")]
    InfeasibleStart {
        /// Index of the violated inequality constraint.
        index: usize,
        /// Constraint value at the starting point.
        value: f64,
    },

    /// A vector or matrix has the wrong dimension.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Where the mismatch was detected.
        context: String,
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// A solver configuration value is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the invalid setting.
        reason: String,
    },

    /// Invalid problem data.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Description of the invalid input.
        reason: String,
    },

    /// The Newton system could not be solved, even with regularization.
    #[error("Numerical stall at iteration {iteration}: {source}")]
    NumericalStall {
        /// Newton iteration at which the stall occurred.
        iteration: usize,
        /// Underlying linear algebra failure.
        #[source]
        source: MathError,
    },

    /// A linear algebra failure outside the Newton step.
    #[error("Linear algebra error: {0}")]
    Math(#[from] MathError),

    /// No step length satisfying the line-search conditions was found.
    #[error("Line search failed after {iterations} iterations (last step {last_step:.3e})")]
    LineSearchFailure {
        /// Number of trial steps evaluated.
        iterations: usize,
        /// Last trial step length.
        last_step: f64,
    },

    /// A returned inequality multiplier is negative.
    #[error("Dual infeasibility: inequality multiplier {index} is {multiplier:.3e}")]
    DualInfeasibility {
        /// Index of the offending multiplier.
        index: usize,
        /// The negative multiplier value.
        multiplier: f64,
    },

    /// Configuration could not be parsed.
    #[error("Failed to parse settings: {reason}")]
    Parse {
        /// Parser message.
        reason: String,
    },
}

impl OptimError {
    /// Creates a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised before any iteration begins.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::InfeasibleStart { .. }
                | Self::DimensionMismatch { .. }
                | Self::InvalidConfig { .. }
                | Self::InvalidInput { .. }
                | Self::Parse { .. }
        )
    }

    /// Returns true for errors the solver absorbs into a non-converged status.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NumericalStall { .. } | Self::Math(_) | Self::LineSearchFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OptimError::InfeasibleStart {
            index: 2,
            value: -0.1,
        };
        assert!(err.to_string().contains("inequality 2"));

        let err = OptimError::dimension_mismatch("start vector", 3, 2);
        assert!(err.to_string().contains("expected 3, got 2"));
    }

    #[test]
    fn test_error_classification() {
        assert!(OptimError::invalid_config("decay").is_setup_error());
        assert!(OptimError::InfeasibleStart {
            index: 0,
            value: 0.0
        }
        .is_setup_error());

        let stall = OptimError::NumericalStall {
            iteration: 3,
            source: MathError::NotPositiveDefinite { shift: 1.0 },
        };
        assert!(stall.is_recoverable());
        assert!(!stall.is_setup_error());

        let dual = OptimError::DualInfeasibility {
            index: 0,
            multiplier: -1.0,
        };
        assert!(!dual.is_recoverable());
        assert!(!dual.is_setup_error());

        let math: OptimError = MathError::non_finite("cholesky").into();
        assert!(math.is_recoverable());
    }
}
