//! Cholesky solves for symmetric positive definite systems.
//!
//! Newton systems built from a convex barrier sub-problem are symmetric
//! positive definite. Away from the solution, or for nonconvex objectives, the
//! Hessian can be indefinite; [`regularized_cholesky_solve`] then shifts the
//! diagonal until a factorization succeeds.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};

/// Configuration for the diagonal shift used by [`regularized_cholesky_solve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegularizationConfig {
    /// First shift tried, relative to the largest diagonal magnitude.
    pub initial_shift: f64,
    /// Factor applied to the shift after each failed attempt.
    pub growth: f64,
    /// Maximum number of shifted factorizations after the unshifted one.
    pub max_attempts: u32,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            initial_shift: 1e-8,
            growth: 10.0,
            max_attempts: 12,
        }
    }
}

impl RegularizationConfig {
    /// Sets the maximum number of shifted attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Solution of a possibly regularized symmetric system.
#[derive(Debug, Clone)]
pub struct RegularizedSolution {
    /// Solution of `(A + shift * I) x = b`.
    pub solution: DVector<f64>,
    /// Diagonal shift that was applied (zero if none was needed).
    pub shift: f64,
}

impl RegularizedSolution {
    /// Returns true if a diagonal shift had to be applied.
    #[must_use]
    pub fn was_regularized(&self) -> bool {
        self.shift > 0.0
    }
}

fn check_system(a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<()> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(MathError::invalid_input("Matrix must be square"));
    }
    if n != b.len() {
        return Err(MathError::rhs_mismatch(n, b.len()));
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(MathError::non_finite("Cholesky solve"));
    }
    Ok(())
}

/// Solves `A x = b` for symmetric positive definite `A`.
///
/// Fails with [`MathError::NotPositiveDefinite`] when the factorization breaks
/// down.
pub fn cholesky_solve(a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<DVector<f64>> {
    check_system(a, b)?;
    Cholesky::new(a.clone())
        .map(|chol| chol.solve(b))
        .ok_or(MathError::NotPositiveDefinite { shift: 0.0 })
}

/// Solves `(A + τ I) x = b`, increasing `τ` until `A + τ I` factors.
///
/// The unshifted matrix is tried first. Subsequent shifts start at
/// `initial_shift * max(1, max|A_ii|)` and grow geometrically.
pub fn regularized_cholesky_solve(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    config: &RegularizationConfig,
) -> MathResult<RegularizedSolution> {
    check_system(a, b)?;

    if let Some(chol) = Cholesky::new(a.clone()) {
        return Ok(RegularizedSolution {
            solution: chol.solve(b),
            shift: 0.0,
        });
    }

    let n = a.nrows();
    let scale = a.diagonal().amax().max(1.0);
    let mut shift = config.initial_shift * scale;

    for _ in 0..config.max_attempts {
        let mut shifted = a.clone();
        for i in 0..n {
            shifted[(i, i)] += shift;
        }
        if let Some(chol) = Cholesky::new(shifted) {
            return Ok(RegularizedSolution {
                solution: chol.solve(b),
                shift,
            });
        }
        shift *= config.growth;
    }

    Err(MathError::NotPositiveDefinite {
        shift: shift / config.growth,
    })
}
