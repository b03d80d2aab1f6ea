//! Linear algebra utilities.
//!
//! Dense factorizations and solves for the Newton systems assembled by the
//! optimizer. Matrices are `nalgebra` dynamic matrices.

mod cholesky;

pub use cholesky::{
    cholesky_solve, regularized_cholesky_solve, RegularizationConfig, RegularizedSolution,
};

use nalgebra::DMatrix;

/// Returns true if `matrix` is square and symmetric within `tolerance`.
///
/// The tolerance is relative to the largest absolute entry, so badly scaled
/// but symmetric matrices are still accepted.
pub fn is_symmetric(matrix: &DMatrix<f64>, tolerance: f64) -> bool {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return false;
    }
    let scale = matrix.amax().max(1.0);
    for i in 0..n {
        for j in i + 1..n {
            if (matrix[(i, j)] - matrix[(j, i)]).abs() > tolerance * scale {
                return false;
            }
        }
    }
    true
}
