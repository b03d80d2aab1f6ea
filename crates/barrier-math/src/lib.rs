//! # Barrier Math
//!
//! Dense linear algebra for the Barrier optimization engine.
//!
//! This crate provides:
//!
//! - **Linear Algebra**: Cholesky and regularized Cholesky solves
//! - **Symmetry checks** for assembled Hessians
//!
//! Matrices and vectors are `nalgebra` dynamic types (`DMatrix<f64>`,
//! `DVector<f64>`).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]
#![allow(clippy::doc_markdown)]

pub mod error;
pub mod linear_algebra;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{MathError, MathResult};
    pub use crate::linear_algebra::{
        cholesky_solve, is_symmetric, regularized_cholesky_solve, RegularizationConfig,
        RegularizedSolution,
    };
}

pub use error::{MathError, MathResult};
