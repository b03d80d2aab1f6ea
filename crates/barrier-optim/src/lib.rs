//! # Barrier Optim
//!
//! Interior-point optimization engine for smooth objectives under linear
//! equality and inequality constraints.
//!
//! This crate provides:
//!
//! - **Objectives**: the [`Objective`](objective::Objective) trait with
//!   quadratic, linear, closure and weighted composite implementations
//! - **Constraints**: linear equalities, coordinate bounds and general linear
//!   inequalities collected in a [`ConstraintSet`](constraints::ConstraintSet)
//! - **Barrier continuation**: log-barrier sub-problems solved by Newton's
//!   method with a strong Wolfe line search while the barrier strength decays
//! - **Batch solving** of independent problems, in parallel with the
//!   `parallel` feature
//!
//! Equality constraints are folded into the Newton system through an
//! augmented Lagrangian, so every linear solve is `n × n`.
//!
//! ## Example
//!
//! ```rust
//! use barrier_optim::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! // Minimum variance of two assets, fully invested, 15%-65% per asset.
//! let covariance = DMatrix::from_row_slice(2, 2, &[0.04, 0.006, 0.006, 0.09]);
//! let objective = QuadraticObjective::from_covariance(covariance).unwrap();
//! let constraints = ConstraintSet::new(2)
//!     .with_budget(1.0)
//!     .unwrap()
//!     .with_box(0.15, 0.65)
//!     .unwrap();
//! let problem = Problem::new(objective, constraints, DVector::from_vec(vec![0.5, 0.5]));
//!
//! let result = BarrierSolver::default().solve(&problem).unwrap();
//!
//! assert!(result.converged);
//! assert!((result.variates().sum() - 1.0).abs() < 1e-6);
//! ```

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
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod barrier;
pub mod batch;
pub mod config;
pub mod constraints;
pub mod continuation;
pub mod error;
pub mod lagrangian;
pub mod line_search;
pub mod newton;
pub mod objective;
pub mod sensitivity;
pub mod state;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::batch::{solve_batch, BatchConfig};
    pub use crate::config::{
        BarrierControl, ConvergenceControl, ConvergenceCriterion, HessianMode, LineSearchControl,
        PenaltyControl, SolverSettings,
    };
    pub use crate::constraints::{
        Bound, BoundSide, ConstraintSet, InequalityConstraint, LinearEquality, LinearInequality,
        SharedInequality,
    };
    pub use crate::continuation::{solve, BarrierSolver, Problem};
    pub use crate::error::{OptimError, OptimResult};
    pub use crate::newton::InnerStatus;
    pub use crate::objective::{
        CompositeObjective, FnObjective, LinearObjective, Objective, QuadraticObjective,
        SharedObjective,
    };
    pub use crate::sensitivity::{combine, combine_weighted, Sensitivity};
    pub use crate::state::{KktResiduals, MultiplierState, OuterIterationRecord, SolveResult};
}

pub use error::{OptimError, OptimResult};
