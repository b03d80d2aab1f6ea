//! Solver state and results.

use std::time::Duration;

use nalgebra::DVector;

use crate::constraints::ConstraintSet;
use crate::error::{OptimError, OptimResult};
use crate::newton::InnerStatus;
use crate::objective::Objective;

/// Variates together with their constraint multipliers.
///
/// Multipliers follow the sign convention
/// `∇f(x) − Σᵢ zᵢ ∇gᵢ(x) + Σⱼ νⱼ aⱼ = 0` at a KKT point, with `zᵢ ≥ 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplierState {
    /// Variate vector `x`.
    pub variates: DVector<f64>,
    /// Equality multipliers `ν`, one per equality constraint.
    pub equality_multipliers: DVector<f64>,
    /// Inequality multipliers `z`, one per inequality constraint.
    pub inequality_multipliers: DVector<f64>,
}

impl MultiplierState {
    /// Creates a state.
    #[must_use]
    pub fn new(
        variates: DVector<f64>,
        equality_multipliers: DVector<f64>,
        inequality_multipliers: DVector<f64>,
    ) -> Self {
        Self {
            variates,
            equality_multipliers,
            inequality_multipliers,
        }
    }

    /// Checks that every inequality multiplier is non-negative.
    pub fn check_dual_feasibility(&self) -> OptimResult<()> {
        match self
            .inequality_multipliers
            .iter()
            .enumerate()
            .find(|(_, z)| !(**z >= 0.0))
        {
            Some((index, &multiplier)) => Err(OptimError::DualInfeasibility { index, multiplier }),
            None => Ok(()),
        }
    }
}

/// First-order optimality residuals at a solution.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KktResiduals {
    /// `‖∇f − Σ zᵢ∇gᵢ + Σ νⱼ aⱼ‖∞`.
    pub stationarity: f64,
    /// Largest equality residual or inequality violation.
    pub primal_infeasibility: f64,
    /// `maxᵢ |zᵢ gᵢ|`.
    pub complementarity: f64,
}

impl KktResiduals {
    /// Evaluates the residuals of `state` for the given problem.
    pub fn evaluate<O: Objective + ?Sized>(
        objective: &O,
        constraints: &ConstraintSet,
        state: &MultiplierState,
    ) -> Self {
        let x = &state.variates;
        let mut gradient = objective.evaluate(x).jacobian;

        let mut complementarity: f64 = 0.0;
        let mut violation = constraints.max_equality_violation(x);
        for (constraint, z) in constraints
            .inequalities()
            .iter()
            .zip(state.inequality_multipliers.iter())
        {
            let g = constraint.value(x);
            gradient.axpy(-z, &constraint.gradient(x), 1.0);
            complementarity = complementarity.max((z * g).abs());
            violation = violation.max(-g);
        }
        for (equality, nu) in constraints
            .equalities()
            .iter()
            .zip(state.equality_multipliers.iter())
        {
            gradient.axpy(*nu, equality.coefficients(), 1.0);
        }

        Self {
            stationarity: gradient.amax(),
            primal_infeasibility: violation.max(0.0),
            complementarity,
        }
    }
}

/// Summary of one outer (barrier-level) iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OuterIterationRecord {
    /// Outer iteration index, starting at 0.
    pub iteration: usize,
    /// Barrier strength `μ` used at this level.
    pub barrier_strength: f64,
    /// Duality gap `μ · m_ineq`.
    pub duality_gap: f64,
    /// Inner solver status.
    pub inner_status: InnerStatus,
    /// Newton iterations spent at this level.
    pub inner_iterations: usize,
    /// Objective value `f(x)` at the end of the level.
    pub objective_value: f64,
}

/// Outcome of a barrier solve.
///
/// Non-convergence is reported through [`SolveResult::converged`], not as an
/// error.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Final variates and multipliers.
    pub state: MultiplierState,
    /// True when the last barrier level converged and the schedule reached
    /// the gap tolerance or the barrier floor.
    pub converged: bool,
    /// Number of outer iterations performed.
    pub outer_iterations: usize,
    /// Final barrier strength.
    pub barrier_strength: f64,
    /// Objective value at the final variates.
    pub objective_value: f64,
    /// Newton iterations across all barrier levels.
    pub total_newton_iterations: usize,
    /// Per-level history.
    pub history: Vec<OuterIterationRecord>,
    /// Optimality residuals at the final state.
    pub kkt: KktResiduals,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl SolveResult {
    /// Final variates.
    #[must_use]
    pub fn variates(&self) -> &DVector<f64> {
        &self.state.variates
    }

    /// Final equality multipliers.
    #[must_use]
    pub fn equality_multipliers(&self) -> &DVector<f64> {
        &self.state.equality_multipliers
    }

    /// Final inequality multipliers.
    #[must_use]
    pub fn inequality_multipliers(&self) -> &DVector<f64> {
        &self.state.inequality_multipliers
    }

    /// Final duality gap, or `0` when no level was run.
    #[must_use]
    pub fn duality_gap(&self) -> f64 {
        self.history.last().map_or(0.0, |r| r.duality_gap)
    }
}
