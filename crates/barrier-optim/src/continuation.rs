//! Outer barrier continuation.
//!
//! Solves a sequence of barrier sub-problems with geometrically decreasing
//! strength `μ`, warm-starting each level from the previous one:
//!
//! ```text
//! μ₀ = initial_strength
//! repeat:
//!     x, ν ← inner Newton solve at μ from the previous x, ν
//!     stop if μ·m_ineq ≤ gap_tolerance, μ ≤ floor, budget or deadline
//!     μ ← max(μ·decay_factor, floor)
//! ```
//!
//! # Example
//!
//! ```rust
//! use barrier_optim::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! let objective = QuadraticObjective::new(DMatrix::identity(2, 2) * 2.0, DVector::zeros(2)).unwrap();
//! let constraints = ConstraintSet::new(2)
//!     .with_budget(1.0)
//!     .unwrap()
//!     .with_box(0.0, 1.0)
//!     .unwrap();
//! let problem = Problem::new(objective, constraints, DVector::from_vec(vec![0.3, 0.7]));
//!
//! let result = BarrierSolver::default().solve(&problem).unwrap();
//!
//! assert!(result.converged);
//! assert!((result.variates()[0] - 0.5).abs() < 1e-6);
//! ```

use std::time::Instant;

use nalgebra::DVector;
use tracing::{debug, info, warn};

use crate::barrier::{check_strictly_feasible, BarrierTransform};
use crate::config::{BarrierControl, ConvergenceControl, SolverSettings};
use crate::constraints::{ConstraintSet, LinearEquality, SharedInequality};
use crate::error::{OptimError, OptimResult};
use crate::newton::{InnerStatus, NewtonSolver};
use crate::objective::Objective;
use crate::state::{KktResiduals, MultiplierState, OuterIterationRecord, SolveResult};

/// Relative tolerance for the Hessian symmetry check at the start point.
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// An objective, its constraints and a strictly feasible start.
pub struct Problem<O> {
    objective: O,
    constraints: ConstraintSet,
    start: DVector<f64>,
    equality_multipliers: Option<DVector<f64>>,
}

impl<O: Objective> Problem<O> {
    /// Creates a problem. Validation happens when it is solved.
    pub fn new(objective: O, constraints: ConstraintSet, start: DVector<f64>) -> Self {
        Self {
            objective,
            constraints,
            start,
            equality_multipliers: None,
        }
    }

    /// Warm-starts the equality multipliers (zero otherwise).
    #[must_use]
    pub fn with_equality_multipliers(mut self, multipliers: DVector<f64>) -> Self {
        self.equality_multipliers = Some(multipliers);
        self
    }

    /// The objective.
    pub fn objective(&self) -> &O {
        &self.objective
    }

    /// The constraints.
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// The starting variates.
    pub fn start(&self) -> &DVector<f64> {
        &self.start
    }

    /// Checks dimensions, strict feasibility and the objective at the start.
    pub fn validate(&self) -> OptimResult<()> {
        validate_problem(
            &self.objective,
            &self.constraints,
            &self.start,
            self.equality_multipliers.as_ref(),
        )
    }
}

impl<O> std::fmt::Debug for Problem<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("constraints", &self.constraints)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

fn validate_problem<O: Objective + ?Sized>(
    objective: &O,
    constraints: &ConstraintSet,
    start: &DVector<f64>,
    equality_multipliers: Option<&DVector<f64>>,
) -> OptimResult<()> {
    objective.validate()?;
    let n = objective.dimension();
    if constraints.dimension() != n {
        return Err(OptimError::dimension_mismatch(
            "constraint set",
            n,
            constraints.dimension(),
        ));
    }
    if start.len() != n {
        return Err(OptimError::dimension_mismatch("start vector", n, start.len()));
    }
    if start.iter().any(|v| !v.is_finite()) {
        return Err(OptimError::invalid_input("start vector must be finite"));
    }
    if let Some(multipliers) = equality_multipliers {
        if multipliers.len() != constraints.equality_count() {
            return Err(OptimError::dimension_mismatch(
                "equality multipliers",
                constraints.equality_count(),
                multipliers.len(),
            ));
        }
    }

    check_strictly_feasible(constraints.inequalities(), start)?;

    let sensitivity = objective.evaluate(start);
    if sensitivity.dimension() != n {
        return Err(OptimError::dimension_mismatch(
            "objective gradient",
            n,
            sensitivity.dimension(),
        ));
    }
    let hessian = &sensitivity.hessian;
    if hessian.nrows() != n || hessian.ncols() != n {
        return Err(OptimError::dimension_mismatch(
            "objective Hessian",
            n,
            if hessian.nrows() != n { hessian.nrows() } else { hessian.ncols() },
        ));
    }
    if !sensitivity.is_finite() {
        return Err(OptimError::invalid_input(
            "objective is not finite at the start point",
        ));
    }
    if !sensitivity.is_symmetric(SYMMETRY_TOLERANCE) {
        return Err(OptimError::invalid_input(
            "objective Hessian is not symmetric at the start point",
        ));
    }
    Ok(())
}

/// Why the outer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Gap,
    Floor,
    Budget,
    Deadline,
    Diverged,
}

/// Barrier continuation solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarrierSolver {
    settings: SolverSettings,
}

impl BarrierSolver {
    /// Creates a solver with the given settings.
    #[must_use]
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    /// The solver settings.
    #[must_use]
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Solves `problem`.
    pub fn solve<O: Objective>(&self, problem: &Problem<O>) -> OptimResult<SolveResult> {
        self.minimize(
            &problem.objective,
            &problem.constraints,
            &problem.start,
            problem.equality_multipliers.as_ref(),
        )
    }

    /// Solves with borrowed problem data.
    ///
    /// Setup errors are returned before any iteration. Non-convergence is
    /// reported through [`SolveResult::converged`]. A negative inequality
    /// multiplier in the final state is returned as
    /// [`OptimError::DualInfeasibility`].
    pub fn minimize<O: Objective + ?Sized>(
        &self,
        objective: &O,
        constraints: &ConstraintSet,
        start: &DVector<f64>,
        equality_multipliers: Option<&DVector<f64>>,
    ) -> OptimResult<SolveResult> {
        self.settings.validate()?;
        validate_problem(objective, constraints, start, equality_multipliers)?;

        let started = Instant::now();
        let schedule = self.settings.barrier;
        let deadline = schedule.time_limit().map(|limit| started + limit);
        let newton = NewtonSolver::new(self.settings).with_deadline(deadline);
        let m_ineq = constraints.inequality_count() as f64;

        let mut strength = schedule.initial_strength;
        let mut penalty = self.settings.penalty.initial_penalty;
        let mut state = MultiplierState::new(
            start.clone(),
            equality_multipliers
                .cloned()
                .unwrap_or_else(|| DVector::zeros(constraints.equality_count())),
            BarrierTransform::new(constraints.inequalities(), strength).implied_multipliers(start),
        );
        let mut history = Vec::new();
        let mut total_newton_iterations = 0;
        let mut last_status = InnerStatus::MaxIterationsExceeded;
        let mut stop = StopReason::Budget;

        for iteration in 0..schedule.max_outer_iterations {
            let outcome = newton.solve(objective, constraints, strength, &state, penalty);
            let duality_gap = strength * m_ineq;
            total_newton_iterations += outcome.iterations;
            last_status = outcome.status;

            debug!(
                iteration,
                strength,
                duality_gap,
                status = ?outcome.status,
                inner_iterations = outcome.iterations,
                objective = outcome.objective_value,
                "barrier level finished"
            );
            history.push(OuterIterationRecord {
                iteration,
                barrier_strength: strength,
                duality_gap,
                inner_status: outcome.status,
                inner_iterations: outcome.iterations,
                objective_value: outcome.objective_value,
            });

            if outcome.status == InnerStatus::Diverged {
                warn!(iteration, strength, "inner solve diverged");
                if outcome.state.variates.iter().all(|v| v.is_finite()) {
                    state = outcome.state;
                }
                stop = StopReason::Diverged;
                break;
            }

            state = outcome.state;
            penalty = outcome.penalty;

            if duality_gap <= schedule.gap_tolerance {
                stop = StopReason::Gap;
                break;
            }
            if strength <= schedule.floor {
                stop = StopReason::Floor;
                break;
            }
            if outcome.timed_out || deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(iteration, strength, "time limit reached");
                stop = StopReason::Deadline;
                break;
            }
            if iteration + 1 == schedule.max_outer_iterations {
                warn!(
                    outer_iterations = iteration + 1,
                    duality_gap, "outer iteration budget exhausted"
                );
                break;
            }

            strength = (strength * schedule.decay_factor).max(schedule.floor);
        }

        state.check_dual_feasibility()?;

        let converged =
            last_status.is_converged() && matches!(stop, StopReason::Gap | StopReason::Floor);
        let kkt = KktResiduals::evaluate(objective, constraints, &state);
        let objective_value = objective.evaluate(&state.variates).value;

        info!(
            converged,
            stop = ?stop,
            outer_iterations = history.len(),
            newton_iterations = total_newton_iterations,
            objective = objective_value,
            stationarity = kkt.stationarity,
            "barrier solve finished"
        );

        Ok(SolveResult {
            state,
            converged,
            outer_iterations: history.len(),
            barrier_strength: strength,
            objective_value,
            total_newton_iterations,
            history,
            kkt,
            elapsed: started.elapsed(),
        })
    }
}

/// Minimizes `objective` subject to `a·x + b = 0` equalities and `g(x) > 0`
/// inequalities from a strictly feasible `start`, with default line-search,
/// penalty and Hessian settings.
pub fn solve<O: Objective + ?Sized>(
    objective: &O,
    equality_constraints: Vec<LinearEquality>,
    inequality_constraints: Vec<SharedInequality>,
    start: &DVector<f64>,
    convergence: ConvergenceControl,
    barrier: BarrierControl,
) -> OptimResult<SolveResult> {
    let constraints = ConstraintSet::from_parts(
        objective.dimension(),
        equality_constraints,
        inequality_constraints,
    )?;
    BarrierSolver::new(SolverSettings::new(convergence, barrier)).minimize(
        objective,
        &constraints,
        start,
        None,
    )
}
