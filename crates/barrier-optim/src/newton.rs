//! Inner Newton solver for a fixed barrier strength.
//!
//! Minimizes the augmented Lagrangian at a fixed `μ`:
//!
//! 1. Solve `H Δx = −∇L` with a regularized Cholesky factorization.
//! 2. Cap the step at a fraction of the distance to the nearest boundary.
//! 3. Run a strong Wolfe line search, falling back to Armijo backtracking.
//! 4. Stop on the configured convergence criterion.
//!
//! Once the Newton loop converges, equality multipliers are refined with
//! `λ ← λ + ρ c(x)` and the loop is re-entered until the equality residuals
//! are within `feasibility_tolerance`.

use std::time::Instant;

use barrier_math::linear_algebra::regularized_cholesky_solve;
use nalgebra::{DMatrix, DVector};
use tracing::{trace, warn};

use crate::config::{ConvergenceCriterion, HessianMode, SolverSettings};
use crate::constraints::ConstraintSet;
use crate::error::OptimError;
use crate::lagrangian::AugmentedLagrangian;
use crate::line_search::WolfeLineSearch;
use crate::objective::Objective;
use crate::state::MultiplierState;

/// Augmented values below this are treated as unbounded.
const UNBOUNDED_VALUE: f64 = -1e30;

/// Terminal state of an inner solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerStatus {
    /// The convergence criterion was met and the equalities hold.
    Converged,
    /// A budget or the deadline ran out, or the Newton step could not be
    /// computed.
    MaxIterationsExceeded,
    /// The augmented function became non-finite or unbounded below.
    Diverged,
}

impl InnerStatus {
    /// True for [`InnerStatus::Converged`].
    #[must_use]
    pub fn is_converged(self) -> bool {
        self == Self::Converged
    }
}

/// Result of an inner solve.
#[derive(Debug, Clone)]
pub struct InnerOutcome {
    /// Final iterate with `z = μ/g(x)` and `ν = λ + ρ c(x)`.
    pub state: MultiplierState,
    /// Terminal status.
    pub status: InnerStatus,
    /// Newton iterations across all multiplier rounds.
    pub iterations: usize,
    /// Objective value `f(x)` at the final iterate.
    pub objective_value: f64,
    /// Penalty `ρ` in effect at the end, for warm starting the next level.
    pub penalty: f64,
    /// Most recent recoverable error, if any.
    pub last_error: Option<OptimError>,
    /// True when the deadline stopped the solve.
    pub timed_out: bool,
}

/// Result of one Newton loop at fixed multipliers.
struct NewtonRun {
    x: DVector<f64>,
    status: InnerStatus,
    error: Option<OptimError>,
    timed_out: bool,
}

impl NewtonRun {
    fn stopped(x: DVector<f64>, status: InnerStatus) -> Self {
        Self {
            x,
            status,
            error: None,
            timed_out: false,
        }
    }
}

/// BFGS approximation of the objective curvature.
#[derive(Debug, Clone)]
struct QuasiNewton {
    approximation: DMatrix<f64>,
    updates: usize,
}

impl QuasiNewton {
    fn new(n: usize) -> Self {
        Self {
            approximation: DMatrix::identity(n, n),
            updates: 0,
        }
    }

    /// Rescales the identity start by `yᵀy / sᵀy` on the first update, then
    /// applies a damped BFGS update.
    fn update(&mut self, s: &DVector<f64>, y: &DVector<f64>) {
        if self.updates == 0 {
            let scale = y.norm_squared() / s.dot(y);
            if scale.is_finite() && scale > 0.0 {
                let n = s.len();
                self.approximation = DMatrix::identity(n, n) * scale;
            }
        }
        damped_bfgs_update(&mut self.approximation, s, y);
        self.updates += 1;
    }
}

/// Newton solver for one barrier level.
#[derive(Debug, Clone, Copy)]
pub struct NewtonSolver {
    settings: SolverSettings,
    deadline: Option<Instant>,
}

impl NewtonSolver {
    /// Creates a solver with the given settings.
    #[must_use]
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            deadline: None,
        }
    }

    /// Sets a wall-clock deadline, checked once per Newton iteration.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Minimizes the augmented Lagrangian at barrier strength `strength`,
    /// starting from `start` (variates and equality multipliers `λ`) with
    /// penalty `penalty`.
    ///
    /// `start.variates` must be strictly feasible.
    pub fn solve<O: Objective + ?Sized>(
        &self,
        objective: &O,
        constraints: &ConstraintSet,
        strength: f64,
        start: &MultiplierState,
        penalty: f64,
    ) -> InnerOutcome {
        let penalty_control = self.settings.penalty;
        let feasibility_tolerance = self.settings.convergence.feasibility_tolerance;

        let mut lagrangian = AugmentedLagrangian::new(
            objective,
            constraints,
            strength,
            start.equality_multipliers.clone(),
            penalty,
        );
        let mut x = start.variates.clone();
        let mut iterations = 0;
        let mut last_error = None;
        let mut timed_out = false;
        let mut curvature = None;
        let mut previous_violation = f64::INFINITY;
        let mut status = InnerStatus::MaxIterationsExceeded;

        for round in 0..=penalty_control.max_multiplier_updates {
            let run = self.newton_loop(&lagrangian, x, &mut iterations, &mut curvature);
            x = run.x;
            status = run.status;
            timed_out |= run.timed_out;
            if run.error.is_some() {
                last_error = run.error;
            }
            if status != InnerStatus::Converged || constraints.equality_count() == 0 {
                break;
            }

            let violation = constraints.max_equality_violation(&x);
            if violation <= feasibility_tolerance {
                break;
            }
            if round == penalty_control.max_multiplier_updates {
                warn!(
                    violation,
                    rounds = round + 1,
                    "equality multiplier updates exhausted"
                );
                status = InnerStatus::MaxIterationsExceeded;
                break;
            }

            let mut rho = lagrangian.penalty();
            if violation > 0.25 * previous_violation {
                rho = (rho * penalty_control.growth).min(penalty_control.max_penalty);
            }
            previous_violation = violation;
            trace!(round, violation, penalty = rho, "refining equality multipliers");
            lagrangian = lagrangian.with_multipliers(lagrangian.updated_multipliers(&x), rho);
        }

        let equality_multipliers = lagrangian.updated_multipliers(&x);
        let inequality_multipliers = lagrangian.barrier().implied_multipliers(&x);
        let objective_value = objective.evaluate(&x).value;

        InnerOutcome {
            state: MultiplierState::new(x, equality_multipliers, inequality_multipliers),
            status,
            iterations,
            objective_value,
            penalty: lagrangian.penalty(),
            last_error,
            timed_out,
        }
    }

    /// Newton iterations at fixed multipliers. `iterations` is the running
    /// count shared with the caller; `curvature` carries the quasi-Newton
    /// approximation between rounds.
    fn newton_loop<O: Objective + ?Sized>(
        &self,
        lagrangian: &AugmentedLagrangian<'_, O>,
        x0: DVector<f64>,
        iterations: &mut usize,
        curvature: &mut Option<QuasiNewton>,
    ) -> NewtonRun {
        let convergence = self.settings.convergence;
        let line_search = WolfeLineSearch::new(self.settings.line_search);
        let regularization = self.settings.hessian.regularization();
        let mode = self.settings.hessian.mode;

        let mut x = x0;
        let Some(mut terms) = lagrangian.evaluate_terms(&x) else {
            return NewtonRun::stopped(x, InnerStatus::Diverged);
        };
        let mut current = terms.total();
        if !current.is_finite() {
            return NewtonRun::stopped(x, InnerStatus::Diverged);
        }
        let initial_gradient_norm = current.jacobian.amax();

        loop {
            if convergence.criterion == ConvergenceCriterion::GradientNorm
                && current.jacobian.amax()
                    <= convergence.absolute_tolerance
                        + convergence.relative_tolerance * initial_gradient_norm
            {
                return NewtonRun::stopped(x, InnerStatus::Converged);
            }
            if *iterations >= convergence.max_iterations {
                warn!(
                    iterations = *iterations,
                    strength = lagrangian.barrier().strength(),
                    "Newton iteration budget exhausted"
                );
                return NewtonRun::stopped(x, InnerStatus::MaxIterationsExceeded);
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(iterations = *iterations, "time limit reached");
                return NewtonRun {
                    x,
                    status: InnerStatus::MaxIterationsExceeded,
                    error: None,
                    timed_out: true,
                };
            }
            *iterations += 1;

            if mode == HessianMode::Bfgs && curvature.is_none() {
                *curvature = Some(QuasiNewton::new(x.len()));
            }
            // Quasi-Newton replaces the objective curvature only; barrier and
            // penalty curvature stay exact.
            let hessian = match (mode, curvature.as_ref()) {
                (HessianMode::Bfgs, Some(b)) => &b.approximation + &terms.constraints.hessian,
                _ => current.hessian.clone(),
            };

            let rhs = -&current.jacobian;
            let mut direction = match regularized_cholesky_solve(&hessian, &rhs, &regularization) {
                Ok(solution) => {
                    if solution.was_regularized() {
                        trace!(shift = solution.shift, "regularized Newton system");
                    }
                    solution.solution
                }
                Err(source) => {
                    warn!(iteration = *iterations, %source, "Newton system could not be solved");
                    return NewtonRun {
                        x,
                        status: InnerStatus::MaxIterationsExceeded,
                        error: Some(OptimError::NumericalStall {
                            iteration: *iterations,
                            source,
                        }),
                        timed_out: false,
                    };
                }
            };

            let mut slope = current.jacobian.dot(&direction);
            let decrement = -0.5 * slope;
            // Below value resolution the line search cannot tell iterates apart.
            let at_resolution = decrement.is_finite()
                && slope <= 0.0
                && decrement <= f64::EPSILON * current.value.abs().max(1.0);
            // The objective sequence is judged on the decrease predicted for
            // this step; the step is still taken before stopping.
            let finishing = convergence.criterion == ConvergenceCriterion::ObjectiveSequence
                && (at_resolution
                    || decrement.is_finite()
                        && slope <= 0.0
                        && decrement
                            <= convergence.absolute_tolerance
                                + convergence.relative_tolerance * current.value.abs());
            if !at_resolution && !(slope < 0.0) {
                trace!(slope, "Newton direction not descending, using steepest descent");
                direction = rhs;
                slope = current.jacobian.dot(&direction);
            }

            let max_step = lagrangian.barrier().max_feasible_step(
                &x,
                &direction,
                self.settings.line_search.boundary_fraction,
            );
            let phi = |y: &DVector<f64>| lagrangian.value_and_gradient(y);
            let step = if at_resolution {
                max_step.min(1.0)
            } else {
                match line_search.search(
                    &phi,
                    &x,
                    current.value,
                    &current.jacobian,
                    &direction,
                    max_step,
                ) {
                    Ok(step) => step.step,
                    Err(wolfe_error) => {
                        trace!(%wolfe_error, "strong Wolfe search failed, backtracking");
                        match line_search.backtrack(
                            &phi,
                            &x,
                            current.value,
                            &current.jacobian,
                            &direction,
                            max_step,
                        ) {
                            Ok(step) => step.step,
                            Err(error) => {
                                let stationary = finishing
                                    || self.is_stationary(
                                        current.value,
                                        &current.jacobian,
                                        -0.5 * slope,
                                        initial_gradient_norm,
                                    );
                                let status = if stationary {
                                    InnerStatus::Converged
                                } else {
                                    warn!(iteration = *iterations, %error, "line search failed");
                                    InnerStatus::MaxIterationsExceeded
                                };
                                return NewtonRun {
                                    x,
                                    status,
                                    error: Some(error),
                                    timed_out: false,
                                };
                            }
                        }
                    }
                }
            };

            let s_k = &direction * step;
            let x_next = &x + &s_k;
            let Some(next_terms) = lagrangian.evaluate_terms(&x_next) else {
                return NewtonRun::stopped(x, InnerStatus::MaxIterationsExceeded);
            };
            let next = next_terms.total();
            if !next.is_finite() || next.value < UNBOUNDED_VALUE {
                warn!(iteration = *iterations, value = next.value, "augmented objective diverged");
                return NewtonRun::stopped(x_next, InnerStatus::Diverged);
            }

            if let Some(quasi_newton) = curvature.as_mut() {
                let y = &next_terms.objective.jacobian - &terms.objective.jacobian;
                quasi_newton.update(&s_k, &y);
            }

            trace!(
                iteration = *iterations,
                value = next.value,
                gradient_norm = next.jacobian.amax(),
                step,
                "Newton step"
            );

            let converged = match convergence.criterion {
                ConvergenceCriterion::ObjectiveSequence => finishing,
                ConvergenceCriterion::GradientNorm => {
                    next.jacobian.amax()
                        <= convergence.absolute_tolerance
                            + convergence.relative_tolerance * initial_gradient_norm
                }
            };

            x = x_next;
            current = next;
            terms = next_terms;

            if converged {
                return NewtonRun::stopped(x, InnerStatus::Converged);
            }
        }
    }

    /// Whether an iterate the line search cannot improve is already
    /// stationary under the configured criterion.
    fn is_stationary(
        &self,
        value: f64,
        gradient: &DVector<f64>,
        predicted_decrease: f64,
        initial_gradient_norm: f64,
    ) -> bool {
        let c = self.settings.convergence;
        match c.criterion {
            ConvergenceCriterion::ObjectiveSequence => {
                predicted_decrease <= c.absolute_tolerance + c.relative_tolerance * value.abs()
            }
            ConvergenceCriterion::GradientNorm => {
                gradient.amax() <= c.absolute_tolerance + c.relative_tolerance * initial_gradient_norm
            }
        }
    }
}

/// Powell-damped BFGS update of `b` with step `s` and gradient change `y`.
///
/// Keeps `b` positive definite; the update is skipped when `sᵀBs` is
/// negligible.
fn damped_bfgs_update(b: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) {
    let bs = &*b * s;
    let sbs = s.dot(&bs);
    if !(sbs > f64::EPSILON * s.norm_squared()) {
        return;
    }

    let sy = s.dot(y);
    let r = if sy >= 0.2 * sbs {
        y.clone()
    } else {
        let theta = 0.8 * sbs / (sbs - sy);
        y * theta + &bs * (1.0 - theta)
    };
    let sr = s.dot(&r);
    if !(sr > 0.0) || !r.iter().all(|v| v.is_finite()) {
        return;
    }

    b.ger(-1.0 / sbs, &bs, &bs, 1.0);
    b.ger(1.0 / sr, &r, &r, 1.0);
}
