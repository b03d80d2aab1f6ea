//! Augmented Lagrangian of a fixed-barrier sub-problem.
//!
//! Equality constraints are folded into the objective rather than added as
//! KKT rows, so the Newton system stays `n × n`:
//!
//! ```text
//! L(x; λ, ρ) = f(x) − μ Σᵢ log gᵢ(x) + Σⱼ λⱼ cⱼ(x) + (ρ/2) Σⱼ cⱼ(x)²,   cⱼ(x) = aⱼ·x + bⱼ
//! ```
//!
//! The quadratic term makes minimizers of `L` approach the equality manifold;
//! the multiplier update `λ ← λ + ρ c(x)` removes the remaining offset.

use nalgebra::DVector;

use crate::barrier::BarrierTransform;
use crate::constraints::ConstraintSet;
use crate::objective::Objective;
use crate::sensitivity::Sensitivity;

/// Objective and constraint contributions to the augmented Lagrangian.
#[derive(Debug, Clone)]
pub struct AugmentedTerms {
    /// The raw objective `f`.
    pub objective: Sensitivity,
    /// Barrier plus folded equality terms.
    pub constraints: Sensitivity,
}

impl AugmentedTerms {
    /// Sum of both contributions.
    #[must_use]
    pub fn total(&self) -> Sensitivity {
        Sensitivity {
            value: self.objective.value + self.constraints.value,
            jacobian: &self.objective.jacobian + &self.constraints.jacobian,
            hessian: &self.objective.hessian + &self.constraints.hessian,
        }
    }
}

/// Augmented Lagrangian for one barrier strength and multiplier estimate.
pub struct AugmentedLagrangian<'a, O: ?Sized> {
    objective: &'a O,
    constraints: &'a ConstraintSet,
    barrier: BarrierTransform<'a>,
    multipliers: DVector<f64>,
    penalty: f64,
}

impl<'a, O: Objective + ?Sized> AugmentedLagrangian<'a, O> {
    /// Creates the augmented function at barrier strength `strength` with
    /// equality multipliers `multipliers` and quadratic penalty `penalty`.
    pub fn new(
        objective: &'a O,
        constraints: &'a ConstraintSet,
        strength: f64,
        multipliers: DVector<f64>,
        penalty: f64,
    ) -> Self {
        Self {
            objective,
            constraints,
            barrier: BarrierTransform::new(constraints.inequalities(), strength),
            multipliers,
            penalty,
        }
    }

    /// The barrier transform in use.
    #[must_use]
    pub fn barrier(&self) -> &BarrierTransform<'a> {
        &self.barrier
    }

    /// Current equality multiplier estimate `λ`.
    #[must_use]
    pub fn multipliers(&self) -> &DVector<f64> {
        &self.multipliers
    }

    /// Quadratic penalty `ρ`.
    #[must_use]
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Returns a copy with a new multiplier estimate and penalty.
    #[must_use]
    pub fn with_multipliers(&self, multipliers: DVector<f64>, penalty: f64) -> Self {
        Self {
            objective: self.objective,
            constraints: self.constraints,
            barrier: self.barrier,
            multipliers,
            penalty,
        }
    }

    /// First-order multiplier update `λ + ρ c(x)`.
    #[must_use]
    pub fn updated_multipliers(&self, x: &DVector<f64>) -> DVector<f64> {
        let residuals = self.constraints.equality_residuals(x);
        &self.multipliers + residuals * self.penalty
    }

    /// Objective and constraint contributions at `x`, or `None` where the
    /// barrier is infinite.
    #[must_use]
    pub fn evaluate_terms(&self, x: &DVector<f64>) -> Option<AugmentedTerms> {
        let objective = self.objective.evaluate(x);
        let mut constraints = self.barrier.evaluate(x)?;

        for (equality, lambda) in self.constraints.equalities().iter().zip(self.multipliers.iter()) {
            let c = equality.value(x);
            let a = equality.coefficients();
            constraints.value += lambda * c + 0.5 * self.penalty * c * c;
            constraints.jacobian.axpy(lambda + self.penalty * c, a, 1.0);
            constraints.hessian.ger(self.penalty, a, a, 1.0);
        }

        Some(AugmentedTerms {
            objective,
            constraints,
        })
    }

    /// Value, gradient and Hessian of the augmented Lagrangian. The value is
    /// `+∞` where any inequality is violated.
    #[must_use]
    pub fn evaluate(&self, x: &DVector<f64>) -> Sensitivity {
        match self.evaluate_terms(x) {
            Some(terms) => terms.total(),
            None => {
                let n = x.len();
                Sensitivity {
                    value: f64::INFINITY,
                    ..Sensitivity::zeros(n)
                }
            }
        }
    }

    /// Value and gradient only, as consumed by the line search.
    #[must_use]
    pub fn value_and_gradient(&self, x: &DVector<f64>) -> (f64, DVector<f64>) {
        let s = self.evaluate(x);
        (s.value, s.jacobian)
    }
}
