//! Log-barrier transform for inequality constraints.
//!
//! ```text
//! B_μ(x)   = −μ Σᵢ log gᵢ(x)
//! ∇B_μ(x)  = −μ Σᵢ ∇gᵢ / gᵢ
//! ∇²B_μ(x) =  μ Σᵢ ∇gᵢ∇gᵢᵀ / gᵢ²  −  μ Σᵢ ∇²gᵢ / gᵢ
//! ```
//!
//! The curvature term `∇²gᵢ` only appears for constraints that report a
//! Hessian; affine constraints contribute the rank-one terms alone.

use nalgebra::DVector;

use crate::constraints::SharedInequality;
use crate::error::{OptimError, OptimResult};
use crate::sensitivity::Sensitivity;

/// Log-barrier over a borrowed slice of inequality constraints.
#[derive(Clone, Copy)]
pub struct BarrierTransform<'a> {
    inequalities: &'a [SharedInequality],
    strength: f64,
}

impl<'a> BarrierTransform<'a> {
    /// Creates a barrier with strength `μ`.
    #[must_use]
    pub fn new(inequalities: &'a [SharedInequality], strength: f64) -> Self {
        Self {
            inequalities,
            strength,
        }
    }

    /// Barrier strength `μ`.
    #[must_use]
    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// True when there are no inequality constraints (the barrier is a no-op).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inequalities.is_empty()
    }

    /// Barrier value, gradient and Hessian at `x`.
    ///
    /// Returns `None` when some `gᵢ(x) ≤ 0`, i.e. the barrier is `+∞`.
    #[must_use]
    pub fn evaluate(&self, x: &DVector<f64>) -> Option<Sensitivity> {
        let n = x.len();
        let mu = self.strength;
        let mut term = Sensitivity::zeros(n);

        for constraint in self.inequalities {
            let g = constraint.value(x);
            if !(g > 0.0) {
                return None;
            }
            let grad = constraint.gradient(x);

            term.value -= mu * g.ln();
            term.jacobian.axpy(-mu / g, &grad, 1.0);
            term.hessian.ger(mu / (g * g), &grad, &grad, 1.0);
            if let Some(curvature) = constraint.hessian(x) {
                term.hessian -= curvature * (mu / g);
            }
        }
        Some(term)
    }

    /// Adds the barrier to an objective sensitivity. The value becomes `+∞`
    /// at infeasible points.
    #[must_use]
    pub fn penalize(&self, objective: Sensitivity, x: &DVector<f64>) -> Sensitivity {
        if self.is_empty() {
            return objective;
        }
        match self.evaluate(x) {
            Some(term) => Sensitivity {
                value: objective.value + term.value,
                jacobian: objective.jacobian + term.jacobian,
                hessian: objective.hessian + term.hessian,
            },
            None => Sensitivity {
                value: f64::INFINITY,
                ..objective
            },
        }
    }

    /// Checks `gᵢ(x) > 0` for every constraint.
    pub fn check_strictly_feasible(&self, x: &DVector<f64>) -> OptimResult<()> {
        check_strictly_feasible(self.inequalities, x)
    }

    /// Multipliers implied by barrier stationarity, `λᵢ = μ / gᵢ(x)`.
    #[must_use]
    pub fn implied_multipliers(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.inequalities.len(),
            self.inequalities
                .iter()
                .map(|g| self.strength / g.value(x)),
        )
    }

    /// Largest `α ≤ 1` keeping `x + α d` strictly inside every affine
    /// constraint, scaled by `fraction`.
    ///
    /// For each affine `gᵢ` with `∇gᵢ·d < 0` the boundary lies at
    /// `α = −gᵢ(x) / (∇gᵢ·d)`. Constraints with curvature are not capped here;
    /// the line search sees `+∞` beyond their boundary instead.
    #[must_use]
    pub fn max_feasible_step(&self, x: &DVector<f64>, d: &DVector<f64>, fraction: f64) -> f64 {
        self.inequalities
            .iter()
            .filter(|g| g.is_affine())
            .filter_map(|g| {
                let slope = g.gradient(x).dot(d);
                (slope < 0.0).then(|| fraction * g.value(x) / -slope)
            })
            .fold(1.0, f64::min)
    }
}

/// Checks `gᵢ(x) > 0` for every constraint, reporting the first violation.
pub fn check_strictly_feasible(
    inequalities: &[SharedInequality],
    x: &DVector<f64>,
) -> OptimResult<()> {
    for (index, constraint) in inequalities.iter().enumerate() {
        let value = constraint.value(x);
        if !(value > 0.0) {
            return Err(OptimError::InfeasibleStart { index, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{Bound, ConstraintSet, LinearInequality};
    use approx::assert_relative_eq;

    fn unit_box() -> ConstraintSet {
        ConstraintSet::new(2).with_box(0.0, 1.0).unwrap()
    }

    #[test]
    fn test_barrier_value_gradient_hessian() {
        let set = unit_box();
        let barrier = BarrierTransform::new(set.inequalities(), 0.5);
        let x = DVector::from_vec(vec![0.25, 0.5]);

        let term = barrier.evaluate(&x).unwrap();

        let expected = -0.5 * (0.25_f64.ln() + 0.75_f64.ln() + 0.5_f64.ln() + 0.5_f64.ln());
        assert_relative_eq!(term.value, expected, epsilon = 1e-14);
        // -μ (1/x - 1/(1-x))
        assert_relative_eq!(term.jacobian[0], -0.5 * (4.0 - 4.0 / 3.0), epsilon = 1e-14);
        assert_relative_eq!(term.jacobian[1], 0.0, epsilon = 1e-14);
        // μ (1/x² + 1/(1-x)²)
        assert_relative_eq!(term.hessian[(0, 0)], 0.5 * (16.0 + 16.0 / 9.0), epsilon = 1e-12);
        assert_relative_eq!(term.hessian[(0, 1)], 0.0, epsilon = 1e-14);
        assert!(term.is_symmetric(1e-14));
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let set = ConstraintSet::new(2)
            .with_inequality(LinearInequality::new(DVector::from_vec(vec![1.0, 2.0]), 0.5).unwrap())
            .unwrap()
            .with_box(-1.0, 1.0)
            .unwrap();
        let barrier = BarrierTransform::new(set.inequalities(), 0.3);
        let x = DVector::from_vec(vec![0.1, -0.2]);
        let term = barrier.evaluate(&x).unwrap();
        let h = 1e-6;

        for k in 0..2 {
            let mut up = x.clone();
            let mut down = x.clone();
            up[k] += h;
            down[k] -= h;
            let fd = (barrier.evaluate(&up).unwrap().value - barrier.evaluate(&down).unwrap().value)
                / (2.0 * h);
            assert_relative_eq!(term.jacobian[k], fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_infeasible_point_is_infinite() {
        let set = unit_box();
        let barrier = BarrierTransform::new(set.inequalities(), 1.0);
        let outside = DVector::from_vec(vec![1.0, 0.5]);

        assert!(barrier.evaluate(&outside).is_none());
        let penalized = barrier.penalize(Sensitivity::zeros(2), &outside);
        assert_eq!(penalized.value, f64::INFINITY);
    }

    #[test]
    fn test_empty_barrier_is_noop() {
        let set = ConstraintSet::new(2);
        let barrier = BarrierTransform::new(set.inequalities(), 1.0);
        let objective = Sensitivity {
            value: 3.0,
            jacobian: DVector::from_vec(vec![1.0, 2.0]),
            hessian: nalgebra::DMatrix::identity(2, 2),
        };
        let x = DVector::from_vec(vec![5.0, -5.0]);

        assert!(barrier.is_empty());
        assert_eq!(barrier.penalize(objective.clone(), &x), objective);
        assert_eq!(barrier.implied_multipliers(&x).len(), 0);
    }

    #[test]
    fn test_strict_feasibility_check() {
        let set = unit_box();
        let barrier = BarrierTransform::new(set.inequalities(), 1.0);

        assert!(barrier
            .check_strictly_feasible(&DVector::from_vec(vec![0.5, 0.5]))
            .is_ok());
        let err = barrier
            .check_strictly_feasible(&DVector::from_vec(vec![0.5, 0.0]))
            .unwrap_err();
        assert_eq!(
            err,
            OptimError::InfeasibleStart {
                index: 2,
                value: 0.0
            }
        );
    }

    #[test]
    fn test_implied_multipliers_are_positive() {
        let set = unit_box();
        let barrier = BarrierTransform::new(set.inequalities(), 0.1);
        let lambda = barrier.implied_multipliers(&DVector::from_vec(vec![0.2, 0.9]));

        assert_relative_eq!(lambda[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(lambda[3], 1.0, epsilon = 1e-12);
        assert!(lambda.iter().all(|l| *l > 0.0));
    }

    #[test]
    fn test_max_feasible_step() {
        let set = ConstraintSet::new(1)
            .with_inequality(Bound::upper(1, 0, 1.0).unwrap())
            .unwrap();
        let barrier = BarrierTransform::new(set.inequalities(), 1.0);
        let x = DVector::from_element(1, 0.5);

        // Boundary is at α = 0.25 along d = 2.
        let step = barrier.max_feasible_step(&x, &DVector::from_element(1, 2.0), 0.99);
        assert_relative_eq!(step, 0.2475, epsilon = 1e-14);

        // Moving away from the boundary is uncapped.
        let step = barrier.max_feasible_step(&x, &DVector::from_element(1, -2.0), 0.99);
        assert_relative_eq!(step, 1.0);
    }
}
