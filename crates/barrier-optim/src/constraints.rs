//! Constraint model.
//!
//! Equality constraints are linear functionals `a·x + b = 0`. Inequality
//! constraints follow the interior convention `g(x) > 0` (strictly feasible);
//! the log-barrier is undefined on and outside the boundary.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::error::{OptimError, OptimResult};

/// A linear equality constraint `a·x + b = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEquality {
    a: DVector<f64>,
    b: f64,
}

impl LinearEquality {
    /// Creates `a·x + b = 0`.
    pub fn new(a: DVector<f64>, b: f64) -> OptimResult<Self> {
        if a.iter().any(|v| !v.is_finite()) || !b.is_finite() {
            return Err(OptimError::invalid_input(
                "equality constraint coefficients must be finite",
            ));
        }
        Ok(Self { a, b })
    }

    /// Budget constraint `Σ xᵢ = total` over `n` variates.
    pub fn budget(n: usize, total: f64) -> OptimResult<Self> {
        Self::new(DVector::from_element(n, 1.0), -total)
    }

    /// Coefficient vector `a`.
    #[must_use]
    pub fn coefficients(&self) -> &DVector<f64> {
        &self.a
    }

    /// Constant term `b`.
    #[must_use]
    pub fn constant(&self) -> f64 {
        self.b
    }

    /// Dimension of the coefficient vector.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.a.len()
    }

    /// Residual `a·x + b`.
    #[must_use]
    pub fn value(&self, x: &DVector<f64>) -> f64 {
        self.a.dot(x) + self.b
    }

    /// Gradient `a` (constant).
    #[must_use]
    pub fn gradient(&self, _x: &DVector<f64>) -> DVector<f64> {
        self.a.clone()
    }
}

/// An inequality constraint with the convention `g(x) > 0` feasible.
pub trait InequalityConstraint {
    /// Dimension of the variate vector the constraint applies to.
    fn dimension(&self) -> usize;

    /// Constraint value `g(x)`.
    fn value(&self, x: &DVector<f64>) -> f64;

    /// Gradient `∇g(x)`.
    fn gradient(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Hessian `∇²g(x)`, if the constraint has curvature.
    fn hessian(&self, _x: &DVector<f64>) -> Option<DMatrix<f64>> {
        None
    }

    /// True if `g` is affine, so the gradient is constant and steps can be
    /// capped exactly at the boundary.
    fn is_affine(&self) -> bool {
        true
    }
}

/// Direction of a single-coordinate bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    /// `x_i ≥ β`, `g = x_i − β`.
    Lower,
    /// `x_i ≤ β`, `g = β − x_i`.
    Upper,
}

/// One-sided bound on a single coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    dimension: usize,
    index: usize,
    value: f64,
    side: BoundSide,
}

impl Bound {
    /// Creates a bound on coordinate `index` of an `n`-dimensional vector.
    pub fn new(dimension: usize, index: usize, value: f64, side: BoundSide) -> OptimResult<Self> {
        if index >= dimension {
            return Err(OptimError::invalid_input(format!(
                "bound index {index} out of range for dimension {dimension}"
            )));
        }
        if !value.is_finite() {
            return Err(OptimError::invalid_input("bound value must be finite"));
        }
        Ok(Self {
            dimension,
            index,
            value,
            side,
        })
    }

    /// Lower bound `x_index ≥ value`.
    pub fn lower(dimension: usize, index: usize, value: f64) -> OptimResult<Self> {
        Self::new(dimension, index, value, BoundSide::Lower)
    }

    /// Upper bound `x_index ≤ value`.
    pub fn upper(dimension: usize, index: usize, value: f64) -> OptimResult<Self> {
        Self::new(dimension, index, value, BoundSide::Upper)
    }

    /// Bounded coordinate.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bound value `β`.
    #[must_use]
    pub fn bound(&self) -> f64 {
        self.value
    }

    /// Bound direction.
    #[must_use]
    pub fn side(&self) -> BoundSide {
        self.side
    }

    fn sign(&self) -> f64 {
        match self.side {
            BoundSide::Lower => 1.0,
            BoundSide::Upper => -1.0,
        }
    }
}

impl InequalityConstraint for Bound {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        self.sign() * (x[self.index] - self.value)
    }

    fn gradient(&self, _x: &DVector<f64>) -> DVector<f64> {
        let mut g = DVector::zeros(self.dimension);
        g[self.index] = self.sign();
        g
    }
}

/// General linear inequality `a·x + b > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInequality {
    a: DVector<f64>,
    b: f64,
}

impl LinearInequality {
    /// Creates `a·x + b > 0`.
    pub fn new(a: DVector<f64>, b: f64) -> OptimResult<Self> {
        if a.iter().any(|v| !v.is_finite()) || !b.is_finite() {
            return Err(OptimError::invalid_input(
                "inequality constraint coefficients must be finite",
            ));
        }
        Ok(Self { a, b })
    }
}

impl InequalityConstraint for LinearInequality {
    fn dimension(&self) -> usize {
        self.a.len()
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        self.a.dot(x) + self.b
    }

    fn gradient(&self, _x: &DVector<f64>) -> DVector<f64> {
        self.a.clone()
    }
}

/// A boxed inequality constraint that can be shared across threads.
pub type SharedInequality = Box<dyn InequalityConstraint + Send + Sync>;

/// Ordered equality and inequality constraints over `n` variates.
pub struct ConstraintSet {
    dimension: usize,
    equalities: Vec<LinearEquality>,
    inequalities: Vec<SharedInequality>,
}

impl ConstraintSet {
    /// Creates an empty constraint set for `n` variates.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            equalities: Vec::new(),
            inequalities: Vec::new(),
        }
    }

    /// Builds a set from already-constructed constraint lists.
    pub fn from_parts(
        dimension: usize,
        equalities: Vec<LinearEquality>,
        inequalities: Vec<SharedInequality>,
    ) -> OptimResult<Self> {
        let mut set = Self::new(dimension);
        for equality in equalities {
            set = set.with_equality(equality)?;
        }
        for (index, inequality) in inequalities.into_iter().enumerate() {
            if inequality.dimension() != dimension {
                return Err(OptimError::dimension_mismatch(
                    format!("inequality constraint {index}"),
                    dimension,
                    inequality.dimension(),
                ));
            }
            set.inequalities.push(inequality);
        }
        Ok(set)
    }

    /// Adds an equality constraint.
    pub fn with_equality(mut self, equality: LinearEquality) -> OptimResult<Self> {
        if equality.dimension() != self.dimension {
            return Err(OptimError::dimension_mismatch(
                format!("equality constraint {}", self.equalities.len()),
                self.dimension,
                equality.dimension(),
            ));
        }
        self.equalities.push(equality);
        Ok(self)
    }

    /// Adds the budget constraint `Σ xᵢ = total`.
    pub fn with_budget(self, total: f64) -> OptimResult<Self> {
        let n = self.dimension;
        self.with_equality(LinearEquality::budget(n, total)?)
    }

    /// Adds an inequality constraint.
    pub fn with_inequality(
        mut self,
        inequality: impl InequalityConstraint + Send + Sync + 'static,
    ) -> OptimResult<Self> {
        if inequality.dimension() != self.dimension {
            return Err(OptimError::dimension_mismatch(
                format!("inequality constraint {}", self.inequalities.len()),
                self.dimension,
                inequality.dimension(),
            ));
        }
        self.inequalities.push(Box::new(inequality));
        Ok(self)
    }

    /// Adds a single-coordinate bound.
    pub fn with_bound(self, index: usize, value: f64, side: BoundSide) -> OptimResult<Self> {
        let n = self.dimension;
        self.with_inequality(Bound::new(n, index, value, side)?)
    }

    /// Adds `lower ≤ xᵢ ≤ upper` for every coordinate.
    pub fn with_box(mut self, lower: f64, upper: f64) -> OptimResult<Self> {
        if !(lower < upper) {
            return Err(OptimError::invalid_input(format!(
                "box lower bound {lower} must be below upper bound {upper}"
            )));
        }
        for i in 0..self.dimension {
            self = self
                .with_bound(i, lower, BoundSide::Lower)?
                .with_bound(i, upper, BoundSide::Upper)?;
        }
        Ok(self)
    }

    /// Number of variates.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Equality constraints, in insertion order.
    #[must_use]
    pub fn equalities(&self) -> &[LinearEquality] {
        &self.equalities
    }

    /// Inequality constraints, in insertion order.
    #[must_use]
    pub fn inequalities(&self) -> &[SharedInequality] {
        &self.inequalities
    }

    /// Number of equality constraints `m_eq`.
    #[must_use]
    pub fn equality_count(&self) -> usize {
        self.equalities.len()
    }

    /// Number of inequality constraints `m_ineq`.
    #[must_use]
    pub fn inequality_count(&self) -> usize {
        self.inequalities.len()
    }

    /// Equality residuals `a_j·x + b_j`.
    #[must_use]
    pub fn equality_residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.equalities.len(),
            self.equalities.iter().map(|e| e.value(x)),
        )
    }

    /// Largest absolute equality residual (zero without equalities).
    #[must_use]
    pub fn max_equality_violation(&self, x: &DVector<f64>) -> f64 {
        self.equalities
            .iter()
            .map(|e| e.value(x).abs())
            .fold(0.0, f64::max)
    }

    /// Inequality values `g_i(x)`.
    #[must_use]
    pub fn inequality_values(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.inequalities.len(),
            self.inequalities.iter().map(|g| g.value(x)),
        )
    }
}

impl fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSet")
            .field("dimension", &self.dimension)
            .field("equalities", &self.equalities)
            .field("inequalities", &self.inequalities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equality_value_and_gradient() {
        let eq = LinearEquality::budget(2, 1.0).unwrap();
        let x = DVector::from_vec(vec![0.3, 0.5]);

        assert_relative_eq!(eq.value(&x), -0.2, epsilon = 1e-15);
        assert_eq!(eq.gradient(&x), DVector::from_vec(vec![1.0, 1.0]));
    }

    #[test]
    fn test_bounds() {
        let x = DVector::from_vec(vec![0.5, 0.2]);
        let lower = Bound::lower(2, 1, 0.15).unwrap();
        let upper = Bound::upper(2, 1, 0.65).unwrap();

        assert_relative_eq!(lower.value(&x), 0.05, epsilon = 1e-15);
        assert_relative_eq!(upper.value(&x), 0.45, epsilon = 1e-15);
        assert_eq!(lower.gradient(&x), DVector::from_vec(vec![0.0, 1.0]));
        assert_eq!(upper.gradient(&x), DVector::from_vec(vec![0.0, -1.0]));
        assert!(lower.is_affine());
        assert!(lower.hessian(&x).is_none());
    }

    #[test]
    fn test_bound_violation_is_non_positive() {
        let lower = Bound::lower(1, 0, 1.0).unwrap();
        assert!(lower.value(&DVector::from_element(1, 1.0)) <= 0.0);
        assert!(lower.value(&DVector::from_element(1, 0.5)) < 0.0);
    }

    #[test]
    fn test_bound_index_checked() {
        assert!(Bound::lower(2, 2, 0.0).is_err());
        assert!(Bound::upper(2, 0, f64::NAN).is_err());
    }

    #[test]
    fn test_linear_inequality() {
        // x1 - x2 + 0.1 > 0
        let g = LinearInequality::new(DVector::from_vec(vec![1.0, -1.0]), 0.1).unwrap();
        let x = DVector::from_vec(vec![0.2, 0.25]);
        assert_relative_eq!(g.value(&x), 0.05, epsilon = 1e-15);
    }

    #[test]
    fn test_constraint_set_builder() {
        let set = ConstraintSet::new(2)
            .with_budget(1.0)
            .unwrap()
            .with_box(0.15, 0.65)
            .unwrap();

        assert_eq!(set.equality_count(), 1);
        assert_eq!(set.inequality_count(), 4);

        let x = DVector::from_vec(vec![0.5, 0.5]);
        assert_relative_eq!(set.max_equality_violation(&x), 0.0);
        assert!(set.inequality_values(&x).iter().all(|g| *g > 0.0));
    }

    #[test]
    fn test_constraint_set_dimension_checks() {
        let result = ConstraintSet::new(3).with_equality(LinearEquality::budget(2, 1.0).unwrap());
        assert!(matches!(result, Err(OptimError::DimensionMismatch { .. })));

        let result = ConstraintSet::new(3).with_inequality(Bound::lower(2, 0, 0.0).unwrap());
        assert!(matches!(result, Err(OptimError::DimensionMismatch { .. })));

        assert!(ConstraintSet::new(2).with_box(1.0, 0.0).is_err());
    }

    #[test]
    fn test_from_parts() {
        let inequalities: Vec<SharedInequality> = vec![
            Box::new(Bound::lower(2, 0, 0.0).unwrap()),
            Box::new(Bound::upper(2, 1, 1.0).unwrap()),
        ];
        let set = ConstraintSet::from_parts(
            2,
            vec![LinearEquality::budget(2, 1.0).unwrap()],
            inequalities,
        )
        .unwrap();
        assert_eq!(set.equality_count(), 1);
        assert_eq!(set.inequality_count(), 2);

        let wrong: Vec<SharedInequality> = vec![Box::new(Bound::lower(3, 0, 0.0).unwrap())];
        assert!(ConstraintSet::from_parts(2, Vec::new(), wrong).is_err());
    }
}
