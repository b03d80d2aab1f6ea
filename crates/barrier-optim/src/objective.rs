//! Objective providers.
//!
//! Any type implementing [`Objective`] can be minimized. The caller supplies
//! first- and second-order sensitivities; nothing here differentiates
//! automatically.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::error::{OptimError, OptimResult};
use crate::sensitivity::{combine_weighted, Sensitivity};

/// A smooth scalar function with value, gradient and Hessian.
///
/// `evaluate` must be pure and deterministic for a given `x`.
pub trait Objective {
    /// Problem dimension `n`.
    fn dimension(&self) -> usize;

    /// Value, gradient and Hessian at `x`.
    fn evaluate(&self, x: &DVector<f64>) -> Sensitivity;

    /// Checks the objective is well formed before a solve.
    fn validate(&self) -> OptimResult<()> {
        Ok(())
    }
}

impl<O: Objective + ?Sized> Objective for &O {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn evaluate(&self, x: &DVector<f64>) -> Sensitivity {
        (**self).evaluate(x)
    }

    fn validate(&self) -> OptimResult<()> {
        (**self).validate()
    }
}

impl<O: Objective + ?Sized> Objective for Box<O> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn evaluate(&self, x: &DVector<f64>) -> Sensitivity {
        (**self).evaluate(x)
    }

    fn validate(&self) -> OptimResult<()> {
        (**self).validate()
    }
}

/// Quadratic objective `½ xᵀQx + cᵀx + k`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraticObjective {
    q: DMatrix<f64>,
    c: DVector<f64>,
    constant: f64,
}

impl QuadraticObjective {
    /// Creates `½ xᵀQx + cᵀx`. `Q` must be square, symmetric and match `c`.
    pub fn new(q: DMatrix<f64>, c: DVector<f64>) -> OptimResult<Self> {
        let n = c.len();
        if q.nrows() != n || q.ncols() != n {
            return Err(OptimError::dimension_mismatch(
                "quadratic objective matrix",
                n,
                q.nrows().max(q.ncols()),
            ));
        }
        if !barrier_math::linear_algebra::is_symmetric(&q, 1e-12) {
            return Err(OptimError::invalid_input(
                "quadratic objective matrix must be symmetric",
            ));
        }
        Ok(Self {
            q,
            c,
            constant: 0.0,
        })
    }

    /// Portfolio variance `xᵀΣx` for a covariance matrix `Σ`.
    pub fn from_covariance(covariance: DMatrix<f64>) -> OptimResult<Self> {
        let n = covariance.nrows();
        Self::new(covariance * 2.0, DVector::zeros(n))
    }

    /// Sets the constant term `k`.
    #[must_use]
    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }
}

impl Objective for QuadraticObjective {
    fn dimension(&self) -> usize {
        self.c.len()
    }

    fn evaluate(&self, x: &DVector<f64>) -> Sensitivity {
        let qx = &self.q * x;
        Sensitivity {
            value: 0.5 * x.dot(&qx) + self.c.dot(x) + self.constant,
            jacobian: qx + &self.c,
            hessian: self.q.clone(),
        }
    }
}

/// Linear objective `cᵀx + k`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearObjective {
    c: DVector<f64>,
    constant: f64,
}

impl LinearObjective {
    /// Creates `cᵀx`.
    #[must_use]
    pub fn new(c: DVector<f64>) -> Self {
        Self { c, constant: 0.0 }
    }

    /// Sets the constant term `k`.
    #[must_use]
    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }
}

impl Objective for LinearObjective {
    fn dimension(&self) -> usize {
        self.c.len()
    }

    fn evaluate(&self, x: &DVector<f64>) -> Sensitivity {
        let n = self.c.len();
        Sensitivity {
            value: self.c.dot(x) + self.constant,
            jacobian: self.c.clone(),
            hessian: DMatrix::zeros(n, n),
        }
    }
}

/// Adapts a closure returning a [`Sensitivity`] into an [`Objective`].
pub struct FnObjective<F> {
    dimension: usize,
    f: F,
}

impl<F> FnObjective<F>
where
    F: Fn(&DVector<f64>) -> Sensitivity,
{
    /// Wraps `f` as an objective of dimension `dimension`.
    pub fn new(dimension: usize, f: F) -> Self {
        Self { dimension, f }
    }
}

impl<F> fmt::Debug for FnObjective<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObjective")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl<F> Objective for FnObjective<F>
where
    F: Fn(&DVector<f64>) -> Sensitivity,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn evaluate(&self, x: &DVector<f64>) -> Sensitivity {
        (self.f)(x)
    }
}

/// A boxed objective that can be shared across threads.
pub type SharedObjective = Box<dyn Objective + Send + Sync>;

/// Weighted sum of objectives.
pub struct CompositeObjective {
    dimension: usize,
    components: Vec<(f64, SharedObjective)>,
}

impl CompositeObjective {
    /// Creates an empty composite of dimension `dimension`.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            components: Vec::new(),
        }
    }

    /// Adds `weight × objective`.
    pub fn with_component(
        mut self,
        weight: f64,
        objective: impl Objective + Send + Sync + 'static,
    ) -> OptimResult<Self> {
        if objective.dimension() != self.dimension {
            return Err(OptimError::dimension_mismatch(
                format!("composite component {}", self.components.len()),
                self.dimension,
                objective.dimension(),
            ));
        }
        if !weight.is_finite() {
            return Err(OptimError::invalid_input("component weight must be finite"));
        }
        self.components.push((weight, Box::new(objective)));
        Ok(self)
    }

    /// Mean-variance utility `−μᵀx + risk_aversion × xᵀΣx`.
    pub fn mean_variance(
        expected_returns: DVector<f64>,
        covariance: DMatrix<f64>,
        risk_aversion: f64,
    ) -> OptimResult<Self> {
        let n = expected_returns.len();
        Self::new(n)
            .with_component(-1.0, LinearObjective::new(expected_returns))?
            .with_component(risk_aversion, QuadraticObjective::from_covariance(covariance)?)
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if no components were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Debug for CompositeObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObjective")
            .field("dimension", &self.dimension)
            .field(
                "weights",
                &self.components.iter().map(|(w, _)| *w).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Objective for CompositeObjective {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn evaluate(&self, x: &DVector<f64>) -> Sensitivity {
        let parts: Vec<Sensitivity> = self
            .components
            .iter()
            .map(|(_, objective)| objective.evaluate(x))
            .collect();
        let weighted: Vec<(f64, &Sensitivity)> = self
            .components
            .iter()
            .zip(&parts)
            .map(|((w, _), s)| (*w, s))
            .collect();

        match combine_weighted(&weighted) {
            Ok(total) => total,
            // Empty, or a component returned sensitivities of the wrong size.
            Err(_) => Sensitivity {
                value: f64::NAN,
                ..Sensitivity::zeros(self.dimension)
            },
        }
    }

    fn validate(&self) -> OptimResult<()> {
        if self.components.is_empty() {
            return Err(OptimError::invalid_input(
                "composite objective has no components",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quadratic_sensitivity() {
        let q = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]);
        let obj = QuadraticObjective::new(q, DVector::from_vec(vec![-2.0, 0.0])).unwrap();
        let s = obj.evaluate(&DVector::from_vec(vec![1.0, 1.0]));

        assert_relative_eq!(s.value, 2.0 - 2.0, epsilon = 1e-15);
        assert_relative_eq!(s.jacobian[0], 0.0, epsilon = 1e-15);
        assert_relative_eq!(s.jacobian[1], 2.0, epsilon = 1e-15);
        assert!(s.is_symmetric(1e-14));
    }

    #[test]
    fn test_covariance_objective_is_variance() {
        let cov = DMatrix::from_row_slice(2, 2, &[0.09, 0.12, 0.12, 0.04]);
        let obj = QuadraticObjective::from_covariance(cov).unwrap();
        let s = obj.evaluate(&DVector::from_vec(vec![0.5, 0.5]));

        // 0.25 * (0.09 + 2 * 0.12 + 0.04)
        assert_relative_eq!(s.value, 0.0925, epsilon = 1e-15);
        assert!(s.is_symmetric(1e-14));
    }

    #[test]
    fn test_quadratic_rejects_asymmetric() {
        let q = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        assert!(QuadraticObjective::new(q, DVector::zeros(2)).is_err());
        assert!(QuadraticObjective::new(DMatrix::zeros(3, 3), DVector::zeros(2)).is_err());
    }

    #[test]
    fn test_mean_variance_composite() {
        let mu = DVector::from_vec(vec![0.08, 0.06]);
        let cov = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.02]);
        let obj = CompositeObjective::mean_variance(mu, cov, 2.0).unwrap();
        let x = DVector::from_vec(vec![0.5, 0.5]);
        let s = obj.evaluate(&x);

        let variance = 0.25 * (0.04 + 0.02 + 2.0 * 0.01);
        assert_relative_eq!(s.value, -0.07 + 2.0 * variance, epsilon = 1e-15);
        assert_relative_eq!(s.hessian[(0, 1)], 2.0 * 2.0 * 0.01, epsilon = 1e-15);
        assert!(s.is_symmetric(1e-14));
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn test_composite_dimension_check() {
        let result = CompositeObjective::new(2)
            .with_component(1.0, LinearObjective::new(DVector::zeros(3)));
        assert!(matches!(result, Err(OptimError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_empty_composite_is_rejected() {
        let empty = CompositeObjective::new(2);

        assert!(matches!(empty.validate(), Err(OptimError::InvalidInput { .. })));
        assert!(empty.evaluate(&DVector::zeros(2)).value.is_nan());

        let boxed: SharedObjective = Box::new(CompositeObjective::new(2));
        assert!(boxed.validate().is_err());
        assert!(QuadraticObjective::from_covariance(DMatrix::identity(2, 2))
            .unwrap()
            .validate()
            .is_ok());
    }

    #[test]
    fn test_fn_objective() {
        let obj = FnObjective::new(1, |x: &DVector<f64>| Sensitivity {
            value: x[0].exp(),
            jacobian: DVector::from_element(1, x[0].exp()),
            hessian: DMatrix::from_element(1, 1, x[0].exp()),
        });
        let s = obj.evaluate(&DVector::from_element(1, 0.0));

        assert_eq!(obj.dimension(), 1);
        assert_relative_eq!(s.value, 1.0);
    }
}
