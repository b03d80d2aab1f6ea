//! Objective sensitivities and their aggregation.
//!
//! A [`Sensitivity`] is the value, gradient (Jacobian) and Hessian of a scalar
//! function at a point. Composite objectives such as
//! `expectation + risk_aversion × variance` are built by combining the
//! sensitivities of their parts with [`combine`] or [`combine_weighted`].

use barrier_math::linear_algebra::is_symmetric;
use nalgebra::{DMatrix, DVector};

use crate::error::{OptimError, OptimResult};

/// Value, gradient and Hessian of a scalar function at a point.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensitivity {
    /// Function value.
    pub value: f64,
    /// Gradient, length `n`.
    pub jacobian: DVector<f64>,
    /// Hessian, `n × n`. Expected to be symmetric.
    pub hessian: DMatrix<f64>,
}

impl Sensitivity {
    /// Creates a sensitivity, checking that the Hessian is `n × n` for a
    /// gradient of length `n`.
    pub fn new(value: f64, jacobian: DVector<f64>, hessian: DMatrix<f64>) -> OptimResult<Self> {
        let n = jacobian.len();
        if hessian.nrows() != n {
            return Err(OptimError::dimension_mismatch(
                "sensitivity hessian rows",
                n,
                hessian.nrows(),
            ));
        }
        if hessian.ncols() != n {
            return Err(OptimError::dimension_mismatch(
                "sensitivity hessian columns",
                n,
                hessian.ncols(),
            ));
        }
        Ok(Self {
            value,
            jacobian,
            hessian,
        })
    }

    /// A zero sensitivity of dimension `n`.
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self {
            value: 0.0,
            jacobian: DVector::zeros(n),
            hessian: DMatrix::zeros(n, n),
        }
    }

    /// Problem dimension `n`.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.jacobian.len()
    }

    /// Returns true if the Hessian is symmetric within `tolerance` (relative
    /// to its largest entry).
    #[must_use]
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        is_symmetric(&self.hessian, tolerance)
    }

    /// Returns true if value, gradient and Hessian are all finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
            && self.jacobian.iter().all(|v| v.is_finite())
            && self.hessian.iter().all(|v| v.is_finite())
    }

    /// Adds `weight × other` in place.
    fn add_scaled(&mut self, weight: f64, other: &Sensitivity) {
        self.value += weight * other.value;
        self.jacobian.axpy(weight, &other.jacobian, 1.0);
        self.hessian += &other.hessian * weight;
    }

    fn check_dimension(&self, n: usize, index: usize) -> OptimResult<()> {
        if self.jacobian.len() != n {
            return Err(OptimError::dimension_mismatch(
                format!("jacobian of component {index}"),
                n,
                self.jacobian.len(),
            ));
        }
        if self.hessian.nrows() != n || self.hessian.ncols() != n {
            return Err(OptimError::dimension_mismatch(
                format!("hessian of component {index}"),
                n,
                self.hessian.nrows().max(self.hessian.ncols()),
            ));
        }
        Ok(())
    }
}

/// Combines a primary sensitivity with weighted auxiliary ones.
///
/// The first component enters with weight 1; every further component is
/// scaled by `weight` (for example a risk-aversion coefficient applied to a
/// variance term):
///
/// ```text
/// value    = v₀ + weight · Σᵢ₌₁ vᵢ
/// jacobian = J₀ + weight · Σᵢ₌₁ Jᵢ
/// hessian  = H₀ + weight · Σᵢ₌₁ Hᵢ
/// ```
///
/// A single component is returned unchanged.
pub fn combine(weight: f64, components: &[Sensitivity]) -> OptimResult<Sensitivity> {
    let (primary, auxiliary) = components
        .split_first()
        .ok_or_else(|| OptimError::invalid_input("cannot combine an empty list of sensitivities"))?;

    let n = primary.dimension();
    primary.check_dimension(n, 0)?;

    let mut combined = primary.clone();
    for (offset, component) in auxiliary.iter().enumerate() {
        component.check_dimension(n, offset + 1)?;
        combined.add_scaled(weight, component);
    }
    Ok(combined)
}

/// Linear combination `Σ wᵢ sᵢ` of sensitivities with explicit weights.
pub fn combine_weighted(components: &[(f64, &Sensitivity)]) -> OptimResult<Sensitivity> {
    let (_, first) = components
        .first()
        .ok_or_else(|| OptimError::invalid_input("cannot combine an empty list of sensitivities"))?;

    let n = first.dimension();
    let mut combined = Sensitivity::zeros(n);
    for (index, (weight, component)) in components.iter().enumerate() {
        component.check_dimension(n, index)?;
        combined.add_scaled(*weight, component);
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn expectation() -> Sensitivity {
        Sensitivity::new(
            -0.07,
            DVector::from_vec(vec![-0.08, -0.06]),
            DMatrix::zeros(2, 2),
        )
        .unwrap()
    }

    fn variance() -> Sensitivity {
        Sensitivity::new(
            0.05,
            DVector::from_vec(vec![0.2, 0.1]),
            DMatrix::from_row_slice(2, 2, &[0.18, 0.02, 0.02, 0.08]),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_bad_hessian() {
        let result = Sensitivity::new(0.0, DVector::zeros(2), DMatrix::zeros(3, 3));
        assert!(matches!(result, Err(OptimError::DimensionMismatch { .. })));

        let result = Sensitivity::new(0.0, DVector::zeros(2), DMatrix::zeros(2, 3));
        assert!(matches!(result, Err(OptimError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_combine_single_is_identity() {
        let s = variance();
        assert_eq!(combine(1.0, &[s.clone()]).unwrap(), s);
        // The weight only applies to auxiliary components.
        assert_eq!(combine(7.5, &[s.clone()]).unwrap(), s);
    }

    #[test]
    fn test_combine_mean_variance() {
        let risk_aversion = 3.0;
        let combined = combine(risk_aversion, &[expectation(), variance()]).unwrap();

        assert_relative_eq!(combined.value, -0.07 + 3.0 * 0.05, epsilon = 1e-15);
        assert_relative_eq!(combined.jacobian[0], -0.08 + 3.0 * 0.2, epsilon = 1e-15);
        assert_relative_eq!(combined.jacobian[1], -0.06 + 3.0 * 0.1, epsilon = 1e-15);
        assert_relative_eq!(combined.hessian[(0, 0)], 0.54, epsilon = 1e-15);
        assert_relative_eq!(combined.hessian[(0, 1)], 0.06, epsilon = 1e-15);
        assert!(combined.is_symmetric(1e-14));
    }

    #[test]
    fn test_combine_dimension_mismatch() {
        let other = Sensitivity::zeros(3);
        let result = combine(1.0, &[expectation(), other]);
        assert!(matches!(result, Err(OptimError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_combine_empty() {
        assert!(matches!(
            combine(1.0, &[]),
            Err(OptimError::InvalidInput { .. })
        ));
        assert!(combine_weighted(&[]).is_err());
    }

    #[test]
    fn test_combine_weighted() {
        let e = expectation();
        let v = variance();
        let combined = combine_weighted(&[(-1.0, &e), (0.5, &v)]).unwrap();

        assert_relative_eq!(combined.value, 0.07 + 0.025, epsilon = 1e-15);
        assert_relative_eq!(combined.hessian[(1, 1)], 0.04, epsilon = 1e-15);
        assert!(combined.is_symmetric(1e-14));
    }
}
