//! Line search along a descent direction.
//!
//! [`WolfeLineSearch::search`] finds a step length satisfying the strong Wolfe
//! conditions
//!
//! ```text
//! Armijo:    φ(α) ≤ φ(0) + c₁ α φ'(0)
//! Curvature: |φ'(α)| ≤ c₂ |φ'(0)|
//! ```
//!
//! with `φ(α) = f(x + α d)`, using the bracketing phase of Nocedal & Wright
//! (Alg. 3.5) followed by a zoom phase (Alg. 3.6) with safeguarded cubic
//! interpolation. A non-finite `φ(α)` (a barrier evaluated outside the
//! feasible region) counts as a failed Armijo test, so the step is pulled back
//! inside the region.

use nalgebra::DVector;

use crate::config::LineSearchControl;
use crate::error::{OptimError, OptimResult};

/// An accepted step.
#[derive(Debug, Clone)]
pub struct LineSearchStep {
    /// Step length `α`.
    pub step: f64,
    /// Function value at `x + α d`.
    pub value: f64,
    /// Gradient at `x + α d`.
    pub gradient: DVector<f64>,
    /// Number of function evaluations used.
    pub evaluations: usize,
}

/// A trial point on the search line.
#[derive(Debug, Clone)]
struct Trial {
    alpha: f64,
    value: f64,
    slope: f64,
    gradient: DVector<f64>,
}

/// Strong Wolfe line search.
#[derive(Debug, Clone, Copy)]
pub struct WolfeLineSearch {
    control: LineSearchControl,
}

impl Default for WolfeLineSearch {
    fn default() -> Self {
        Self::new(LineSearchControl::default())
    }
}

impl WolfeLineSearch {
    /// Creates a line search with the given control.
    #[must_use]
    pub fn new(control: LineSearchControl) -> Self {
        Self { control }
    }

    /// The line search control.
    #[must_use]
    pub fn control(&self) -> &LineSearchControl {
        &self.control
    }

    /// Finds a strong Wolfe step along `d` from `x`.
    ///
    /// `phi` returns value and gradient; `f0`/`g0` are its values at `x`.
    /// Steps never exceed `max_step`, and the first trial is `min(1, max_step)`.
    /// If the cap is reached while the function is still decreasing, the
    /// capped step is accepted on the Armijo condition alone; the curvature
    /// condition is not enforced there. With `max_step = 1`, as for an
    /// unconstrained Newton step, this applies to the unit step.
    pub fn search<F>(
        &self,
        phi: &F,
        x: &DVector<f64>,
        f0: f64,
        g0: &DVector<f64>,
        d: &DVector<f64>,
        max_step: f64,
    ) -> OptimResult<LineSearchStep>
    where
        F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
    {
        let slope0 = g0.dot(d);
        if !(slope0 < 0.0) || !(max_step > 0.0) {
            return Err(OptimError::LineSearchFailure {
                iterations: 0,
                last_step: 0.0,
            });
        }

        let c1 = self.control.c1;
        let c2 = self.control.c2;
        let mut evaluations = 0;

        let mut previous = Trial {
            alpha: 0.0,
            value: f0,
            slope: slope0,
            gradient: g0.clone(),
        };
        let mut alpha = max_step.min(1.0);

        for i in 0..self.control.max_iterations {
            let current = evaluate(phi, x, d, alpha);
            evaluations += 1;

            let armijo_ok =
                current.value.is_finite() && current.value <= f0 + c1 * alpha * slope0;
            if !armijo_ok || (i > 0 && current.value >= previous.value) {
                return self.zoom(phi, x, d, f0, slope0, previous, current, evaluations);
            }

            if current.slope.abs() <= -c2 * slope0 {
                return Ok(accept(current, evaluations));
            }

            if current.slope >= 0.0 {
                return self.zoom(phi, x, d, f0, slope0, current, previous, evaluations);
            }

            if alpha >= max_step {
                // Still descending at the cap; the boundary rule forbids a longer step.
                return Ok(accept(current, evaluations));
            }

            previous = current;
            alpha = (2.0 * alpha).min(max_step);
        }

        Err(OptimError::LineSearchFailure {
            iterations: evaluations,
            last_step: alpha,
        })
    }

    /// Zoom phase on the bracket `[lo, hi]` (in either order).
    ///
    /// `lo` always satisfies the Armijo condition and has the lowest value
    /// among the trials that do.
    #[allow(clippy::too_many_arguments)]
    fn zoom<F>(
        &self,
        phi: &F,
        x: &DVector<f64>,
        d: &DVector<f64>,
        f0: f64,
        slope0: f64,
        mut lo: Trial,
        mut hi: Trial,
        mut evaluations: usize,
    ) -> OptimResult<LineSearchStep>
    where
        F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
    {
        let c1 = self.control.c1;
        let c2 = self.control.c2;
        let mut last_step = hi.alpha;

        for _ in 0..self.control.max_zoom_iterations {
            if (hi.alpha - lo.alpha).abs() <= f64::EPSILON * lo.alpha.abs().max(1.0) {
                break;
            }

            let alpha = interpolate(&lo, &hi);
            last_step = alpha;
            let trial = evaluate(phi, x, d, alpha);
            evaluations += 1;

            let armijo_ok = trial.value.is_finite() && trial.value <= f0 + c1 * alpha * slope0;
            if !armijo_ok || trial.value >= lo.value {
                hi = trial;
                continue;
            }

            if trial.slope.abs() <= -c2 * slope0 {
                return Ok(accept(trial, evaluations));
            }

            if trial.slope * (hi.alpha - lo.alpha) >= 0.0 {
                hi = lo;
            }
            lo = trial;
        }

        Err(OptimError::LineSearchFailure {
            iterations: evaluations,
            last_step,
        })
    }

    /// Armijo backtracking from `min(1, max_step)`, halving on failure.
    ///
    /// Used as a fallback when the strong Wolfe search cannot satisfy the
    /// curvature condition.
    pub fn backtrack<F>(
        &self,
        phi: &F,
        x: &DVector<f64>,
        f0: f64,
        g0: &DVector<f64>,
        d: &DVector<f64>,
        max_step: f64,
    ) -> OptimResult<LineSearchStep>
    where
        F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
    {
        let slope0 = g0.dot(d);
        if !(slope0 < 0.0) || !(max_step > 0.0) {
            return Err(OptimError::LineSearchFailure {
                iterations: 0,
                last_step: 0.0,
            });
        }

        let mut alpha = max_step.min(1.0);
        for i in 0..self.control.max_iterations {
            let trial = evaluate(phi, x, d, alpha);
            if trial.value.is_finite() && trial.value <= f0 + self.control.c1 * alpha * slope0 {
                return Ok(accept(trial, i + 1));
            }
            alpha *= 0.5;
        }

        Err(OptimError::LineSearchFailure {
            iterations: self.control.max_iterations,
            last_step: alpha,
        })
    }
}

fn evaluate<F>(phi: &F, x: &DVector<f64>, d: &DVector<f64>, alpha: f64) -> Trial
where
    F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
{
    let point = x + d * alpha;
    let (value, gradient) = phi(&point);
    let slope = if value.is_finite() {
        gradient.dot(d)
    } else {
        f64::NAN
    };
    Trial {
        alpha,
        value,
        slope,
        gradient,
    }
}

fn accept(trial: Trial, evaluations: usize) -> LineSearchStep {
    LineSearchStep {
        step: trial.alpha,
        value: trial.value,
        gradient: trial.gradient,
        evaluations,
    }
}

/// Minimizer of the cubic matching value and slope at both bracket ends,
/// falling back to bisection when the cubic is unusable or lands too close
/// to an end point.
fn interpolate(lo: &Trial, hi: &Trial) -> f64 {
    let midpoint = 0.5 * (lo.alpha + hi.alpha);
    if !hi.value.is_finite() || !hi.slope.is_finite() {
        return midpoint;
    }

    let (a, b) = (lo.alpha, hi.alpha);
    let d1 = lo.slope + hi.slope - 3.0 * (lo.value - hi.value) / (a - b);
    let discriminant = d1 * d1 - lo.slope * hi.slope;
    if !(discriminant >= 0.0) {
        return midpoint;
    }
    let d2 = (b - a).signum() * discriminant.sqrt();
    let candidate = b - (b - a) * (hi.slope + d2 - d1) / (hi.slope - lo.slope + 2.0 * d2);

    let (left, right) = if a < b { (a, b) } else { (b, a) };
    let margin = 0.1 * (right - left);
    if candidate.is_finite() && candidate > left + margin && candidate < right - margin {
        candidate
    } else {
        midpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parabola(x: &DVector<f64>) -> (f64, DVector<f64>) {
        (x[0] * x[0], DVector::from_element(1, 2.0 * x[0]))
    }

    fn rosenbrock(x: &DVector<f64>) -> (f64, DVector<f64>) {
        let (a, b) = (x[0], x[1]);
        let value = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
        let gradient = DVector::from_vec(vec![
            -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
            200.0 * (b - a * a),
        ]);
        (value, gradient)
    }

    fn assert_strong_wolfe<F>(phi: &F, x: &DVector<f64>, d: &DVector<f64>, step: &LineSearchStep)
    where
        F: Fn(&DVector<f64>) -> (f64, DVector<f64>),
    {
        let control = LineSearchControl::default();
        let (f0, g0) = phi(x);
        let slope0 = g0.dot(d);
        assert!(step.value <= f0 + control.c1 * step.step * slope0);
        assert!(step.gradient.dot(d).abs() <= control.c2 * slope0.abs() + 1e-12);
    }

    #[test]
    fn test_full_newton_step_accepted() {
        let ls = WolfeLineSearch::default();
        let x = DVector::from_element(1, 3.0);
        let (f0, g0) = parabola(&x);
        // Newton direction for x² is -x.
        let d = DVector::from_element(1, -3.0);

        let step = ls.search(&parabola, &x, f0, &g0, &d, 1.0).unwrap();

        assert_relative_eq!(step.step, 1.0);
        assert_eq!(step.evaluations, 1);
    }

    #[test]
    fn test_overshooting_direction_zooms() {
        let ls = WolfeLineSearch::default();
        let x = DVector::from_element(1, 1.0);
        let (f0, g0) = parabola(&x);
        // Steepest descent overshoots to x = -1 at α = 1.
        let d = -g0.clone();

        let step = ls.search(&parabola, &x, f0, &g0, &d, 1.0).unwrap();

        assert_relative_eq!(step.step, 0.5, epsilon = 1e-10);
        assert_strong_wolfe(&parabola, &x, &d, &step);
    }

    #[test]
    fn test_short_direction_expands() {
        let ls = WolfeLineSearch::default();
        let x = DVector::from_element(1, 10.0);
        let (f0, g0) = parabola(&x);
        let d = DVector::from_element(1, -0.5);

        let step = ls.search(&parabola, &x, f0, &g0, &d, f64::INFINITY).unwrap();

        assert!(step.step > 1.0);
        assert_strong_wolfe(&parabola, &x, &d, &step);
    }

    #[test]
    fn test_rosenbrock_steepest_descent() {
        let ls = WolfeLineSearch::default();
        let x = DVector::from_vec(vec![-1.2, 1.0]);
        let (f0, g0) = rosenbrock(&x);
        let d = -g0.clone();

        let step = ls.search(&rosenbrock, &x, f0, &g0, &d, 1.0).unwrap();

        assert!(step.value < f0);
        assert_strong_wolfe(&rosenbrock, &x, &d, &step);
    }

    #[test]
    fn test_infinite_region_is_avoided() {
        // Barrier-like: +∞ for x ≥ 0.5.
        let walled = |x: &DVector<f64>| {
            if x[0] >= 0.5 {
                (f64::INFINITY, DVector::zeros(1))
            } else {
                ((x[0] - 1.0).powi(2), DVector::from_element(1, 2.0 * (x[0] - 1.0)))
            }
        };
        let ls = WolfeLineSearch::default();
        let x = DVector::from_element(1, 0.0);
        let (f0, g0) = walled(&x);
        let d = DVector::from_element(1, 1.0);

        let result = ls.search(&walled, &x, f0, &g0, &d, 1.0);
        let step = match result {
            Ok(step) => step,
            Err(_) => ls.backtrack(&walled, &x, f0, &g0, &d, 1.0).unwrap(),
        };

        assert!(step.value.is_finite());
        assert!(step.step < 0.5);
        assert!(step.value < f0);
    }

    #[test]
    fn test_step_capped_at_boundary() {
        let ls = WolfeLineSearch::default();
        let x = DVector::from_element(1, 10.0);
        let (f0, g0) = parabola(&x);
        let d = DVector::from_element(1, -1.0);

        let step = ls.search(&parabola, &x, f0, &g0, &d, 0.25).unwrap();

        assert_relative_eq!(step.step, 0.25);
    }

    #[test]
    fn test_unit_cap_accepts_descending_step_without_curvature() {
        let ls = WolfeLineSearch::default();
        let x = DVector::from_element(1, 100.0);
        let (f0, g0) = parabola(&x);
        let d = DVector::from_element(1, -1.0);

        let step = ls.search(&parabola, &x, f0, &g0, &d, 1.0).unwrap();

        assert_relative_eq!(step.step, 1.0);
        // Still steeply descending: strong curvature is not met at the cap.
        let c2 = ls.control().c2;
        assert!(step.gradient.dot(&d).abs() > c2 * g0.dot(&d).abs());
        assert!(step.value < f0);
    }

    #[test]
    fn test_ascent_direction_fails() {
        let ls = WolfeLineSearch::default();
        let x = DVector::from_element(1, 1.0);
        let (f0, g0) = parabola(&x);
        let d = g0.clone();

        let result = ls.search(&parabola, &x, f0, &g0, &d, 1.0);
        assert!(matches!(result, Err(OptimError::LineSearchFailure { .. })));
        assert!(ls.backtrack(&parabola, &x, f0, &g0, &d, 1.0).is_err());
    }

    #[test]
    fn test_backtracking_sufficient_decrease() {
        let ls = WolfeLineSearch::default();
        let x = DVector::from_element(1, 5.0);
        let (f0, g0) = parabola(&x);
        let d = -g0.clone();

        let step = ls.backtrack(&parabola, &x, f0, &g0, &d, 1.0).unwrap();

        assert!(step.value < f0);
        assert!(step.step <= 1.0);
    }
}
