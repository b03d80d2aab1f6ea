//! Property-based tests for solver invariants.
//!
//! These tests verify properties that should hold for every input:
//! - Convex box-constrained quadratics converge to a dual-feasible point
//! - Combining a single sensitivity with weight one is the identity
//! - Composed Hessians are symmetric

use barrier_optim::lagrangian::AugmentedLagrangian;
use barrier_optim::prelude::*;
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;

// =============================================================================
// TEST DATA GENERATORS
// =============================================================================

/// Symmetric positive definite `LLᵀ + εI` from a random factor.
fn spd_matrix(n: usize, entries: &[f64], ridge: f64) -> DMatrix<f64> {
    let l = DMatrix::from_row_slice(n, n, &entries[..n * n]);
    &l * l.transpose() + DMatrix::identity(n, n) * ridge
}

fn convex_quadratic_strategy() -> impl Strategy<Value = (usize, Vec<f64>, Vec<f64>)> {
    (2usize..5).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec(-1.0..1.0f64, n * n),
            prop::collection::vec(-2.0..2.0f64, n),
        )
    })
}

fn sensitivity_strategy() -> impl Strategy<Value = Sensitivity> {
    (1usize..5).prop_flat_map(|n| {
        (
            -10.0..10.0f64,
            prop::collection::vec(-5.0..5.0f64, n),
            prop::collection::vec(-5.0..5.0f64, n * n),
        )
            .prop_map(move |(value, jacobian, entries)| {
                let m = DMatrix::from_row_slice(n, n, &entries);
                Sensitivity {
                    value,
                    jacobian: DVector::from_vec(jacobian),
                    hessian: (&m + m.transpose()) * 0.5,
                }
            })
    })
}

// =============================================================================
// SOLVER PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_convex_box_quadratic_converges_dual_feasible(
        (n, entries, linear) in convex_quadratic_strategy(),
    ) {
        let q = spd_matrix(n, &entries, 0.5);
        let objective = QuadraticObjective::new(q, DVector::from_vec(linear)).unwrap();
        let constraints = ConstraintSet::new(n).with_box(-1.0, 1.0).unwrap();
        let problem = Problem::new(objective, constraints, DVector::zeros(n));
        let settings = SolverSettings::default();

        let result = BarrierSolver::new(settings).solve(&problem).unwrap();

        prop_assert!(result.converged);
        prop_assert!(result.state.check_dual_feasibility().is_ok());
        prop_assert!(result.inequality_multipliers().iter().all(|z| *z >= 0.0));
        prop_assert!(result.variates().iter().all(|x| *x > -1.0 && *x < 1.0));
        prop_assert!(
            result.total_newton_iterations
                <= settings.barrier.max_outer_iterations * settings.convergence.max_iterations
        );
    }

    #[test]
    fn test_budget_constrained_quadratic_is_feasible(
        (n, entries, linear) in convex_quadratic_strategy(),
    ) {
        let q = spd_matrix(n, &entries, 0.5);
        let objective = QuadraticObjective::new(q, DVector::from_vec(linear)).unwrap();
        let constraints = ConstraintSet::new(n)
            .with_budget(1.0)
            .unwrap()
            .with_box(0.0, 1.0)
            .unwrap();
        let start = DVector::from_element(n, 1.0 / n as f64);
        let problem = Problem::new(objective, constraints, start);

        let result = BarrierSolver::default().solve(&problem).unwrap();

        prop_assert!(result.converged);
        prop_assert!((result.variates().sum() - 1.0).abs() <= 1e-6);
        prop_assert!(result.kkt.primal_infeasibility <= 1e-6);
    }
}

// =============================================================================
// SENSITIVITY PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_combine_single_component_is_identity(s in sensitivity_strategy()) {
        let combined = combine(1.0, std::slice::from_ref(&s)).unwrap();
        prop_assert_eq!(combined, s);
    }

    #[test]
    fn test_combined_hessian_is_symmetric(
        a in sensitivity_strategy(),
        weight in -3.0..3.0f64,
    ) {
        let b = Sensitivity {
            value: a.value * 0.5,
            jacobian: &a.jacobian * 2.0,
            hessian: a.hessian.transpose(),
        };
        let combined = combine(weight, &[a, b]).unwrap();
        prop_assert!(combined.is_symmetric(1e-12));
    }

    #[test]
    fn test_augmented_hessian_is_symmetric(
        (n, entries, linear) in convex_quadratic_strategy(),
        strength in 1e-6..1.0f64,
        multiplier in -5.0..5.0f64,
    ) {
        let q = spd_matrix(n, &entries, 0.1);
        let objective = QuadraticObjective::new(q, DVector::from_vec(linear)).unwrap();
        let constraints = ConstraintSet::new(n)
            .with_budget(1.0)
            .unwrap()
            .with_box(-1.0, 1.0)
            .unwrap();
        let lagrangian = AugmentedLagrangian::new(
            &objective,
            &constraints,
            strength,
            DVector::from_element(1, multiplier),
            1e3,
        );

        let s = lagrangian.evaluate(&DVector::from_element(n, 0.1));

        prop_assert!(s.value.is_finite());
        prop_assert!(s.is_symmetric(1e-12));
    }
}
