use std::cell::Cell;

use approx::assert_abs_diff_eq;
use nalgebra::{DVector, DVectorSlice, DVectorSliceMut};
use ode_toolbox::{create_solver, DerivativeError, FnOdeSystem, OdeError, OdeSystem, SolverConfig, StepState};
use proptest::prelude::*;

use crate::assert_approx_matrix_eq;
use crate::utils::{Exponential, Oscillator, RecordingOscillator, RecordingSystem};

/// Chain of first-order decays, species `i` decays into species `i + 1`.
struct DecayChain {
    n: Cell<usize>,
}

impl OdeSystem for DecayChain {
    fn n_eqns(&self) -> usize {
        self.n.get()
    }

    fn derivatives(&self, _x: f64, y: DVectorSlice<f64>, mut dydx: DVectorSliceMut<f64>) -> Result<(), DerivativeError> {
        for i in 0..y.len() {
            let source = if i > 0 { y[i - 1] } else { 0.0 };
            dydx[i] = source - y[i];
        }
        Ok(())
    }
}

#[test]
fn exponential_growth_on_unit_interval() {
    let system = Exponential { lambda: 1.0 };
    let config = SolverConfig::default().set_abs_tol(1e-8).set_rel_tol(1e-8);
    let mut solver = create_solver(&system, &config).unwrap();

    let mut y = DVector::from_element(1, 1.0);
    let mut dx = 0.1;
    solver.solve_range(0.0, 1.0, &mut y, &mut dx).unwrap();

    assert_abs_diff_eq!(y[0], 2.718281828, epsilon = 1e-6);
    assert!(dx > 0.0);
}

#[test]
fn global_error_decreases_with_tolerance() {
    let system = Exponential { lambda: -1.0 };
    let tolerances = [1e-4, 1e-6, 1e-8, 1e-10];

    let errors: Vec<f64> = tolerances
        .iter()
        .map(|&tol| {
            let config = SolverConfig::default().set_abs_tol(tol).set_rel_tol(tol);
            let mut solver = create_solver(&system, &config).unwrap();
            let mut y = DVector::from_element(1, 1.0);
            let mut dx = 0.1;
            solver.solve_range(0.0, 2.0, &mut y, &mut dx).unwrap();
            (y[0] - (-2.0f64).exp()).abs()
        })
        .collect();

    for (&error, &tol) in errors.iter().zip(tolerances.iter()) {
        assert!(error < 10.0 * tol, "error {:e} for tolerance {:e}", error, tol);
    }
    for pair in errors.windows(2) {
        assert!(pair[1] < pair[0], "errors: {:?}", errors);
    }

    // Error roughly proportional to the tolerance
    let slope = (errors[3].ln() - errors[0].ln()) / (tolerances[3].ln() - tolerances[0].ln());
    assert!(slope > 0.5 && slope < 2.0, "slope {}, errors: {:?}", slope, errors);
}

#[test]
fn oscillator_matches_exact_solution() {
    let system = Oscillator { omega: 2.0 };
    let config = SolverConfig::default().set_abs_tol(1e-12).set_rel_tol(1e-10);
    let mut solver = create_solver(&system, &config).unwrap();

    let mut y = DVector::from_vec(vec![1.0, 0.0]);
    let mut dx = 0.01;
    // Several outer steps that reuse the step size estimate
    for i in 0..10 {
        let x_start = i as f64 * 0.5;
        solver.solve_range(x_start, x_start + 0.5, &mut y, &mut dx).unwrap();
    }

    let expected = DVector::from_vec(vec![10.0f64.cos(), -2.0 * 10.0f64.sin()]);
    assert_approx_matrix_eq!(&y, &expected, abstol = 1e-7);
}

#[test]
fn direction_is_fixed_across_sub_steps() {
    let system = Oscillator { omega: 10.0 };
    let config = SolverConfig::default().set_abs_tol(1e-10).set_rel_tol(1e-8);
    let mut solver = create_solver(&system, &config).unwrap();

    let mut x = 0.0;
    let mut y = DVector::from_vec(vec![1.0, 0.0]);
    let mut step = StepState::new(-1.0).unwrap();
    while x > -5.0 {
        solver.solve_step(&mut x, &mut y, &mut step).unwrap();
        assert!(!step.forward());
        assert!(step.dx_did < 0.0);
        assert!(step.dx_try < 0.0);
        step.first = false;
    }

    assert!(solver.stats().rejected_steps > 0);
    assert!((y[0] - (10.0 * x).cos()).abs() < 1e-4);
}

#[test]
fn rejected_step_is_retried_without_growth() {
    let system = Oscillator { omega: 10.0 };
    let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();

    let mut x = 0.0;
    let mut y = DVector::from_vec(vec![1.0, 0.0]);
    let mut step = StepState::new(1.0).unwrap();
    solver.solve_step(&mut x, &mut y, &mut step).unwrap();

    assert!(step.reject);
    assert!(!step.prev_reject);
    assert!(step.dx_did > 0.0 && step.dx_did < 1.0);
    assert!(step.dx_try <= step.dx_did);
    assert_eq!(x, step.dx_did);

    let stats = solver.stats();
    assert_eq!(stats.accepted_steps, 1);
    assert!(stats.rejected_steps >= 1);
    assert_eq!(
        stats.derivative_evals,
        1 + 5 * (stats.accepted_steps + stats.rejected_steps)
    );
}

#[test]
fn single_step_never_exceeds_requested_size() {
    let system = Exponential { lambda: -0.5 };
    let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();

    let mut x = 1.0;
    let mut y = DVector::from_element(1, 3.0);
    let mut dx = 0.25;
    solver.solve(&mut x, &mut y, &mut dx).unwrap();

    assert_eq!(x, 1.25);
    assert!(dx > 0.25);
    assert!((y[0] - 3.0 * (-0.125f64).exp()).abs() < 1e-6);
}

#[test]
fn retry_cap_is_enforced_within_one_step() {
    let system = Oscillator { omega: 1000.0 };
    let config = SolverConfig::default().set_max_steps(3);
    let mut solver = create_solver(&system, &config).unwrap();

    let mut x = 0.0;
    let mut y = DVector::from_vec(vec![1.0, 0.0]);
    let mut dx = 1.0;
    let result = solver.solve(&mut x, &mut y, &mut dx);

    assert!(matches!(result, Err(OdeError::StepLimitExceeded { max_steps: 3, .. })));
    assert_eq!(x, 0.0);
    assert_eq!(y, DVector::from_vec(vec![1.0, 0.0]));
    assert_eq!(solver.stats().rejected_steps, 3);
}

#[test]
fn retry_cap_is_enforced_over_range() {
    let system = Exponential { lambda: -1.0 };
    let config = SolverConfig::default().set_max_steps(5);
    let mut solver = create_solver(&system, &config).unwrap();

    let mut y = DVector::from_element(1, 1.0);
    let mut dx = 1e-3;
    let result = solver.solve_range(0.0, 100.0, &mut y, &mut dx);

    assert!(matches!(result, Err(OdeError::StepLimitExceeded { max_steps: 5, .. })));
    // The state of the last accepted step is kept
    assert!(y[0] < 1.0 && y[0] > 0.0);
}

#[test]
fn non_finite_derivatives_underflow_the_step_size() {
    let system = FnOdeSystem::new(1, |_, _, mut dydx| {
        dydx[0] = std::f64::NAN;
        Ok(())
    });
    let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();

    let mut x = 1.0;
    let mut y = DVector::from_element(1, 2.0);
    let mut dx = 0.1;
    let result = solver.solve(&mut x, &mut y, &mut dx);

    assert!(matches!(result, Err(OdeError::StepSizeUnderflow { .. })));
    assert_eq!(x, 1.0);
    assert_eq!(y[0], 2.0);
}

#[test]
fn derivative_failure_is_propagated() {
    let system = FnOdeSystem::new(1, |x, y, mut dydx| {
        if x > 0.5 {
            return Err(DerivativeError::from("reaction rate overflow"));
        }
        dydx[0] = -y[0];
        Ok(())
    });
    let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();

    let mut y = DVector::from_element(1, 1.0);
    let mut dx = 0.1;
    match solver.solve_range(0.0, 1.0, &mut y, &mut dx) {
        Err(OdeError::Derivative { x, source }) => {
            assert!(x > 0.5);
            assert_eq!(source.to_string(), "reaction rate overflow");
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(y[0] < 1.0 && y[0] > (-0.5f64).exp() - 1e-6);
}

#[test]
fn zero_tolerance_with_nonzero_error_is_an_error() {
    let system = Oscillator { omega: 1.0 };
    let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();
    solver.abs_tol_mut()[1] = 0.0;
    solver.rel_tol_mut()[1] = 0.0;

    let mut x = 0.0;
    let mut y = DVector::from_vec(vec![1.0, 0.0]);
    let mut dx = 0.1;
    let result = solver.solve(&mut x, &mut y, &mut dx);
    assert!(matches!(result, Err(OdeError::ZeroTolerance { index: 1, .. })));
}

#[test]
fn mismatched_state_is_rejected() {
    let system = Oscillator { omega: 1.0 };
    let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();

    let mut x = 0.0;
    let mut y = DVector::from_element(3, 1.0);
    let mut dx = 0.1;
    assert!(matches!(
        solver.solve(&mut x, &mut y, &mut dx),
        Err(OdeError::DimensionMismatch { expected: 2, actual: 3 })
    ));

    let mut y = DVector::from_element(2, 1.0);
    let mut dx = 0.1;
    assert!(matches!(
        solver.solve_range(0.0, -1.0, &mut y, &mut dx),
        Err(OdeError::DirectionMismatch { .. })
    ));
    let mut dx = 0.0;
    assert!(matches!(
        solver.solve(&mut x, &mut y, &mut dx),
        Err(OdeError::InvalidStepSize(_))
    ));
}

#[test]
fn empty_range_is_a_no_op() {
    let system = RecordingSystem::default();
    let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();

    let mut y = DVector::from_element(1, 4.0);
    let mut dx = 0.3;
    solver.solve_range(2.0, 2.0, &mut y, &mut dx).unwrap();

    assert_eq!(y[0], 4.0);
    assert_eq!(dx, 0.3);
    assert!(system.evaluated_at.borrow().is_empty());
}

#[test]
fn resize_follows_variable_system_size() {
    let system = DecayChain { n: Cell::new(4) };
    let config = SolverConfig::default()
        .set_abs_tol([1e-8, 2e-8, 3e-8, 4e-8])
        .set_rel_tol(1e-8);
    let mut solver = create_solver(&system, &config).unwrap();
    solver.abs_tol_mut()[0] = 5e-9;

    system.n.set(2);
    assert_eq!(solver.resize().unwrap(), true);
    assert_eq!(solver.resize().unwrap(), false);
    assert_eq!(solver.abs_tol().as_slice(), &[5e-9, 2e-8]);
    assert_eq!(solver.rel_tol().len(), 2);

    let mut y = DVector::from_vec(vec![1.0, 0.0]);
    let mut dx = 0.1;
    solver.solve_range(0.0, 1.0, &mut y, &mut dx).unwrap();
    // y1 = x * exp(-x) for the two-species chain
    assert!((y[1] - (-1.0f64).exp()).abs() < 1e-5);

    system.n.set(4);
    assert_eq!(solver.resize().unwrap(), true);
    assert_eq!(solver.abs_tol().as_slice(), &[5e-9, 2e-8, 3e-8, 4e-8]);

    system.n.set(5);
    assert!(matches!(
        solver.resize(),
        Err(OdeError::TooManyEquations { requested: 5, max: 4 })
    ));
    assert_eq!(solver.n_eqns(), 4);
}

#[test]
fn sub_step_rounding_onto_x_end_finishes_the_range() {
    // Just below the interval length, but x_start + dx rounds to x_end
    let system = RecordingSystem::default();
    let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();

    let x_start = 1e6;
    let x_end = x_start + 1.0;
    let mut y = DVector::from_element(1, 0.0);
    let mut dx_est = 1.0 - 1e-11;
    solver.solve_range(x_start, x_end, &mut y, &mut dx_est).unwrap();

    assert_abs_diff_eq!(y[0], 1.0, epsilon = 1e-9);
    assert!(dx_est > 0.0);
    let evaluated_at = system.evaluated_at.borrow();
    assert_eq!(evaluated_at.len(), 6);
    assert!(evaluated_at.iter().all(|&x| x >= x_start && x <= x_end));
}

proptest! {
    #[test]
    fn solve_range_lands_exactly_on_x_end(
        x_start in -10.0..10.0f64,
        length in 1e-3..20.0f64,
        fraction in 1e-3..2.0f64,
        backward in any::<bool>(),
    ) {
        let sign = if backward { -1.0 } else { 1.0 };
        let x_end = x_start + sign * length;
        let system = RecordingSystem::default();
        let mut solver = create_solver(&system, &SolverConfig::default()).unwrap();

        let mut y = DVector::from_element(1, 0.5);
        let mut dx_est = sign * fraction * length;
        solver.solve_range(x_start, x_end, &mut y, &mut dx_est).unwrap();

        let (lo, hi) = if backward { (x_end, x_start) } else { (x_start, x_end) };
        let slack = 1e-12 * (1.0 + lo.abs().max(hi.abs()));
        for &x in system.evaluated_at.borrow().iter() {
            prop_assert!(x >= lo - slack && x <= hi + slack, "evaluated at {} outside [{}, {}]", x, lo, hi);
        }
        prop_assert!((y[0] - (0.5 + x_end - x_start)).abs() < 1e-9);
        prop_assert!(dx_est * sign > 0.0);
    }

    #[test]
    fn solve_range_lands_exactly_on_x_end_with_rejections(
        x_start in -10.0..10.0f64,
        offset in prop_oneof![Just(0.0), Just(1e6)],
        length in 0.5..3.0f64,
        fraction in 0.5..2.0f64,
        backward in any::<bool>(),
    ) {
        let omega = 10.0;
        let sign = if backward { -1.0 } else { 1.0 };
        let x_start = x_start + offset;
        let x_end = x_start + sign * length;
        let system = RecordingOscillator::new(omega);
        let config = SolverConfig::default().set_abs_tol(1e-10).set_rel_tol(1e-10);
        let mut solver = create_solver(&system, &config).unwrap();

        let mut y = DVector::from_vec(vec![1.0, 0.0]);
        let mut dx_est = sign * fraction * length;
        solver.solve_range(x_start, x_end, &mut y, &mut dx_est).unwrap();

        // The oversized initial trial step is always rejected
        prop_assert!(solver.stats().rejected_steps > 0);

        let (lo, hi) = if backward { (x_end, x_start) } else { (x_start, x_end) };
        let slack = 1e-12 * (1.0 + lo.abs().max(hi.abs()));
        for &x in system.evaluated_at.borrow().iter() {
            prop_assert!(x >= lo - slack && x <= hi + slack, "evaluated at {} outside [{}, {}]", x, lo, hi);
        }

        let t = x_end - x_start;
        prop_assert!((y[0] - (omega * t).cos()).abs() < 1e-5);
        prop_assert!((y[1] + omega * (omega * t).sin()).abs() < 1e-4);
        prop_assert!(dx_est * sign > 0.0);
    }
}
