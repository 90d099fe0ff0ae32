//! Integration tests for the dispatch layer, end to end.
//!
//! Purpose
//! -------
//! - Validate complete solves over all three paths: unconstrained descent,
//!   box-constrained barrier and particle-swarm runs, and the
//!   augmented-Lagrangian constrained driver.
//! - Exercise the trace/halting bridge, mini-batch streaming, sense
//!   flipping, and re-init against realistic smooth objectives.
//!
//! Coverage
//! --------
//! - `context::SolveContext`: build, solve, repeated solves, re-init.
//! - `capability`: bounds-blind warn-and-drop routing.
//! - `bridge`: callback invocation caps, callback failure, early halt.
//! - `solve`: solution-record normalization across algorithms.
//!
//! Exclusions
//! ----------
//! - Fine-grained validation of individual building blocks (validation
//!   helpers, option mapping tables, barrier calculus) — covered by unit
//!   tests in the respective modules.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use ndarray::array;
use optbridge::prelude::*;

/// Shifted quadratic `(θ₁-1)² + (θ₂-2)²` with its analytic derivatives.
fn quadratic() -> ProblemBuilder<()> {
    ProblemBuilder::new(
        |theta: &Theta, _p: &Params, _d: &()| {
            Ok((theta[0] - 1.0).powi(2) + (theta[1] - 2.0).powi(2))
        },
        array![4.0, -3.0],
    )
    .gradient(|theta: &Theta, _p: &Params, _d: &()| {
        Ok(array![2.0 * (theta[0] - 1.0), 2.0 * (theta[1] - 2.0)])
    })
    .hessian(|_theta: &Theta, _p: &Params, _d: &()| Ok(array![[2.0, 0.0], [0.0, 2.0]]))
}

#[test]
// Purpose
// -------
// Solve the shifted quadratic with L-BFGS on the unconstrained path.
//
// Given
// -----
// - The quadratic with analytic gradient, no bounds, no constraints.
//
// Expect
// ------
// - Minimizer ≈ (1, 2), minimum ≈ 0, converged, small gradient norm.
fn lbfgs_solves_the_quadratic() {
    // Arrange
    let problem = quadratic().build().unwrap();
    let mut ctx =
        SolveContext::build(problem, Optimizer::lbfgs(), None, OptionSet::new()).unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_eq!(ctx.path(), SolvePath::Unconstrained);
    assert_abs_diff_eq!(record.minimizer[0], 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(record.minimizer[1], 2.0, epsilon = 1e-5);
    assert_abs_diff_eq!(record.minimum, 0.0, epsilon = 1e-8);
    assert!(record.converged);
    assert!(record.grad_norm.unwrap() < 1e-4);
}

#[test]
// Purpose
// -------
// Verify the barrier box path pins the solution to the active faces.
//
// Given
// -----
// - The quadratic bounded to [0, 0.5]²; the free minimum (1, 2) lies
//   outside the box.
//
// Expect
// ------
// - Minimizer ≈ (0.5, 0.5) and inside the box.
fn barrier_path_respects_the_box() {
    // Arrange
    let problem = quadratic()
        .lower_bounds(array![0.0, 0.0])
        .upper_bounds(array![0.5, 0.5])
        .build()
        .unwrap();
    let mut ctx =
        SolveContext::build(problem, Optimizer::lbfgs(), None, OptionSet::new()).unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_eq!(ctx.path(), SolvePath::BoxConstrained);
    assert_abs_diff_eq!(record.minimizer[0], 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(record.minimizer[1], 0.5, epsilon = 1e-3);
    assert!(record.minimizer.iter().all(|t| (0.0..=0.5).contains(t)));
    assert_abs_diff_eq!(record.minimum, 0.25 + 2.25, epsilon = 1e-2);
}

#[test]
// Purpose
// -------
// Verify the barrier path with infinite lower sentinels constrains only
// the finite faces.
//
// Given
// -----
// - The quadratic with lower bounds (-∞, -∞) and upper bounds (0.5, 0.5);
//   the free minimum (1, 2) violates both upper faces.
//
// Expect
// ------
// - Minimizer ≈ (0.5, 0.5); no coordinate exceeds its upper bound.
fn barrier_path_handles_half_open_boxes() {
    // Arrange
    let problem = quadratic()
        .lower_bounds(array![f64::NEG_INFINITY, f64::NEG_INFINITY])
        .upper_bounds(array![0.5, 0.5])
        .build()
        .unwrap();
    let mut ctx =
        SolveContext::build(problem, Optimizer::lbfgs(), None, OptionSet::new()).unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_eq!(ctx.path(), SolvePath::BoxConstrained);
    assert_abs_diff_eq!(record.minimizer[0], 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(record.minimizer[1], 0.5, epsilon = 1e-3);
    assert!(record.minimizer.iter().all(|t| *t <= 0.5));
}

#[test]
// Purpose
// -------
// Verify maximization flips the reported optimum value but never the
// minimizer.
//
// Given
// -----
// - f(θ) = -(θ₀ - 3)², maximized, against the equivalent negated
//   minimization.
//
// Expect
// ------
// - Both locate θ₀ ≈ 3; the maximize record reports the caller-sense
//   value ≈ 0.
fn maximize_matches_negated_minimize() {
    // Arrange
    let maximize = ProblemBuilder::new(
        |theta: &Theta, _p: &Params, _d: &()| Ok(-(theta[0] - 3.0).powi(2)),
        array![0.0],
    )
    .sense(Sense::Maximize)
    .gradient(|theta: &Theta, _p: &Params, _d: &()| Ok(array![-2.0 * (theta[0] - 3.0)]))
    .build()
    .unwrap();
    let minimize = ProblemBuilder::new(
        |theta: &Theta, _p: &Params, _d: &()| Ok((theta[0] - 3.0).powi(2)),
        array![0.0],
    )
    .gradient(|theta: &Theta, _p: &Params, _d: &()| Ok(array![2.0 * (theta[0] - 3.0)]))
    .build()
    .unwrap();

    // Act
    let max_record = SolveContext::build(maximize, Optimizer::lbfgs(), None, OptionSet::new())
        .unwrap()
        .solve()
        .unwrap();
    let min_record = SolveContext::build(minimize, Optimizer::lbfgs(), None, OptionSet::new())
        .unwrap()
        .solve()
        .unwrap();

    // Assert
    assert_abs_diff_eq!(max_record.minimizer[0], 3.0, epsilon = 1e-5);
    assert_abs_diff_eq!(min_record.minimizer[0], 3.0, epsilon = 1e-5);
    assert_abs_diff_eq!(max_record.minimum, 0.0, epsilon = 1e-8);
}

#[test]
// Purpose
// -------
// Verify a finite mini-batch stream caps callback invocations and halts
// the solve.
//
// Given
// -----
// - A 3-element stream feeding a moving-target objective, a counting
//   callback, and a generous iteration budget.
//
// Expect
// ------
// - At most 3 callback invocations; the solve ends unconverged with the
//   stream-exhaustion reason recorded.
fn stream_exhaustion_halts_the_solve() {
    // Arrange
    let problem = ProblemBuilder::<f64>::new(
        |theta: &Theta, _p: &Params, item: &f64| Ok((theta[0] - item).powi(2)),
        array![10.0],
    )
    .gradient(|theta: &Theta, _p: &Params, item: &f64| Ok(array![2.0 * (theta[0] - item)]))
    .build()
    .unwrap();
    let calls = Rc::new(RefCell::new(0_usize));
    let seen = Rc::clone(&calls);
    let options = OptionSet::new()
        .callback(move |_s: &TraceSnapshot| {
            *seen.borrow_mut() += 1;
            Ok(false)
        })
        .max_iters(50);
    let stream = VecStream::new(vec![1.0, 2.0, 3.0]);
    let mut ctx = SolveContext::build(
        problem,
        Optimizer::GradientDescent,
        Some(Box::new(stream)),
        options,
    )
    .unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_eq!(*calls.borrow(), 3);
    assert!(!record.converged);
    assert_eq!(record.original.termination, "mini-batch stream exhausted");
}

#[test]
// Purpose
// -------
// Verify a callback error aborts the solve as CallbackFailed.
//
// Given
// -----
// - A callback failing on its first invocation.
//
// Expect
// ------
// - The solve returns CallbackFailed; no record is produced.
fn callback_error_aborts_the_solve() {
    // Arrange
    let problem = quadratic().build().unwrap();
    let options = OptionSet::new().callback(|_s: &TraceSnapshot| {
        Err(OptError::CallbackFailed { text: "budget exceeded".to_string() })
    });
    let mut ctx =
        SolveContext::build(problem, Optimizer::lbfgs(), None, options).unwrap();

    // Act
    let result = ctx.solve();

    // Assert
    assert!(matches!(result, Err(OptError::CallbackFailed { .. })));
}

#[test]
// Purpose
// -------
// Verify a callback can request an early halt through its return value.
//
// Given
// -----
// - An anisotropic quadratic, so steepest descent needs several
//   iterations, and a callback returning true from the second iterate on.
//
// Expect
// ------
// - The solve ends unconverged with the callback-halt reason.
fn callback_true_requests_early_halt() {
    // Arrange
    let problem = ProblemBuilder::new(
        |theta: &Theta, _p: &Params, _d: &()| {
            Ok((theta[0] - 1.0).powi(2) + 10.0 * (theta[1] - 2.0).powi(2))
        },
        array![4.0, -3.0],
    )
    .gradient(|theta: &Theta, _p: &Params, _d: &()| {
        Ok(array![2.0 * (theta[0] - 1.0), 20.0 * (theta[1] - 2.0)])
    })
    .build()
    .unwrap();
    let options = OptionSet::new()
        .callback(|s: &TraceSnapshot| Ok(s.iteration >= 2))
        .max_iters(100);
    let mut ctx =
        SolveContext::build(problem, Optimizer::GradientDescent, None, options).unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert!(!record.converged);
    assert_eq!(record.original.termination, "trace callback requested halt");
    assert!(record.iterations <= 3);
}

#[test]
// Purpose
// -------
// Verify numeric and symbolic re-init between repeated solves.
//
// Given
// -----
// - A symbolic problem solved, re-initialized, and solved again.
//
// Expect
// ------
// - Both solves land on the same optimum; parameters stay untouched by an
//   initial-point-only re-init; the symbolic update changes one entry.
fn reinit_supports_repeated_solves() {
    // Arrange
    let problem = quadratic()
        .parameters(array![0.25])
        .symbolic(SymbolicSystem::new(
            vec!["a".to_string(), "b".to_string()],
            vec!["scale".to_string()],
        ))
        .build()
        .unwrap();
    let mut ctx =
        SolveContext::build(problem, Optimizer::lbfgs(), None, OptionSet::new()).unwrap();

    // Act
    let first = ctx.solve().unwrap();
    ctx.reinit(None, Some(ReinitValue::Numeric(array![-8.0, 12.0]))).unwrap();
    let second = ctx.solve().unwrap();
    ctx.reinit(
        None,
        Some(ReinitValue::Symbolic(HashMap::from([("b".to_string(), 7.0)]))),
    )
    .unwrap();

    // Assert
    assert_abs_diff_eq!(first.minimizer[0], 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(second.minimizer[0], 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(second.minimizer[1], 2.0, epsilon = 1e-5);
    assert_eq!(ctx.parameters(), &array![0.25]);
    assert_abs_diff_eq!(ctx.initial_point()[1], 7.0, epsilon = 1e-12);
    assert_abs_diff_eq!(ctx.initial_point()[0], -8.0, epsilon = 1e-12);
}

#[test]
// Purpose
// -------
// Verify the augmented-Lagrangian driver solves an equality-constrained
// quadratic.
//
// Given
// -----
// - min (θ₁-1)² + (θ₂-2)² subject to θ₁ + θ₂ = 1.5.
//
// Expect
// ------
// - Minimizer ≈ (0.25, 1.25) with the constraint satisfied tightly.
fn auglag_solves_equality_constraint() {
    // Arrange
    let problem = quadratic()
        .constraints(
            |theta: &Theta, _p: &Params| Ok(array![theta[0] + theta[1]]),
            array![1.5],
            array![1.5],
        )
        .constraints_jacobian(|_theta: &Theta, _p: &Params| Ok(array![[1.0, 1.0]]))
        .build()
        .unwrap();
    let mut ctx = SolveContext::build(
        problem,
        Optimizer::AugLag { inner: ConstrainedInner::Lbfgs },
        None,
        OptionSet::new(),
    )
    .unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_eq!(ctx.path(), SolvePath::Constrained);
    assert_abs_diff_eq!(record.minimizer[0], 0.25, epsilon = 1e-4);
    assert_abs_diff_eq!(record.minimizer[1], 1.25, epsilon = 1e-4);
    assert_abs_diff_eq!(
        record.minimizer[0] + record.minimizer[1],
        1.5,
        epsilon = 1e-6
    );
}

#[test]
// Purpose
// -------
// Verify bounds handed to Nelder-Mead are dropped with a warning and the
// solve proceeds unconstrained.
//
// Given
// -----
// - The bounded quadratic paired with Nelder-Mead; the free minimum lies
//   outside the box.
//
// Expect
// ------
// - The unconstrained path is selected and the solver reaches the free
//   minimum (1, 2).
fn nelder_mead_drops_bounds_and_solves() {
    // Arrange
    let _ = env_logger::builder().is_test(true).try_init();
    let problem = quadratic()
        .lower_bounds(array![0.0, 0.0])
        .upper_bounds(array![0.5, 0.5])
        .build()
        .unwrap();
    let options = OptionSet::new().rel_tol(1e-10).max_iters(500);
    let mut ctx =
        SolveContext::build(problem, Optimizer::NelderMead, None, options).unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_eq!(ctx.path(), SolvePath::Unconstrained);
    assert_abs_diff_eq!(record.minimizer[0], 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(record.minimizer[1], 2.0, epsilon = 1e-3);
}

#[test]
// Purpose
// -------
// Verify particle swarm consumes its bounds natively and stays inside
// them.
//
// Given
// -----
// - The quadratic bounded to [-2, 2]² with a 40-particle swarm.
//
// Expect
// ------
// - The box-constrained path; every minimizer coordinate inside the box;
//   a value no worse than the box corner nearest the free minimum.
fn particle_swarm_stays_inside_bounds() {
    // Arrange
    let problem = quadratic()
        .lower_bounds(array![-2.0, -2.0])
        .upper_bounds(array![2.0, 2.0])
        .build()
        .unwrap();
    let options = OptionSet::new().max_iters(200);
    let mut ctx = SolveContext::build(
        problem,
        Optimizer::ParticleSwarm { particles: 40 },
        None,
        options,
    )
    .unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_eq!(ctx.path(), SolvePath::BoxConstrained);
    assert!(record.minimizer.iter().all(|t| (-2.0..=2.0).contains(t)));
    assert!(record.minimum < 0.1);
}

#[test]
// Purpose
// -------
// Verify the finite-difference fill-in lets a gradient-based solver run a
// problem declared without analytic derivatives.
//
// Given
// -----
// - The quadratic objective only, with `fd_derivatives()`.
//
// Expect
// ------
// - L-BFGS classifies and solves to the analytic optimum.
fn fd_fill_in_enables_gradient_solvers() {
    // Arrange
    let problem = ProblemBuilder::new(
        |theta: &Theta, _p: &Params, _d: &()| {
            Ok((theta[0] - 1.0).powi(2) + (theta[1] - 2.0).powi(2))
        },
        array![4.0, -3.0],
    )
    .fd_derivatives()
    .build()
    .unwrap();
    let mut ctx =
        SolveContext::build(problem, Optimizer::lbfgs(), None, OptionSet::new()).unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_abs_diff_eq!(record.minimizer[0], 1.0, epsilon = 1e-4);
    assert_abs_diff_eq!(record.minimizer[1], 2.0, epsilon = 1e-4);
}

#[test]
// Purpose
// -------
// Verify Newton over the analytic Hessian lands on the optimum in very
// few iterations.
//
// Given
// -----
// - The quadratic with gradient and Hessian, Newton, a tight iteration
//   budget.
//
// Expect
// ------
// - One Newton step suffices on a quadratic; the minimizer is exact to
//   numerical precision.
fn newton_takes_the_exact_step_on_a_quadratic() {
    // Arrange
    let problem = quadratic().build().unwrap();
    let options = OptionSet::new().max_iters(5);
    let mut ctx =
        SolveContext::build(problem, Optimizer::Newton, None, options).unwrap();

    // Act
    let record = ctx.solve().unwrap();

    // Assert
    assert_abs_diff_eq!(record.minimizer[0], 1.0, epsilon = 1e-10);
    assert_abs_diff_eq!(record.minimizer[1], 2.0, epsilon = 1e-10);
}
