//! solve — path execution and solution normalization.
//!
//! Purpose
//! -------
//! Run the solve path selected by classification and normalize whatever the
//! backend reports into one uniform [`SolutionRecord`]. Every path drives
//! the backend through an executor wrapped in the halting decorator, so
//! trace delivery, batch advance, and early halting behave identically
//! across algorithms.
//!
//! Key behaviors
//! -------------
//! - The unconstrained path invokes the backend once. The box path runs one
//!   inner solve per barrier cycle with a geometrically shrinking μ and
//!   projects the final iterate into the box; particle swarm takes its
//!   bounds natively. The constrained path runs augmented-Lagrangian cycles
//!   with multiplier updates `λ ← ρ r` and penalty growth when the
//!   violation stalls.
//! - Cycle counts, the μ and ρ schedules, and the violation cutoff are
//!   driver configuration, not convergence criteria; convergence is read
//!   back from the backend's termination reason.
//! - The reported minimum is sense-corrected; the minimizer never is.
//! - Backend failures propagate through the crate's error conversion; an
//!   `OptError` raised inside a callback or evaluation comes back out as
//!   itself.
//!
//! Testing notes
//! -------------
//! End-to-end behavior is covered by the integration suite; unit tests here
//! pin the normalization rules.

use std::rc::Rc;
use std::time::{Duration, Instant};

use argmin::core::{
    observers::ObserverMode, CostFunction, Executor, Gradient, Hessian, IterState,
    PopulationState, Solver, State, TerminationReason, TerminationStatus,
};
use argmin::solver::particleswarm::{Particle, ParticleSwarm};
use argmin_observer_slog::SlogLogger;

use crate::{
    bounds::{BarrierObjective, BoxBounds},
    bridge::{BridgeStatus, HaltingSolver, SharedState},
    builders::{
        build_gradient_descent, build_lbfgs_hager_zhang, build_lbfgs_more_thuente,
        build_nelder_mead, build_newton, build_trust_region, verify_particles,
    },
    capability::{ConstrainedInner, LineSearcher, Optimizer, SolvePath},
    constraints::{AugLagObjective, ConstraintBundle},
    errors::{OptError, OptResult},
    objective::SolveObjective,
    options::MappedOptions,
    problem::ProblemSpec,
    types::{ConsVals, Cost, FnEvalMap, Grad, Hess, Theta},
    validation::{validate_theta_hat, validate_value},
};

/// Initial barrier weight of the box path.
const BARRIER_MU0: f64 = 1.0;
/// Geometric factor applied to μ after each barrier cycle.
const BARRIER_SHRINK: f64 = 0.1;
/// Number of barrier cycles per box solve.
const BARRIER_CYCLES: usize = 12;

/// Initial penalty parameter of the constrained driver.
const AUGLAG_RHO0: f64 = 10.0;
/// Penalty growth factor when the violation stalls.
const AUGLAG_GROWTH: f64 = 10.0;
/// Required per-cycle violation reduction before the penalty grows.
const AUGLAG_IMPROVEMENT: f64 = 0.25;
/// Violation level at which the driver stops cycling.
const AUGLAG_VIOL_TOL: f64 = 1e-8;
/// Maximum number of augmented-Lagrangian cycles.
const AUGLAG_CYCLES: usize = 20;

/// Raw backend payload preserved alongside the normalized record.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverReport {
    /// Backend termination reason, verbatim.
    pub termination: String,
    /// Best cost in solver space (sense flip not undone).
    pub best_cost: Cost,
    /// Backend function-evaluation counters.
    pub func_counts: FnEvalMap,
}

/// Uniform solve result across all algorithms and paths.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionRecord {
    pub minimizer: Theta,
    /// Objective value at the minimizer, in the caller's sense.
    pub minimum: Cost,
    pub converged: bool,
    /// Symbol derived from `converged`.
    pub status: String,
    pub solve_time: Duration,
    pub iterations: u64,
    /// Euclidean gradient norm at the minimizer, when a gradient exists.
    pub grad_norm: Option<f64>,
    pub original: SolverReport,
}

/// Map backend termination onto the converged flag and raw reason text.
fn termination_summary(termination: &TerminationStatus) -> (bool, String) {
    match termination {
        TerminationStatus::NotTerminated => (false, "not terminated".to_string()),
        TerminationStatus::Terminated(reason) => {
            let converged = matches!(
                reason,
                TerminationReason::SolverConverged | TerminationReason::TargetCostReached
            );
            (converged, reason.to_string())
        }
    }
}

/// Assemble a [`SolutionRecord`] from raw backend state.
///
/// # Errors
/// - [`OptError::MissingThetaHat`] / [`OptError::InvalidThetaHat`] when the
///   backend produced no usable best iterate.
/// - [`OptError::NonFiniteCost`] when the best cost is not finite.
fn normalize(
    theta_hat: Option<Theta>, best_cost: Cost, termination: &TerminationStatus, iterations: u64,
    func_counts: FnEvalMap, solve_time: Duration, sign: f64,
) -> OptResult<SolutionRecord> {
    let minimizer = validate_theta_hat(theta_hat)?;
    validate_value(best_cost)?;
    let (converged, reason) = termination_summary(termination);
    Ok(SolutionRecord {
        minimizer,
        minimum: sign * best_cost,
        converged,
        status: status_symbol(converged),
        solve_time,
        iterations,
        grad_norm: None,
        original: SolverReport { termination: reason, best_cost, func_counts },
    })
}

fn status_symbol(converged: bool) -> String {
    if converged { "converged" } else { "not_converged" }.to_string()
}

/// Run one backend solve under the halting decorator and normalize the
/// outcome.
fn run_iter_solver<D, O, S, G, J, H, R>(
    objective: O, solver: S, shared: &SharedState<D>, init: &Theta, mapped: &MappedOptions,
) -> OptResult<SolutionRecord>
where
    O: CostFunction<Param = Theta, Output = Cost>,
    S: Solver<O, IterState<Theta, G, J, H, R, Cost>>,
{
    let sign = shared.borrow().sign;
    let halting = HaltingSolver::new(solver, Rc::clone(shared));
    let mut executor = Executor::new(objective, halting).configure(|state| {
        let state = state.param(init.clone());
        match mapped.max_iters {
            Some(iters) => state.max_iters(iters),
            None => state,
        }
    });
    if let Some(limit) = mapped.time_limit {
        executor = executor.timeout(limit);
    }
    if mapped.show_progress {
        executor = executor.add_observer(SlogLogger::term(), ObserverMode::Always);
    }

    let start = Instant::now();
    let result = executor.run().map_err(OptError::from)?;
    let solve_time = start.elapsed();

    let func_counts: FnEvalMap =
        result.problem.counts.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    let mut state = result.state;
    let termination = state.get_termination_status().clone();
    let iterations = state.get_iter();
    let best_cost = state.get_best_cost();
    let theta_hat = state.take_best_param();
    normalize(theta_hat, best_cost, &termination, iterations, func_counts, solve_time, sign)
}

/// Route a descent-family optimizer to its configured backend solver.
fn run_descent<D, O>(
    objective: O, optimizer: &Optimizer, shared: &SharedState<D>, init: &Theta,
    mapped: &MappedOptions,
) -> OptResult<SolutionRecord>
where
    O: CostFunction<Param = Theta, Output = Cost>
        + Gradient<Param = Theta, Gradient = Grad>
        + Hessian<Param = Theta, Hessian = Hess>,
{
    match optimizer {
        Optimizer::GradientDescent => {
            run_iter_solver(objective, build_gradient_descent(), shared, init, mapped)
        }
        Optimizer::Lbfgs { line_searcher: LineSearcher::MoreThuente, memory } => {
            let solver = build_lbfgs_more_thuente(*memory, mapped.tol_cost)?;
            run_iter_solver(objective, solver, shared, init, mapped)
        }
        Optimizer::Lbfgs { line_searcher: LineSearcher::HagerZhang, memory } => {
            let solver = build_lbfgs_hager_zhang(*memory, mapped.tol_cost)?;
            run_iter_solver(objective, solver, shared, init, mapped)
        }
        Optimizer::Newton => run_iter_solver(objective, build_newton(), shared, init, mapped),
        Optimizer::TrustRegion => {
            run_iter_solver(objective, build_trust_region(), shared, init, mapped)
        }
        Optimizer::NelderMead => {
            let solver = build_nelder_mead(init, mapped.sd_tolerance)?;
            run_iter_solver(objective, solver, shared, init, mapped)
        }
        Optimizer::ParticleSwarm { .. } | Optimizer::AugLag { .. } => {
            Err(OptError::PotentialBug {
                text: "population or constrained driver routed to the descent runner".to_string(),
            })
        }
    }
}

/// Unconstrained path: one backend invocation.
pub(crate) fn solve_unconstrained<D: 'static>(
    problem: &ProblemSpec<D>, optimizer: &Optimizer, shared: &SharedState<D>, init: &Theta,
    mapped: &MappedOptions,
) -> OptResult<SolutionRecord> {
    let objective = SolveObjective::new(problem, Rc::clone(shared), optimizer.name());
    let mut record = run_descent(objective, optimizer, shared, init, mapped)?;
    attach_grad_norm(problem, optimizer, shared, &mut record)?;
    Ok(record)
}

/// Box path: native bounds for particle swarm, barrier cycles otherwise.
pub(crate) fn solve_box<D: 'static>(
    problem: &ProblemSpec<D>, optimizer: &Optimizer, shared: &SharedState<D>, init: &Theta,
    mapped: &MappedOptions,
) -> OptResult<SolutionRecord> {
    if let Optimizer::ParticleSwarm { particles } = optimizer {
        return run_particle_swarm(problem, shared, *particles, mapped);
    }

    let bounds = BoxBounds::from_problem(problem);
    let mut x = bounds.clamp_interior(init);
    let mut mu = BARRIER_MU0;
    let start = Instant::now();
    let mut total_iters = 0;
    let mut last: Option<SolutionRecord> = None;

    for _ in 0..BARRIER_CYCLES {
        let inner = SolveObjective::new(problem, Rc::clone(shared), optimizer.name());
        let barrier = BarrierObjective::new(inner, bounds.clone(), mu);
        let record = run_descent(barrier, optimizer, shared, &x, mapped)?;
        x = record.minimizer.clone();
        total_iters += record.iterations;
        last = Some(record);
        mu *= BARRIER_SHRINK;
        if matches!(shared.borrow().bridge.status(), BridgeStatus::Halted { .. }) {
            break;
        }
    }

    let mut record = last.ok_or(OptError::MissingThetaHat)?;
    let minimizer = bounds.project(&x);
    let clean = SolveObjective::new(problem, Rc::clone(shared), optimizer.name());
    let (cost, grad) = clean.cost_and_grad(&minimizer).map_err(OptError::from)?;
    let sign = shared.borrow().sign;
    record.minimum = sign * cost;
    record.grad_norm = Some(grad.dot(&grad).sqrt());
    record.minimizer = minimizer;
    record.iterations = total_iters;
    record.solve_time = start.elapsed();
    Ok(record)
}

/// Constrained path: augmented-Lagrangian cycles around an inner descent
/// solver.
pub(crate) fn solve_constrained<D: 'static>(
    problem: &ProblemSpec<D>, optimizer: &Optimizer, shared: &SharedState<D>, init: &Theta,
    mapped: &MappedOptions,
) -> OptResult<SolutionRecord> {
    let inner_optimizer = match optimizer {
        Optimizer::AugLag { inner: ConstrainedInner::Lbfgs } => Optimizer::lbfgs(),
        Optimizer::AugLag { inner: ConstrainedInner::Newton } => Optimizer::Newton,
        _ => return Err(OptError::ConstraintsUnsupported { optimizer: optimizer.name() }),
    };

    let bundle = Rc::new(ConstraintBundle::from_problem(problem)?);
    let mut lambda = ConsVals::zeros(bundle.rows());
    let mut rho = AUGLAG_RHO0;
    let mut x = init.clone();
    let mut prev_violation = f64::INFINITY;
    let mut violation = f64::INFINITY;
    let start = Instant::now();
    let mut total_iters = 0;
    let mut last: Option<SolutionRecord> = None;

    for _ in 0..AUGLAG_CYCLES {
        let inner = SolveObjective::new(problem, Rc::clone(shared), optimizer.name());
        let objective = AugLagObjective::new(
            inner,
            Rc::clone(&bundle),
            Rc::clone(shared),
            lambda.clone(),
            rho,
        );
        let record = run_descent(objective, &inner_optimizer, shared, &x, mapped)?;
        x = record.minimizer.clone();
        total_iters += record.iterations;
        last = Some(record);

        let params = shared.borrow().params.clone();
        let c = bundle.values(&x, &params)?;
        let r = bundle.shifted_residual(&c, &lambda, rho);
        violation = r.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        lambda = &r * rho;

        if violation < AUGLAG_VIOL_TOL {
            break;
        }
        if violation > AUGLAG_IMPROVEMENT * prev_violation {
            rho *= AUGLAG_GROWTH;
        }
        prev_violation = violation;
        if matches!(shared.borrow().bridge.status(), BridgeStatus::Halted { .. }) {
            break;
        }
    }

    let mut record = last.ok_or(OptError::MissingThetaHat)?;
    let clean = SolveObjective::new(problem, Rc::clone(shared), optimizer.name());
    let sign = shared.borrow().sign;
    let cost = clean.cost(&x).map_err(OptError::from)?;
    record.minimum = sign * cost;
    record.minimizer = x;
    record.converged = record.converged && violation < AUGLAG_VIOL_TOL;
    record.status = status_symbol(record.converged);
    record.iterations = total_iters;
    record.solve_time = start.elapsed();
    attach_grad_norm(problem, optimizer, shared, &mut record)?;
    Ok(record)
}

/// Particle swarm runner over population state.
fn run_particle_swarm<D: 'static>(
    problem: &ProblemSpec<D>, shared: &SharedState<D>, particles: usize, mapped: &MappedOptions,
) -> OptResult<SolutionRecord> {
    verify_particles(particles)?;
    let (lower, upper) = match (problem.lower_bounds(), problem.upper_bounds()) {
        (Some(lo), Some(up)) => (lo.clone(), up.clone()),
        _ => return Err(OptError::MissingBounds { optimizer: "ParticleSwarm" }),
    };

    let sign = shared.borrow().sign;
    let objective = SolveObjective::new(problem, Rc::clone(shared), "ParticleSwarm");
    let solver = ParticleSwarm::new((lower, upper), particles);
    let halting = HaltingSolver::new(solver, Rc::clone(shared));
    let mut executor = Executor::new(objective, halting).configure(
        |state: PopulationState<Particle<Theta, Cost>, Cost>| match mapped.max_iters {
            Some(iters) => state.max_iters(iters),
            None => state,
        },
    );
    if let Some(limit) = mapped.time_limit {
        executor = executor.timeout(limit);
    }
    if mapped.show_progress {
        executor = executor.add_observer(SlogLogger::term(), ObserverMode::Always);
    }

    let start = Instant::now();
    let result = executor.run().map_err(OptError::from)?;
    let solve_time = start.elapsed();

    let func_counts: FnEvalMap =
        result.problem.counts.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    let state = result.state;
    let termination = state.get_termination_status().clone();
    let iterations = state.get_iter();
    let best_cost = state.get_best_cost();
    let theta_hat = state.get_best_param().map(|p| p.position.clone());
    normalize(theta_hat, best_cost, &termination, iterations, func_counts, solve_time, sign)
}

/// Fill in the gradient norm at the minimizer when a gradient exists.
fn attach_grad_norm<D>(
    problem: &ProblemSpec<D>, optimizer: &Optimizer, shared: &SharedState<D>,
    record: &mut SolutionRecord,
) -> OptResult<()> {
    if problem.has_gradient() {
        let objective = SolveObjective::new(problem, Rc::clone(shared), optimizer.name());
        let grad = objective.gradient(&record.minimizer).map_err(OptError::from)?;
        record.grad_norm = Some(grad.dot(&grad).sqrt());
    }
    Ok(())
}

/// Entry point used by the context: dispatch on the classified path.
pub(crate) fn dispatch<D: 'static>(
    problem: &ProblemSpec<D>, optimizer: &Optimizer, path: SolvePath, shared: &SharedState<D>,
    init: &Theta, mapped: &MappedOptions,
) -> OptResult<SolutionRecord> {
    match path {
        SolvePath::Unconstrained => solve_unconstrained(problem, optimizer, shared, init, mapped),
        SolvePath::BoxConstrained => solve_box(problem, optimizer, shared, init, mapped),
        SolvePath::Constrained => solve_constrained(problem, optimizer, shared, init, mapped),
    }
}
