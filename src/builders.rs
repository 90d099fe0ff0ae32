//! builders — construction of configured backend solvers.
//!
//! Purpose
//! -------
//! Centralize the construction of each supported algorithm from the mapped
//! option set, so the solve paths assemble solvers through one vocabulary
//! and tuning-knob validation happens in exactly one place.
//!
//! Key behaviors
//! -------------
//! - L-BFGS builders validate the history size and apply the cost-change
//!   tolerance when one was mapped.
//! - The Nelder-Mead builder spans the initial simplex from the starting
//!   point by offsetting one coordinate per vertex.
//! - Second-order solvers (Newton, trust region) carry their backend
//!   defaults; their knobs have no counterpart in the option set.
//!
//! Conventions
//! -----------
//! - Builders return errors from this crate's taxonomy; backend construction
//!   errors are wrapped on the way out.

use argmin::solver::{
    gradientdescent::SteepestDescent,
    neldermead::NelderMead,
    quasinewton::LBFGS,
    trustregion::{Steihaug, TrustRegion},
};

use crate::{
    errors::{OptError, OptResult},
    newton::NewtonSolver,
    types::{
        Cost, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente, MoreThuenteLS, Theta,
    },
};

/// Offset applied per coordinate when spanning the initial simplex.
const SIMPLEX_OFFSET: f64 = 0.1;

/// L-BFGS with the More-Thuente line search.
///
/// # Parameters
/// - `mem`: history size, at least 1.
/// - `tol_cost`: optional cost-change tolerance from option mapping.
///
/// # Errors
/// - [`OptError::InvalidLbfgsMem`] for a zero history size.
/// - Backend construction errors wrapped into the crate taxonomy.
pub fn build_lbfgs_more_thuente(
    mem: usize, tol_cost: Option<f64>,
) -> OptResult<LbfgsMoreThuente> {
    verify_mem(mem)?;
    let mut solver = LBFGS::new(MoreThuenteLS::new(), mem);
    if let Some(tol) = tol_cost {
        solver = solver.with_tolerance_cost(tol).map_err(OptError::from)?;
    }
    Ok(solver)
}

/// L-BFGS with the Hager-Zhang line search.
///
/// Same knobs and errors as [`build_lbfgs_more_thuente`].
pub fn build_lbfgs_hager_zhang(mem: usize, tol_cost: Option<f64>) -> OptResult<LbfgsHagerZhang> {
    verify_mem(mem)?;
    let mut solver = LBFGS::new(HagerZhangLS::new(), mem);
    if let Some(tol) = tol_cost {
        solver = solver.with_tolerance_cost(tol).map_err(OptError::from)?;
    }
    Ok(solver)
}

/// Steepest descent with a More-Thuente line search.
pub fn build_gradient_descent() -> SteepestDescent<MoreThuenteLS> {
    SteepestDescent::new(MoreThuenteLS::new())
}

/// Full-step Newton iteration.
pub fn build_newton() -> NewtonSolver {
    NewtonSolver::new()
}

/// Trust region with the Steihaug subproblem solver.
pub fn build_trust_region() -> TrustRegion<Steihaug<Theta, Cost>, Cost> {
    TrustRegion::new(Steihaug::new())
}

/// Nelder-Mead over a simplex spanned from the starting point.
///
/// Vertex `i + 1` offsets coordinate `i` of `initial` by a fixed step scaled
/// with the coordinate's magnitude.
///
/// # Errors
/// Backend rejection of the standard-deviation tolerance, wrapped into the
/// crate taxonomy.
pub fn build_nelder_mead(
    initial: &Theta, sd_tolerance: Option<f64>,
) -> OptResult<NelderMead<Theta, Cost>> {
    let mut simplex = vec![initial.clone()];
    for i in 0..initial.len() {
        let mut vertex = initial.clone();
        vertex[i] += SIMPLEX_OFFSET * (1.0 + vertex[i].abs());
        simplex.push(vertex);
    }
    let mut solver = NelderMead::new(simplex);
    if let Some(tol) = sd_tolerance {
        solver = solver.with_sd_tolerance(tol).map_err(OptError::from)?;
    }
    Ok(solver)
}

/// Check the particle count before constructing a swarm.
///
/// # Errors
/// [`OptError::InvalidParticleCount`] when the swarm would be empty.
pub fn verify_particles(particles: usize) -> OptResult<()> {
    if particles == 0 {
        return Err(OptError::InvalidParticleCount {
            particles,
            reason: "particle swarm needs at least one particle",
        });
    }
    Ok(())
}

fn verify_mem(mem: usize) -> OptResult<()> {
    if mem == 0 {
        return Err(OptError::InvalidLbfgsMem {
            mem,
            reason: "L-BFGS history size must be at least 1",
        });
    }
    Ok(())
}
