//! newton — full-step Newton iteration over dense Hessians.
//!
//! Purpose
//! -------
//! Provide the second-order descent step used by the Newton configuration
//! and by the Newton-inner constrained driver. The backend's own Newton
//! implementation requires a matrix-inverse operation the ndarray math
//! backend does not carry, so the step is computed here by an LU solve of
//! `H d = g` through `nalgebra`.
//!
//! Key behaviors
//! -------------
//! - One iteration moves `θ ← θ - γ d` with `d` the solution of
//!   `H(θ) d = ∇f(θ)`; the damping factor `γ` defaults to a full step.
//! - A singular Hessian fails the solve instead of producing a NaN iterate.
//! - Termination is left to the executor (iteration cap, timeout, halt
//!   bridge); the step itself imposes no convergence criterion.

use argmin::core::{CostFunction, Error, Gradient, Hessian, IterState, Problem, Solver, KV};
use nalgebra::{DMatrix, DVector};

use crate::{
    errors::OptError,
    types::{Grad, Hess, Theta},
};

/// Newton's method with a fixed damping factor.
pub struct NewtonSolver {
    gamma: f64,
}

impl NewtonSolver {
    /// Full-step Newton (`γ = 1`).
    pub fn new() -> Self {
        Self { gamma: 1.0 }
    }

    /// Damped variant; `gamma` scales every step.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Solve `H d = g` by LU decomposition with partial pivoting.
fn newton_direction(hess: &Hess, grad: &Grad) -> Result<Theta, Error> {
    let n = grad.len();
    let h = DMatrix::from_row_iterator(n, n, hess.iter().copied());
    let g = DVector::from_iterator(n, grad.iter().copied());
    let d = h.lu().solve(&g).ok_or(OptError::ConditionViolated {
        text: "Newton step failed: Hessian is singular".to_string(),
    })?;
    Ok(Theta::from_iter(d.iter().copied()))
}

impl<O> Solver<O, IterState<Theta, Grad, (), Hess, (), f64>> for NewtonSolver
where
    O: CostFunction<Param = Theta, Output = f64>
        + Gradient<Param = Theta, Gradient = Grad>
        + Hessian<Param = Theta, Hessian = Hess>,
{
    const NAME: &'static str = "Newton";

    fn next_iter(
        &mut self, problem: &mut Problem<O>, mut state: IterState<Theta, Grad, (), Hess, (), f64>,
    ) -> Result<(IterState<Theta, Grad, (), Hess, (), f64>, Option<KV>), Error> {
        let param = state.take_param().ok_or(OptError::NotInitialized {
            text: "Newton step requires an initial parameter vector".to_string(),
        })?;
        let grad = problem.gradient(&param)?;
        let hess = problem.hessian(&param)?;
        let direction = newton_direction(&hess, &grad)?;
        let next = &param - &(direction * self.gamma);
        // Executor best-iterate tracking keys off the recorded cost.
        let cost = problem.cost(&next)?;
        Ok((state.param(next).cost(cost), None))
    }
}
