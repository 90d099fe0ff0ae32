//! types — shared numeric aliases and solver wiring.
//!
//! Purpose
//! -------
//! Centralize the core numeric types and solver aliases used throughout the
//! dispatch layer. By defining these in one place, the rest of the crate can
//! stay agnostic to `ndarray` and argmin generics and can more easily evolve
//! if the backend changes.
//!
//! Key behaviors
//! -------------
//! - Define canonical aliases for parameter vectors, gradients, Hessians,
//!   Jacobians, and scalar costs (`Theta`, `Grad`, `Hess`, `ConsJac`,
//!   `Cost`).
//! - Provide a standard map type for argmin function-evaluation counters
//!   (`FnEvalMap`).
//! - Expose pre-wired L-BFGS solver aliases for the two supported
//!   line-search strategies over the common `(Theta, Grad, Cost)` shapes.
//!
//! Conventions
//! -----------
//! - All vectors and matrices are `ndarray` containers over `f64`.
//! - `Cost` is always the scalar the external solver minimizes; sense flips
//!   between caller space and solver space happen in the objective layer.
//! - `Hess` is dense and `n × n` for `n = theta.len()`; `ConsJac` is
//!   `m × n` for `m` constraints.

use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Parameter vector `θ`, the decision variable of a solve.
pub type Theta = Array1<f64>;

/// Gradient vector, matching the shape of [`Theta`].
pub type Grad = Array1<f64>;

/// Dense Hessian matrix; `n × n` for `n = Theta.len()`.
pub type Hess = Array2<f64>;

/// Fixed problem parameters `p` threaded into every objective call.
pub type Params = Array1<f64>;

/// Scalar value in solver space (always minimized).
pub type Cost = f64;

/// Constraint value vector `c(θ)`.
pub type ConsVals = Array1<f64>;

/// Constraint Jacobian; `m × n` for `m` constraints.
pub type ConsJac = Array2<f64>;

/// Function-evaluation counters as reported by the solver.
///
/// Maps argmin's counter names (e.g., `"cost_count"`) to counts.
pub type FnEvalMap = HashMap<String, u64>;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 7;

/// Hager–Zhang line search specialized to this crate's numeric types.
pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;

/// More–Thuente line search specialized to this crate's numeric types.
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

/// L-BFGS solver wired to the Hager–Zhang line search.
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;

/// L-BFGS solver wired to the More–Thuente line search.
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
