//! problem — solver-agnostic problem facade.
//!
//! Purpose
//! -------
//! Normalize a caller's problem definition (objective, optional derivatives,
//! optional nonlinear constraints, bounds, optimization sense, initial point,
//! parameters) into callables with one uniform signature
//! `(θ, params, batch-item)`, so the rest of the dispatch layer never has to
//! special-case how a particular problem was put together.
//!
//! Key behaviors
//! -------------
//! - Collect the pieces through [`ProblemBuilder`] and validate arities once
//!   at [`ProblemBuilder::build`]: bound vectors must match the dimension of
//!   `θ`, and declared constraints must carry both constraint-bound vectors
//!   of equal length.
//! - Optionally fill in a missing gradient (and, from it, a missing Hessian)
//!   by finite differences via [`ProblemBuilder::fd_derivatives`]. This is
//!   the in-crate stand-in for an external automatic-differentiation facade:
//!   downstream derivative-availability checks treat a filled-in gradient
//!   exactly like an analytic one.
//! - Carry an optional [`SymbolicSystem`] (state/parameter name tables) so a
//!   context re-init can address entries by name instead of position.
//!
//! Conventions
//! -----------
//! - All callables are stored as `Rc<dyn Fn>` so per-solve wrapper structs
//!   can be rebuilt from cheap clones without touching user closures.
//! - Objective, gradient, Hessian, and Hessian-vector product take the
//!   current mini-batch element as their trailing argument; constraint
//!   callables are functions of `(θ, params)` only.
//! - The facade never flips signs: values are always in the caller's sense,
//!   and the objective layer owns the minimize/maximize convention.

use std::cell::RefCell;
use std::rc::Rc;

use finitediff::FiniteDiff;

use crate::{
    errors::{OptError, OptResult},
    types::{ConsJac, ConsVals, Cost, Grad, Hess, Params, Theta},
    validation::{validate_bounds_len, validate_grad, validate_hess},
};

/// Objective callable: `f(θ, params, batch-item) -> scalar`.
pub type ObjFn<D> = Rc<dyn Fn(&Theta, &Params, &D) -> OptResult<Cost>>;

/// Gradient callable with the same trailing arguments as the objective.
pub type GradFn<D> = Rc<dyn Fn(&Theta, &Params, &D) -> OptResult<Grad>>;

/// Hessian callable with the same trailing arguments as the objective.
pub type HessFn<D> = Rc<dyn Fn(&Theta, &Params, &D) -> OptResult<Hess>>;

/// Hessian-vector-product callable: `(θ, v, params, batch-item) -> H(θ)·v`.
pub type HvpFn<D> = Rc<dyn Fn(&Theta, &Theta, &Params, &D) -> OptResult<Grad>>;

/// Nonlinear constraint values `c(θ, params)`.
pub type ConsFn = Rc<dyn Fn(&Theta, &Params) -> OptResult<ConsVals>>;

/// Constraint Jacobian `J(θ, params)`, one row per constraint.
pub type ConsJacFn = Rc<dyn Fn(&Theta, &Params) -> OptResult<ConsJac>>;

/// Per-constraint Hessians `[∇²c₁, …, ∇²cₘ]`.
pub type ConsHessFn = Rc<dyn Fn(&Theta, &Params) -> OptResult<Vec<Hess>>>;

/// Whether the caller wants the objective minimized or maximized.
///
/// Every algorithm in the external family minimizes; maximization is
/// implemented downstream as a sign flip on the value and every derivative,
/// undone on the reported minimum only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// Name tables describing a problem of symbolic origin.
///
/// When present, re-init may address `initial_point` entries through
/// `state_names` and `parameters` entries through `param_names`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicSystem {
    state_names: Vec<String>,
    param_names: Vec<String>,
}

impl SymbolicSystem {
    pub fn new(state_names: Vec<String>, param_names: Vec<String>) -> Self {
        Self { state_names, param_names }
    }

    /// Position of a named state (decision variable), if declared.
    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.state_names.iter().position(|n| n == name)
    }

    /// Position of a named parameter, if declared.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_names.iter().position(|n| n == name)
    }
}

/// Normalized problem definition, immutable for the lifetime of a solve.
///
/// Built through [`ProblemBuilder`]; the generic `D` is the mini-batch
/// element type injected as the trailing argument of every objective-side
/// callable (`()` for problems without a data stream).
pub struct ProblemSpec<D = ()> {
    pub(crate) objective: ObjFn<D>,
    pub(crate) gradient: Option<GradFn<D>>,
    pub(crate) hessian: Option<HessFn<D>>,
    pub(crate) hess_vec_prod: Option<HvpFn<D>>,
    pub(crate) constraints: Option<ConsFn>,
    pub(crate) constraints_jacobian: Option<ConsJacFn>,
    pub(crate) constraints_hessian: Option<ConsHessFn>,
    pub(crate) lower_bounds: Option<Theta>,
    pub(crate) upper_bounds: Option<Theta>,
    pub(crate) cons_lower: Option<ConsVals>,
    pub(crate) cons_upper: Option<ConsVals>,
    pub(crate) sense: Sense,
    pub(crate) initial_point: Theta,
    pub(crate) parameters: Params,
    pub(crate) symbolic: Option<SymbolicSystem>,
}

impl<D> ProblemSpec<D> {
    /// Dimension of the decision variable `θ`.
    pub fn dim(&self) -> usize {
        self.initial_point.len()
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn initial_point(&self) -> &Theta {
        &self.initial_point
    }

    pub fn parameters(&self) -> &Params {
        &self.parameters
    }

    pub fn lower_bounds(&self) -> Option<&Theta> {
        self.lower_bounds.as_ref()
    }

    pub fn upper_bounds(&self) -> Option<&Theta> {
        self.upper_bounds.as_ref()
    }

    pub fn symbolic(&self) -> Option<&SymbolicSystem> {
        self.symbolic.as_ref()
    }

    pub fn has_bounds(&self) -> bool {
        self.lower_bounds.is_some() || self.upper_bounds.is_some()
    }

    pub fn has_gradient(&self) -> bool {
        self.gradient.is_some()
    }

    /// True when either a full Hessian or a Hessian-vector product is
    /// available.
    pub fn has_second_order(&self) -> bool {
        self.hessian.is_some() || self.hess_vec_prod.is_some()
    }

    pub fn has_constraints(&self) -> bool {
        self.constraints.is_some()
    }

    pub fn has_constraint_jacobian(&self) -> bool {
        self.constraints_jacobian.is_some()
    }

    pub fn has_constraint_hessians(&self) -> bool {
        self.constraints_hessian.is_some()
    }

    /// Evaluate the raw objective in the caller's sense.
    pub fn eval_objective(&self, theta: &Theta, params: &Params, item: &D) -> OptResult<Cost> {
        (self.objective)(theta, params, item)
    }
}

/// Builder for [`ProblemSpec`].
///
/// Validation of arities happens once in [`ProblemBuilder::build`]; the
/// setter methods themselves never fail.
pub struct ProblemBuilder<D = ()> {
    objective: ObjFn<D>,
    gradient: Option<GradFn<D>>,
    hessian: Option<HessFn<D>>,
    hess_vec_prod: Option<HvpFn<D>>,
    constraints: Option<ConsFn>,
    constraints_jacobian: Option<ConsJacFn>,
    constraints_hessian: Option<ConsHessFn>,
    lower_bounds: Option<Theta>,
    upper_bounds: Option<Theta>,
    cons_lower: Option<ConsVals>,
    cons_upper: Option<ConsVals>,
    sense: Sense,
    initial_point: Theta,
    parameters: Params,
    symbolic: Option<SymbolicSystem>,
    fd_fill: bool,
}

impl<D: 'static> ProblemBuilder<D> {
    /// Start a builder from the two mandatory pieces: the objective and the
    /// initial point. Parameters default to an empty vector.
    pub fn new(
        objective: impl Fn(&Theta, &Params, &D) -> OptResult<Cost> + 'static, initial_point: Theta,
    ) -> Self {
        Self {
            objective: Rc::new(objective),
            gradient: None,
            hessian: None,
            hess_vec_prod: None,
            constraints: None,
            constraints_jacobian: None,
            constraints_hessian: None,
            lower_bounds: None,
            upper_bounds: None,
            cons_lower: None,
            cons_upper: None,
            sense: Sense::Minimize,
            initial_point,
            parameters: Params::zeros(0),
            symbolic: None,
            fd_fill: false,
        }
    }

    pub fn parameters(mut self, parameters: Params) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn sense(mut self, sense: Sense) -> Self {
        self.sense = sense;
        self
    }

    pub fn gradient(
        mut self, gradient: impl Fn(&Theta, &Params, &D) -> OptResult<Grad> + 'static,
    ) -> Self {
        self.gradient = Some(Rc::new(gradient));
        self
    }

    pub fn hessian(
        mut self, hessian: impl Fn(&Theta, &Params, &D) -> OptResult<Hess> + 'static,
    ) -> Self {
        self.hessian = Some(Rc::new(hessian));
        self
    }

    pub fn hess_vec_prod(
        mut self, hvp: impl Fn(&Theta, &Theta, &Params, &D) -> OptResult<Grad> + 'static,
    ) -> Self {
        self.hess_vec_prod = Some(Rc::new(hvp));
        self
    }

    /// Declare nonlinear constraints together with their interval bounds.
    ///
    /// `lower` and `upper` must both be supplied and of equal length; this is
    /// checked in [`ProblemBuilder::build`].
    pub fn constraints(
        mut self, constraints: impl Fn(&Theta, &Params) -> OptResult<ConsVals> + 'static,
        lower: ConsVals, upper: ConsVals,
    ) -> Self {
        self.constraints = Some(Rc::new(constraints));
        self.cons_lower = Some(lower);
        self.cons_upper = Some(upper);
        self
    }

    pub fn constraints_jacobian(
        mut self, jacobian: impl Fn(&Theta, &Params) -> OptResult<ConsJac> + 'static,
    ) -> Self {
        self.constraints_jacobian = Some(Rc::new(jacobian));
        self
    }

    pub fn constraints_hessian(
        mut self, hessians: impl Fn(&Theta, &Params) -> OptResult<Vec<Hess>> + 'static,
    ) -> Self {
        self.constraints_hessian = Some(Rc::new(hessians));
        self
    }

    pub fn lower_bounds(mut self, lower: Theta) -> Self {
        self.lower_bounds = Some(lower);
        self
    }

    pub fn upper_bounds(mut self, upper: Theta) -> Self {
        self.upper_bounds = Some(upper);
        self
    }

    pub fn symbolic(mut self, symbolic: SymbolicSystem) -> Self {
        self.symbolic = Some(symbolic);
        self
    }

    /// Fill missing derivatives by finite differences at build time.
    ///
    /// A missing gradient is approximated from the objective
    /// (central differences, forward fallback); a missing Hessian is then
    /// approximated from whatever gradient is in place. A supplied analytic
    /// derivative always wins over the fill-in.
    pub fn fd_derivatives(mut self) -> Self {
        self.fd_fill = true;
        self
    }

    /// Validate arities and assemble the immutable [`ProblemSpec`].
    ///
    /// # Errors
    /// - [`OptError::DimensionMismatch`] when a bound vector's length does
    ///   not match the dimension of `θ`.
    /// - [`OptError::ConstraintBoundsMissing`] when constraints are declared
    ///   without both constraint-bound vectors.
    /// - [`OptError::ConstraintDimMismatch`] when the two constraint-bound
    ///   vectors disagree in length.
    pub fn build(mut self) -> OptResult<ProblemSpec<D>> {
        let dim = self.initial_point.len();
        validate_bounds_len("lower_bounds", self.lower_bounds.as_ref(), dim)?;
        validate_bounds_len("upper_bounds", self.upper_bounds.as_ref(), dim)?;

        if self.constraints.is_some() {
            match (&self.cons_lower, &self.cons_upper) {
                (Some(lo), Some(up)) => {
                    if lo.len() != up.len() {
                        return Err(OptError::ConstraintDimMismatch {
                            expected: lo.len(),
                            found: up.len(),
                        });
                    }
                }
                _ => return Err(OptError::ConstraintBoundsMissing),
            }
        }

        if self.fd_fill {
            if self.gradient.is_none() {
                let f = Rc::clone(&self.objective);
                self.gradient = Some(Rc::new(move |theta: &Theta, p: &Params, d: &D| {
                    fd_gradient(&f, theta, p, d)
                }));
            }
            if self.hessian.is_none() && self.hess_vec_prod.is_none() {
                if let Some(g) = self.gradient.as_ref().map(Rc::clone) {
                    self.hessian = Some(Rc::new(move |theta: &Theta, p: &Params, d: &D| {
                        fd_hessian(&g, theta, p, d)
                    }));
                }
            }
        }

        Ok(ProblemSpec {
            objective: self.objective,
            gradient: self.gradient,
            hessian: self.hessian,
            hess_vec_prod: self.hess_vec_prod,
            constraints: self.constraints,
            constraints_jacobian: self.constraints_jacobian,
            constraints_hessian: self.constraints_hessian,
            lower_bounds: self.lower_bounds,
            upper_bounds: self.upper_bounds,
            cons_lower: self.cons_lower,
            cons_upper: self.cons_upper,
            sense: self.sense,
            initial_point: self.initial_point,
            parameters: self.parameters,
            symbolic: self.symbolic,
        })
    }
}

/// Finite-difference gradient of the objective at `theta`.
///
/// The FD closure cannot return `Result`, so any error raised by the
/// objective is stored into a shared cell and the closure returns `NaN`.
/// Central differences are tried first; if the result fails validation the
/// computation is retried once with forward differences.
///
/// # Errors
/// - Propagates the first objective error captured during differencing.
/// - Returns validation errors when the gradient has the wrong dimension or
///   non-finite entries on both attempts.
fn fd_gradient<D>(f: &ObjFn<D>, theta: &Theta, params: &Params, item: &D) -> OptResult<Grad> {
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let func = |t: &Theta| -> f64 {
        match f(t, params, item) {
            Ok(value) => value,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                f64::NAN
            }
        }
    };

    let dim = theta.len();
    let grad = theta.central_diff(&func);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    match validate_grad(&grad, dim) {
        Ok(()) => Ok(grad),
        Err(_) => {
            let grad = theta.forward_diff(&func);
            if let Some(err) = closure_err.take() {
                return Err(err);
            }
            validate_grad(&grad, dim)?;
            Ok(grad)
        }
    }
}

/// Finite-difference Hessian assembled from a gradient callable.
///
/// Central differences are preferred; forward differences are the fallback
/// when the central approximation fails validation. The result is
/// symmetrized in place since finite differencing does not guarantee exact
/// symmetry.
fn fd_hessian<D>(g: &GradFn<D>, theta: &Theta, params: &Params, item: &D) -> OptResult<Hess> {
    let closure_err: RefCell<Option<OptError>> = RefCell::new(None);
    let dim = theta.len();
    let grad_func = |t: &Theta| -> Grad {
        match g(t, params, item) {
            Ok(grad) => grad,
            Err(e) => {
                let mut slot = closure_err.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                Grad::from_elem(dim, f64::NAN)
            }
        }
    };

    let mut hess = theta.central_hessian(&grad_func);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    match validate_hess(&hess, dim) {
        Ok(()) => {
            symmetrize(&mut hess);
            Ok(hess)
        }
        Err(_) => {
            let mut hess = theta.forward_hessian(&grad_func);
            if let Some(err) = closure_err.take() {
                return Err(err);
            }
            validate_hess(&hess, dim)?;
            symmetrize(&mut hess);
            Ok(hess)
        }
    }
}

/// Replace `H` with `(H + Hᵀ)/2`.
fn symmetrize(hess: &mut Hess) {
    let n = hess.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (hess[(i, j)] + hess[(j, i)]);
            hess[(i, j)] = avg;
            hess[(j, i)] = avg;
        }
    }
}
