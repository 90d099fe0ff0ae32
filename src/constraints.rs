//! constraints — nonlinear constraint bundles and the augmented Lagrangian.
//!
//! Purpose
//! -------
//! Package a problem's constraint callables and interval bounds into one
//! uniformly-shaped bundle, and build the penalized objective the
//! constrained path minimizes in cycles.
//!
//! Key behaviors
//! -------------
//! - Variable bounds are folded into the bundle as appended identity rows
//!   (`cᵢ(θ) = θᵢ` bounded by the variable's interval), so the inner solver
//!   sees a single constraint system.
//! - Constraint callables are validated on every evaluation: value length
//!   and Jacobian shape must match the declared constraint count.
//! - The penalized objective follows the shifted-penalty scheme for interval
//!   constraints: with `σ = clamp(c + λ/ρ, l, u)` and residual
//!   `r = c + λ/ρ - σ`, the objective is `f + (ρ/2)‖r‖²`, its gradient
//!   `∇f + ρ Jᵀ r`, and its Hessian adds `ρ JᵀJ` over active rows plus
//!   `Σ (ρ rᵢ) ∇²cᵢ`.
//!
//! Invariants & assumptions
//! ------------------------
//! - A residual row is zero exactly when its constraint is inactive at the
//!   current multipliers, so inactive rows drop out of every derivative.
//! - The outer loop owns the λ and ρ schedule; this module only evaluates
//!   for fixed multipliers.

use std::rc::Rc;

use argmin::core::{CostFunction, Error, Gradient, Hessian};

use crate::{
    bridge::SharedState,
    errors::{OptError, OptResult},
    objective::SolveObjective,
    problem::{ConsFn, ConsHessFn, ConsJacFn, ProblemSpec},
    types::{ConsJac, ConsVals, Grad, Hess, Params, Theta},
};

/// Constraint system with variable bounds folded in as identity rows.
pub struct ConstraintBundle {
    values: ConsFn,
    jacobian: ConsJacFn,
    hessians: Option<ConsHessFn>,
    /// Interval bounds for all rows, nonlinear rows first.
    lower: ConsVals,
    upper: ConsVals,
    /// Variable index behind each appended identity row.
    bound_rows: Vec<usize>,
    /// Number of nonlinear rows declared by the problem.
    nonlinear: usize,
    dim: usize,
}

impl ConstraintBundle {
    /// Assemble the bundle from a problem that declares constraints.
    ///
    /// Variables with at least one finite bound contribute an identity row;
    /// a missing side stays at infinity and never activates.
    ///
    /// # Errors
    /// - [`OptError::ConstraintBoundsMissing`] when the problem declares no
    ///   constraint system at all.
    /// - [`OptError::MissingConstraintDerivative`] when the Jacobian
    ///   callable is absent.
    pub fn from_problem<D>(problem: &ProblemSpec<D>) -> OptResult<Self> {
        let values = problem
            .constraints
            .as_ref()
            .map(Rc::clone)
            .ok_or(OptError::ConstraintBoundsMissing)?;
        let jacobian = problem.constraints_jacobian.as_ref().map(Rc::clone).ok_or(
            OptError::MissingConstraintDerivative {
                optimizer: "AugmentedLagrangian",
                derivative: "jacobian",
            },
        )?;
        let hessians = problem.constraints_hessian.as_ref().map(Rc::clone);
        let cons_lower = problem.cons_lower.clone().unwrap_or_else(|| ConsVals::zeros(0));
        let cons_upper = problem.cons_upper.clone().unwrap_or_else(|| ConsVals::zeros(0));
        let nonlinear = cons_lower.len();
        let dim = problem.dim();

        let mut lower: Vec<f64> = cons_lower.to_vec();
        let mut upper: Vec<f64> = cons_upper.to_vec();
        let mut bound_rows = Vec::new();
        for i in 0..dim {
            let l = problem.lower_bounds().map_or(f64::NEG_INFINITY, |b| b[i]);
            let u = problem.upper_bounds().map_or(f64::INFINITY, |b| b[i]);
            if l.is_finite() || u.is_finite() {
                lower.push(l);
                upper.push(u);
                bound_rows.push(i);
            }
        }

        Ok(Self {
            values,
            jacobian,
            hessians,
            lower: ConsVals::from_vec(lower),
            upper: ConsVals::from_vec(upper),
            bound_rows,
            nonlinear,
            dim,
        })
    }

    /// Total row count including folded bound rows.
    pub fn rows(&self) -> usize {
        self.nonlinear + self.bound_rows.len()
    }

    pub fn lower(&self) -> &ConsVals {
        &self.lower
    }

    pub fn upper(&self) -> &ConsVals {
        &self.upper
    }

    /// Evaluate all rows at `theta`.
    ///
    /// # Errors
    /// [`OptError::ConstraintDimMismatch`] when the user callable returns the
    /// wrong number of values.
    pub fn values(&self, theta: &Theta, params: &Params) -> OptResult<ConsVals> {
        let user = (self.values)(theta, params)?;
        if user.len() != self.nonlinear {
            return Err(OptError::ConstraintDimMismatch {
                expected: self.nonlinear,
                found: user.len(),
            });
        }
        let mut all = Vec::with_capacity(self.rows());
        all.extend(user.iter().copied());
        all.extend(self.bound_rows.iter().map(|&i| theta[i]));
        Ok(ConsVals::from_vec(all))
    }

    /// Jacobian of all rows at `theta`.
    ///
    /// # Errors
    /// [`OptError::ConstraintDimMismatch`] when the user Jacobian has the
    /// wrong shape.
    pub fn jacobian(&self, theta: &Theta, params: &Params) -> OptResult<ConsJac> {
        let user = (self.jacobian)(theta, params)?;
        if user.nrows() != self.nonlinear || user.ncols() != self.dim {
            return Err(OptError::ConstraintDimMismatch {
                expected: self.nonlinear,
                found: user.nrows(),
            });
        }
        let mut jac = ConsJac::zeros((self.rows(), self.dim));
        jac.slice_mut(ndarray::s![..self.nonlinear, ..]).assign(&user);
        for (row, &var) in self.bound_rows.iter().enumerate() {
            jac[(self.nonlinear + row, var)] = 1.0;
        }
        Ok(jac)
    }

    /// Shifted residual `r = c + λ/ρ - clamp(c + λ/ρ, l, u)` for given
    /// constraint values and multipliers.
    ///
    /// A row's residual is zero exactly when the row is inactive; the outer
    /// loop uses the residual for both the multiplier update `λ ← ρ r` and
    /// the violation measure.
    pub fn shifted_residual(&self, c: &ConsVals, lambda: &ConsVals, rho: f64) -> ConsVals {
        let shifted = c + &(lambda / rho);
        ConsVals::from_iter(
            shifted
                .iter()
                .zip(self.lower.iter())
                .zip(self.upper.iter())
                .map(|((s, l), u)| s - s.clamp(*l, *u)),
        )
    }

    /// Weighted sum of row Hessians `Σ wᵢ ∇²cᵢ`.
    ///
    /// Bound rows are affine and contribute nothing. Rows with zero weight
    /// skip the user callable entirely only when all weights vanish.
    ///
    /// # Errors
    /// - [`OptError::MissingConstraintDerivative`] when second-order
    ///   information is requested but no Hessian callable exists.
    /// - [`OptError::ConstraintDimMismatch`] on a wrong Hessian count.
    pub fn weighted_hessian(
        &self, theta: &Theta, params: &Params, weights: &ConsVals,
    ) -> OptResult<Hess> {
        let mut total = Hess::zeros((self.dim, self.dim));
        if self.nonlinear == 0 || weights.iter().take(self.nonlinear).all(|w| *w == 0.0) {
            return Ok(total);
        }
        let hessians = self.hessians.as_ref().ok_or(OptError::MissingConstraintDerivative {
            optimizer: "AugmentedLagrangian",
            derivative: "hessians",
        })?;
        let per_row = hessians(theta, params)?;
        if per_row.len() != self.nonlinear {
            return Err(OptError::ConstraintDimMismatch {
                expected: self.nonlinear,
                found: per_row.len(),
            });
        }
        for (i, h) in per_row.iter().enumerate() {
            let w = weights[i];
            if w != 0.0 {
                total = total + &(h * w);
            }
        }
        Ok(total)
    }
}

/// Penalized objective minimized by each constrained cycle.
pub struct AugLagObjective<D> {
    inner: SolveObjective<D>,
    bundle: Rc<ConstraintBundle>,
    shared: SharedState<D>,
    /// Multiplier estimates, one per bundle row.
    lambda: ConsVals,
    rho: f64,
}

impl<D> AugLagObjective<D> {
    pub fn new(
        inner: SolveObjective<D>, bundle: Rc<ConstraintBundle>, shared: SharedState<D>,
        lambda: ConsVals, rho: f64,
    ) -> Self {
        Self { inner, bundle, shared, lambda, rho }
    }

    /// Shifted residual `r = c + λ/ρ - clamp(c + λ/ρ, l, u)` at `theta`.
    ///
    /// The outer loop reads this after each cycle to update multipliers and
    /// measure constraint violation.
    pub fn shifted_residual(&self, theta: &Theta) -> OptResult<ConsVals> {
        let params = self.shared.borrow().params.clone();
        let c = self.bundle.values(theta, &params)?;
        Ok(self.bundle.shifted_residual(&c, &self.lambda, self.rho))
    }
}

impl<D> CostFunction for AugLagObjective<D> {
    type Param = Theta;
    type Output = f64;

    fn cost(&self, param: &Theta) -> Result<f64, Error> {
        let value = self.inner.cost(param)?;
        let params = self.shared.borrow().params.clone();
        let c = self.bundle.values(param, &params)?;
        let r = self.bundle.shifted_residual(&c, &self.lambda, self.rho);
        Ok(value + 0.5 * self.rho * r.dot(&r))
    }
}

impl<D> Gradient for AugLagObjective<D> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, param: &Theta) -> Result<Grad, Error> {
        let mut grad = self.inner.gradient(param)?;
        let params = self.shared.borrow().params.clone();
        let c = self.bundle.values(param, &params)?;
        let r = self.bundle.shifted_residual(&c, &self.lambda, self.rho);
        let jac = self.bundle.jacobian(param, &params)?;
        grad = grad + jac.t().dot(&r) * self.rho;
        Ok(grad)
    }
}

impl<D> Hessian for AugLagObjective<D> {
    type Param = Theta;
    type Hessian = Hess;

    fn hessian(&self, param: &Theta) -> Result<Hess, Error> {
        let mut hess = self.inner.hessian(param)?;
        let params = self.shared.borrow().params.clone();
        let c = self.bundle.values(param, &params)?;
        let r = self.bundle.shifted_residual(&c, &self.lambda, self.rho);
        let jac = self.bundle.jacobian(param, &params)?;

        // Gauss-Newton term over active rows only.
        for (i, ri) in r.iter().enumerate() {
            if *ri != 0.0 {
                let row = jac.row(i);
                for a in 0..hess.nrows() {
                    for b in 0..hess.ncols() {
                        hess[(a, b)] += self.rho * row[a] * row[b];
                    }
                }
            }
        }

        let weights = &r * self.rho;
        hess = hess + self.bundle.weighted_hessian(param, &params, &weights)?;
        Ok(hess)
    }
}
