//! objective — backend-facing view of the problem callables.
//!
//! Purpose
//! -------
//! Wrap the facade callables of a [`crate::problem::ProblemSpec`] into one
//! struct implementing the backend's evaluation traits, with the sign
//! convention for maximization and the current mini-batch element applied at
//! every call.
//!
//! Key behaviors
//! -------------
//! - Every evaluation reads the batch element and fixed parameters from the
//!   shared per-solve state, so a stream advance between iterations is
//!   picked up automatically.
//! - Maximization is a sign flip on the value and every derivative; the
//!   flip is undone only when results are reported back to the caller.
//! - A full Hessian is served from the analytic callable when present, and
//!   otherwise assembled column by column from Hessian-vector products.
//! - Values must be finite and derivative shapes must match the problem
//!   dimension; violations abort the solve instead of feeding garbage to
//!   the algorithm.

use std::rc::Rc;

use argmin::core::{CostFunction, Error, Gradient, Hessian};

use crate::{
    bridge::SharedState,
    errors::OptError,
    problem::{GradFn, HessFn, HvpFn, ObjFn, ProblemSpec},
    types::{Grad, Hess, Theta},
    validation::{validate_grad, validate_hess},
};

/// Evaluation bundle handed to the backend executor.
pub struct SolveObjective<D> {
    objective: ObjFn<D>,
    gradient: Option<GradFn<D>>,
    hessian: Option<HessFn<D>>,
    hess_vec_prod: Option<HvpFn<D>>,
    shared: SharedState<D>,
    dim: usize,
    solver_name: &'static str,
}

impl<D> SolveObjective<D> {
    /// Snapshot the problem's callables; `solver_name` labels derivative
    /// errors raised at evaluation time.
    pub fn new(problem: &ProblemSpec<D>, shared: SharedState<D>, solver_name: &'static str) -> Self {
        Self {
            objective: Rc::clone(&problem.objective),
            gradient: problem.gradient.as_ref().map(Rc::clone),
            hessian: problem.hessian.as_ref().map(Rc::clone),
            hess_vec_prod: problem.hess_vec_prod.as_ref().map(Rc::clone),
            shared,
            dim: problem.dim(),
            solver_name,
        }
    }
}

impl<D> SolveObjective<D> {
    /// Combined value-and-gradient evaluation in solver space.
    ///
    /// The outer box loop uses this for the clean re-evaluation at the
    /// projected minimizer.
    pub fn cost_and_grad(&self, param: &Theta) -> Result<(f64, Grad), Error> {
        Ok((self.cost(param)?, self.gradient(param)?))
    }
}

impl<D> CostFunction for SolveObjective<D> {
    type Param = Theta;
    type Output = f64;

    /// Objective value in solver space (sign-flipped when maximizing).
    ///
    /// # Errors
    /// - Propagates the user objective's error.
    /// - [`OptError::NonFiniteCost`] when the value is NaN or infinite.
    fn cost(&self, param: &Theta) -> Result<f64, Error> {
        let shared = self.shared.borrow();
        let value = (self.objective)(param, &shared.params, &shared.item)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value }.into());
        }
        Ok(shared.sign * value)
    }
}

impl<D> Gradient for SolveObjective<D> {
    type Param = Theta;
    type Gradient = Grad;

    /// Gradient in solver space.
    ///
    /// # Errors
    /// - [`OptError::MissingDerivative`] when no gradient callable exists;
    ///   classification prevents this for gradient-consuming algorithms, so
    ///   hitting it indicates a mis-wired path.
    /// - Dimension and finiteness violations from gradient validation.
    fn gradient(&self, param: &Theta) -> Result<Grad, Error> {
        let gradient = self.gradient.as_ref().ok_or(OptError::MissingDerivative {
            optimizer: self.solver_name,
            derivative: "gradient",
        })?;
        let shared = self.shared.borrow();
        let grad = gradient(param, &shared.params, &shared.item)?;
        validate_grad(&grad, self.dim)?;
        Ok(grad * shared.sign)
    }
}

impl<D> Hessian for SolveObjective<D> {
    type Param = Theta;
    type Hessian = Hess;

    /// Hessian in solver space: analytic when available, otherwise built one
    /// column at a time from Hessian-vector products against the standard
    /// basis.
    ///
    /// # Errors
    /// - [`OptError::MissingDerivative`] when neither a Hessian nor a
    ///   Hessian-vector product was provided.
    /// - Shape and finiteness violations from Hessian validation.
    fn hessian(&self, param: &Theta) -> Result<Hess, Error> {
        let shared = self.shared.borrow();
        if let Some(hessian) = &self.hessian {
            let hess = hessian(param, &shared.params, &shared.item)?;
            validate_hess(&hess, self.dim)?;
            return Ok(hess * shared.sign);
        }
        let hvp = self.hess_vec_prod.as_ref().ok_or(OptError::MissingDerivative {
            optimizer: self.solver_name,
            derivative: "hessian",
        })?;
        let mut hess = Hess::zeros((self.dim, self.dim));
        for j in 0..self.dim {
            let mut basis = Theta::zeros(self.dim);
            basis[j] = 1.0;
            let column = hvp(param, &basis, &shared.params, &shared.item)?;
            validate_grad(&column, self.dim)?;
            hess.column_mut(j).assign(&column);
        }
        validate_hess(&hess, self.dim)?;
        Ok(hess * shared.sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::SentinelStream,
        bridge::{SolveShared, TraceBridge},
        problem::{ProblemBuilder, Sense},
        types::Params,
    };
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn shared(sign: f64) -> SharedState<()> {
        Rc::new(RefCell::new(SolveShared {
            bridge: TraceBridge::new(None, Box::new(SentinelStream::new(()))),
            item: (),
            params: Params::zeros(0),
            sign,
        }))
    }

    fn quadratic(sense: Sense) -> ProblemBuilder<()> {
        ProblemBuilder::new(
            |theta: &Theta, _p: &Params, _d: &()| {
                Ok((theta[0] - 1.0).powi(2) + (theta[1] - 2.0).powi(2))
            },
            array![0.0, 0.0],
        )
        .sense(sense)
        .gradient(|theta: &Theta, _p: &Params, _d: &()| {
            Ok(array![2.0 * (theta[0] - 1.0), 2.0 * (theta[1] - 2.0)])
        })
    }

    #[test]
    // Purpose
    // -------
    // Verify maximization flips value and gradient in solver space.
    //
    // Given
    // -----
    // - The shifted quadratic wrapped with sign -1.
    //
    // Expect
    // ------
    // - Cost and gradient at the origin are the negatives of the raw ones.
    fn maximization_flips_cost_and_gradient() {
        // Arrange
        let problem = quadratic(Sense::Maximize).build().unwrap();
        let objective = SolveObjective::new(&problem, shared(-1.0), "L-BFGS");
        let theta = array![0.0, 0.0];

        // Act
        let cost = objective.cost(&theta).unwrap();
        let grad = objective.gradient(&theta).unwrap();

        // Assert
        assert_abs_diff_eq!(cost, -5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grad[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grad[1], 4.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify the Hessian assembled from Hessian-vector products matches the
    // analytic one.
    //
    // Given
    // -----
    // - The quadratic with only a Hessian-vector product (H = 2I).
    //
    // Expect
    // ------
    // - The assembled Hessian equals 2I.
    fn hessian_is_assembled_from_products() {
        // Arrange
        let problem = quadratic(Sense::Minimize)
            .hess_vec_prod(|_theta: &Theta, v: &Theta, _p: &Params, _d: &()| Ok(v * 2.0))
            .build()
            .unwrap();
        let objective = SolveObjective::new(&problem, shared(1.0), "Newton");

        // Act
        let hess = objective.hessian(&array![0.0, 0.0]).unwrap();

        // Assert
        assert_abs_diff_eq!(hess[(0, 0)], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hess[(1, 1)], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hess[(0, 1)], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hess[(1, 0)], 0.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify non-finite objective values abort instead of reaching the
    // algorithm.
    //
    // Given
    // -----
    // - An objective returning infinity.
    //
    // Expect
    // ------
    // - The cost call errors and the error downcasts to NonFiniteCost.
    fn non_finite_cost_is_rejected() {
        // Arrange
        let problem = ProblemBuilder::new(
            |_theta: &Theta, _p: &Params, _d: &()| Ok(f64::INFINITY),
            array![0.0],
        )
        .build()
        .unwrap();
        let objective = SolveObjective::new(&problem, shared(1.0), "L-BFGS");

        // Act
        let err = objective.cost(&array![0.0]).unwrap_err();

        // Assert
        assert!(matches!(
            OptError::from(err),
            OptError::NonFiniteCost { value } if value.is_infinite()
        ));
    }
}
