//! bounds — variable boxes and the log-barrier objective decorator.
//!
//! Purpose
//! -------
//! Represent per-variable interval bounds with infinite sentinels for
//! half-open sides, and decorate any objective bundle with a logarithmic
//! barrier so bounds-blind descent algorithms can run the box-constrained
//! path.
//!
//! Key behaviors
//! -------------
//! - [`BoxBounds`] fills missing sides with `±f64::INFINITY`, so a box
//!   always exists once the problem declares any bound at all.
//! - The barrier term is `-μ Σ (ln(θᵢ-lᵢ) + ln(uᵢ-θᵢ))` over finite sides.
//!   Below a small distance the logarithm is continued linearly with the
//!   slope it has at that distance, which keeps values and gradients finite
//!   when a line search steps onto or past a face.
//! - The barrier Hessian is diagonal; the linear continuation contributes
//!   zero curvature.
//!
//! Invariants & assumptions
//! ------------------------
//! - Bound vector arities were validated at problem build time.
//! - The outer loop shrinks μ between cycles and projects the final iterate
//!   into the box; this module only evaluates.

use argmin::core::{CostFunction, Error, Gradient, Hessian};

use crate::{
    objective::SolveObjective,
    problem::ProblemSpec,
    types::{Grad, Hess, Theta},
};

/// Distance from a face below which the logarithm is continued linearly.
const EDGE_DIST: f64 = 1e-10;

/// Per-variable interval bounds with infinite sentinels.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxBounds {
    lower: Theta,
    upper: Theta,
}

impl BoxBounds {
    pub fn new(lower: Theta, upper: Theta) -> Self {
        Self { lower, upper }
    }

    /// Box declared by a problem, with missing sides opened to infinity.
    pub fn from_problem<D>(problem: &ProblemSpec<D>) -> Self {
        let dim = problem.dim();
        let lower = problem
            .lower_bounds()
            .cloned()
            .unwrap_or_else(|| Theta::from_elem(dim, f64::NEG_INFINITY));
        let upper = problem
            .upper_bounds()
            .cloned()
            .unwrap_or_else(|| Theta::from_elem(dim, f64::INFINITY));
        Self { lower, upper }
    }

    pub fn lower(&self) -> &Theta {
        &self.lower
    }

    pub fn upper(&self) -> &Theta {
        &self.upper
    }

    /// True when every coordinate lies inside the closed box.
    pub fn contains(&self, theta: &Theta) -> bool {
        theta
            .iter()
            .zip(self.lower.iter())
            .zip(self.upper.iter())
            .all(|((t, l), u)| *t >= *l && *t <= *u)
    }

    /// Clamp each coordinate into the closed box.
    pub fn project(&self, theta: &Theta) -> Theta {
        Theta::from_iter(
            theta
                .iter()
                .zip(self.lower.iter())
                .zip(self.upper.iter())
                .map(|((t, l), u)| t.clamp(*l, *u)),
        )
    }

    /// Move each coordinate strictly inside the box so the barrier is finite
    /// at the starting point. Infinite sides are left alone.
    pub fn clamp_interior(&self, theta: &Theta) -> Theta {
        Theta::from_iter(theta.iter().zip(self.lower.iter()).zip(self.upper.iter()).map(
            |((t, l), u)| {
                let pad = if l.is_finite() && u.is_finite() {
                    (1e-8 * (u - l)).min(0.5 * (u - l))
                } else {
                    1e-8
                };
                let mut v = *t;
                if l.is_finite() && v < l + pad {
                    v = l + pad;
                }
                if u.is_finite() && v > u - pad {
                    v = u - pad;
                }
                v
            },
        ))
    }
}

/// One-sided barrier value at distance `d` from a face.
fn edge_value(d: f64) -> f64 {
    if d >= EDGE_DIST {
        -d.ln()
    } else {
        -EDGE_DIST.ln() + (EDGE_DIST - d) / EDGE_DIST
    }
}

/// Derivative of [`edge_value`] with respect to `d`.
fn edge_slope(d: f64) -> f64 {
    if d >= EDGE_DIST {
        -1.0 / d
    } else {
        -1.0 / EDGE_DIST
    }
}

/// Second derivative of [`edge_value`] with respect to `d`.
fn edge_curvature(d: f64) -> f64 {
    if d >= EDGE_DIST {
        1.0 / (d * d)
    } else {
        0.0
    }
}

/// Objective bundle augmented with a μ-scaled log barrier over a box.
pub struct BarrierObjective<D> {
    inner: SolveObjective<D>,
    bounds: BoxBounds,
    mu: f64,
}

impl<D> BarrierObjective<D> {
    pub fn new(inner: SolveObjective<D>, bounds: BoxBounds, mu: f64) -> Self {
        Self { inner, bounds, mu }
    }

    fn barrier_value(&self, theta: &Theta) -> f64 {
        let mut total = 0.0;
        for ((t, l), u) in theta.iter().zip(self.bounds.lower.iter()).zip(self.bounds.upper.iter())
        {
            if l.is_finite() {
                total += edge_value(t - l);
            }
            if u.is_finite() {
                total += edge_value(u - t);
            }
        }
        self.mu * total
    }

    fn barrier_gradient(&self, theta: &Theta) -> Grad {
        Grad::from_iter(
            theta.iter().zip(self.bounds.lower.iter()).zip(self.bounds.upper.iter()).map(
                |((t, l), u)| {
                    let mut slope = 0.0;
                    if l.is_finite() {
                        slope += edge_slope(t - l);
                    }
                    if u.is_finite() {
                        // d(u - θ)/dθ = -1
                        slope -= edge_slope(u - t);
                    }
                    self.mu * slope
                },
            ),
        )
    }

    fn barrier_hessian_diag(&self, theta: &Theta) -> Grad {
        Grad::from_iter(
            theta.iter().zip(self.bounds.lower.iter()).zip(self.bounds.upper.iter()).map(
                |((t, l), u)| {
                    let mut curv = 0.0;
                    if l.is_finite() {
                        curv += edge_curvature(t - l);
                    }
                    if u.is_finite() {
                        curv += edge_curvature(u - t);
                    }
                    self.mu * curv
                },
            ),
        )
    }
}

impl<D> CostFunction for BarrierObjective<D> {
    type Param = Theta;
    type Output = f64;

    fn cost(&self, param: &Theta) -> Result<f64, Error> {
        Ok(self.inner.cost(param)? + self.barrier_value(param))
    }
}

impl<D> Gradient for BarrierObjective<D> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, param: &Theta) -> Result<Grad, Error> {
        Ok(self.inner.gradient(param)? + self.barrier_gradient(param))
    }
}

impl<D> Hessian for BarrierObjective<D> {
    type Param = Theta;
    type Hessian = Hess;

    fn hessian(&self, param: &Theta) -> Result<Hess, Error> {
        let mut hess = self.inner.hessian(param)?;
        let diag = self.barrier_hessian_diag(param);
        for (i, d) in diag.iter().enumerate() {
            hess[(i, i)] += d;
        }
        Ok(hess)
    }
}
