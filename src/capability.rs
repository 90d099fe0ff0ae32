//! capability — optimizer selection and solve-path classification.
//!
//! Purpose
//! -------
//! Enumerate the supported algorithm family, expose each member's capability
//! tags (bounds, constraints, derivative needs, population behavior), and
//! classify a (problem, optimizer) pair into exactly one of the three solve
//! paths before any evaluation happens.
//!
//! Key behaviors
//! -------------
//! - Classification is eager: derivative availability, bound presence and
//!   finiteness, and constraint support are all checked here, so a solve
//!   that starts has everything its path requires.
//! - Bounds handed to a bounds-blind algorithm are dropped with a warning
//!   rather than rejected; the solve proceeds on the unconstrained path.
//! - Particle swarm requires finite bounds in every coordinate since its
//!   initialization samples the box uniformly.
//!
//! Invariants & assumptions
//! ------------------------
//! - Exactly one [`SolvePath`] per successful classification.
//! - Classification never evaluates user callables.

use std::str::FromStr;

use log::warn;

use crate::{
    errors::{OptError, OptResult},
    problem::ProblemSpec,
    types::DEFAULT_LBFGS_MEM,
};

/// Line-search method used inside quasi-Newton and gradient solvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "morethuente" | "more_thuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" | "hager_zhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "expected MoreThuente or HagerZhang",
            }),
        }
    }
}

/// Inner minimizer driven by the augmented-Lagrangian outer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstrainedInner {
    Lbfgs,
    Newton,
}

/// Supported optimization algorithms.
///
/// Each variant corresponds to one concrete solver configuration; tuning
/// knobs that select a sub-algorithm (line search, memory, particle count)
/// live on the variant itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optimizer {
    GradientDescent,
    Lbfgs { line_searcher: LineSearcher, memory: usize },
    Newton,
    TrustRegion,
    NelderMead,
    ParticleSwarm { particles: usize },
    AugLag { inner: ConstrainedInner },
}

impl Optimizer {
    /// L-BFGS with the default line search and memory.
    pub fn lbfgs() -> Self {
        Optimizer::Lbfgs { line_searcher: LineSearcher::MoreThuente, memory: DEFAULT_LBFGS_MEM }
    }

    /// Human-readable solver name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Optimizer::GradientDescent => "GradientDescent",
            Optimizer::Lbfgs { .. } => "L-BFGS",
            Optimizer::Newton => "Newton",
            Optimizer::TrustRegion => "TrustRegion",
            Optimizer::NelderMead => "NelderMead",
            Optimizer::ParticleSwarm { .. } => "ParticleSwarm",
            Optimizer::AugLag { .. } => "AugmentedLagrangian",
        }
    }

    /// Whether the algorithm can honor variable bounds at all.
    pub fn supports_bounds(&self) -> bool {
        !matches!(self, Optimizer::NelderMead)
    }

    /// Whether the algorithm cannot start without finite bounds.
    pub fn requires_bounds(&self) -> bool {
        matches!(self, Optimizer::ParticleSwarm { .. })
    }

    /// Whether the algorithm handles general nonlinear constraints.
    pub fn supports_constraints(&self) -> bool {
        matches!(self, Optimizer::AugLag { .. })
    }

    /// Whether the algorithm runs without any gradient information.
    pub fn is_derivative_free(&self) -> bool {
        matches!(self, Optimizer::NelderMead | Optimizer::ParticleSwarm { .. })
    }

    /// Whether the algorithm tracks a population rather than a single
    /// iterate.
    pub fn is_population_based(&self) -> bool {
        matches!(self, Optimizer::ParticleSwarm { .. })
    }

    /// Whether the algorithm consumes second-order information.
    pub fn needs_second_order(&self) -> bool {
        match self {
            Optimizer::Newton | Optimizer::TrustRegion => true,
            Optimizer::AugLag { inner } => matches!(inner, ConstrainedInner::Newton),
            _ => false,
        }
    }
}

/// The three mutually exclusive execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvePath {
    Unconstrained,
    BoxConstrained,
    Constrained,
}

/// Classify a (problem, optimizer) pair into its solve path.
///
/// # Errors
/// - [`OptError::ConstraintsUnsupported`] when the problem declares
///   nonlinear constraints but the algorithm cannot handle them.
/// - [`OptError::MissingDerivative`] when the algorithm needs a gradient or
///   second-order information the problem does not provide.
/// - [`OptError::MissingBounds`] and [`OptError::NonFiniteBounds`] when an
///   algorithm that requires finite bounds lacks them.
pub fn classify<D>(problem: &ProblemSpec<D>, optimizer: &Optimizer) -> OptResult<SolvePath> {
    if problem.has_constraints() {
        if !optimizer.supports_constraints() {
            return Err(OptError::ConstraintsUnsupported { optimizer: optimizer.name() });
        }
        check_derivatives(problem, optimizer)?;
        return Ok(SolvePath::Constrained);
    }

    check_derivatives(problem, optimizer)?;

    if optimizer.requires_bounds() {
        check_finite_bounds(problem, optimizer)?;
        return Ok(SolvePath::BoxConstrained);
    }

    if problem.has_bounds() {
        if optimizer.supports_bounds() {
            return Ok(SolvePath::BoxConstrained);
        }
        warn!(
            "{} cannot honor variable bounds; dropping them and solving unconstrained",
            optimizer.name()
        );
    }

    Ok(SolvePath::Unconstrained)
}

fn check_derivatives<D>(problem: &ProblemSpec<D>, optimizer: &Optimizer) -> OptResult<()> {
    if optimizer.is_derivative_free() {
        return Ok(());
    }
    if !problem.has_gradient() {
        return Err(OptError::MissingDerivative {
            optimizer: optimizer.name(),
            derivative: "gradient",
        });
    }
    if optimizer.needs_second_order() && !problem.has_second_order() {
        return Err(OptError::MissingDerivative {
            optimizer: optimizer.name(),
            derivative: "hessian",
        });
    }
    if let Optimizer::AugLag { .. } = optimizer {
        if !problem.has_constraint_jacobian() {
            return Err(OptError::MissingConstraintDerivative {
                optimizer: optimizer.name(),
                derivative: "jacobian",
            });
        }
        if optimizer.needs_second_order() && !problem.has_constraint_hessians() {
            return Err(OptError::MissingConstraintDerivative {
                optimizer: optimizer.name(),
                derivative: "hessians",
            });
        }
    }
    Ok(())
}

fn check_finite_bounds<D>(problem: &ProblemSpec<D>, optimizer: &Optimizer) -> OptResult<()> {
    let (lower, upper) = match (problem.lower_bounds(), problem.upper_bounds()) {
        (Some(lo), Some(up)) => (lo, up),
        _ => return Err(OptError::MissingBounds { optimizer: optimizer.name() }),
    };
    for (index, (l, u)) in lower.iter().zip(upper.iter()).enumerate() {
        if !l.is_finite() || !u.is_finite() {
            return Err(OptError::NonFiniteBounds { optimizer: optimizer.name(), index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        problem::ProblemBuilder,
        types::{Params, Theta},
    };
    use ndarray::array;

    fn base() -> ProblemBuilder<()> {
        ProblemBuilder::new(
            |theta: &Theta, _p: &Params, _d: &()| Ok(theta.dot(theta)),
            array![1.0, 1.0],
        )
    }

    fn with_gradient(builder: ProblemBuilder<()>) -> ProblemBuilder<()> {
        builder.gradient(|theta: &Theta, _p: &Params, _d: &()| Ok(theta * 2.0))
    }

    #[test]
    // Purpose
    // -------
    // Verify the three-way classification on representative pairs.
    //
    // Given
    // -----
    // - A smooth problem with/without bounds and constraints, against
    //   L-BFGS, particle swarm, and the augmented-Lagrangian driver.
    //
    // Expect
    // ------
    // - L-BFGS without bounds is Unconstrained, with bounds BoxConstrained;
    //   particle swarm with finite bounds is BoxConstrained; declared
    //   constraints route to Constrained.
    fn classify_selects_the_expected_path() {
        // Arrange
        let plain = with_gradient(base()).build().unwrap();
        let boxed = with_gradient(base())
            .lower_bounds(array![0.0, 0.0])
            .upper_bounds(array![2.0, 2.0])
            .build()
            .unwrap();
        let constrained = with_gradient(base())
            .constraints(
                |theta: &Theta, _p: &Params| Ok(array![theta[0] + theta[1]]),
                array![1.0],
                array![1.0],
            )
            .constraints_jacobian(|_theta: &Theta, _p: &Params| Ok(array![[1.0, 1.0]]))
            .build()
            .unwrap();

        // Act / Assert
        assert_eq!(classify(&plain, &Optimizer::lbfgs()), Ok(SolvePath::Unconstrained));
        assert_eq!(classify(&boxed, &Optimizer::lbfgs()), Ok(SolvePath::BoxConstrained));
        assert_eq!(
            classify(&boxed, &Optimizer::ParticleSwarm { particles: 20 }),
            Ok(SolvePath::BoxConstrained)
        );
        assert_eq!(
            classify(&constrained, &Optimizer::AugLag { inner: ConstrainedInner::Lbfgs }),
            Ok(SolvePath::Constrained)
        );
    }

    #[test]
    // Purpose
    // -------
    // Ensure bounds handed to a bounds-blind algorithm are dropped, not
    // rejected.
    //
    // Given
    // -----
    // - A bounded problem paired with Nelder-Mead.
    //
    // Expect
    // ------
    // - Classification succeeds with the unconstrained path.
    fn bounds_blind_algorithm_drops_bounds() {
        // Arrange
        let boxed = base()
            .lower_bounds(array![0.0, 0.0])
            .upper_bounds(array![2.0, 2.0])
            .build()
            .unwrap();

        // Act / Assert
        assert_eq!(classify(&boxed, &Optimizer::NelderMead), Ok(SolvePath::Unconstrained));
    }

    #[test]
    // Purpose
    // -------
    // Verify eager rejection of unsupported or under-specified pairs.
    //
    // Given
    // -----
    // - Constraints against L-BFGS, a gradient-free problem against L-BFGS,
    //   a first-order-only problem against Newton, and particle swarm with
    //   missing or infinite bounds.
    //
    // Expect
    // ------
    // - The matching error variant in each case.
    fn classify_rejects_incapable_pairs() {
        // Arrange
        let constrained = with_gradient(base())
            .constraints(
                |theta: &Theta, _p: &Params| Ok(array![theta[0]]),
                array![0.0],
                array![0.0],
            )
            .constraints_jacobian(|_theta: &Theta, _p: &Params| Ok(array![[1.0, 0.0]]))
            .build()
            .unwrap();
        let gradient_free = base().build().unwrap();
        let first_order = with_gradient(base()).build().unwrap();
        let unbounded = with_gradient(base()).build().unwrap();
        let half_open = with_gradient(base())
            .lower_bounds(array![0.0, 0.0])
            .upper_bounds(array![f64::INFINITY, 2.0])
            .build()
            .unwrap();

        // Act / Assert
        assert!(matches!(
            classify(&constrained, &Optimizer::lbfgs()),
            Err(OptError::ConstraintsUnsupported { .. })
        ));
        assert!(matches!(
            classify(&gradient_free, &Optimizer::lbfgs()),
            Err(OptError::MissingDerivative { derivative: "gradient", .. })
        ));
        assert!(matches!(
            classify(&first_order, &Optimizer::Newton),
            Err(OptError::MissingDerivative { derivative: "hessian", .. })
        ));
        assert!(matches!(
            classify(&unbounded, &Optimizer::ParticleSwarm { particles: 10 }),
            Err(OptError::MissingBounds { .. })
        ));
        assert!(matches!(
            classify(&half_open, &Optimizer::ParticleSwarm { particles: 10 }),
            Err(OptError::NonFiniteBounds { index: 0, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Check line-search parsing accepts both spellings and rejects unknown
    // names.
    //
    // Given
    // -----
    // - Strings in both snake and compact case.
    //
    // Expect
    // ------
    // - Known spellings parse; anything else is InvalidLineSearch.
    fn line_searcher_parses_known_names() {
        // Act / Assert
        assert_eq!("MoreThuente".parse::<LineSearcher>(), Ok(LineSearcher::MoreThuente));
        assert_eq!("hager_zhang".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
        assert!(matches!(
            "golden".parse::<LineSearcher>(),
            Err(OptError::InvalidLineSearch { .. })
        ));
    }
}
