//! optbridge — dispatch and translation layer over the argmin solver family.
//!
//! Purpose
//! -------
//! Serve as the crate root for a solver-agnostic optimization surface:
//! callers describe a problem once (objective, optional derivatives, bounds,
//! nonlinear constraints, sense, data stream) and pick an algorithm; the
//! crate classifies the pairing, adapts the problem to what the selected
//! backend solver can consume, and normalizes the heterogeneous results
//! into one uniform solution record.
//!
//! Key behaviors
//! -------------
//! - Classify each (problem, optimizer) pairing into exactly one of three
//!   solve paths: unconstrained, box-constrained, or constrained.
//! - Wrap user callables into backend evaluation traits with the sign
//!   convention for maximization applied consistently.
//! - Bridge per-iterate trace callbacks and mini-batch data streams into
//!   the backend iteration loop, with cooperative early halting.
//! - Translate generic tuning knobs into per-algorithm configuration,
//!   dropping unmappable knobs with a warning instead of failing.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical algorithm internals belong to the backend; this crate
//!   never reimplements a minimizer beyond the thin Newton step the backend
//!   cannot express over plain ndarray containers.
//! - Capability validation is eager: a context that builds has everything
//!   its solve path requires.
//! - Single-threaded, synchronous solves; shared per-solve state uses
//!   `Rc<RefCell<_>>` and nothing requires `Send`.
//!
//! Conventions
//! -----------
//! - Vectors and matrices are `ndarray` containers over `f64`; canonical
//!   aliases live in [`types`].
//! - The backend always minimizes. Maximization flips the value and every
//!   derivative on the way in; only the reported minimum is flipped back.
//! - Errors use the crate-wide [`errors::OptError`] taxonomy; non-fatal
//!   conditions are logged through `log::warn!`.
//!
//! Downstream usage
//! ----------------
//! - Build a [`problem::ProblemSpec`] through [`problem::ProblemBuilder`],
//!   pair it with a [`capability::Optimizer`] in a
//!   [`context::SolveContext`], and call `solve()`.
//! - The [`prelude`] re-exports the types a typical caller touches.

pub mod batch;
pub mod bounds;
pub mod bridge;
pub mod builders;
pub mod capability;
pub mod constraints;
pub mod context;
pub mod errors;
pub mod newton;
pub mod objective;
pub mod options;
pub mod problem;
pub mod solve;
pub mod types;
pub mod validation;

/// One-stop imports for typical callers.
pub mod prelude {
    pub use crate::batch::{MiniBatchStream, SentinelStream, VecStream};
    pub use crate::bridge::TraceSnapshot;
    pub use crate::capability::{ConstrainedInner, LineSearcher, Optimizer, SolvePath};
    pub use crate::context::{ReinitValue, SolveContext};
    pub use crate::errors::{OptError, OptResult};
    pub use crate::options::OptionSet;
    pub use crate::problem::{ProblemBuilder, ProblemSpec, Sense, SymbolicSystem};
    pub use crate::solve::{SolutionRecord, SolverReport};
    pub use crate::types::{Cost, Grad, Hess, Params, Theta};
}
