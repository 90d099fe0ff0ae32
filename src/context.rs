//! context — solve context construction, re-init, and the solve entry point.
//!
//! Purpose
//! -------
//! Tie a problem, an optimizer, an optional data stream, and an option set
//! into a reusable context. Classification and capability validation run
//! once at build time; solves may then be repeated, with the starting point
//! and fixed parameters replaceable in between without rebuilding the
//! facade callables.
//!
//! Key behaviors
//! -------------
//! - [`SolveContext::build`] classifies exactly once and performs no solve
//!   work; a context that builds has everything its path requires.
//! - Re-init replaces (parameters, initial point) numerically or through
//!   the problem's symbolic name tables; unsupplied sides stay untouched
//!   and symbolic maps update only the named entries.
//! - [`SolveContext::solve`] primes the batch stream, snapshots the current
//!   re-init state into the shared per-solve state, and dispatches on the
//!   classified path. Repeated solves rewind the stream.
//!
//! Conventions
//! -----------
//! - `None` data means a sentinel stream over `D::default()`, so data-free
//!   problems run under the same machinery as batched ones.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ndarray::Array1;

use crate::{
    batch::{MiniBatchStream, SentinelStream},
    bridge::{SharedState, SolveShared, TraceBridge},
    capability::{classify, Optimizer, SolvePath},
    errors::{OptError, OptResult},
    options::{map_options, OptionSet},
    problem::{ProblemSpec, Sense, SymbolicSystem},
    solve::{dispatch, SolutionRecord},
    types::{Params, Theta},
};

/// Replaceable solve inputs: fixed parameters and the starting point.
#[derive(Debug, Clone, PartialEq)]
pub struct ReinitState {
    parameters: Params,
    initial_point: Theta,
}

/// One side of a re-init request.
pub enum ReinitValue {
    /// Full replacement vector; must preserve the stored dimension.
    Numeric(Array1<f64>),
    /// Partial by-name update through the problem's symbolic system.
    Symbolic(HashMap<String, f64>),
}

/// Reusable pairing of a problem with a classified optimizer.
pub struct SolveContext<D = ()> {
    problem: ProblemSpec<D>,
    optimizer: Optimizer,
    path: SolvePath,
    options: OptionSet,
    shared: SharedState<D>,
    reinit: ReinitState,
}

impl<D: Clone + Default + 'static> SolveContext<D> {
    /// Classify and validate the pairing; no evaluation happens here.
    ///
    /// # Errors
    /// Classification errors: `ConstraintsUnsupported`, `MissingDerivative`,
    /// `MissingConstraintDerivative`, `MissingBounds`, `NonFiniteBounds`.
    pub fn build(
        problem: ProblemSpec<D>, optimizer: Optimizer,
        data: Option<Box<dyn MiniBatchStream<D>>>, options: OptionSet,
    ) -> OptResult<Self> {
        let path = classify(&problem, &optimizer)?;
        let stream: Box<dyn MiniBatchStream<D>> =
            data.unwrap_or_else(|| Box::new(SentinelStream::new(D::default())));
        let sign = match problem.sense() {
            Sense::Maximize => -1.0,
            Sense::Minimize => 1.0,
        };
        let bridge = TraceBridge::new(options.callback.clone(), stream);
        let shared = Rc::new(RefCell::new(SolveShared {
            bridge,
            item: D::default(),
            params: problem.parameters().clone(),
            sign,
        }));
        let reinit = ReinitState {
            parameters: problem.parameters().clone(),
            initial_point: problem.initial_point().clone(),
        };
        Ok(Self { problem, optimizer, path, options, shared, reinit })
    }

    /// Path selected at build time.
    pub fn path(&self) -> SolvePath {
        self.path
    }

    /// Starting point of the next solve.
    pub fn initial_point(&self) -> &Theta {
        &self.reinit.initial_point
    }

    /// Fixed parameters of the next solve.
    pub fn parameters(&self) -> &Params {
        &self.reinit.parameters
    }

    /// Replace parameters and/or the starting point for subsequent solves.
    ///
    /// # Errors
    /// - [`OptError::DimensionMismatch`] for a numeric replacement of the
    ///   wrong length.
    /// - [`OptError::UnsupportedSymbolicRemap`] for a symbolic request on a
    ///   problem without a symbolic system.
    /// - [`OptError::UnknownSymbol`] for an undeclared name.
    pub fn reinit(
        &mut self, parameters: Option<ReinitValue>, initial_point: Option<ReinitValue>,
    ) -> OptResult<()> {
        if let Some(value) = parameters {
            self.reinit.parameters = apply_reinit(
                "parameters",
                &self.reinit.parameters,
                value,
                self.problem.symbolic(),
                SymbolicSystem::param_index,
            )?;
        }
        if let Some(value) = initial_point {
            self.reinit.initial_point = apply_reinit(
                "initial_point",
                &self.reinit.initial_point,
                value,
                self.problem.symbolic(),
                SymbolicSystem::state_index,
            )?;
        }
        Ok(())
    }

    /// Run one blocking solve over the classified path.
    ///
    /// # Errors
    /// Option-mapping errors, `EmptyBatchStream` from priming, and anything
    /// the dispatched path reports.
    pub fn solve(&mut self) -> OptResult<SolutionRecord> {
        let mapped = map_options(&self.options, &self.optimizer)?;
        {
            let mut shared = self.shared.borrow_mut();
            shared.params = self.reinit.parameters.clone();
            let item = shared.bridge.prime()?;
            shared.item = item;
        }
        dispatch(
            &self.problem,
            &self.optimizer,
            self.path,
            &self.shared,
            &self.reinit.initial_point,
            &mapped,
        )
    }
}

/// Apply one re-init side, returning the replacement vector.
fn apply_reinit(
    field: &'static str, current: &Array1<f64>, value: ReinitValue,
    symbolic: Option<&SymbolicSystem>, index_of: fn(&SymbolicSystem, &str) -> Option<usize>,
) -> OptResult<Array1<f64>> {
    match value {
        ReinitValue::Numeric(replacement) => {
            if replacement.len() != current.len() {
                return Err(OptError::DimensionMismatch {
                    field,
                    expected: current.len(),
                    found: replacement.len(),
                });
            }
            Ok(replacement)
        }
        ReinitValue::Symbolic(updates) => {
            let system = symbolic.ok_or(OptError::UnsupportedSymbolicRemap { field })?;
            let mut out = current.clone();
            for (name, value) in updates {
                let index = index_of(system, &name).ok_or_else(|| OptError::UnknownSymbol {
                    field,
                    name: name.clone(),
                })?;
                if index >= out.len() {
                    return Err(OptError::DimensionMismatch {
                        field,
                        expected: out.len(),
                        found: index + 1,
                    });
                }
                out[index] = value;
            }
            Ok(out)
        }
    }
}
