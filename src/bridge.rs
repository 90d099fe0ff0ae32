//! bridge — per-iterate trace delivery, early halting, and batch advance.
//!
//! Purpose
//! -------
//! Connect the caller's trace callback and mini-batch stream to the iteration
//! loop of any backend algorithm. One mechanism serves every solver: a
//! delegating decorator ([`HaltingSolver`]) reports each accepted iterate,
//! advances the stream, and converts a halt request into a clean solver exit.
//!
//! Key behaviors
//! -------------
//! - Before a solve starts, [`TraceBridge::prime`] loads the first batch
//!   element; an immediately empty stream aborts the solve.
//! - After each accepted iterate the callback runs first, then the stream
//!   advances. A callback returning `Ok(true)`, a callback error, or stream
//!   exhaustion each stop the solve; a stream of `N` elements therefore
//!   produces at most `N` callback invocations.
//! - Halting is sticky: once the bridge is halted further trace events are
//!   ignored and the decorator reports termination on the next poll.
//! - Reported trace values are always in the caller's sense; the sign flip
//!   applied for maximization is undone before the snapshot is built.
//!
//! Invariants & assumptions
//! ------------------------
//! - Exactly one [`SolveShared`] per solve, shared between the objective
//!   wrapper and the decorator through `Rc<RefCell<_>>`. Borrows never cross
//!   a call into user code holding the same handle.
//! - Population algorithms trace the population centroid, single-iterate
//!   algorithms the iterate itself.

use std::cell::RefCell;
use std::rc::Rc;

use argmin::core::{Problem, Solver, State, TerminationReason, TerminationStatus, KV};
use argmin::solver::particleswarm::Particle;

use crate::{
    batch::MiniBatchStream,
    errors::{OptError, OptResult},
    options::CallbackFn,
    types::{Params, Theta},
};

/// One accepted iterate as reported to the trace callback.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSnapshot {
    /// Current iterate (population centroid for population algorithms).
    pub iterate: Theta,
    /// Objective value at the iterate, in the caller's sense.
    pub value: f64,
    /// Zero-based iteration counter of the backend.
    pub iteration: u64,
}

/// Whether the bridge is still forwarding trace events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Active,
    Halted { reason: &'static str },
}

const HALT_CALLBACK: &str = "trace callback requested halt";
const HALT_STREAM: &str = "mini-batch stream exhausted";

/// Callback-and-stream pairing for one solve.
pub struct TraceBridge<D> {
    callback: Option<CallbackFn>,
    stream: Box<dyn MiniBatchStream<D>>,
    status: BridgeStatus,
}

impl<D> TraceBridge<D> {
    pub fn new(callback: Option<CallbackFn>, stream: Box<dyn MiniBatchStream<D>>) -> Self {
        Self { callback, stream, status: BridgeStatus::Active }
    }

    pub fn status(&self) -> BridgeStatus {
        self.status
    }

    /// Rewind the stream and load the element for iteration zero.
    ///
    /// # Errors
    /// Returns [`OptError::EmptyBatchStream`] when the stream has no
    /// elements at all.
    pub fn prime(&mut self) -> OptResult<D> {
        self.status = BridgeStatus::Active;
        self.stream.reset();
        self.stream.next_item().ok_or(OptError::EmptyBatchStream)
    }

    /// Report one accepted iterate: run the callback, then advance the
    /// stream.
    ///
    /// Returns the element for the next iteration, or `None` when the solve
    /// should stop. Once halted, further calls are no-ops.
    ///
    /// # Errors
    /// Returns [`OptError::CallbackFailed`] wrapping the callback's own
    /// error text.
    pub fn on_trace(&mut self, snapshot: &TraceSnapshot) -> OptResult<Option<D>> {
        if matches!(self.status, BridgeStatus::Halted { .. }) {
            return Ok(None);
        }
        if let Some(callback) = &self.callback {
            match callback(snapshot) {
                Ok(false) => {}
                Ok(true) => {
                    self.status = BridgeStatus::Halted { reason: HALT_CALLBACK };
                    return Ok(None);
                }
                Err(e) => {
                    self.status = BridgeStatus::Halted { reason: HALT_CALLBACK };
                    return Err(OptError::CallbackFailed { text: e.to_string() });
                }
            }
        }
        match self.stream.next_item() {
            Some(item) => Ok(Some(item)),
            None => {
                self.status = BridgeStatus::Halted { reason: HALT_STREAM };
                Ok(None)
            }
        }
    }
}

/// Mutable state shared between the objective wrapper and the decorator for
/// the duration of one solve.
pub struct SolveShared<D> {
    pub bridge: TraceBridge<D>,
    /// Batch element fed to the objective for the current iteration.
    pub item: D,
    /// Fixed (non-decision) parameters forwarded to every callable.
    pub params: Params,
    /// `-1.0` when maximizing, `1.0` otherwise; backend cost is
    /// `sign * caller value`.
    pub sign: f64,
}

pub type SharedState<D> = Rc<RefCell<SolveShared<D>>>;

impl<D> SolveShared<D> {
    /// Forward a snapshot through the bridge and install the next batch
    /// element when the solve continues.
    fn on_trace(&mut self, snapshot: &TraceSnapshot) -> OptResult<()> {
        if let Some(next) = self.bridge.on_trace(snapshot)? {
            self.item = next;
        }
        Ok(())
    }
}

/// Delegating decorator that adds trace delivery and early halting to any
/// backend solver.
pub struct HaltingSolver<S, D> {
    inner: S,
    shared: SharedState<D>,
}

impl<S, D> HaltingSolver<S, D> {
    pub fn new(inner: S, shared: SharedState<D>) -> Self {
        Self { inner, shared }
    }

    fn halt_status(&self) -> Option<TerminationStatus> {
        match self.shared.borrow().bridge.status() {
            BridgeStatus::Halted { reason } => Some(TerminationStatus::Terminated(
                TerminationReason::SolverExit(reason.to_string()),
            )),
            BridgeStatus::Active => None,
        }
    }
}

impl<O, S, D, G, J, H, R> Solver<O, argmin::core::IterState<Theta, G, J, H, R, f64>>
    for HaltingSolver<S, D>
where
    S: Solver<O, argmin::core::IterState<Theta, G, J, H, R, f64>>,
{
    const NAME: &'static str = "HaltingSolver";

    fn init(
        &mut self, problem: &mut Problem<O>,
        state: argmin::core::IterState<Theta, G, J, H, R, f64>,
    ) -> Result<
        (argmin::core::IterState<Theta, G, J, H, R, f64>, Option<KV>),
        argmin::core::Error,
    > {
        self.inner.init(problem, state)
    }

    fn next_iter(
        &mut self, problem: &mut Problem<O>,
        state: argmin::core::IterState<Theta, G, J, H, R, f64>,
    ) -> Result<
        (argmin::core::IterState<Theta, G, J, H, R, f64>, Option<KV>),
        argmin::core::Error,
    > {
        let (state, kv) = self.inner.next_iter(problem, state)?;
        if let Some(param) = state.get_param() {
            let mut shared = self.shared.borrow_mut();
            let snapshot = TraceSnapshot {
                iterate: param.clone(),
                value: shared.sign * state.get_cost(),
                iteration: state.get_iter(),
            };
            shared.on_trace(&snapshot)?;
        }
        Ok((state, kv))
    }

    fn terminate(
        &mut self, state: &argmin::core::IterState<Theta, G, J, H, R, f64>,
    ) -> TerminationStatus {
        if let Some(status) = self.halt_status() {
            return status;
        }
        self.inner.terminate(state)
    }
}

impl<O, S, D> Solver<O, argmin::core::PopulationState<Particle<Theta, f64>, f64>>
    for HaltingSolver<S, D>
where
    S: Solver<O, argmin::core::PopulationState<Particle<Theta, f64>, f64>>,
{
    const NAME: &'static str = "HaltingSolver";

    fn init(
        &mut self, problem: &mut Problem<O>,
        state: argmin::core::PopulationState<Particle<Theta, f64>, f64>,
    ) -> Result<
        (argmin::core::PopulationState<Particle<Theta, f64>, f64>, Option<KV>),
        argmin::core::Error,
    > {
        self.inner.init(problem, state)
    }

    fn next_iter(
        &mut self, problem: &mut Problem<O>,
        state: argmin::core::PopulationState<Particle<Theta, f64>, f64>,
    ) -> Result<
        (argmin::core::PopulationState<Particle<Theta, f64>, f64>, Option<KV>),
        argmin::core::Error,
    > {
        let (state, kv) = self.inner.next_iter(problem, state)?;
        if let Some(iterate) = population_centroid(&state) {
            let mut shared = self.shared.borrow_mut();
            let snapshot = TraceSnapshot {
                iterate,
                value: shared.sign * state.get_cost(),
                iteration: state.get_iter(),
            };
            shared.on_trace(&snapshot)?;
        }
        Ok((state, kv))
    }

    fn terminate(
        &mut self, state: &argmin::core::PopulationState<Particle<Theta, f64>, f64>,
    ) -> TerminationStatus {
        if let Some(status) = self.halt_status() {
            return status;
        }
        self.inner.terminate(state)
    }
}

/// Mean position of the current population; the best individual stands in
/// when no population has been recorded yet.
fn population_centroid(
    state: &argmin::core::PopulationState<Particle<Theta, f64>, f64>,
) -> Option<Theta> {
    if let Some(population) = state.get_population() {
        if !population.is_empty() {
            let mut sum = Theta::zeros(population[0].position.len());
            for particle in population {
                sum = sum + &particle.position;
            }
            return Some(sum / population.len() as f64);
        }
    }
    state.get_param().map(|p| p.position.clone())
}
