//! options — caller-facing tuning knobs and their per-solver mapping.
//!
//! Purpose
//! -------
//! Collect the generic options a caller may set ([`OptionSet`]) and translate
//! them into the concrete knobs each algorithm actually understands
//! ([`MappedOptions`]). Knobs with no counterpart on the selected algorithm
//! are dropped with a warning rather than rejected, so switching algorithms
//! never turns a previously working option set into an error.
//!
//! Key behaviors
//! -------------
//! - `abs_tol` currently maps to nothing in the algorithm family and is
//!   always dropped with a warning.
//! - `rel_tol` maps to the cost-change tolerance on L-BFGS and to the
//!   standard-deviation tolerance on Nelder-Mead; every other algorithm
//!   drops it with a warning.
//! - `max_iters`, `max_time`, and `show_progress` apply uniformly through
//!   the executor.
//!
//! Conventions
//! -----------
//! - Tolerances are validated (finite, strictly positive) before mapping.
//! - A `None` knob means "leave the algorithm default alone".

use std::rc::Rc;
use std::time::Duration;

use log::warn;

use crate::{
    bridge::TraceSnapshot,
    capability::Optimizer,
    errors::OptResult,
    validation::verify_tol,
};

/// Per-iterate trace callback.
///
/// Returning `Ok(true)` requests an early halt; `Ok(false)` continues the
/// solve. Any `Err` aborts the solve with `CallbackFailed`.
pub type CallbackFn = Rc<dyn Fn(&TraceSnapshot) -> OptResult<bool>>;

/// Algorithm-independent tuning knobs.
#[derive(Default)]
pub struct OptionSet {
    pub callback: Option<CallbackFn>,
    pub max_iters: Option<u64>,
    pub max_time: Option<Duration>,
    pub abs_tol: Option<f64>,
    pub rel_tol: Option<f64>,
    pub show_progress: bool,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(mut self, callback: impl Fn(&TraceSnapshot) -> OptResult<bool> + 'static) -> Self {
        self.callback = Some(Rc::new(callback));
        self
    }

    pub fn max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = Some(max_iters);
        self
    }

    pub fn max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn abs_tol(mut self, abs_tol: f64) -> Self {
        self.abs_tol = Some(abs_tol);
        self
    }

    pub fn rel_tol(mut self, rel_tol: f64) -> Self {
        self.rel_tol = Some(rel_tol);
        self
    }

    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// Knobs after translation for one concrete algorithm.
///
/// Unset knobs stay `None`; the executor and solver defaults rule.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedOptions {
    pub max_iters: Option<u64>,
    pub time_limit: Option<Duration>,
    /// Cost-change tolerance understood by L-BFGS.
    pub tol_cost: Option<f64>,
    /// Simplex standard-deviation tolerance understood by Nelder-Mead.
    pub sd_tolerance: Option<f64>,
    pub show_progress: bool,
}

/// Translate an [`OptionSet`] for the selected algorithm.
///
/// # Errors
/// Returns [`crate::errors::OptError::InvalidTol`] when a supplied tolerance
/// is non-finite or not strictly positive.
pub fn map_options(options: &OptionSet, optimizer: &Optimizer) -> OptResult<MappedOptions> {
    verify_tol("abs_tol", options.abs_tol)?;
    verify_tol("rel_tol", options.rel_tol)?;

    if options.abs_tol.is_some() {
        warn!("abs_tol has no counterpart on {}; dropping it", optimizer.name());
    }

    let mut tol_cost = None;
    let mut sd_tolerance = None;
    if let Some(rel_tol) = options.rel_tol {
        match optimizer {
            Optimizer::Lbfgs { .. } | Optimizer::AugLag { .. } => tol_cost = Some(rel_tol),
            Optimizer::NelderMead => sd_tolerance = Some(rel_tol),
            _ => warn!("rel_tol has no counterpart on {}; dropping it", optimizer.name()),
        }
    }

    Ok(MappedOptions {
        max_iters: options.max_iters,
        time_limit: options.max_time,
        tol_cost,
        sd_tolerance,
        show_progress: options.show_progress,
    })
}
