//! Validation helpers shared across the dispatch layer.
//!
//! This module centralizes the consistency checks used at module seams:
//!
//! - **Tolerance checks**: [`verify_tol`] ensures numeric tolerances are
//!   finite and strictly positive when provided.
//! - **Gradient validation**: [`validate_grad`] enforces correct dimension
//!   and finite entries.
//! - **Hessian validation**: [`validate_hess`] enforces square shape and
//!   finite entries.
//! - **Bound vectors**: [`validate_bounds_len`] checks arity against the
//!   problem dimension.
//! - **Estimates**: [`validate_theta_hat`] ensures a candidate minimizer
//!   exists and contains only finite values; [`validate_value`] checks
//!   scalar outputs for finiteness.
//!
//! These helpers standardize error reporting through domain-specific
//! [`OptError`] variants so higher-level code stays uniform.

use crate::{
    errors::{OptError, OptResult},
    types::{Grad, Hess, Theta},
};

/// Validate an optional tolerance value under a given knob name.
///
/// - Accepts `None` (knob unset, solver default applies).
/// - If `Some`, the value must be **finite** and **strictly positive**.
///
/// # Errors
/// Returns [`OptError::InvalidTol`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol(name: &'static str, tol: Option<f64>) -> OptResult<()> {
    if let Some(tol) = tol {
        if !tol.is_finite() {
            return Err(OptError::InvalidTol { name, tol, reason: "Tolerance must be finite." });
        }
        if tol <= 0.0 {
            return Err(OptError::InvalidTol { name, tol, reason: "Tolerance must be positive." });
        }
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] with the index/value of the first
///   offending element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate the shape and entries of a Hessian matrix.
///
/// # Errors
/// - [`OptError::HessianDimMismatch`] if dimensions do not equal `dim × dim`.
/// - [`OptError::InvalidHessian`] if any entry is non-finite.
pub fn validate_hess(hess: &Hess, dim: usize) -> OptResult<()> {
    if hess.nrows() != dim || hess.ncols() != dim {
        return Err(OptError::HessianDimMismatch {
            expected: dim,
            found: (hess.nrows(), hess.ncols()),
        });
    }
    for ((i, j), &value) in hess.indexed_iter() {
        if !value.is_finite() {
            return Err(OptError::InvalidHessian { row: i, col: j, value });
        }
    }
    Ok(())
}

/// Validate an optional bound vector's arity against the problem dimension.
///
/// # Errors
/// Returns [`OptError::DimensionMismatch`] when the vector is present with
/// the wrong length.
pub fn validate_bounds_len(
    field: &'static str, bounds: Option<&Theta>, dim: usize,
) -> OptResult<()> {
    if let Some(b) = bounds {
        if b.len() != dim {
            return Err(OptError::DimensionMismatch { field, expected: dim, found: b.len() });
        }
    }
    Ok(())
}

/// Validate and unwrap an estimated minimizer.
///
/// Accepts only a present vector with all **finite** entries.
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if no vector was provided.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    match theta_hat {
        Some(t) => {
            for (index, &value) in t.iter().enumerate() {
                if !value.is_finite() {
                    return Err(OptError::InvalidThetaHat {
                        index,
                        value,
                        reason: "Minimizer entries must be finite.",
                    });
                }
            }
            Ok(t)
        }
        None => Err(OptError::MissingThetaHat),
    }
}

/// Validate that a scalar objective value is finite.
///
/// Negative values are fine as long as they are finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteCost`] if the value is `NaN` or infinite.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}
