use argmin::core::{ArgminError, Error};

/// Crate-wide result alias for dispatch-layer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Context construction ----
    /// Derivative-based optimizer chosen but the required derivative is absent.
    MissingDerivative {
        optimizer: &'static str,
        derivative: &'static str,
    },

    /// Constraint-capable optimizer chosen but a constraint derivative is absent.
    MissingConstraintDerivative {
        optimizer: &'static str,
        derivative: &'static str,
    },

    /// Nonlinear constraints supplied to an optimizer that cannot consume them.
    ConstraintsUnsupported {
        optimizer: &'static str,
    },

    /// Optimizer requires bounds (population constructor) but none were given.
    MissingBounds {
        optimizer: &'static str,
    },

    /// Optimizer requires finite bounds on every coordinate.
    NonFiniteBounds {
        optimizer: &'static str,
        index: usize,
    },

    // ---- Re-init ----
    /// Symbolic re-init requested against a problem with no symbolic system.
    UnsupportedSymbolicRemap {
        field: &'static str,
    },

    /// Symbolic re-init named a key the symbolic system does not declare.
    UnknownSymbol {
        field: &'static str,
        name: String,
    },

    /// Replacement vector does not match the stored dimension.
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    // ---- Callback bridge ----
    /// User trace callback failed; reported on its first occurrence.
    CallbackFailed {
        text: String,
    },

    /// Mini-batch stream produced no element at solve start.
    EmptyBatchStream,

    // ---- Objective / derivatives ----
    /// Objective returned a non-finite value.
    NonFiniteCost {
        value: f64,
    },

    /// Gradient dimensions do not match parameter dimensions.
    GradientDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Gradient elements need to be finite.
    InvalidGradient {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    /// Hessian matrix dimensions do not match parameter dimensions.
    HessianDimMismatch {
        expected: usize,
        found: (usize, usize),
    },

    /// Hessian values need to be finite.
    InvalidHessian {
        row: usize,
        col: usize,
        value: f64,
    },

    /// Constraint vector or Jacobian shape disagrees with the declared bounds.
    ConstraintDimMismatch {
        expected: usize,
        found: usize,
    },

    /// Constraints declared without both constraint-bound vectors.
    ConstraintBoundsMissing,

    // ---- Options ----
    /// Tolerances need to be positive and finite.
    InvalidTol {
        name: &'static str,
        tol: f64,
        reason: &'static str,
    },

    /// Maximum iterations needs to be positive.
    InvalidMaxIter {
        max_iter: u64,
        reason: &'static str,
    },

    /// Invalid line searcher name.
    InvalidLineSearch {
        name: String,
        reason: &'static str,
    },

    /// L-BFGS memory needs to be at least 1.
    InvalidLbfgsMem {
        mem: usize,
        reason: &'static str,
    },

    /// Particle swarm needs at least one particle.
    InvalidParticleCount {
        particles: usize,
        reason: &'static str,
    },

    // ---- Solver outcome ----
    /// Estimated parameters must be finite.
    InvalidThetaHat {
        index: usize,
        value: f64,
        reason: &'static str,
    },

    /// Best parameter vector is missing from the solver state.
    MissingThetaHat,

    // ---- Argmin ----
    /// Wrapper for argmin::InvalidParameter
    InvalidParameter {
        text: String,
    },
    /// Wrapper for argmin::NotImplemented
    NotImplemented {
        text: String,
    },
    /// Wrapper for argmin::NotInitialized
    NotInitialized {
        text: String,
    },
    /// Wrapper for argmin::ConditionViolated
    ConditionViolated {
        text: String,
    },
    /// Wrapper for argmin::PotentialBug
    PotentialBug {
        text: String,
    },
    /// Wrapper for other argmin::Error types
    BackendError {
        text: String,
    },
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Context construction ----
            OptError::MissingDerivative { optimizer, derivative } => {
                write!(f, "Optimizer '{optimizer}' requires a {derivative} but none is available")
            }
            OptError::MissingConstraintDerivative { optimizer, derivative } => {
                write!(f, "Optimizer '{optimizer}' requires a {derivative} but none is available")
            }
            OptError::ConstraintsUnsupported { optimizer } => {
                write!(f, "Optimizer '{optimizer}' cannot consume nonlinear constraints")
            }
            OptError::MissingBounds { optimizer } => {
                write!(f, "Optimizer '{optimizer}' requires bounds but none were supplied")
            }
            OptError::NonFiniteBounds { optimizer, index } => {
                write!(f, "Optimizer '{optimizer}' requires finite bounds; coordinate {index} is unbounded")
            }

            // ---- Re-init ----
            OptError::UnsupportedSymbolicRemap { field } => {
                write!(f, "Symbolic re-init of '{field}' requested but the problem has no symbolic system")
            }
            OptError::UnknownSymbol { field, name } => {
                write!(f, "Symbolic re-init of '{field}' named unknown symbol '{name}'")
            }
            OptError::DimensionMismatch { field, expected, found } => {
                write!(f, "Dimension mismatch for '{field}': expected {expected}, found {found}")
            }

            // ---- Callback bridge ----
            OptError::CallbackFailed { text } => {
                write!(f, "Trace callback failed: {text}")
            }
            OptError::EmptyBatchStream => {
                write!(f, "Mini-batch stream produced no element at solve start")
            }

            // ---- Objective / derivatives ----
            OptError::NonFiniteCost { value } => {
                write!(f, "Non-finite objective value: {value}")
            }
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient at index {index}: {value}: {reason}")
            }
            OptError::HessianDimMismatch { expected, found } => {
                write!(
                    f,
                    "Hessian dimension mismatch: expected ({expected}, {expected}), found {found:?}"
                )
            }
            OptError::InvalidHessian { row, col, value } => {
                write!(f, "Invalid Hessian at ({row}, {col}): {value}, must be finite")
            }
            OptError::ConstraintDimMismatch { expected, found } => {
                write!(f, "Constraint dimension mismatch: expected {expected}, found {found}")
            }
            OptError::ConstraintBoundsMissing => {
                write!(f, "Constraints declared without both constraint-bound vectors")
            }

            // ---- Options ----
            OptError::InvalidTol { name, tol, reason } => {
                write!(f, "Invalid {name} tolerance {tol}: {reason}")
            }
            OptError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid maximum iterations {max_iter}: {reason}")
            }
            OptError::InvalidLineSearch { name, reason } => {
                write!(f, "Invalid line searcher '{name}': {reason}")
            }
            OptError::InvalidLbfgsMem { mem, reason } => {
                write!(f, "Invalid L-BFGS memory {mem}: {reason}")
            }
            OptError::InvalidParticleCount { particles, reason } => {
                write!(f, "Invalid particle count {particles}: {reason}")
            }

            // ---- Solver outcome ----
            OptError::InvalidThetaHat { index, value, reason } => {
                write!(f, "Invalid estimated parameter at index {index}: {value}: {reason}")
            }
            OptError::MissingThetaHat => {
                write!(f, "Missing estimated parameters from solver state")
            }

            // ---- Argmin ----
            OptError::InvalidParameter { text } => {
                write!(f, "Invalid parameter: {text}")
            }
            OptError::NotImplemented { text } => {
                write!(f, "Not implemented: {text}")
            }
            OptError::NotInitialized { text } => {
                write!(f, "Not initialized: {text}")
            }
            OptError::ConditionViolated { text } => {
                write!(f, "Condition violated: {text}")
            }
            OptError::PotentialBug { text } => {
                write!(f, "Potential bug: {text}")
            }
            OptError::BackendError { text } => {
                write!(f, "Backend error: {text}")
            }
        }
    }
}

impl From<Error> for OptError {
    /// Recover an `OptError` raised inside the executor, otherwise translate
    /// argmin's own error kinds. Anything else is kept verbatim as a backend
    /// error so external solver failures propagate unmodified.
    fn from(original_err: Error) -> Self {
        match original_err.downcast::<OptError>() {
            Ok(opt_err) => opt_err,
            Err(err) => match err.downcast::<ArgminError>() {
                Ok(argmin_err) => match argmin_err {
                    ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                    ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                    ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                    ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                    ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                    other => OptError::BackendError { text: other.to_string() },
                },
                Err(err) => OptError::BackendError { text: err.to_string() },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Ensure an `OptError` pushed into an argmin `Error` is recovered intact
    // by the `From<Error>` conversion rather than flattened to a string.
    //
    // Given
    // -----
    // - A `CallbackFailed` value wrapped into `argmin::core::Error`.
    //
    // Expect
    // ------
    // - Conversion back yields the original variant.
    fn opt_error_round_trips_through_argmin_error() {
        // Arrange
        let original = OptError::CallbackFailed { text: "stop".to_string() };
        let wrapped: Error = original.clone().into();

        // Act
        let recovered: OptError = wrapped.into();

        // Assert
        assert_eq!(recovered, original);
    }

    #[test]
    // Purpose
    // -------
    // Verify argmin's own error kinds map onto the matching wrapper variants.
    //
    // Given
    // -----
    // - An `ArgminError::InvalidParameter` wrapped into `Error`.
    //
    // Expect
    // ------
    // - Conversion yields `OptError::InvalidParameter` with the same text.
    fn argmin_error_kinds_map_to_wrapper_variants() {
        // Arrange
        let wrapped: Error =
            ArgminError::InvalidParameter { text: "bad dimension".to_string() }.into();

        // Act
        let converted: OptError = wrapped.into();

        // Assert
        assert_eq!(converted, OptError::InvalidParameter { text: "bad dimension".to_string() });
    }
}
