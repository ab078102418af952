use thiserror::Error;

use crate::equation_engine::ExpressionError;

/// Errors raised by the integration engine.
///
/// Usage errors (bad index, mismatched lengths, invalid step size) mean the
/// caller has to fix its inputs; degenerate errors flag a mathematically
/// singular configuration. Every operation is deterministic, so retrying a
/// failed call fails the same way.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("Index {index} out of bounds for vector of length {len}.")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Vector length mismatch: {left} vs {right}.")]
    LengthMismatch { left: usize, right: usize },

    #[error("Invalid slice range [{start}, {end}) for vector of length {len}.")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("Cannot normalize a zero vector.")]
    DivideByZero,

    #[error("Step size dt must be positive and finite (got {0}).")]
    InvalidStep(f64),

    #[error("Invalid time span: t0 = {t0}, t_end = {t_end}.")]
    InvalidTimeSpan { t0: f64, t_end: f64 },

    #[error("Too many steps from t0 = {t0} to t_end = {t_end} with dt = {dt}.")]
    TooManySteps { t0: f64, t_end: f64, dt: f64 },

    #[error("System has zero state variables.")]
    EmptySystem,

    #[error("Bodies {i} and {j} occupy the same position.")]
    CoincidentBodies { i: usize, j: usize },

    #[error("Unknown step algorithm '{name}'. Available: {available}.")]
    UnknownAlgorithm { name: String, available: String },

    #[error("Unknown scenario '{name}'. Available: {available}.")]
    UnknownScenario { name: String, available: String },

    #[error("Series '{0}' has no points.")]
    EmptySeries(String),

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    /// True for singular-input failures, as opposed to caller contract violations.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, SimError::DivideByZero | SimError::CoincidentBodies { .. })
    }
}
