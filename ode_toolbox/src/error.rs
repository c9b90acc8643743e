//! Error type shared by all solvers, the registry and the configuration.

use std::error::Error;

use thiserror::Error;

/// Error returned by a user-supplied derivative (or Jacobian) routine.
pub type DerivativeError = Box<dyn Error + Send + Sync>;

/// Error type used by the crate.
///
/// Every variant is fatal to the call that produced it. Stepping operations only ever write
/// accepted steps into the caller's state, so the state as of the last accepted step is still
/// available when one of these is returned.
#[derive(Error, Debug)]
pub enum OdeError {
    /// The requested solver family has not been registered.
    #[error("unknown ODE solver type `{name}`, valid solver types are: {}", .valid.join(", "))]
    UnknownSolverType { name: String, valid: Vec<String> },
    /// A solver family with the same name is already registered.
    #[error("an ODE solver type named `{0}` is already registered")]
    DuplicateSolverType(String),
    /// The global solver registry could not be locked.
    #[error("the solver registry is unavailable (poisoned lock)")]
    RegistryUnavailable,
    #[error("invalid solver configuration: {0}")]
    InvalidConfiguration(String),
    /// A tolerance is negative, non-finite or both tolerances of an equation are zero.
    #[error("invalid tolerances for equation {index}: absTol = {abs_tol}, relTol = {rel_tol}")]
    InvalidTolerance { index: usize, abs_tol: f64, rel_tol: f64 },
    /// The error scale of an equation with a nonzero error estimate is zero.
    #[error("zero tolerance for equation {index} with nonzero error estimate {error}")]
    ZeroTolerance { index: usize, error: f64 },
    #[error("the system requests {requested} equations, but the solver was built for at most {max}")]
    TooManyEquations { requested: usize, max: usize },
    #[error("state vector has {actual} entries, but the solver integrates {expected} equations")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("step size must be finite and nonzero (got {0})")]
    InvalidStepSize(f64),
    #[error("step size {dx} points away from the integration interval [{x_start}, {x_end}]")]
    DirectionMismatch { dx: f64, x_start: f64, x_end: f64 },
    /// Adaptive shrinking produced a step that can no longer be resolved at `x`.
    /// Usually a sign that the problem is too stiff for an explicit method.
    #[error("step size underflow at x = {x} (dx = {dx}), the problem is probably stiff")]
    StepSizeUnderflow { x: f64, dx: f64 },
    #[error("integration steps greater than maximum {max_steps} at x = {x}")]
    StepLimitExceeded { max_steps: usize, x: f64 },
    /// The derivative routine failed. The original error is kept as the source.
    #[error("derivative evaluation failed at x = {x}")]
    Derivative {
        x: f64,
        #[source]
        source: DerivativeError,
    },
}
