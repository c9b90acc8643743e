use crate::OdeError;

/// Bookkeeping for one top-level integration call.
///
/// Created by the caller (or by [`OdeSolver::solve_range`](super::OdeSolver::solve_range)),
/// mutated by every sub-step and discarded when the call returns. The direction of integration
/// is fixed from the sign of the first trial step and cannot be changed afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct StepState {
    forward: bool,
    attempts: usize,
    /// Step size to attempt next.
    pub dx_try: f64,
    /// Step size of the last accepted step.
    pub dx_did: f64,
    pub first: bool,
    pub last: bool,
    /// Whether the last step had to be retried with a smaller step size.
    pub reject: bool,
    /// Whether any attempt since the last acceptance was rejected.
    pub prev_reject: bool,
}

impl StepState {
    pub fn new(dx_try: f64) -> Result<Self, OdeError> {
        if dx_try == 0.0 || !dx_try.is_finite() {
            return Err(OdeError::InvalidStepSize(dx_try));
        }

        Ok(Self {
            forward: dx_try > 0.0,
            attempts: 0,
            dx_try,
            dx_did: 0.0,
            first: true,
            last: false,
            reject: false,
            prev_reject: false,
        })
    }

    /// Direction of integration, `true` for increasing `x`.
    pub fn forward(&self) -> bool {
        self.forward
    }

    /// Number of step attempts (accepted and rejected) made with this state so far.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Counts one more step attempt at `x`, failing once more than `max_steps` were made.
    pub fn register_attempt(&mut self, max_steps: usize, x: f64) -> Result<(), OdeError> {
        if self.attempts >= max_steps {
            return Err(OdeError::StepLimitExceeded { max_steps, x });
        }
        self.attempts += 1;
        Ok(())
    }

    /// Whether `dx` points in the direction of integration.
    pub fn is_along(&self, dx: f64) -> bool {
        (dx > 0.0) == self.forward
    }
}
