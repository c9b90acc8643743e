mod base;
mod step_state;

pub use base::OdeSolverBase;
pub use step_state::StepState;

use log::warn;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::{OdeError, OdeSystem};

/// Counters accumulated by a solver over its lifetime.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub derivative_evals: usize,
}

/// Common interface of all ODE solver families.
///
/// A solver is bound to one [`OdeSystem`] for its whole lifetime and keeps its scratch buffers
/// between calls, so none of the stepping methods allocate. Whenever the number of equations of
/// the system changes, [`resize`](OdeSolver::resize) has to be called before the next step.
///
/// Only [`solve_step`](OdeSolver::solve_step) is family specific, the other stepping methods
/// are built on top of it.
pub trait OdeSolver {
    /// Name under which the solver family is registered.
    fn name(&self) -> &str;

    fn system(&self) -> &dyn OdeSystem;

    fn base(&self) -> &OdeSolverBase;

    fn base_mut(&mut self) -> &mut OdeSolverBase;

    fn stats(&self) -> SolverStats;

    /// Adapts tolerances and scratch buffers to the current size of the system.
    ///
    /// Returns whether anything had to be resized.
    fn resize(&mut self) -> Result<bool, OdeError>;

    /// Makes one accepted step from `x` along `step.dx_try`.
    ///
    /// Rejected attempts are retried with a smaller step until one is accepted. On success `x`
    /// and `y` are advanced by `step.dx_did` and `step.dx_try` holds the step size to attempt
    /// next. On error, `x` and `y` are left at their values on entry.
    fn solve_step(&mut self, x: &mut f64, y: &mut DVector<f64>, step: &mut StepState) -> Result<(), OdeError>;

    fn n_eqns(&self) -> usize {
        self.base().n_eqns()
    }

    fn max_steps(&self) -> usize {
        self.base().max_steps()
    }

    fn abs_tol(&self) -> &DVector<f64> {
        self.base().abs_tol()
    }

    fn rel_tol(&self) -> &DVector<f64> {
        self.base().rel_tol()
    }

    fn abs_tol_mut(&mut self) -> &mut [f64] {
        self.base_mut().abs_tol_mut()
    }

    fn rel_tol_mut(&mut self) -> &mut [f64] {
        self.base_mut().rel_tol_mut()
    }

    /// Makes one accepted step from `x` of at most `dx_try`.
    ///
    /// On return `dx_try` holds the recommended size of the next step.
    fn solve(&mut self, x: &mut f64, y: &mut DVector<f64>, dx_try: &mut f64) -> Result<(), OdeError> {
        let mut step = StepState::new(*dx_try)?;
        self.solve_step(x, y, &mut step)?;
        *dx_try = step.dx_try;
        Ok(())
    }

    /// Integrates `y` from `x_start` to exactly `x_end`.
    ///
    /// `dx_est` is the initial trial step and must point from `x_start` towards `x_end`. On
    /// success it holds the recommended initial step for a subsequent call, which ignores the
    /// truncation of the final step onto `x_end`. Fails if the interval cannot be covered within
    /// `max_steps` step attempts.
    fn solve_range(&mut self, x_start: f64, x_end: f64, y: &mut DVector<f64>, dx_est: &mut f64) -> Result<(), OdeError> {
        if x_start == x_end {
            return Ok(());
        }

        let mut step = StepState::new(*dx_est)?;
        if step.forward() != (x_end > x_start) {
            return Err(OdeError::DirectionMismatch {
                dx: *dx_est,
                x_start,
                x_end,
            });
        }

        let mut x = x_start;
        let mut n_step = 0;
        loop {
            let dx_try0 = step.dx_try;
            let remaining = x_end - x;
            step.last = remaining.abs() <= step.dx_try.abs();
            if step.last {
                step.dx_try = remaining;
            }

            if let Err(err) = self.solve_step(&mut x, y, &mut step) {
                warn!(
                    "{} solver failed after {} steps at x = {} of [{}, {}]: {}",
                    self.name(),
                    n_step,
                    x,
                    x_start,
                    x_end,
                    err
                );
                return Err(err);
            }

            if step.last && step.dx_did == remaining {
                *dx_est = if n_step > 0 { dx_try0 } else { step.dx_try };
                return Ok(());
            }
            // A step shorter than `remaining` can still round onto `x_end`.
            if (x - x_end) * (x_end - x_start) >= 0.0 {
                *dx_est = step.dx_try;
                return Ok(());
            }

            n_step += 1;
            step.first = false;
        }
    }
}
