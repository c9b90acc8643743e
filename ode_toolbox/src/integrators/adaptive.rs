//! Adaptive step-size control shared by all embedded Runge-Kutta families.
//!
//! A family implements [`EmbeddedStep`] to produce one trial solution together with its
//! normalized error, a [`StepSizeController`] turns that error into an accept/reject decision and
//! [`advance`] composes the two into a complete adaptive step.

use log::{debug, trace};
use nalgebra::{DVector, DVectorSlice, DVectorSliceMut};

use crate::config::SolverConfig;
use crate::solver::{OdeSolverBase, SolverStats, StepState};
use crate::{OdeError, OdeSystem};

/// A single trial step of an embedded method.
pub trait EmbeddedStep {
    /// Number of derivative evaluations made by one call to `embedded_step`.
    const NEW_EVALUATIONS: usize;

    /// Attempts a step of size `dx` from `(x0, y0)`, writing the trial solution into `y`.
    ///
    /// `dydx0` must hold the derivatives at `(x0, y0)`. Returns the normalized error of the
    /// trial solution as computed by [`OdeSolverBase::normalize_error`].
    fn embedded_step(
        &mut self,
        ode: &dyn OdeSystem,
        base: &OdeSolverBase,
        x0: f64,
        y0: &DVector<f64>,
        dydx0: &DVector<f64>,
        dx: f64,
        y: &mut DVector<f64>,
    ) -> Result<f64, OdeError>;
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum StepDecision {
    /// Keep the trial solution and multiply the step size by `scale` for the next step.
    Accept { scale: f64 },
    /// Discard the trial solution and retry with the step size multiplied by `scale < 1`.
    Reject { scale: f64 },
}

pub trait StepSizeController {
    /// Decides on a trial step given its normalized `error`.
    ///
    /// `prev_reject` tells whether the step size was already reduced for the current step.
    fn decide(&self, error: f64, prev_reject: bool) -> StepDecision;
}

/// The classic controller `scale = safety * error^(-alpha)`, clamped to `[min_scale, max_scale]`.
///
/// Growth uses the order of the propagated solution, shrinking the order of the error estimate.
/// A non-finite error is treated like a very large one.
#[derive(Clone, Debug, PartialEq)]
pub struct StepController {
    pub safe_scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub alpha_increase: f64,
    pub alpha_decrease: f64,
}

impl StepController {
    pub fn from_config(config: &SolverConfig, order: u32, error_order: u32) -> Self {
        Self {
            safe_scale: config.safe_scale(),
            min_scale: config.min_scale(),
            max_scale: config.max_scale(),
            alpha_increase: 1.0 / order as f64,
            alpha_decrease: 1.0 / error_order as f64,
        }
    }
}

impl StepSizeController for StepController {
    fn decide(&self, error: f64, prev_reject: bool) -> StepDecision {
        if !error.is_finite() {
            return StepDecision::Reject {
                scale: self.min_scale,
            };
        }

        if error <= 1.0 {
            let scale = if error == 0.0 {
                self.max_scale
            } else {
                (self.safe_scale * error.powf(-self.alpha_increase))
                    .max(self.min_scale)
                    .min(self.max_scale)
            };
            // No growth directly after a rejection
            let scale = if prev_reject { scale.min(1.0) } else { scale };
            StepDecision::Accept { scale }
        } else {
            // safe_scale < 1 and error > 1, so this is always a reduction
            let scale = (self.safe_scale * error.powf(-self.alpha_decrease)).max(self.min_scale);
            StepDecision::Reject { scale }
        }
    }
}

/// Buffers used by [`advance`] in addition to the stage buffers of the method.
#[derive(Clone, Debug)]
pub struct AdaptiveWorkspace {
    pub dydx0: DVector<f64>,
    pub y_new: DVector<f64>,
    pub stats: SolverStats,
}

impl AdaptiveWorkspace {
    pub fn new(n: usize) -> Self {
        Self {
            dydx0: DVector::zeros(n),
            y_new: DVector::zeros(n),
            stats: SolverStats::default(),
        }
    }

    /// Returns whether the buffers had to be reallocated.
    pub fn resize(&mut self, n: usize) -> bool {
        if self.y_new.len() == n {
            return false;
        }
        self.dydx0 = DVector::zeros(n);
        self.y_new = DVector::zeros(n);
        true
    }
}

/// Evaluates `dydx = f(x, y)`, attaching `x` to a failure.
pub fn evaluate_derivatives(
    ode: &dyn OdeSystem,
    x: f64,
    y: &DVector<f64>,
    dydx: &mut DVector<f64>,
) -> Result<(), OdeError> {
    ode.derivatives(x, DVectorSlice::from(y), DVectorSliceMut::from(dydx))
        .map_err(|source| OdeError::Derivative { x, source })
}

/// Makes one accepted adaptive step from `(x, y)`, starting with the trial size `step.dx_try`.
///
/// Every attempt counts against `base.max_steps()` through `step`. `x` and `y` are only written
/// once a trial step has been accepted.
pub fn advance<M, C>(
    ode: &dyn OdeSystem,
    base: &OdeSolverBase,
    controller: &C,
    method: &mut M,
    workspace: &mut AdaptiveWorkspace,
    x: &mut f64,
    y: &mut DVector<f64>,
    step: &mut StepState,
) -> Result<(), OdeError>
where
    M: EmbeddedStep,
    C: StepSizeController,
{
    let n = base.n_eqns();
    if ode.n_eqns() != n {
        return Err(OdeError::DimensionMismatch {
            expected: n,
            actual: ode.n_eqns(),
        });
    }
    if y.len() != n {
        return Err(OdeError::DimensionMismatch {
            expected: n,
            actual: y.len(),
        });
    }
    if step.dx_try == 0.0 || !step.dx_try.is_finite() || !step.is_along(step.dx_try) {
        return Err(OdeError::InvalidStepSize(step.dx_try));
    }

    step.reject = false;
    evaluate_derivatives(ode, *x, y, &mut workspace.dydx0)?;
    workspace.stats.derivative_evals += 1;

    let mut dx = step.dx_try;
    loop {
        step.register_attempt(base.max_steps(), *x)?;

        let error = method.embedded_step(ode, base, *x, y, &workspace.dydx0, dx, &mut workspace.y_new)?;
        workspace.stats.derivative_evals += M::NEW_EVALUATIONS;

        match controller.decide(error, step.prev_reject) {
            StepDecision::Accept { scale } => {
                y.copy_from(&workspace.y_new);
                *x += dx;
                step.dx_did = dx;
                step.dx_try = dx * scale;
                step.prev_reject = false;
                workspace.stats.accepted_steps += 1;
                trace!("Accepted step dx = {:e} to x = {} (error {:.3e})", dx, *x, error);
                return Ok(());
            }
            StepDecision::Reject { scale } => {
                step.reject = true;
                step.prev_reject = true;
                workspace.stats.rejected_steps += 1;

                let dx_new = dx * scale;
                if dx_new.abs() < std::f64::MIN_POSITIVE || *x + dx_new == *x {
                    return Err(OdeError::StepSizeUnderflow { x: *x, dx: dx_new });
                }
                debug!(
                    "Rejected step dx = {:e} at x = {} (error {:.3e}), retrying with dx = {:e}",
                    dx, *x, error, dx_new
                );
                dx = dx_new;
            }
        }
    }
}
