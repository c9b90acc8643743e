use log::debug;
use nalgebra::DVector;

use crate::config::SolverConfig;
use crate::integrators::adaptive::{advance, evaluate_derivatives, AdaptiveWorkspace, EmbeddedStep, StepController};
use crate::solver::{OdeSolver, OdeSolverBase, SolverStats, StepState};
use crate::{OdeError, OdeSystem};

// Runge-Kutta-Fehlberg coefficients
const C2: f64 = 1.0 / 4.0;
const C3: f64 = 3.0 / 8.0;
const C4: f64 = 12.0 / 13.0;
const C5: f64 = 1.0;
const C6: f64 = 1.0 / 2.0;

const A21: f64 = 1.0 / 4.0;
const A31: f64 = 3.0 / 32.0;
const A32: f64 = 9.0 / 32.0;
const A41: f64 = 1932.0 / 2197.0;
const A42: f64 = -7200.0 / 2197.0;
const A43: f64 = 7296.0 / 2197.0;
const A51: f64 = 439.0 / 216.0;
const A52: f64 = -8.0;
const A53: f64 = 3680.0 / 513.0;
const A54: f64 = -845.0 / 4104.0;
const A61: f64 = -8.0 / 27.0;
const A62: f64 = 2.0;
const A63: f64 = -3544.0 / 2565.0;
const A64: f64 = 1859.0 / 4104.0;
const A65: f64 = -11.0 / 40.0;

// Fifth-order weights
const B1: f64 = 16.0 / 135.0;
const B3: f64 = 6656.0 / 12825.0;
const B4: f64 = 28561.0 / 56430.0;
const B5: f64 = -9.0 / 50.0;
const B6: f64 = 2.0 / 55.0;

// Difference between the fourth- and fifth-order weights
const E1: f64 = 25.0 / 216.0 - B1;
const E3: f64 = 1408.0 / 2565.0 - B3;
const E4: f64 = 2197.0 / 4104.0 - B4;
const E5: f64 = -1.0 / 5.0 - B5;
const E6: f64 = -B6;

/// Stage buffers of the Fehlberg pair.
#[derive(Clone, Debug)]
pub struct Rkf45Stages {
    y_temp: DVector<f64>,
    k2: DVector<f64>,
    k3: DVector<f64>,
    k4: DVector<f64>,
    k5: DVector<f64>,
    k6: DVector<f64>,
    err: DVector<f64>,
}

impl Rkf45Stages {
    pub fn new(n: usize) -> Self {
        Self {
            y_temp: DVector::zeros(n),
            k2: DVector::zeros(n),
            k3: DVector::zeros(n),
            k4: DVector::zeros(n),
            k5: DVector::zeros(n),
            k6: DVector::zeros(n),
            err: DVector::zeros(n),
        }
    }

    pub fn resize(&mut self, n: usize) -> bool {
        if self.err.len() == n {
            return false;
        }
        *self = Self::new(n);
        true
    }

    /// The local error estimate of the last trial step.
    pub fn error_estimate(&self) -> &DVector<f64> {
        &self.err
    }
}

impl EmbeddedStep for Rkf45Stages {
    const NEW_EVALUATIONS: usize = 5;

    fn embedded_step(
        &mut self,
        ode: &dyn OdeSystem,
        base: &OdeSolverBase,
        x0: f64,
        y0: &DVector<f64>,
        dydx0: &DVector<f64>,
        dx: f64,
        y: &mut DVector<f64>,
    ) -> Result<f64, OdeError> {
        let k1 = dydx0;

        self.y_temp.copy_from(y0);
        self.y_temp.axpy(dx * A21, k1, 1.0);
        evaluate_derivatives(ode, x0 + C2 * dx, &self.y_temp, &mut self.k2)?;

        self.y_temp.copy_from(y0);
        self.y_temp.axpy(dx * A31, k1, 1.0);
        self.y_temp.axpy(dx * A32, &self.k2, 1.0);
        evaluate_derivatives(ode, x0 + C3 * dx, &self.y_temp, &mut self.k3)?;

        self.y_temp.copy_from(y0);
        self.y_temp.axpy(dx * A41, k1, 1.0);
        self.y_temp.axpy(dx * A42, &self.k2, 1.0);
        self.y_temp.axpy(dx * A43, &self.k3, 1.0);
        evaluate_derivatives(ode, x0 + C4 * dx, &self.y_temp, &mut self.k4)?;

        self.y_temp.copy_from(y0);
        self.y_temp.axpy(dx * A51, k1, 1.0);
        self.y_temp.axpy(dx * A52, &self.k2, 1.0);
        self.y_temp.axpy(dx * A53, &self.k3, 1.0);
        self.y_temp.axpy(dx * A54, &self.k4, 1.0);
        evaluate_derivatives(ode, x0 + C5 * dx, &self.y_temp, &mut self.k5)?;

        self.y_temp.copy_from(y0);
        self.y_temp.axpy(dx * A61, k1, 1.0);
        self.y_temp.axpy(dx * A62, &self.k2, 1.0);
        self.y_temp.axpy(dx * A63, &self.k3, 1.0);
        self.y_temp.axpy(dx * A64, &self.k4, 1.0);
        self.y_temp.axpy(dx * A65, &self.k5, 1.0);
        evaluate_derivatives(ode, x0 + C6 * dx, &self.y_temp, &mut self.k6)?;

        // y <- y0 + dx * (b1 k1 + b3 k3 + b4 k4 + b5 k5 + b6 k6)
        y.copy_from(y0);
        y.axpy(dx * B1, k1, 1.0);
        y.axpy(dx * B3, &self.k3, 1.0);
        y.axpy(dx * B4, &self.k4, 1.0);
        y.axpy(dx * B5, &self.k5, 1.0);
        y.axpy(dx * B6, &self.k6, 1.0);

        // err <- dx * (e1 k1 + e3 k3 + e4 k4 + e5 k5 + e6 k6)
        self.err.copy_from(k1);
        self.err *= dx * E1;
        self.err.axpy(dx * E3, &self.k3, 1.0);
        self.err.axpy(dx * E4, &self.k4, 1.0);
        self.err.axpy(dx * E5, &self.k5, 1.0);
        self.err.axpy(dx * E6, &self.k6, 1.0);

        base.normalize_error(y0, y, &self.err)
    }
}

/// Fourth/fifth-order embedded Runge-Kutta-Fehlberg solver.
///
/// The fifth-order solution is propagated. The error estimate is formed directly from the
/// difference of the two weight sets, so one step costs five new derivative evaluations
/// (the derivative at the start of the step is reused).
pub struct Rkf45<'a> {
    ode: &'a dyn OdeSystem,
    base: OdeSolverBase,
    controller: StepController,
    stages: Rkf45Stages,
    workspace: AdaptiveWorkspace,
}

impl<'a> Rkf45<'a> {
    pub const NAME: &'static str = "RKF45";

    pub fn new(ode: &'a dyn OdeSystem, config: &SolverConfig) -> Result<Self, OdeError> {
        let n = ode.n_eqns();
        Ok(Self {
            ode,
            base: OdeSolverBase::new(n, config)?,
            controller: StepController::from_config(config, 5, 4),
            stages: Rkf45Stages::new(n),
            workspace: AdaptiveWorkspace::new(n),
        })
    }

    pub fn controller(&self) -> &StepController {
        &self.controller
    }

    pub fn stages(&self) -> &Rkf45Stages {
        &self.stages
    }
}

/// Constructor stored in the solver registry.
pub fn new_rkf45<'a>(ode: &'a dyn OdeSystem, config: &SolverConfig) -> Result<Box<dyn OdeSolver + 'a>, OdeError> {
    Ok(Box::new(Rkf45::new(ode, config)?))
}

impl<'a> OdeSolver for Rkf45<'a> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn system(&self) -> &dyn OdeSystem {
        self.ode
    }

    fn base(&self) -> &OdeSolverBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OdeSolverBase {
        &mut self.base
    }

    fn stats(&self) -> SolverStats {
        self.workspace.stats
    }

    fn resize(&mut self) -> Result<bool, OdeError> {
        let n = self.ode.n_eqns();
        if !self.base.resize(n)? {
            return Ok(false);
        }
        self.stages.resize(n);
        self.workspace.resize(n);
        debug!("Resized {} workspace to {} equations", Self::NAME, n);
        Ok(true)
    }

    fn solve_step(&mut self, x: &mut f64, y: &mut DVector<f64>, step: &mut StepState) -> Result<(), OdeError> {
        advance(
            self.ode,
            &self.base,
            &self.controller,
            &mut self.stages,
            &mut self.workspace,
            x,
            y,
            step,
        )
    }
}
