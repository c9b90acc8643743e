//! Small problems with (mostly) known solutions.

use nalgebra::{DVector, DVectorSlice, DVectorSliceMut};
use ode_toolbox::{DerivativeError, OdeSystem, SolverConfig};

use crate::problems::{cell_fraction, CellSetup, CellSystem, Problem};

/// dy/dx = lambda * y, y(0) = 1
struct Exponential {
    lambda: f64,
}

impl OdeSystem for Exponential {
    fn n_eqns(&self) -> usize {
        1
    }

    fn derivatives(&self, _x: f64, y: DVectorSlice<f64>, mut dydx: DVectorSliceMut<f64>) -> Result<(), DerivativeError> {
        dydx[0] = self.lambda * y[0];
        Ok(())
    }
}

impl CellSystem for Exponential {
    fn as_ode_system(&self) -> &dyn OdeSystem {
        self
    }

    fn exact_solution(&self, x: f64) -> Option<DVector<f64>> {
        Some(DVector::from_element(1, (self.lambda * x).exp()))
    }
}

/// y'' = -omega^2 y with y(0) = 1, y'(0) = 0
struct HarmonicOscillator {
    omega: f64,
}

impl OdeSystem for HarmonicOscillator {
    fn n_eqns(&self) -> usize {
        2
    }

    fn derivatives(&self, _x: f64, y: DVectorSlice<f64>, mut dydx: DVectorSliceMut<f64>) -> Result<(), DerivativeError> {
        dydx[0] = y[1];
        dydx[1] = -self.omega * self.omega * y[0];
        Ok(())
    }
}

impl CellSystem for HarmonicOscillator {
    fn as_ode_system(&self) -> &dyn OdeSystem {
        self
    }

    fn exact_solution(&self, x: f64) -> Option<DVector<f64>> {
        let phase = self.omega * x;
        Some(DVector::from_vec(vec![phase.cos(), -self.omega * phase.sin()]))
    }
}

/// y'' = mu (1 - y^2) y' - y
struct VanDerPol {
    mu: f64,
}

impl OdeSystem for VanDerPol {
    fn n_eqns(&self) -> usize {
        2
    }

    fn derivatives(&self, _x: f64, y: DVectorSlice<f64>, mut dydx: DVectorSliceMut<f64>) -> Result<(), DerivativeError> {
        dydx[0] = y[1];
        dydx[1] = self.mu * (1.0 - y[0] * y[0]) * y[1] - y[0];
        Ok(())
    }
}

impl CellSystem for VanDerPol {
    fn as_ode_system(&self) -> &dyn OdeSystem {
        self
    }
}

pub fn exponential_decay() -> Problem {
    Problem {
        name: "exponential_decay".to_string(),
        x_start: 0.0,
        x_end: 5.0,
        initial_step: 0.1,
        solver_config: SolverConfig::default().set_abs_tol(1e-12).set_rel_tol(1e-8),
        new_cell: |cell_index, num_cells| CellSetup {
            system: Box::new(Exponential {
                lambda: -(0.5 + cell_fraction(cell_index, num_cells)),
            }),
            initial_state: DVector::from_element(1, 1.0),
        },
    }
}

pub fn exponential_growth() -> Problem {
    Problem {
        name: "exponential_growth".to_string(),
        x_start: 0.0,
        x_end: 1.0,
        initial_step: 0.1,
        solver_config: SolverConfig::default().set_abs_tol(1e-8).set_rel_tol(1e-8),
        new_cell: |_, _| CellSetup {
            system: Box::new(Exponential { lambda: 1.0 }),
            initial_state: DVector::from_element(1, 1.0),
        },
    }
}

pub fn harmonic_oscillator() -> Problem {
    Problem {
        name: "harmonic_oscillator".to_string(),
        x_start: 0.0,
        x_end: 20.0,
        initial_step: 0.01,
        solver_config: SolverConfig::default().set_abs_tol(1e-10).set_rel_tol(1e-8),
        new_cell: |cell_index, num_cells| CellSetup {
            system: Box::new(HarmonicOscillator {
                omega: 1.0 + cell_fraction(cell_index, num_cells),
            }),
            initial_state: DVector::from_vec(vec![1.0, 0.0]),
        },
    }
}

pub fn van_der_pol() -> Problem {
    Problem {
        name: "van_der_pol".to_string(),
        x_start: 0.0,
        x_end: 20.0,
        initial_step: 0.01,
        solver_config: SolverConfig::default().set_abs_tol(1e-8).set_rel_tol(1e-6),
        new_cell: |cell_index, num_cells| CellSetup {
            system: Box::new(VanDerPol {
                mu: 1.0 + 4.0 * cell_fraction(cell_index, num_cells),
            }),
            initial_state: DVector::from_vec(vec![2.0, 0.0]),
        },
    }
}
