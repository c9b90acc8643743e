use std::f64::consts::LN_2;

use nalgebra::{DVector, DVectorSlice, DVectorSliceMut};
use ode_toolbox::{DerivativeError, OdeSystem, SolverConfig};

use crate::problems::{cell_fraction, CellSetup, CellSystem, Problem};

/// U-235 delayed neutron fractions of the six precursor groups
const U235_DELAYED_FRACTIONS: [f64; 6] = [0.00021, 0.00142, 0.00128, 0.00257, 0.00075, 0.00027];
/// Precursor half-lives in seconds
const HALF_LIVES: [f64; 6] = [56.0, 23.0, 6.2, 2.3, 0.61, 0.23];
/// Prompt neutron generation time in seconds
const GENERATION_TIME: f64 = 1e-4;

/// Point reactor kinetics with six delayed neutron precursor groups.
///
/// The state is `[n, C_1, ..., C_6]` with the relative neutron population `n`:
///
/// ```ignore
///    dn/dt   = (rho - beta) / Lambda * n + sum_i lambda_i C_i
///    dC_i/dt = beta_i / Lambda * n - lambda_i C_i
/// ```
struct PointKinetics {
    reactivity: f64,
    delayed_fractions: [f64; 6],
    decay_constants: [f64; 6],
    generation_time: f64,
}

impl PointKinetics {
    fn u235(reactivity: f64) -> Self {
        let mut decay_constants = [0.0; 6];
        for (lambda, half_life) in decay_constants.iter_mut().zip(HALF_LIVES.iter()) {
            *lambda = LN_2 / half_life;
        }
        Self {
            reactivity,
            delayed_fractions: U235_DELAYED_FRACTIONS,
            decay_constants,
            generation_time: GENERATION_TIME,
        }
    }

    fn beta(&self) -> f64 {
        self.delayed_fractions.iter().sum()
    }

    /// State in which the precursor concentrations are in equilibrium with the neutron population.
    fn equilibrium_state(&self, n: f64) -> DVector<f64> {
        let mut state = DVector::zeros(7);
        state[0] = n;
        for i in 0..6 {
            state[i + 1] = self.delayed_fractions[i] / (self.generation_time * self.decay_constants[i]) * n;
        }
        state
    }
}

impl OdeSystem for PointKinetics {
    fn n_eqns(&self) -> usize {
        7
    }

    fn derivatives(&self, _x: f64, y: DVectorSlice<f64>, mut dydx: DVectorSliceMut<f64>) -> Result<(), DerivativeError> {
        let n = y[0];
        if !n.is_finite() {
            return Err(DerivativeError::from(format!("non-finite neutron population {}", n)));
        }

        let mut delayed_source = 0.0;
        for i in 0..6 {
            let precursors = y[i + 1];
            delayed_source += self.decay_constants[i] * precursors;
            dydx[i + 1] = self.delayed_fractions[i] / self.generation_time * n - self.decay_constants[i] * precursors;
        }
        dydx[0] = (self.reactivity - self.beta()) / self.generation_time * n + delayed_source;
        Ok(())
    }
}

impl CellSystem for PointKinetics {
    fn as_ode_system(&self) -> &dyn OdeSystem {
        self
    }
}

/// Reactivity step of 0.1 to 0.5 dollars (varying over cells) applied to a critical reactor.
pub fn six_group_u235() -> Problem {
    Problem {
        name: "reactor_kinetics".to_string(),
        x_start: 0.0,
        x_end: 10.0,
        initial_step: 1e-4,
        solver_config: SolverConfig::default().set_abs_tol(1e-10).set_rel_tol(1e-6),
        new_cell: |cell_index, num_cells| {
            let beta: f64 = U235_DELAYED_FRACTIONS.iter().sum();
            let dollars = 0.1 + 0.4 * cell_fraction(cell_index, num_cells);
            let system = PointKinetics::u235(dollars * beta);
            let initial_state = system.equilibrium_state(1.0);
            CellSetup {
                system: Box::new(system),
                initial_state,
            }
        },
    }
}
