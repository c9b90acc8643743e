use std::cell::Cell;

use log::debug;
use nalgebra::{DVector, DVectorSlice, DVectorSliceMut};
use ode_toolbox::{DerivativeError, OdeSystem, SolverConfig};

use crate::problems::{cell_fraction, CellSetup, CellSystem, Problem};

const MAX_SPECIES: usize = 8;

/// Linear decay chain `A_0 -> A_1 -> ... -> A_{n-1}` where species `k` only takes part once
/// `x >= k * activation_interval`.
///
/// The number of equations grows over time, which requires the solver to be resized between
/// outer steps. The last active species decays into species that are not tracked yet.
struct DecayChain {
    rates: Vec<f64>,
    activation_interval: f64,
    n_active: Cell<usize>,
}

impl DecayChain {
    fn active_species_at(&self, x: f64) -> usize {
        let activated = (x / self.activation_interval).floor().max(0.0) as usize + 1;
        activated.min(self.rates.len())
    }
}

impl OdeSystem for DecayChain {
    fn n_eqns(&self) -> usize {
        self.n_active.get()
    }

    fn derivatives(&self, _x: f64, y: DVectorSlice<f64>, mut dydx: DVectorSliceMut<f64>) -> Result<(), DerivativeError> {
        for i in 0..y.len() {
            let source = if i > 0 { self.rates[i - 1] * y[i - 1] } else { 0.0 };
            dydx[i] = source - self.rates[i] * y[i];
        }
        Ok(())
    }
}

impl CellSystem for DecayChain {
    fn as_ode_system(&self) -> &dyn OdeSystem {
        self
    }

    fn update(&self, x: f64, y: &mut DVector<f64>) -> bool {
        let n = self.active_species_at(x);
        if n == self.n_active.get() {
            return false;
        }

        debug!("Decay chain now tracks {} species at x = {}", n, x);
        self.n_active.set(n);
        let old = y.clone();
        *y = DVector::from_fn(n, |i, _| if i < old.len() { old[i] } else { 0.0 });
        true
    }
}

pub fn decay_chain() -> Problem {
    Problem {
        name: "decay_chain".to_string(),
        x_start: 0.0,
        x_end: 10.0,
        initial_step: 0.05,
        solver_config: SolverConfig::default().set_abs_tol(1e-12).set_rel_tol(1e-6),
        new_cell: |cell_index, num_cells| {
            let fraction = cell_fraction(cell_index, num_cells);
            let rates = (0..MAX_SPECIES).map(|k| 1.0 / (1.0 + 0.25 * k as f64)).collect();
            let mut initial_state = DVector::zeros(MAX_SPECIES);
            initial_state[0] = 1.0;
            CellSetup {
                // The solver is sized for all species, the first update shrinks it to the active ones
                system: Box::new(DecayChain {
                    rates,
                    activation_interval: 0.5 + fraction,
                    n_active: Cell::new(MAX_SPECIES),
                }),
                initial_state,
            }
        },
    }
}
