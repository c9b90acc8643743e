use std::error::Error;

use nalgebra::DVector;
use ode_toolbox::{OdeSystem, SolverConfig};
use once_cell::sync::Lazy;

mod decay_chain;
mod elementary;
mod reactor_kinetics;

static PROBLEM_REGISTRY: Lazy<Vec<ProblemConstructor>> = Lazy::new(|| {
    let mut problems = Vec::new();
    problems.push(ProblemConstructor {
        name: "exponential_decay".to_string(),
        constructor: elementary::exponential_decay,
    });
    problems.push(ProblemConstructor {
        name: "exponential_growth".to_string(),
        constructor: elementary::exponential_growth,
    });
    problems.push(ProblemConstructor {
        name: "harmonic_oscillator".to_string(),
        constructor: elementary::harmonic_oscillator,
    });
    problems.push(ProblemConstructor {
        name: "van_der_pol".to_string(),
        constructor: elementary::van_der_pol,
    });
    problems.push(ProblemConstructor {
        name: "decay_chain".to_string(),
        constructor: decay_chain::decay_chain,
    });
    problems.push(ProblemConstructor {
        name: "reactor_kinetics".to_string(),
        constructor: reactor_kinetics::six_group_u235,
    });

    problems.sort_by_key(|constructor| constructor.name.clone());
    problems
});

/// The ODE system of a single cell together with the hooks the runner calls between outer steps.
pub trait CellSystem: OdeSystem {
    fn as_ode_system(&self) -> &dyn OdeSystem;

    /// Updates the system for an outer step starting at `x`.
    ///
    /// Returns `true` if the number of equations changed, in which case `y` has already been
    /// adapted and the solver has to be resized.
    fn update(&self, _x: f64, _y: &mut DVector<f64>) -> bool {
        false
    }

    /// Exact solution at `x`, if known.
    fn exact_solution(&self, _x: f64) -> Option<DVector<f64>> {
        None
    }
}

pub struct CellSetup {
    pub system: Box<dyn CellSystem>,
    pub initial_state: DVector<f64>,
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    pub x_start: f64,
    pub x_end: f64,
    /// Initial trial step of every cell.
    pub initial_step: f64,
    pub solver_config: SolverConfig,
    /// Builds the system of cell `cell_index` out of `num_cells`, cells differ in their parameters.
    pub new_cell: fn(cell_index: usize, num_cells: usize) -> CellSetup,
}

#[doc(hidden)]
pub struct ProblemConstructor {
    name: String,
    constructor: fn() -> Problem,
}

pub fn available_problems() -> Vec<String> {
    let mut names = Vec::new();
    for problem in PROBLEM_REGISTRY.iter() {
        names.push(problem.name.clone());
    }
    names
}

pub fn load_problem(name: &str) -> Result<Problem, Box<dyn Error>> {
    for problem in PROBLEM_REGISTRY.iter() {
        if problem.name == name {
            return Ok((problem.constructor)());
        }
    }

    Err(Box::from(format!("Could not find problem {}", name)))
}

/// Position of a cell in `[0, 1)`, used to vary parameters across cells.
fn cell_fraction(cell_index: usize, num_cells: usize) -> f64 {
    cell_index as f64 / num_cells.max(1) as f64
}
