#![allow(clippy::excessive_precision)]
#![allow(clippy::too_many_arguments)]

/// Solver configuration and tolerance specification.
pub mod config;
mod error;
/// Implementations of embedded integration schemes and their step-size control.
pub mod integrators;
/// Traits to model systems of ODEs that can be integrated by this crate's solvers.
pub mod ode_system;
/// Name-based selection of solver families.
pub mod registry;
/// The interface and shared state of all solvers.
pub mod solver;

pub use config::{SolverConfig, Tolerance};
pub use error::{DerivativeError, OdeError};
pub use ode_system::{FnOdeSystem, IntoOdeSystem, OdeSystem};
pub use registry::{available_solvers, create_solver, register_solver, SolverConstructor};
pub use solver::{OdeSolver, OdeSolverBase, SolverStats, StepState};
