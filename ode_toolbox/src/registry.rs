use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use once_cell::sync::Lazy;

use crate::config::SolverConfig;
use crate::integrators::rkf45::{new_rkf45, Rkf45};
use crate::solver::OdeSolver;
use crate::{OdeError, OdeSystem};

/// Constructor binding a solver family to a system and a configuration.
pub type SolverConstructor =
    for<'a> fn(&'a dyn OdeSystem, &SolverConfig) -> Result<Box<dyn OdeSolver + 'a>, OdeError>;

static REGISTRY: Lazy<Mutex<HashMap<String, SolverConstructor>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(Rkf45::NAME.to_string(), new_rkf45 as SolverConstructor);
    Mutex::new(map)
});

fn lock_registry() -> Result<MutexGuard<'static, HashMap<String, SolverConstructor>>, OdeError> {
    REGISTRY.lock().map_err(|_| OdeError::RegistryUnavailable)
}

/// Registers an additional solver family under `name`.
///
/// Fails if a family with the same name is already registered.
pub fn register_solver(name: &str, constructor: SolverConstructor) -> Result<(), OdeError> {
    let mut registry = lock_registry()?;
    if registry.contains_key(name) {
        return Err(OdeError::DuplicateSolverType(name.to_string()));
    }
    registry.insert(name.to_string(), constructor);
    debug!("Registered ODE solver type {}", name);
    Ok(())
}

/// Names of all registered solver families in lexicographic order.
pub fn available_solvers() -> Result<Vec<String>, OdeError> {
    let registry = lock_registry()?;
    let mut names: Vec<_> = registry.keys().cloned().collect();
    names.sort();
    Ok(names)
}

/// Creates the solver family named by `config.solver_name`, bound to `ode`.
pub fn create_solver<'a>(ode: &'a dyn OdeSystem, config: &SolverConfig) -> Result<Box<dyn OdeSolver + 'a>, OdeError> {
    config.validate()?;

    let constructor = {
        let registry = lock_registry()?;
        match registry.get(&config.solver_name) {
            Some(constructor) => *constructor,
            None => {
                let mut valid: Vec<_> = registry.keys().cloned().collect();
                valid.sort();
                return Err(OdeError::UnknownSolverType {
                    name: config.solver_name.clone(),
                    valid,
                });
            }
        }
    };

    debug!("Selecting ODE solver {}", config.solver_name);
    constructor(ode, config)
}
