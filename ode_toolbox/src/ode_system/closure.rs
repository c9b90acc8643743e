use nalgebra::{DVectorSlice, DVectorSliceMut};

use crate::ode_system::OdeSystem;
use crate::DerivativeError;

/// Wrapper for a closure with a fixed number of equations, use the `IntoOdeSystem` trait to construct.
pub struct FnOdeSystem<F> {
    n_eqns: usize,
    f: F,
}

impl<F> FnOdeSystem<F>
where
    F: Fn(f64, DVectorSlice<f64>, DVectorSliceMut<f64>) -> Result<(), DerivativeError>,
{
    pub fn new(n_eqns: usize, f: F) -> Self {
        Self { n_eqns, f }
    }
}

/// Allows to view a derivative closure as an `OdeSystem`.
pub trait IntoOdeSystem<F> {
    fn into_ode_system(self, n_eqns: usize) -> FnOdeSystem<F>;
}

impl<F> IntoOdeSystem<F> for F
where
    F: Fn(f64, DVectorSlice<f64>, DVectorSliceMut<f64>) -> Result<(), DerivativeError>,
{
    fn into_ode_system(self, n_eqns: usize) -> FnOdeSystem<F> {
        FnOdeSystem::new(n_eqns, self)
    }
}

impl<F> OdeSystem for FnOdeSystem<F>
where
    F: Fn(f64, DVectorSlice<f64>, DVectorSliceMut<f64>) -> Result<(), DerivativeError>,
{
    fn n_eqns(&self) -> usize {
        self.n_eqns
    }

    fn derivatives(&self, x: f64, y: DVectorSlice<f64>, dydx: DVectorSliceMut<f64>) -> Result<(), DerivativeError> {
        (self.f)(x, y, dydx)
    }
}
