mod closure;

pub use closure::{FnOdeSystem, IntoOdeSystem};

use nalgebra::{DMatrixSliceMut, DVectorSlice, DVectorSliceMut};

use crate::DerivativeError;

/// An abstract system of first-order ODEs
///
/// ```ignore
///    dy/dx = f(x, y),
/// ```
///
/// where `x` is the independent variable (time or a path parameter) and `y` the state.
///
/// Solvers only hold a shared reference to the system. A system whose size changes between
/// calls (e.g. a chemical mechanism with a variable number of active species) reports the new
/// size through `n_eqns`, and the solver must then be resized explicitly.
pub trait OdeSystem {
    /// The number of equations currently active.
    fn n_eqns(&self) -> usize;

    /// Evaluate the derivatives `dydx = f(x, y)`, overwriting `dydx`.
    fn derivatives(&self, x: f64, y: DVectorSlice<f64>, dydx: DVectorSliceMut<f64>) -> Result<(), DerivativeError>;

    /// Evaluate the derivative with respect to `x` and the Jacobian `df/dy`.
    ///
    /// Only needed by implicit solver families. The default implementation reports that the
    /// system does not provide a Jacobian.
    fn jacobian(
        &self,
        _x: f64,
        _y: DVectorSlice<f64>,
        _dfdx: DVectorSliceMut<f64>,
        _dfdy: DMatrixSliceMut<f64>,
    ) -> Result<(), DerivativeError> {
        Err(DerivativeError::from("this ODE system does not provide a Jacobian"))
    }
}
