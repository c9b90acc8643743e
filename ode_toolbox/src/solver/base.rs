use itertools::izip;
use nalgebra::DVector;

use crate::config::{SolverConfig, Tolerance, DEFAULT_ABS_TOL, DEFAULT_REL_TOL};
use crate::OdeError;

/// State shared by every solver family: sizes, per-equation tolerances and the step cap.
///
/// The tolerance vectors always have exactly `n_eqns()` entries. They are sized for the number
/// of equations at construction time, which is also the largest size the solver can later be
/// resized to.
#[derive(Clone, Debug)]
pub struct OdeSolverBase {
    max_n: usize,
    n: usize,
    abs_tol_config: Tolerance,
    rel_tol_config: Tolerance,
    abs_tol: DVector<f64>,
    rel_tol: DVector<f64>,
    max_steps: usize,
}

fn validate_tolerance_pair(index: usize, abs_tol: f64, rel_tol: f64) -> Result<(), OdeError> {
    let valid = abs_tol.is_finite()
        && rel_tol.is_finite()
        && abs_tol >= 0.0
        && rel_tol >= 0.0
        && (abs_tol > 0.0 || rel_tol > 0.0);
    if valid {
        Ok(())
    } else {
        Err(OdeError::InvalidTolerance {
            index,
            abs_tol,
            rel_tol,
        })
    }
}

impl OdeSolverBase {
    /// Builds the base for a system with `n_eqns` equations.
    ///
    /// Scalar tolerances are broadcast. Tolerance sequences shorter than `n_eqns` are padded with
    /// the defaults, longer ones are truncated.
    pub fn new(n_eqns: usize, config: &SolverConfig) -> Result<Self, OdeError> {
        config.validate()?;

        let abs_tol = DVector::from_fn(n_eqns, |i, _| config.abs_tol.value_or(i, DEFAULT_ABS_TOL));
        let rel_tol = DVector::from_fn(n_eqns, |i, _| config.rel_tol.value_or(i, DEFAULT_REL_TOL));
        for (i, (&a, &r)) in abs_tol.iter().zip(rel_tol.iter()).enumerate() {
            validate_tolerance_pair(i, a, r)?;
        }

        Ok(Self {
            max_n: n_eqns,
            n: n_eqns,
            abs_tol_config: config.abs_tol.clone(),
            rel_tol_config: config.rel_tol.clone(),
            abs_tol,
            rel_tol,
            max_steps: config.max_steps,
        })
    }

    pub fn n_eqns(&self) -> usize {
        self.n
    }

    /// Largest number of equations this solver can be resized to.
    pub fn max_n_eqns(&self) -> usize {
        self.max_n
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn abs_tol(&self) -> &DVector<f64> {
        &self.abs_tol
    }

    pub fn rel_tol(&self) -> &DVector<f64> {
        &self.rel_tol
    }

    pub fn abs_tol_mut(&mut self) -> &mut [f64] {
        self.abs_tol.as_mut_slice()
    }

    pub fn rel_tol_mut(&mut self) -> &mut [f64] {
        self.rel_tol.as_mut_slice()
    }

    /// Adapts the base to `n_eqns` equations.
    ///
    /// Returns `Ok(false)` without touching anything if the size did not change. Tolerances of
    /// equations that stay active are preserved (including later user modifications), entries
    /// for newly activated equations are taken from the configuration.
    pub fn resize(&mut self, n_eqns: usize) -> Result<bool, OdeError> {
        if n_eqns == self.n {
            return Ok(false);
        }
        if n_eqns > self.max_n {
            return Err(OdeError::TooManyEquations {
                requested: n_eqns,
                max: self.max_n,
            });
        }

        let n_old = self.n;
        let abs_config = &self.abs_tol_config;
        let rel_config = &self.rel_tol_config;
        let old_abs = &self.abs_tol;
        let old_rel = &self.rel_tol;
        let abs_tol = DVector::from_fn(n_eqns, |i, _| {
            if i < n_old {
                old_abs[i]
            } else {
                abs_config.value_or(i, DEFAULT_ABS_TOL)
            }
        });
        let rel_tol = DVector::from_fn(n_eqns, |i, _| {
            if i < n_old {
                old_rel[i]
            } else {
                rel_config.value_or(i, DEFAULT_REL_TOL)
            }
        });

        self.abs_tol = abs_tol;
        self.rel_tol = rel_tol;
        self.n = n_eqns;
        Ok(true)
    }

    /// Scaled RMS norm of the error estimate `err` of a step from `y0` to `y`.
    ///
    /// Each component is scaled by `absTol + relTol * max(|y0|, |y|)`. A value below 1 means the
    /// step satisfies the tolerances. An empty system has zero error.
    pub fn normalize_error(&self, y0: &DVector<f64>, y: &DVector<f64>, err: &DVector<f64>) -> Result<f64, OdeError> {
        let n = self.n;
        if let Some(actual) = [y0.len(), y.len(), err.len()].iter().copied().find(|&len| len != n) {
            return Err(OdeError::DimensionMismatch { expected: n, actual });
        }
        if n == 0 {
            return Ok(0.0);
        }

        let mut sum = 0.0;
        for (i, (&a, &r, &y0_i, &y_i, &e)) in izip!(
            self.abs_tol.iter(),
            self.rel_tol.iter(),
            y0.iter(),
            y.iter(),
            err.iter()
        )
        .enumerate()
        {
            let tol = a + r * y0_i.abs().max(y_i.abs());
            if tol == 0.0 {
                if e != 0.0 {
                    return Err(OdeError::ZeroTolerance { index: i, error: e });
                }
                continue;
            }
            let scaled = e / tol;
            sum += scaled * scaled;
        }

        Ok((sum / n as f64).sqrt())
    }
}
