
use serde::{Deserialize, Serialize};

use crate::OdeError;

/// Name of the solver family used when the configuration does not name one.
pub const DEFAULT_SOLVER_NAME: &str = "RKF45";
pub const DEFAULT_ABS_TOL: f64 = 1e-15;
pub const DEFAULT_REL_TOL: f64 = 1e-4;
pub const DEFAULT_MAX_STEPS: usize = 10_000;
pub const DEFAULT_SAFE_SCALE: f64 = 0.9;
pub const DEFAULT_MIN_SCALE: f64 = 0.2;
pub const DEFAULT_MAX_SCALE: f64 = 5.0;

/// Scalar or per-equation tolerance.
///
/// Converts from `f64`, arrays, slices and vectors, so either form can be passed wherever a
/// tolerance is expected. In JSON it is either a number or an array of numbers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tolerance {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Tolerance {
    /// Configured value for equation `index`, if the configuration provides one.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        match self {
            Tolerance::Scalar(v) => Some(*v),
            Tolerance::Vector(vs) => vs.get(index).copied(),
        }
    }

    /// Value used for equation `index`, falling back to `default` for sequences that are too short.
    pub fn value_or(&self, index: usize, default: f64) -> f64 {
        self.value_at(index).unwrap_or(default)
    }
}

impl From<f64> for Tolerance {
    fn from(val: f64) -> Self {
        Tolerance::Scalar(val)
    }
}

impl From<&[f64]> for Tolerance {
    fn from(val: &[f64]) -> Self {
        Tolerance::Vector(val.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Tolerance {
    fn from(val: [f64; N]) -> Self {
        Tolerance::Vector(val.to_vec())
    }
}

impl From<Vec<f64>> for Tolerance {
    fn from(val: Vec<f64>) -> Self {
        Tolerance::Vector(val)
    }
}

fn default_solver_name() -> String {
    DEFAULT_SOLVER_NAME.to_string()
}

fn default_abs_tol() -> Tolerance {
    Tolerance::Scalar(DEFAULT_ABS_TOL)
}

fn default_rel_tol() -> Tolerance {
    Tolerance::Scalar(DEFAULT_REL_TOL)
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

/// Solver dictionary: which family to build and how it controls its error.
///
/// Deserializes from a JSON object with camelCase keys, e.g.
///
/// ```json
/// { "solverName": "RKF45", "absTol": 1e-12, "relTol": [1e-6, 1e-8], "maxSteps": 5000 }
/// ```
///
/// Missing keys take their defaults, unknown keys are rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SolverConfig {
    #[serde(default = "default_solver_name")]
    pub solver_name: String,
    #[serde(default = "default_abs_tol")]
    pub abs_tol: Tolerance,
    #[serde(default = "default_rel_tol")]
    pub rel_tol: Tolerance,
    /// Cap on the number of sub-steps (and rejections) within one requested integration.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Safety factor in step-size prediction.
    #[serde(default)]
    pub safe_scale: Option<f64>,
    /// Smallest factor a step may shrink by in one rejection.
    #[serde(default)]
    pub min_scale: Option<f64>,
    /// Largest factor a step may grow by after one acceptance.
    #[serde(default)]
    pub max_scale: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SOLVER_NAME)
    }
}

impl SolverConfig {
    pub fn new(solver_name: impl Into<String>) -> Self {
        Self {
            solver_name: solver_name.into(),
            abs_tol: default_abs_tol(),
            rel_tol: default_rel_tol(),
            max_steps: DEFAULT_MAX_STEPS,
            safe_scale: None,
            min_scale: None,
            max_scale: None,
        }
    }

    pub fn set_abs_tol(mut self, abs_tol: impl Into<Tolerance>) -> Self {
        self.abs_tol = abs_tol.into();
        self
    }

    pub fn set_rel_tol(mut self, rel_tol: impl Into<Tolerance>) -> Self {
        self.rel_tol = rel_tol.into();
        self
    }

    pub fn set_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn set_safe_scale(mut self, safe_scale: f64) -> Self {
        self.safe_scale = Some(safe_scale);
        self
    }

    pub fn set_scale_limits(mut self, min_scale: f64, max_scale: f64) -> Self {
        self.min_scale = Some(min_scale);
        self.max_scale = Some(max_scale);
        self
    }

    pub fn safe_scale(&self) -> f64 {
        self.safe_scale.unwrap_or(DEFAULT_SAFE_SCALE)
    }

    pub fn min_scale(&self) -> f64 {
        self.min_scale.unwrap_or(DEFAULT_MIN_SCALE)
    }

    pub fn max_scale(&self) -> f64 {
        self.max_scale.unwrap_or(DEFAULT_MAX_SCALE)
    }

    /// Checks the options that do not depend on the number of equations.
    pub fn validate(&self) -> Result<(), OdeError> {
        if self.max_steps == 0 {
            return Err(OdeError::InvalidConfiguration(
                "maxSteps must be positive (got 0)".to_string(),
            ));
        }

        let safe_scale = self.safe_scale();
        if !(safe_scale > 1e-4 && safe_scale < 1.0) {
            return Err(OdeError::InvalidConfiguration(format!(
                "safeScale must be in (1e-4, 1.0) (got {})",
                safe_scale
            )));
        }

        let (min_scale, max_scale) = (self.min_scale(), self.max_scale());
        if !(min_scale > 0.0 && min_scale < 1.0) {
            return Err(OdeError::InvalidConfiguration(format!(
                "minScale must be in (0, 1) (got {})",
                min_scale
            )));
        }
        if !(max_scale > 1.0 && max_scale.is_finite()) {
            return Err(OdeError::InvalidConfiguration(format!(
                "maxScale must be finite and larger than 1 (got {})",
                max_scale
            )));
        }

        Ok(())
    }
}
