use log::warn;
use ode_toolbox::{OdeError, SolverConfig, SolverStats};
use serde::Serialize;

/// Result of integrating a single cell.
#[derive(Debug, Serialize)]
pub struct CellReport {
    pub cell: usize,
    pub x: f64,
    pub state: Vec<f64>,
    pub stats: SolverStats,
    /// Maximum deviation from the exact solution, if the problem has one
    pub max_error: Option<f64>,
    /// Recommended step size for a subsequent integration
    pub next_step: f64,
}

#[derive(Debug, Serialize)]
pub struct FailedCell {
    pub cell: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ProblemReport<'a> {
    pub problem: &'a str,
    pub solver_config: &'a SolverConfig,
    pub outer_steps: usize,
    pub cells: Vec<CellReport>,
    pub failed_cells: Vec<FailedCell>,
}

impl<'a> ProblemReport<'a> {
    /// Splits per-cell results, ordered by cell index, into finished and failed cells.
    pub fn from_results(
        problem: &'a str,
        solver_config: &'a SolverConfig,
        outer_steps: usize,
        results: Vec<Result<CellReport, OdeError>>,
    ) -> Self {
        let mut cells = Vec::with_capacity(results.len());
        let mut failed_cells = Vec::new();
        for (cell, result) in results.into_iter().enumerate() {
            match result {
                Ok(report) => cells.push(report),
                Err(err) => {
                    warn!("Integration of cell {} failed: {}", cell, err);
                    failed_cells.push(FailedCell {
                        cell,
                        error: err.to_string(),
                    });
                }
            }
        }

        Self {
            problem,
            solver_config,
            outer_steps,
            cells,
            failed_cells,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed_cells.is_empty()
    }

    pub fn total_stats(&self) -> SolverStats {
        self.cells.iter().fold(SolverStats::default(), |mut total, report| {
            total.accepted_steps += report.stats.accepted_steps;
            total.rejected_steps += report.stats.rejected_steps;
            total.derivative_evals += report.stats.derivative_evals;
            total
        })
    }

    /// Largest deviation from the exact solution over all finished cells that have one.
    pub fn max_error(&self) -> Option<f64> {
        self.cells
            .iter()
            .filter_map(|report| report.max_error)
            .fold(None, |max: Option<f64>, e| Some(max.map_or(e, |m| m.max(e))))
    }
}
