use std::env;
use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use coarse_prof::profile;
use log::{error, info, warn};
use nalgebra::DVector;
use rayon::prelude::*;
use structopt::StructOpt;

use ode_runner::problems::{available_problems, load_problem, CellSetup, Problem};
use ode_runner::report::{CellReport, ProblemReport};
use ode_runner::setup::{initialize_logging, initialize_thread_pool};
use ode_toolbox::{create_solver, OdeError, SolverConfig};

static BUILD_TIMESTAMP: Option<&'static str> = option_env!("ODE_RUNNER_BUILD_TIMESTAMP");
static BUILD_HOSTNAME: Option<&'static str> = option_env!("ODE_RUNNER_BUILD_HOSTNAME");
static GIT_LAST_COMMIT: Option<&'static str> = option_env!("ODE_RUNNER_GIT_LAST_COMMIT");

#[derive(Debug, StructOpt)]
struct CommandlineArgs {
    #[structopt(
        short = "-p",
        long = "--problem",
        help = "Name of problem to integrate",
        required_unless = "list-problems"
    )]
    problem: Option<String>,
    #[structopt(short = "-l", long = "--list-problems", help = "List available problems")]
    list_problems: bool,
    #[structopt(
        long,
        parse(from_os_str),
        help = "JSON file with a solver configuration per problem name"
    )]
    config_file: Option<PathBuf>,
    #[structopt(long, help = "Overrides the end of the integration interval")]
    x_end: Option<f64>,
    #[structopt(
        long,
        default_value = "10",
        help = "Number of outer steps, each integrated with one call to the solver"
    )]
    outer_steps: usize,
    #[structopt(long, default_value = "1", help = "Number of independent cells to integrate")]
    cells: usize,
    #[structopt(
        long,
        default_value = "data",
        parse(from_os_str),
        help = "Base directory for output files"
    )]
    output_dir: PathBuf,
    #[structopt(
        long,
        parse(from_os_str),
        help = "Path for the logfile relative to 'output-dir/problem-name'"
    )]
    log_file: Option<PathBuf>,
    #[structopt(
        long,
        default_value = "0",
        help = "The number of threads to use for the rayon thread pool, if not specified it will be read from env or default rayon value"
    )]
    num_threads: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = CommandlineArgs::from_args();
    if args.list_problems {
        list_problems()?;
    } else {
        initialize_logging(&log_file_path(&args))?;
        initialize_thread_pool(args.num_threads)?;

        info!("Started ode_runner");
        print_build_info();

        info!("Running on '{}'", hostname::get()?.to_string_lossy());
        info!("Working directory: '{}'", env::current_dir()?.to_string_lossy());
        info!("Full command line: '{}'", env::args().collect::<Vec<_>>().join(" "));

        if let Err(err) = run_problem(&args) {
            error!("Problem returned error: {}", err);
            error!("Aborting.");
            return Err(err);
        }
        info!("Exiting.");
    }

    Ok(())
}

/// Log file inside `output-dir/problem-name`, named by start time unless given explicitly.
fn log_file_path(args: &CommandlineArgs) -> PathBuf {
    let log_dir = match &args.problem {
        Some(problem_name) => args.output_dir.join(problem_name),
        None => args.output_dir.clone(),
    };
    match &args.log_file {
        Some(log_file_name) => log_dir.join(log_file_name),
        None => log_dir.join(format!(
            "ode_runner_{}.log",
            chrono::Local::now().format("%F_%H-%M-%S-%6f")
        )),
    }
}

fn list_problems() -> Result<(), Box<dyn Error>> {
    println!("Available problems: ");
    for problem in available_problems() {
        println!("  - {}", problem);
    }
    println!("Available solvers: ");
    for solver in ode_toolbox::available_solvers()? {
        println!("  - {}", solver);
    }
    Ok(())
}

/// Reads the solver configuration for `problem_name` from a JSON object keyed by problem names.
fn load_solver_config(config_path: &Path, problem_name: &str) -> Result<Option<SolverConfig>, Box<dyn Error>> {
    let json_string = fs::read_to_string(config_path).map_err(|e| {
        format!(
            "Unable to open JSON file '{}' for reading ({:?})",
            config_path.to_string_lossy(),
            e
        )
    })?;

    let json: serde_json::Value = serde_json::from_str(&json_string).map_err(|e| {
        format!(
            "Error during parsing of JSON file '{}': {}",
            config_path.to_string_lossy(),
            e
        )
    })?;
    let json = json.as_object().ok_or_else(|| {
        format!(
            "Expected a JSON object on the highest level in config file {}",
            config_path.to_string_lossy()
        )
    })?;

    match json.get(problem_name) {
        Some(problem_config) => {
            let config = serde_json::from_value(problem_config.clone())
                .map_err(|e| format!("Invalid solver configuration for problem `{}`: {}", problem_name, e))?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

fn run_problem(args: &CommandlineArgs) -> Result<(), Box<dyn Error>> {
    let problem_name = args
        .problem
        .as_ref()
        .ok_or("No problem name given")?;

    info!("Starting to load problem {}.", problem_name);
    let mut problem = load_problem(problem_name)?;
    info!("Loaded problem {}.", problem_name);

    if let Some(config_path) = &args.config_file {
        match load_solver_config(config_path, problem_name)? {
            Some(config) => problem.solver_config = config,
            None => warn!(
                "Did not find entry for problem `{}` in config file `{}`, using defaults",
                problem_name,
                config_path.to_string_lossy()
            ),
        }
    }
    problem.solver_config.validate()?;

    if let Some(x_end) = args.x_end {
        info!(
            "Overriding end of integration interval set by problem. Original: {}. New: {}.",
            problem.x_end, x_end
        );
        problem.x_end = x_end;
    }
    if args.outer_steps == 0 {
        return Err(Box::from("The number of outer steps must be positive"));
    }

    info!(
        "Integrating {} cell(s) over [{}, {}] in {} outer steps with solver {}.",
        args.cells, problem.x_start, problem.x_end, args.outer_steps, problem.solver_config.solver_name
    );

    let t_start = Instant::now();
    let results: Vec<Result<CellReport, OdeError>> = {
        profile!("integrate_cells");
        (0..args.cells)
            .into_par_iter()
            .map(|cell| integrate_cell(&problem, cell, args.cells, args.outer_steps))
            .collect()
    };
    info!("Measured time for integration: {:.6}s", t_start.elapsed().as_secs_f64());

    let report = ProblemReport::from_results(&problem.name, &problem.solver_config, args.outer_steps, results);
    log_summary(&report);

    {
        profile!("write_output");
        write_report(args, &report)?;
    }

    coarse_prof_write_string()?
        .split('\n')
        .for_each(|l| info!("{}", l));

    if !report.is_complete() {
        return Err(Box::from(format!(
            "{} of {} cell(s) failed, see the failed_cells entries of the results",
            report.failed_cells.len(),
            args.cells
        )));
    }
    info!("Integration finished.");

    Ok(())
}

/// Integrates one cell with its own system and solver, one `solve_range` call per outer step.
fn integrate_cell(problem: &Problem, cell: usize, num_cells: usize, outer_steps: usize) -> Result<CellReport, OdeError> {
    let CellSetup { system, initial_state } = (problem.new_cell)(cell, num_cells);
    let mut y = initial_state;
    let mut solver = create_solver(system.as_ode_system(), &problem.solver_config)?;

    let dx_outer = (problem.x_end - problem.x_start) / outer_steps as f64;
    let mut dx = problem.initial_step.abs() * dx_outer.signum();
    for step in 0..outer_steps {
        let x0 = problem.x_start + step as f64 * dx_outer;
        let x1 = if step + 1 == outer_steps {
            problem.x_end
        } else {
            x0 + dx_outer
        };

        if system.update(x0, &mut y) {
            solver.resize()?;
        }
        solver.solve_range(x0, x1, &mut y, &mut dx)?;
    }

    let max_error = system
        .exact_solution(problem.x_end)
        .map(|exact: DVector<f64>| (&y - exact).amax());

    Ok(CellReport {
        cell,
        x: problem.x_end,
        state: y.as_slice().to_vec(),
        stats: solver.stats(),
        max_error,
        next_step: dx,
    })
}

fn log_summary(report: &ProblemReport) {
    let total = report.total_stats();
    info!(
        "{} cell(s) finished, {} failed: {} accepted steps, {} rejected steps, {} derivative evaluations",
        report.cells.len(),
        report.failed_cells.len(),
        total.accepted_steps,
        total.rejected_steps,
        total.derivative_evals
    );

    if let Some(max_error) = report.max_error() {
        info!("Maximum deviation from exact solution: {:e}", max_error);
    }
    if let Some(first) = report.cells.first() {
        info!("Final state of cell {}: {:?}", first.cell, first.state);
    }
}

fn write_report(args: &CommandlineArgs, report: &ProblemReport) -> Result<(), Box<dyn Error>> {
    let output_dir = args.output_dir.join(report.problem);
    fs::create_dir_all(&output_dir)?;

    let json = serde_json::to_string_pretty(report)?;

    let output_path = output_dir.join("results.json");
    let mut json_file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&output_path)?;
    json_file.write_all(json.as_bytes())?;
    info!("Wrote results to '{}'", output_path.to_string_lossy());

    Ok(())
}

fn print_build_info() {
    info!("Build info");
    info!("\tBuild timestamp: {}", BUILD_TIMESTAMP.unwrap_or("Unknown"));
    info!("\tBuild hostname: '{}'", BUILD_HOSTNAME.unwrap_or("Unknown"));

    if let Some(last_commit) = GIT_LAST_COMMIT {
        for line in last_commit.split(';') {
            info!("\t\t{}", line);
        }
    } else {
        warn!("\tGit commit information was unavailable at build time");
    }
}

/// Returns the coarse_prof write output as a string
fn coarse_prof_write_string() -> Result<String, Box<dyn Error>> {
    let mut buffer = Vec::new();
    coarse_prof::write(&mut buffer)?;
    Ok(String::from_utf8_lossy(buffer.as_slice()).into_owned())
}
