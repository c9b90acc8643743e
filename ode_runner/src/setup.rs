use std::env;
use std::error::Error;
use std::fs;
use std::path::Path;

use log::{error, info, LevelFilter};

/// Log level requested through `RUST_LOG`, or `Info` if unset.
///
/// An unrecognized value falls back to `Info` and is returned alongside so it can be reported
/// once logging is up.
pub fn log_level_from_env() -> (LevelFilter, Option<String>) {
    match env::var("RUST_LOG") {
        Ok(value) => parse_log_level(&value),
        Err(_) => (LevelFilter::Info, None),
    }
}

fn parse_log_level(value: &str) -> (LevelFilter, Option<String>) {
    match value.trim().parse::<LevelFilter>() {
        Ok(level) => (level, None),
        Err(_) => (LevelFilter::Info, Some(value.to_string())),
    }
}

/// Sends log records to stdout and to a freshly truncated file at `log_file_path`.
pub fn initialize_logging(log_file_path: &Path) -> Result<(), Box<dyn Error>> {
    let (level, unknown_level) = log_level_from_env();

    if let Some(log_dir) = log_file_path.parent() {
        fs::create_dir_all(log_dir)
            .map_err(|e| format!("Unable to create log directory '{}' ({:?})", log_dir.display(), e))?;
    }
    let log_file = fern::log_file(log_file_path)
        .and_then(|file| file.set_len(0).map(|_| file))
        .map_err(|e| format!("Unable to open log file '{}' ({:?})", log_file_path.display(), e))?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .chain(log_file)
        .apply()
        .map_err(|e| format!("Unable to apply logger configuration ({:?})", e))?;

    if let Some(value) = unknown_level {
        error!("Unknown log level '{}' in RUST_LOG, using INFO instead.", value);
    }
    Ok(())
}

/// Builds the global rayon pool. Zero threads leaves the choice to rayon.
pub fn initialize_thread_pool(num_threads: usize) -> Result<(), Box<dyn Error>> {
    rayon::ThreadPoolBuilder::new().num_threads(num_threads).build_global()?;

    let source = if num_threads > 0 {
        "command line"
    } else if env::var_os("RAYON_NUM_THREADS").is_some() {
        "environment"
    } else {
        "default"
    };
    info!("Rayon threads: {} ({})", rayon::current_num_threads(), source);
    Ok(())
}
