#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::CommanderError;

pub const LOG_FILE_PREFIX: &str = "cpmcommander.log";

/// Sends events to a daily file under `log_dir`; the terminal belongs to the
/// panels. `RUST_LOG` refines the filter, `debug` raises it to debug.
///
/// Keep the guard alive until exit, or buffered lines are lost.
pub fn init(log_dir: &Path, debug: bool) -> Result<WorkerGuard, CommanderError> {
    fs::create_dir_all(log_dir)
        .map_err(|err| CommanderError::Config(format!("cannot create {}: {err}", log_dir.display())))?;
    let (writer, guard) = tracing_appender::non_blocking(daily(log_dir, LOG_FILE_PREFIX));

    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    if debug {
        filter = filter.add_directive(LevelFilter::DEBUG.into());
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false).with_filter(filter))
        .try_init()
        .map_err(|err| CommanderError::Config(err.to_string()))?;
    Ok(guard)
}
