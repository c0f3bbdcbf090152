use anyhow::{Context, Result};
use std::{fs, path::Path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt,
    prelude::*,
};

/// Installs the global subscriber: stdout plus an append-only log file.
///
/// The file always records debug output from this crate. Stdout drops it when
/// `quiet_debug` is set. Keep the returned guard alive until shutdown so
/// buffered file output is flushed.
pub fn init(log_file: &Path, quiet_debug: bool) -> Result<WorkerGuard> {
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = log_file
        .file_name()
        .with_context(|| format!("LOG_FILE {} has no file name", log_file.display()))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    let stdout_level = if quiet_debug {
        LevelFilter::INFO
    } else {
        LevelFilter::DEBUG
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter_for(stdout_level)))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter_for(LevelFilter::DEBUG)),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// Our own targets at `level`; dependencies stay at info.
fn filter_for(level: LevelFilter) -> Targets {
    Targets::new()
        .with_target(env!("CARGO_CRATE_NAME"), level)
        .with_target("tower_http", level)
        .with_default(LevelFilter::INFO)
}
