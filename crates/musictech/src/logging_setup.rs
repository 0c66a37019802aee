//! Tracing subscriber for the host process
//!
//! Console output goes to stderr. File output is written off the render
//! thread and named after the session's engine, so logs from different
//! visualizers can be told apart in one log directory.

use crate::config::HostConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Keeps the non-blocking file writer alive; logs are flushed on drop
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Log file for this session: the configured per-process path with the
/// engine id spliced in, e.g. `logs/musictech-mandelbrot-4242.log`
pub fn session_log_path(config: &HostConfig) -> PathBuf {
    let base = config.log.current_log_path();
    let engine = config.session.engine.trim().to_ascii_lowercase().replace(' ', "-");
    match base.file_name().and_then(|n| n.to_str()) {
        Some(name) => match name.split_once('-') {
            Some((prefix, rest)) => base.with_file_name(format!("{prefix}-{engine}-{rest}")),
            None => base.with_file_name(format!("{engine}-{name}")),
        },
        None => base,
    }
}

/// Install the global subscriber for `config`
pub fn init(config: &HostConfig) -> Result<Option<LogGuard>> {
    let log = &config.log;
    log.ensure_log_directory()
        .context("Failed to create log directory")?;

    match log.cleanup_old_logs() {
        Ok(0) => {}
        Ok(removed) => eprintln!("Removed {} old log file(s)", removed),
        Err(e) => eprintln!("Warning: Failed to cleanup old log files: {}", e),
    }

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::builder()
        .with_default_directive(log.parse_level().into())
        .from_env_lossy();

    let console_layer = log.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter.clone())
    });

    let (file_layer, guard) = if log.file_output {
        let path = session_log_path(config);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Log path has no file name")?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(stem)
            .filename_suffix("log")
            .build(&log.log_directory)
            .with_context(|| format!("Failed to create log file: {:?}", path))?;
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        eprintln!("Logging to file: {:?}", path);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_thread_names(true)
            .with_filter(filter);
        (Some(layer), Some(LogGuard { _guard: worker_guard }))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    tracing::info!(
        "Logging initialized at level {} for engine '{}' ({}x{})",
        log.level,
        config.session.engine,
        config.session.width,
        config.session.height
    );
    Ok(guard)
}
