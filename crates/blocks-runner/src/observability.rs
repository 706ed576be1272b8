//! # Tracing Setup
//!
//! ## Logging Architecture
//! - **stdout**: WARN only (CLI output stays readable and pipeable)
//! - **file**: INFO for blocks crates, WARN for deps (daily rotation)
//! - **RUST_LOG**: Honored for file logs only; stdout always bounded to WARN

use std::{fs, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default file filter: our crates at INFO, everything else at WARN.
pub const DEFAULT_FILE_FILTER: &str = "blocks=info,warn";

/// Guards that must be held for the lifetime of the process.
/// Dropping this will cause buffered logs to be lost.
pub struct TracingGuards {
    _file_guard: WorkerGuard,
}

/// Ensures the logs directory exists.
fn ensure_log_dir(dir: &Path) {
    if !dir.exists() {
        // Best effort: stdout logging still works without it.
        let _ = fs::create_dir_all(dir);
    }
}

/// Initializes tracing with bounded stdout + rotated file logs.
///
/// # Logging Policy
/// - **stdout**: Always WARN only (ignores RUST_LOG), compact, no target
/// - **file**: `blocks=info,warn` unless RUST_LOG is set
///   - Daily rotation to `{log_dir}/{service_name}.log`
///   - Non-blocking writer, full metadata
///
/// Must be called at most once per process.
pub fn init_tracing(service_name: &str, log_dir: &Path) -> TracingGuards {
    ensure_log_dir(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, format!("{}.log", service_name));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let stdout_filter = EnvFilter::new("warn");
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILE_FILTER));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(true)
        .compact()
        .with_filter(stdout_filter);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_filter(file_filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    tracing::info!(
        "Tracing initialized for {} (stdout=WARN, file={}/{}.log)",
        service_name,
        log_dir.display(),
        service_name
    );

    TracingGuards {
        _file_guard: file_guard,
    }
}
