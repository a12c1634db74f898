use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix; the daily appender suffixes it with the run date.
pub const LOG_FILE_PREFIX: &str = "salary-run.log";

/// Initializes console output plus one append-only log file per calendar day
/// (`<log_dir>/salary-run.log.YYYY-MM-DD`).
///
/// The returned guard must be held until exit so buffered lines reach the file.
pub fn init_logging(log_dir: &Path) -> WorkerGuard {
    // A missing directory is reported by the appender itself on first write
    let _ = fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Plain text: level, timestamp, originating module and message
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(non_blocking_writer);

    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("h1b_salary_etl=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
