//! Tracing configuration and log routing.
//!
//! Console output goes to stderr so the MCP binary can keep stdout for protocol frames. Logs are
//! also appended to `DOCUSMART_LOG_FILE` when set, or to `logs/docusmart.log` otherwise.
use std::{fs::OpenOptions, path::Path, sync::OnceLock};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_ENV: &str = "DOCUSMART_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "docusmart.log";

/// Install the global subscriber: stderr always, plus a file sink when one can be opened.
///
/// Filtering follows `RUST_LOG` and falls back to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    let file = log_writer().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();
}

fn log_writer() -> Option<NonBlocking> {
    match std::env::var(LOG_FILE_ENV) {
        Ok(path) => append_to(Path::new(&path)),
        Err(_) => {
            if let Err(err) = std::fs::create_dir_all(DEFAULT_LOG_DIR) {
                eprintln!("Cannot create {DEFAULT_LOG_DIR}/ for logs: {err}");
                return None;
            }
            Some(keep_alive(tracing_appender::non_blocking(
                tracing_appender::rolling::never(DEFAULT_LOG_DIR, DEFAULT_LOG_FILE),
            )))
        }
    }
}

fn append_to(path: &Path) -> Option<NonBlocking> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(keep_alive(tracing_appender::non_blocking(file))),
        Err(err) => {
            eprintln!("Cannot open log file {}: {err}", path.display());
            None
        }
    }
}

/// The guard flushes on drop, so it lives for the whole process.
fn keep_alive((writer, guard): (NonBlocking, WorkerGuard)) -> NonBlocking {
    let _ = LOG_GUARD.set(guard);
    writer
}
