//! Logging and tracing configuration
//!
//! Interactive commands log compactly to stderr. Test runs can additionally
//! keep a full-detail log file so a failed scenario can be replayed step by
//! step after the fact.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::paths;

const RUN_LOG: &str = "run.log";

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wallet_bdd=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for a test run (file + stderr logging)
///
/// The file gets everything at DEBUG for this crate, including step
/// expansion spans. The returned guard must be held until the run ends so
/// buffered lines are flushed.
pub fn init_run(log_dir: Option<&Path>) -> Option<(PathBuf, WorkerGuard)> {
    let dir = match log_dir {
        Some(dir) => Some(dir.to_path_buf()),
        None => paths::ensure_log_dir().ok().flatten(),
    };

    let Some(dir) = dir else {
        init_cli();
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        init_cli();
        return None;
    }

    let appender = tracing_appender::rolling::never(&dir, RUN_LOG);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter = EnvFilter::new("wallet_bdd=debug,info");
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wallet_bdd=warn"));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    use tracing_subscriber::Layer;
    tracing_subscriber::registry()
        .with(file_layer.with_filter(file_filter))
        .with(stderr_layer.with_filter(stderr_filter))
        .init();

    Some((dir.join(RUN_LOG), guard))
}
