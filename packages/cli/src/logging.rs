use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "kgrec.log";

/// Keeps the file writer flushing until dropped at the end of `main`
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

fn daily_file_writer(log_dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

/// Stderr output always; a daily file under `log_dir` when file logs are on.
/// An unusable log directory is reported once the stderr layer is live.
pub fn init_tracing(config: &Config) -> Option<FileLogGuard> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let file = config
        .file_logs
        .then(|| daily_file_writer(&config.log_dir));
    let (file_layer, guard, file_error) = match file {
        Some(Ok((writer, guard))) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard), None)
        }
        Some(Err(err)) => (None, None, Some(err)),
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .init();

    if let Some(err) = file_error {
        tracing::warn!(
            log_dir = %config.log_dir.display(),
            error = %err,
            "file logging disabled"
        );
    }

    guard.map(|guard| FileLogGuard { _guard: guard })
}
