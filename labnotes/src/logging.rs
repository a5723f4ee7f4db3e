//! Process-wide logging
//!
//! Built once at startup. The returned [`LogGuard`] flushes the file writer
//! when dropped, so the caller keeps it alive for the life of the process.

use crate::error::{AppError, Result};
use crate::services::settings::LogSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "labnotes.log";

/// Keeps the background log writer running
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// `RUST_LOG` when set, otherwise the configured level.
fn env_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Install the global subscriber: stderr always, plus a daily file under
/// `settings.directory` when enabled.
pub fn init(settings: &LogSettings) -> Result<LogGuard> {
    let (file_layer, file_guard) = if settings.file_enabled {
        std::fs::create_dir_all(&settings.directory)?;
        let appender = tracing_appender::rolling::daily(&settings.directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter(settings))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Generic(format!("Failed to initialise logging: {}", e)))?;

    if settings.file_enabled {
        tracing::info!("Writing logs to {:?}", settings.directory);
    }

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
