//! Tracing subscriber setup.
//!
//! Console output always; a daily rolling file when a log directory is
//! configured. `RUST_LOG` takes precedence over the configured level.

use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingSettings;

/// File name prefix for rolling log files.
pub const LOG_FILE_PREFIX: &str = "scanview.log";

/// Keeps background log writers alive. Drop it only at shutdown.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
    #[cfg(feature = "profiling")]
    _chrome: tracing_chrome::FlushGuard,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file", &self._file.is_some())
            .finish_non_exhaustive()
    }
}

/// Errors installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{0}'")]
    Filter(String),

    #[error("Cannot create log directory: {0}")]
    Directory(#[from] io::Error),

    #[error("A global tracing subscriber is already installed")]
    AlreadyInstalled,
}

fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|_| LoggingError::Filter(settings.level.clone())),
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Fails if the level is not a valid filter, the log directory cannot be
/// created, or a subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, LoggingError> {
    let filter = env_filter(settings)?;

    let console = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .with_writer(io::stderr);

    let (file_layer, file_guard) = match &settings.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    #[cfg(feature = "profiling")]
    let (chrome_layer, chrome_guard) = tracing_chrome::ChromeLayerBuilder::new()
        .include_args(true)
        .build();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer);

    #[cfg(feature = "profiling")]
    let registry = registry.with(chrome_layer);

    registry
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    Ok(LoggingGuard {
        _file: file_guard,
        #[cfg(feature = "profiling")]
        _chrome: chrome_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_reported() {
        let settings = LoggingSettings {
            level: "scanview=loud".to_string(),
            directory: None,
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(
                env_filter(&settings),
                Err(LoggingError::Filter(_))
            ));
        }
    }

    #[test]
    fn test_valid_level() {
        let settings = LoggingSettings::default();
        assert!(env_filter(&settings).is_ok());
    }
}
