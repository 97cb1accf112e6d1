use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Could not open log source {}: {source}", .path.display())]
    LogSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MonitorError {
    pub fn log_source(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MonitorError::LogSource {
            path: path.into(),
            source,
        }
    }

    /// Whether the process should stop instead of degrading silently
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::LogSource { .. } | MonitorError::ConfigError(_)
        )
    }
}

impl From<prometheus::Error> for MonitorError {
    fn from(err: prometheus::Error) -> Self {
        MonitorError::MetricsError(err.to_string())
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
