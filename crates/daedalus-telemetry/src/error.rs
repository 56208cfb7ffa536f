//! Telemetry error types.

use thiserror::Error;

/// Errors raised while setting up logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The metrics recorder could not be installed.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// The log subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Rendered metrics could not be written.
    #[error("Failed to write metrics to {path}: {source}")]
    MetricsWrite {
        /// Destination file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl TelemetryError {
    /// Creates a logging initialization error.
    pub fn logging(message: impl Into<String>) -> Self {
        Self::LoggingInit(message.into())
    }

    /// Creates a metrics initialization error.
    pub fn metrics(message: impl Into<String>) -> Self {
        Self::MetricsInit(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TelemetryError::metrics("already installed").to_string(),
            "Failed to initialize metrics: already installed"
        );
        assert_eq!(
            TelemetryError::logging("bad filter").to_string(),
            "Failed to initialize logging: bad filter"
        );
    }

    #[test]
    fn test_write_error_names_path() {
        let err = TelemetryError::MetricsWrite {
            path: "out/metrics.prom".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("out/metrics.prom"));
    }
}
