//! Logging and metrics for the Daedalus route compiler.
//!
//! - **Logging**: `tracing-subscriber` output in JSON or human-readable form
//! - **Metrics**: build counters via the `metrics` crate, rendered in
//!   Prometheus text format
//!
//! # Example
//!
//! ```rust,ignore
//! use daedalus_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let registry = init_telemetry(&TelemetryConfig::default())?;
//! // ... compile ...
//! if let Some(registry) = registry {
//!     registry.write_to("target/daedalus-metrics.prom".as_ref())?;
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};
pub use self::metrics::{init_metrics, MetricsConfig, MetricsRegistry};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Configuration for logging and metrics together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Logging configuration.
    pub logging: LogConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

/// Installs logging, then metrics.
///
/// Returns the metrics registry when metrics are enabled.
///
/// # Errors
///
/// Returns the first subsystem failure.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_telemetry() {
        let config = TelemetryConfig {
            logging: LogConfig {
                enabled: false,
                ..LogConfig::default()
            },
            metrics: MetricsConfig::default(),
        };
        assert!(init_telemetry(&config).unwrap().is_none());
    }
}
