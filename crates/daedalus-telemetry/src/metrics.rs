//! Build metrics.
//!
//! Counters are recorded through the `metrics` facade and rendered in
//! Prometheus text format. A build has no scrape endpoint, so the rendered
//! text is written to a file when requested.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `daedalus_units_generated_total` | Counter | `kind` | Units generated |
//! | `daedalus_unit_bytes_total` | Counter | `kind` | Encoded unit bytes |
//! | `daedalus_compile_failures_total` | Counter | `error` | Controllers that failed to compile |
//! | `daedalus_unit_writes_total` | Counter | `outcome` | Unit files written, unchanged or pruned |
//! | `daedalus_compile_duration_seconds` | Histogram | - | Per-controller compile time |

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// `daedalus_units_generated_total`
pub const UNITS_GENERATED: &str = "daedalus_units_generated_total";
/// `daedalus_unit_bytes_total`
pub const UNIT_BYTES: &str = "daedalus_unit_bytes_total";
/// `daedalus_compile_failures_total`
pub const COMPILE_FAILURES: &str = "daedalus_compile_failures_total";
/// `daedalus_unit_writes_total`
pub const UNIT_WRITES: &str = "daedalus_unit_writes_total";
/// `daedalus_compile_duration_seconds`
pub const COMPILE_DURATION: &str = "daedalus_compile_duration_seconds";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether a global recorder is installed.
    pub enabled: bool,
}

/// Renders recorded metrics.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Wraps an exporter handle.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// A recorder that is not installed globally, with its registry.
    ///
    /// Use it with [`metrics::with_local_recorder`].
    #[must_use]
    pub fn local() -> (PrometheusRecorder, Self) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let registry = Self::new(recorder.handle());
        (recorder, registry)
    }

    /// The global registry, if [`init_metrics`] installed one.
    #[must_use]
    pub fn global() -> Option<Self> {
        METRICS_HANDLE.get().cloned().map(Self::new)
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Writes the rendered metrics to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::MetricsWrite`] if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> TelemetryResult<()> {
        std::fs::write(path, self.render()).map_err(|source| TelemetryError::MetricsWrite {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Installs the global Prometheus recorder.
///
/// Installing twice fails; the first registry stays active.
///
/// # Errors
///
/// Returns [`TelemetryError::MetricsInit`] if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::metrics(e.to_string()))?;
    let _ = METRICS_HANDLE.set(handle.clone());
    describe_metrics();

    Ok(Some(MetricsRegistry::new(handle)))
}

fn describe_metrics() {
    describe_counter!(UNITS_GENERATED, "Units generated, by kind");
    describe_counter!(UNIT_BYTES, Unit::Bytes, "Encoded size of generated units");
    describe_counter!(COMPILE_FAILURES, "Controllers that failed to compile");
    describe_counter!(UNIT_WRITES, "Unit files by write outcome");
    describe_histogram!(
        COMPILE_DURATION,
        Unit::Seconds,
        "Time spent compiling one controller"
    );
}

/// Records one generated unit of `kind` (`handler` or `registration`).
pub fn record_unit(kind: &str, bytes: usize) {
    counter!(UNITS_GENERATED, "kind" => kind.to_string()).increment(1);
    counter!(UNIT_BYTES, "kind" => kind.to_string())
        .increment(u64::try_from(bytes).unwrap_or(u64::MAX));
}

/// Records a controller that failed to compile with error class `error`.
pub fn record_compile_failure(error: &str) {
    counter!(COMPILE_FAILURES, "error" => error.to_string()).increment(1);
}

/// Records the outcome of writing one unit file.
pub fn record_unit_write(outcome: &str) {
    counter!(UNIT_WRITES, "outcome" => outcome.to_string()).increment(1);
}

/// Records the compile time of one controller.
pub fn record_compile_duration(duration: Duration) {
    histogram!(COMPILE_DURATION).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_disabled() {
        assert!(!MetricsConfig::default().enabled);
        assert!(init_metrics(&MetricsConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_local_recorder_renders_counters() {
        let (recorder, registry) = MetricsRegistry::local();
        metrics::with_local_recorder(&recorder, || {
            record_unit("handler", 120);
            record_unit("handler", 80);
            record_unit("registration", 50);
            record_compile_failure("unsupported_binding");
            record_unit_write("unchanged");
        });

        let text = registry.render();
        assert!(text.contains(r#"daedalus_units_generated_total{kind="handler"} 2"#));
        assert!(text.contains(r#"daedalus_units_generated_total{kind="registration"} 1"#));
        assert!(text.contains(r#"daedalus_unit_bytes_total{kind="handler"} 200"#));
        assert!(text.contains(r#"daedalus_compile_failures_total{error="unsupported_binding"} 1"#));
        assert!(text.contains(r#"daedalus_unit_writes_total{outcome="unchanged"} 1"#));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_unit("handler", 1);
        record_compile_duration(Duration::from_millis(3));
    }
}
