//! The build pipeline: compile, write units, write the manifest, prune.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use daedalus_codegen::{CompileError, CompiledController, CompilerOptions, RouteCompiler};
use daedalus_config::{DaedalusConfig, LogFormat as ConfigLogFormat};
use daedalus_model::ControllerDescriptor;
use daedalus_telemetry::metrics::{
    record_compile_duration, record_compile_failure, record_unit, record_unit_write,
};
use daedalus_telemetry::{LogConfig, LogFormat, MetricsConfig, MetricsRegistry, TelemetryConfig};
use tracing::{info, info_span, warn};

use crate::descriptors::load_descriptors;
use crate::error::{BuildError, BuildResult};
use crate::manifest::Manifest;
use crate::writer::{OutputWriter, WriteOutcome};

/// Summary of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Controllers compiled.
    pub controllers: usize,
    /// Units generated.
    pub units: usize,
    /// Unit files created or replaced.
    pub written: usize,
    /// Unit files left untouched because their bytes did not change.
    pub unchanged: usize,
    /// Files of units no longer generated that were deleted.
    pub pruned: Vec<String>,
    /// Total encoded size of all units.
    pub bytes: usize,
    /// The manifest written.
    pub manifest: Manifest,
    /// Path of the manifest file.
    pub manifest_path: PathBuf,
}

/// Derives the telemetry settings from the build configuration.
#[must_use]
pub fn telemetry_config(config: &DaedalusConfig) -> TelemetryConfig {
    let logging = &config.logging;
    TelemetryConfig {
        logging: LogConfig {
            enabled: logging.enabled,
            level: logging.level.clone(),
            format: match logging.format {
                ConfigLogFormat::Json => LogFormat::Json,
                ConfigLogFormat::Pretty => LogFormat::Pretty,
                ConfigLogFormat::Compact => LogFormat::Compact,
            },
            span_events: false,
            file_line_info: logging.include_location,
            include_target: true,
            ansi: logging.ansi_enabled,
        },
        metrics: MetricsConfig {
            enabled: config.metrics.enabled,
        },
    }
}

/// Runs builds with one configuration.
///
/// # Example
///
/// ```no_run
/// use daedalus_build::RouteBuild;
/// use daedalus_config::ConfigLoader;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConfigLoader::new().with_optional_file("daedalus.toml")?.load()?;
/// let report = RouteBuild::new(config).run_files(&["descriptors".into()])?;
/// println!("{} units, {} written", report.units, report.written);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RouteBuild {
    config: DaedalusConfig,
    compiler: RouteCompiler,
    metrics: Option<MetricsRegistry>,
}

impl RouteBuild {
    /// Creates a build for `config`.
    pub fn new(config: DaedalusConfig) -> Self {
        let compiler = RouteCompiler::new(CompilerOptions {
            excluded_attributes: config.compiler.excluded_attributes.clone(),
        });
        Self {
            config,
            compiler,
            metrics: None,
        }
    }

    /// Renders `registry` to the configured metrics file after each build.
    #[must_use]
    pub fn with_metrics(mut self, registry: Option<MetricsRegistry>) -> Self {
        self.metrics = registry;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &DaedalusConfig {
        &self.config
    }

    /// Loads descriptor files (or directories of them) and builds.
    ///
    /// # Errors
    ///
    /// See [`load_descriptors`] and [`run`](Self::run).
    pub fn run_files(&self, inputs: &[PathBuf]) -> BuildResult<BuildReport> {
        let controllers = load_descriptors(inputs)?;
        self.run(&controllers)
    }

    /// Compiles `controllers` and writes the output.
    ///
    /// Nothing is written unless every controller compiles.
    ///
    /// # Errors
    ///
    /// Returns compile failures, then I/O and telemetry failures.
    pub fn run(&self, controllers: &[ControllerDescriptor]) -> BuildResult<BuildReport> {
        let span = info_span!("build", output = %self.config.output.dir.display());
        let _guard = span.enter();

        let compiled = self.compile(controllers)?;
        let report = self.write(&compiled)?;
        if let (Some(registry), Some(path)) = (&self.metrics, &self.config.metrics.output_file) {
            registry.write_to(path)?;
        }
        info!(
            controllers = report.controllers,
            units = report.units,
            written = report.written,
            unchanged = report.unchanged,
            pruned = report.pruned.len(),
            "build finished"
        );
        Ok(report)
    }

    /// Compiles every controller.
    ///
    /// With `fail_fast` the first failure is returned as
    /// [`BuildError::Compile`]; otherwise all controllers are attempted and
    /// the failures are returned together as [`BuildError::Failed`].
    ///
    /// # Errors
    ///
    /// Returns compile failures, including controllers declared twice.
    pub fn compile(
        &self,
        controllers: &[ControllerDescriptor],
    ) -> BuildResult<Vec<CompiledController>> {
        let fail_fast = self.config.compiler.fail_fast;
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(controllers.len());
        let mut failures = Vec::new();

        for controller in controllers {
            let result = if seen.insert(controller.name.as_str()) {
                let started = Instant::now();
                let result = self.compiler.compile_controller(controller);
                record_compile_duration(started.elapsed());
                result
            } else {
                Err(CompileError::invalid_controller(
                    &controller.name,
                    "controller is declared more than once",
                ))
            };

            match result {
                Ok(units) => {
                    for unit in units.units() {
                        record_unit(unit.kind.as_str(), unit.bytes.len());
                    }
                    compiled.push(units);
                }
                Err(err) => {
                    record_compile_failure(err.class());
                    warn!(controller = %controller.name, error = %err, "compilation failed");
                    if fail_fast {
                        return Err(BuildError::compile(&controller.name, err));
                    }
                    failures.push((controller.name.clone(), err));
                }
            }
        }

        if failures.is_empty() {
            Ok(compiled)
        } else {
            Err(BuildError::Failed { failures })
        }
    }

    /// Writes unit files and the manifest, then prunes stale units.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] or [`BuildError::InvalidUnitName`].
    pub fn write(&self, compiled: &[CompiledController]) -> BuildResult<BuildReport> {
        let output = &self.config.output;
        let writer = OutputWriter::new(&output.dir, output.incremental);
        writer.prepare()?;

        let manifest_path = output.dir.join(&output.manifest_name);
        let previous = Manifest::read(&manifest_path);
        let manifest = Manifest::from_compiled(compiled, &output.unit_extension)?;

        let mut report = BuildReport {
            controllers: compiled.len(),
            ..BuildReport::default()
        };
        let units = compiled.iter().flat_map(|c| c.units());
        for (unit, entry) in units.zip(&manifest.units) {
            let outcome = writer.write(&entry.file, &unit.bytes)?;
            record_unit_write(outcome.as_str());
            match outcome {
                WriteOutcome::Written => report.written += 1,
                WriteOutcome::Unchanged => report.unchanged += 1,
            }
            report.units += 1;
            report.bytes += unit.bytes.len();
        }

        if output.prune_stale {
            if let Some(previous) = &previous {
                for stale in manifest.stale_in(previous) {
                    if writer.remove(&stale.file)? {
                        record_unit_write("pruned");
                        info!(unit = %stale.name, file = %stale.file, "pruned stale unit");
                        report.pruned.push(stale.file.clone());
                    }
                }
            }
        }

        let json = manifest.to_json(&manifest_path)?;
        writer.write(&output.manifest_name, &json)?;

        report.manifest = manifest;
        report.manifest_path = manifest_path;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_mapping() {
        let mut config = DaedalusConfig::development();
        config.logging.format = ConfigLogFormat::Compact;
        let telemetry = telemetry_config(&config);
        assert_eq!(telemetry.logging.level, "debug");
        assert_eq!(telemetry.logging.format, LogFormat::Compact);
        assert!(telemetry.logging.file_line_info);
        assert!(telemetry.logging.ansi);
        assert!(!telemetry.metrics.enabled);
    }
}
