//! The top-level [`DaedalusConfig`].

use serde::{Deserialize, Serialize};

use crate::{CompilerConfig, ConfigError, LogFormat, LoggingConfig, MetricsConfig, OutputConfig};

/// Complete route compiler configuration.
///
/// # Example
///
/// ```
/// use daedalus_config::DaedalusConfig;
///
/// let config = DaedalusConfig::default();
/// assert!(config.output.incremental);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct DaedalusConfig {
    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Compiler settings.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DaedalusConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> DaedalusConfigBuilder {
        DaedalusConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - the output directory or manifest name is empty
    /// - the manifest name contains a path separator
    /// - the unit extension is empty or contains `.` or a path separator
    /// - an excluded attribute name is empty
    /// - the log level is empty
    ///
    /// Returns `ConfigError::Conflict` if a metrics output file is set
    /// while metrics are disabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value("output.dir", "must not be empty"));
        }
        if self.output.manifest_name.is_empty() {
            return Err(ConfigError::invalid_value(
                "output.manifest_name",
                "must not be empty",
            ));
        }
        if self.output.manifest_name.contains(['/', '\\']) {
            return Err(ConfigError::invalid_value(
                "output.manifest_name",
                "must be a file name, not a path",
            ));
        }
        let extension = &self.output.unit_extension;
        if extension.is_empty() || extension.contains(['.', '/', '\\']) {
            return Err(ConfigError::invalid_value(
                "output.unit_extension",
                format!("`{extension}` must be a non-empty extension without '.'"),
            ));
        }
        if self
            .compiler
            .excluded_attributes
            .iter()
            .any(|name| name.trim().is_empty())
        {
            return Err(ConfigError::invalid_value(
                "compiler.excluded_attributes",
                "attribute names must not be empty",
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }
        if self.metrics.output_file.is_some() && !self.metrics.enabled {
            return Err(ConfigError::Conflict(
                "metrics.output_file is set but metrics.enabled is false".to_string(),
            ));
        }
        Ok(())
    }

    /// Development preset: pretty debug logs, all failures reported.
    ///
    /// ```
    /// use daedalus_config::{DaedalusConfig, LogFormat};
    ///
    /// let config = DaedalusConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.ansi_enabled = true;
        config.logging.include_location = true;
        config.compiler.fail_fast = false;
        config
    }

    /// Production (CI) preset: JSON logs, fail fast, metrics on.
    ///
    /// ```
    /// use daedalus_config::{DaedalusConfig, LogFormat};
    ///
    /// let config = DaedalusConfig::production();
    /// assert_eq!(config.logging.format, LogFormat::Json);
    /// assert!(config.metrics.enabled);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.ansi_enabled = false;
        config.compiler.fail_fast = true;
        config.metrics.enabled = true;
        config
    }
}

/// Builder for [`DaedalusConfig`].
#[derive(Debug, Default)]
#[must_use]
pub struct DaedalusConfigBuilder {
    output: Option<OutputConfig>,
    compiler: Option<CompilerConfig>,
    logging: Option<LoggingConfig>,
    metrics: Option<MetricsConfig>,
}

impl DaedalusConfigBuilder {
    /// Set the output section.
    pub fn output(mut self, output: OutputConfig) -> Self {
        self.output = Some(output);
        self
    }

    /// Set the compiler section.
    pub fn compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Set the logging section.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the metrics section.
    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the configuration; unset sections take their defaults.
    #[must_use]
    pub fn build(self) -> DaedalusConfig {
        DaedalusConfig {
            output: self.output.unwrap_or_default(),
            compiler: self.compiler.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_is_valid() {
        assert!(DaedalusConfig::default().validate().is_ok());
        assert!(DaedalusConfig::development().validate().is_ok());
        assert!(DaedalusConfig::production().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = DaedalusConfig::builder()
            .output(OutputConfig {
                dir: PathBuf::from("gen"),
                ..OutputConfig::default()
            })
            .build();
        assert_eq!(config.output.dir, PathBuf::from("gen"));
        assert_eq!(config.compiler, CompilerConfig::default());
    }

    #[test]
    fn test_validate_unit_extension() {
        let mut config = DaedalusConfig::default();
        config.output.unit_extension = ".dunit".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "output.unit_extension"
        ));
    }

    #[test]
    fn test_validate_manifest_name() {
        let mut config = DaedalusConfig::default();
        config.output.manifest_name = "meta/manifest.json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_excluded_attribute() {
        let mut config = DaedalusConfig::default();
        config.compiler.excluded_attributes = vec!["Traced".to_string(), " ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_metrics_file_requires_metrics() {
        let mut config = DaedalusConfig::default();
        config.metrics.output_file = Some(PathBuf::from("metrics.prom"));
        assert!(matches!(config.validate(), Err(ConfigError::Conflict(_))));
        config.metrics.enabled = true;
        assert!(config.validate().is_ok());
    }
}
