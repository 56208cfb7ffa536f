//! Configuration sections.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where and how generated units are written.
///
/// # Example
///
/// ```
/// use daedalus_config::OutputConfig;
///
/// let output = OutputConfig::default();
/// assert_eq!(output.manifest_name, "daedalus-manifest.json");
/// assert_eq!(output.unit_extension, "dunit");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory receiving unit files and the manifest.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Manifest file name inside `dir`.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Unit file extension, without the dot.
    #[serde(default = "default_unit_extension")]
    pub unit_extension: String,

    /// Skip rewriting unit files whose bytes did not change.
    #[serde(default = "default_true")]
    pub incremental: bool,

    /// Delete unit files listed in the previous manifest but no longer
    /// generated.
    #[serde(default = "default_true")]
    pub prune_stale: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            manifest_name: default_manifest_name(),
            unit_extension: default_unit_extension(),
            incremental: true,
            prune_stale: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("target/daedalus")
}

fn default_manifest_name() -> String {
    "daedalus-manifest.json".to_string()
}

fn default_unit_extension() -> String {
    "dunit".to_string()
}

fn default_true() -> bool {
    true
}

/// Compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Attribute names dropped from routes in addition to the built-in set.
    /// Matched on the fully qualified or the simple name.
    #[serde(default)]
    pub excluded_attributes: Vec<String>,

    /// Stop at the first controller that fails to compile. When false every
    /// controller is attempted and all failures are reported.
    #[serde(default = "default_true")]
    pub fail_fast: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            excluded_attributes: Vec::new(),
            fail_fast: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
    /// Single-line, human-readable.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g., "info", "daedalus_codegen=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// ANSI colors in the human-readable formats.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include file and line in log events.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Build metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Record build metrics.
    #[serde(default)]
    pub enabled: bool,

    /// File receiving the Prometheus text rendering after a build.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}
