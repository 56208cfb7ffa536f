//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ConfigError, DaedalusConfig, LogFormat, Origin};

/// Environment prefix used by [`ConfigLoader::with_default_env`].
pub const DEFAULT_ENV_PREFIX: &str = "DAEDALUS";

/// Configuration loader.
///
/// Layers, later ones overriding earlier ones:
/// 1. defaults (or a preset)
/// 2. a TOML or JSON file
/// 3. `PREFIX__SECTION__KEY` environment variables
///
/// A file replaces the whole configuration; sections and fields it omits
/// take their defaults, not the values of an earlier preset.
///
/// # Example
///
/// ```no_run
/// use daedalus_config::ConfigLoader;
///
/// # fn main() -> Result<(), daedalus_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("daedalus.toml")?
///     .with_env_prefix("DAEDALUS")
///     .load()?;
/// println!("writing units to {}", config.output.dir.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: DaedalusConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = DaedalusConfig::development();
        self
    }

    /// Start from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = DaedalusConfig::production();
        self
    }

    /// Load a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, has another
    /// extension, or does not parse (unknown fields included).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        self.config = parse_file(&content, path)?;
        Ok(self)
    }

    /// Load a file if it exists.
    ///
    /// # Errors
    ///
    /// Same as [`with_file`](Self::with_file) for an existing file.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration text in `format` (`toml` or `json`).
    ///
    /// ```
    /// use daedalus_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[output]\ndir = \"gen\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.output.dir.to_str(), Some("gen"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unsupported format or a parse failure.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content).map_err(|e| ConfigError::toml(Origin::Inline, e))?,
            "json" => {
                serde_json::from_str(content).map_err(|e| ConfigError::json(Origin::Inline, e))?
            }
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        Ok(self)
    }

    /// Apply `PREFIX__SECTION__KEY` environment overrides on [`load`](Self::load).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply `DAEDALUS__SECTION__KEY` overrides.
    #[must_use]
    pub fn with_default_env(self) -> Self {
        self.with_env_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Load variables from a `.env` file in the working directory, if any.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation
    /// fails.
    pub fn load(mut self) -> Result<DaedalusConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(key, _)| key.starts_with(&format!("{prefix}__")))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Return the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> DaedalusConfig {
        self.config
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let path = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env(key, "invalid key format"))?;
        let parts: Vec<&str> = path.split("__").collect();
        let bool_value = || {
            parse_bool(value).ok_or_else(|| ConfigError::env(key, "expected boolean"))
        };
        let config = &mut self.config;

        match parts.as_slice() {
            ["OUTPUT", "DIR"] => config.output.dir = PathBuf::from(value),
            ["OUTPUT", "MANIFEST_NAME"] => config.output.manifest_name = value.to_string(),
            ["OUTPUT", "UNIT_EXTENSION"] => config.output.unit_extension = value.to_string(),
            ["OUTPUT", "INCREMENTAL"] => config.output.incremental = bool_value()?,
            ["OUTPUT", "PRUNE_STALE"] => config.output.prune_stale = bool_value()?,

            ["COMPILER", "EXCLUDED_ATTRIBUTES"] => {
                config.compiler.excluded_attributes = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["COMPILER", "FAIL_FAST"] => config.compiler.fail_fast = bool_value()?,

            ["LOGGING", "ENABLED"] => config.logging.enabled = bool_value()?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    "compact" => LogFormat::Compact,
                    _ => {
                        return Err(ConfigError::env(
                            key,
                            "expected 'json', 'pretty' or 'compact'",
                        ))
                    }
                };
            }
            ["LOGGING", "ANSI_ENABLED"] => config.logging.ansi_enabled = bool_value()?,
            ["LOGGING", "INCLUDE_LOCATION"] => config.logging.include_location = bool_value()?,

            ["METRICS", "ENABLED"] => config.metrics.enabled = bool_value()?,
            ["METRICS", "OUTPUT_FILE"] => {
                config.metrics.output_file = (!value.is_empty()).then(|| PathBuf::from(value));
            }

            _ => {}
        }
        Ok(())
    }
}

fn parse_file(content: &str, path: &Path) -> Result<DaedalusConfig, ConfigError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match extension.as_deref() {
        Some("toml") => {
            toml::from_str(content).map_err(|e| ConfigError::toml(Origin::File(path.into()), e))
        }
        Some("json") => serde_json::from_str(content)
            .map_err(|e| ConfigError::json(Origin::File(path.into()), e)),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, DaedalusConfig::default());
    }

    #[test]
    fn test_loader_presets() {
        let dev = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(dev.logging.format, LogFormat::Pretty);
        assert!(!dev.compiler.fail_fast);

        let prod = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert!(prod.metrics.enabled);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"compiler": {"excluded_attributes": ["Traced"], "fail_fast": false}}"#;
        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config.compiler.excluded_attributes, ["Traced"]);
        assert!(!config.compiler.fail_fast);
        assert_eq!(config.output, crate::OutputConfig::default());
    }

    #[test]
    fn test_loader_unsupported_format() {
        assert!(ConfigLoader::new().with_string("", "yaml").is_err());
    }

    #[test]
    fn test_loader_rejects_unknown_section() {
        let err = ConfigLoader::new()
            .with_string("[server]\nport = 1", "toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Toml { origin: Origin::Inline, .. }));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        assert!(matches!(
            ConfigLoader::new().with_file("/nonexistent/daedalus.toml"),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/daedalus.toml")
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(config, DaedalusConfig::default());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_apply_env_var_output() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__OUTPUT__DIR", "build/units", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__OUTPUT__INCREMENTAL", "no", "TEST")
            .unwrap();
        assert_eq!(loader.config.output.dir, PathBuf::from("build/units"));
        assert!(!loader.config.output.incremental);
    }

    #[test]
    fn test_apply_env_var_excluded_attributes() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__COMPILER__EXCLUDED_ATTRIBUTES", "Traced, app.Audit,,", "TEST")
            .unwrap();
        assert_eq!(loader.config.compiler.excluded_attributes, ["Traced", "app.Audit"]);
    }

    #[test]
    fn test_apply_env_var_logging_and_metrics() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__LOGGING__FORMAT", "compact", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__METRICS__OUTPUT_FILE", "metrics.prom", "TEST")
            .unwrap();
        assert_eq!(loader.config.logging.format, LogFormat::Compact);
        assert_eq!(
            loader.config.metrics.output_file,
            Some(PathBuf::from("metrics.prom"))
        );
    }

    #[test]
    fn test_apply_env_var_invalid_values() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__OUTPUT__PRUNE_STALE", "sometimes", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__LOGGING__FORMAT", "xml", "TEST")
            .is_err());
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__OUTPUT__COLOR", "blue", "TEST")
            .unwrap();
        assert_eq!(loader.config, DaedalusConfig::default());
    }
}
