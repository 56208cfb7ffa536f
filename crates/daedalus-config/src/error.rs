//! Errors raised while assembling a [`DaedalusConfig`](crate::DaedalusConfig).

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Where configuration text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A configuration file.
    File(PathBuf),
    /// Text passed to [`ConfigLoader::with_string`](crate::ConfigLoader::with_string).
    Inline,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Inline => f.write_str("inline configuration"),
        }
    }
}

/// A configuration that cannot be loaded or is not usable for a build.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("no configuration file at {0}")]
    Missing(PathBuf),

    /// The file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// The file.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Neither `.toml` nor `.json`.
    #[error("unsupported configuration format `{0}` (expected toml or json)")]
    UnsupportedFormat(String),

    /// Malformed TOML, or a key the schema does not know.
    #[error("{origin}: {source}")]
    Toml {
        /// Where the text came from.
        origin: Origin,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },

    /// Malformed JSON, or a key the schema does not know.
    #[error("{origin}: {source}")]
    Json {
        /// Where the text came from.
        origin: Origin,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// A `DAEDALUS__*` variable could not be applied.
    #[error("environment variable {var}: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A single setting is out of range.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted setting name, e.g. `output.unit_extension`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Settings that are fine alone but contradict each other.
    #[error("conflicting settings: {0}")]
    Conflict(String),
}

impl ConfigError {
    /// Creates a read error for `path`.
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a TOML error for text from `origin`.
    pub fn toml(origin: Origin, source: toml::de::Error) -> Self {
        Self::Toml { origin, source }
    }

    /// Creates a JSON error for text from `origin`.
    pub fn json(origin: Origin, source: serde_json::Error) -> Self {
        Self::Json { origin, source }
    }

    /// Creates an environment error for `var`.
    pub fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error for `field`.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error comes from parsing configuration text.
    #[must_use]
    pub const fn is_parse_error(&self) -> bool {
        matches!(self, Self::Toml { .. } | Self::Json { .. })
    }
}
