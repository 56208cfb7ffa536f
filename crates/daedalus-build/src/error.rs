//! Build error types.

use std::path::{Path, PathBuf};

use daedalus_codegen::CompileError;
use daedalus_config::ConfigError;
use daedalus_telemetry::TelemetryError;
use thiserror::Error;

/// Result type alias using [`BuildError`].
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors that fail a build.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A descriptor file is not valid descriptor JSON.
    #[error("invalid descriptor file {path}: {source}")]
    Descriptor {
        /// The descriptor file.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The manifest could not be encoded.
    #[error("failed to encode manifest {path}: {source}")]
    Manifest {
        /// The manifest file.
        path: PathBuf,
        /// Encode error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Telemetry setup or output failed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// A controller failed to compile.
    #[error("failed to compile {controller}: {source}")]
    Compile {
        /// Controller name.
        controller: String,
        /// The compiler error.
        #[source]
        source: CompileError,
    },

    /// Several controllers failed to compile (fail-fast disabled).
    #[error("{} controller(s) failed to compile; first: {}", .failures.len(), first_failure(.failures))]
    Failed {
        /// Controller name and error, in input order.
        failures: Vec<(String, CompileError)>,
    },

    /// A unit name cannot be turned into a file name.
    #[error("unit name `{0}` cannot be used as a file name")]
    InvalidUnitName(String),
}

fn first_failure(failures: &[(String, CompileError)]) -> String {
    failures
        .first()
        .map(|(controller, err)| format!("{controller}: {err}"))
        .unwrap_or_default()
}

impl BuildError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a compile error for `controller`.
    pub fn compile(controller: impl Into<String>, source: CompileError) -> Self {
        Self::Compile {
            controller: controller.into(),
            source,
        }
    }

    /// The compiler errors behind this error, if any.
    #[must_use]
    pub fn compile_errors(&self) -> Vec<&CompileError> {
        match self {
            Self::Compile { source, .. } => vec![source],
            Self::Failed { failures } => failures.iter().map(|(_, err)| err).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = BuildError::io(
            "out/app.C$Routes.dunit",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("out/app.C$Routes.dunit"));
    }

    #[test]
    fn test_failed_summarizes_first_failure() {
        let err = BuildError::Failed {
            failures: vec![
                (
                    "app.A".to_string(),
                    CompileError::invalid_controller("app.A", "controller name is empty"),
                ),
                (
                    "app.B".to_string(),
                    CompileError::invalid_controller("app.B", "x"),
                ),
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 controller(s) failed to compile; first: app.A: invalid controller app.A: controller name is empty"
        );
        assert_eq!(err.compile_errors().len(), 2);
    }
}
