//! Compiler error types.

use daedalus_unit::UnitError;
use thiserror::Error;

/// Result type alias using [`CompileError`].
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors that stop compilation of a controller.
///
/// All of these are build-time failures; a controller is never partially
/// compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A parameter's binding kind does not accept its declared type.
    #[error("cannot bind parameter `{param}` of {method} from {kind} as {ty}: {reason}")]
    UnsupportedBinding {
        /// `owner.method` of the offending method.
        method: String,
        /// Parameter name.
        param: String,
        /// Binding kind name.
        kind: String,
        /// Declared parameter type.
        ty: String,
        /// Why the combination is rejected.
        reason: String,
    },

    /// Two methods render to the same handler unit name.
    #[error("duplicate route {verb} {pattern}: {first} and {second} both compile to `{unit}`")]
    DuplicateRoute {
        /// HTTP verb.
        verb: String,
        /// Normalized pattern.
        pattern: String,
        /// The unit name both methods render to.
        unit: String,
        /// First method, `owner.method`.
        first: String,
        /// Second method, `owner.method`.
        second: String,
    },

    /// The controller descriptor cannot be compiled as a whole.
    #[error("invalid controller {controller}: {reason}")]
    InvalidController {
        /// Controller name.
        controller: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Generated code was rejected by the verifier or could not be encoded.
    #[error("internal compiler error: {0}")]
    Internal(#[from] UnitError),
}

impl CompileError {
    /// Creates an unsupported-binding error.
    pub fn unsupported(
        method: impl Into<String>,
        param: impl Into<String>,
        kind: impl Into<String>,
        ty: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsupportedBinding {
            method: method.into(),
            param: param.into(),
            kind: kind.into(),
            ty: ty.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-controller error.
    pub fn invalid_controller(controller: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidController {
            controller: controller.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors caused by the input descriptors rather than
    /// by the compiler itself.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// A short, stable name of the error class, used as a metric label.
    #[must_use]
    pub const fn class(&self) -> &'static str {
        match self {
            Self::UnsupportedBinding { .. } => "unsupported_binding",
            Self::DuplicateRoute { .. } => "duplicate_route",
            Self::InvalidController { .. } => "invalid_controller",
            Self::Internal(_) => "internal",
        }
    }
}
