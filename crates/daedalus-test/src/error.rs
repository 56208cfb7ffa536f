//! Test error types.

use daedalus_unit::UnitError;
use thiserror::Error;

/// Result type alias using [`TestError`].
pub type TestResult<T> = Result<T, TestError>;

/// Errors raised while loading or executing units in memory.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestError {
    /// A unit could not be decoded or verified.
    #[error("unit error: {0}")]
    Unit(#[from] UnitError),

    /// A unit referenced by name is not loaded.
    #[error("unit not loaded: {0}")]
    UnknownUnit(String),

    /// The same unit was loaded twice.
    #[error("unit loaded twice: {0}")]
    DuplicateUnit(String),

    /// No method with that name exists on the receiver.
    #[error("no method {name} on {owner}")]
    NoSuchMethod {
        /// Receiver class.
        owner: String,
        /// Method name.
        name: String,
    },

    /// A value had the wrong runtime type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type.
        expected: String,
        /// Actual value.
        found: String,
    },

    /// A request value the handler asked for is absent.
    #[error("missing {0}")]
    Missing(String),

    /// A request value could not be converted.
    #[error("cannot convert {value:?} to {target}")]
    Conversion {
        /// Raw value.
        value: String,
        /// Target type.
        target: String,
    },

    /// Execution ran past the instruction budget.
    #[error("instruction budget of {0} exhausted")]
    StepLimit(usize),

    /// The machine reached an inconsistent state the verifier should have
    /// ruled out.
    #[error("machine fault: {0}")]
    Fault(String),
}

impl TestError {
    /// Creates a type mismatch error.
    pub fn mismatch(expected: impl Into<String>, found: impl std::fmt::Display) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.to_string(),
        }
    }

    /// Creates a no-such-method error.
    pub fn no_method(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NoSuchMethod {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion(value: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Conversion {
            value: value.into(),
            target: target.into(),
        }
    }

    /// Creates a machine fault.
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault(message.into())
    }
}
