//! Model error types.

use thiserror::Error;

/// Errors raised while interpreting descriptor input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The HTTP verb is not one of the supported methods.
    #[error("unknown HTTP verb: {0}")]
    UnknownVerb(String),

    /// The primitive name is not one of the eight primitive kinds.
    #[error("unknown primitive type: {0}")]
    UnknownPrimitive(String),
}
