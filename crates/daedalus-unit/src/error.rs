//! Unit format error types.

use thiserror::Error;

/// Result type alias using [`UnitError`].
pub type UnitResult<T> = Result<T, UnitError>;

/// Errors raised while building, encoding, decoding or verifying a unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The input ended before a complete unit was read.
    #[error("truncated unit: needed {needed} more bytes while reading {context}")]
    Truncated {
        /// What was being read.
        context: &'static str,
        /// Missing byte count.
        needed: usize,
    },

    /// The input does not start with the unit magic.
    #[error("not a unit: bad magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// The unit was written by an unsupported format version.
    #[error("unsupported unit format version {0}")]
    UnsupportedVersion(u16),

    /// Unknown unit kind tag.
    #[error("unknown unit kind tag {0}")]
    UnknownKind(u8),

    /// Unknown constant pool tag.
    #[error("unknown constant tag {0}")]
    UnknownConstantTag(u8),

    /// Unknown instruction opcode.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A string does not fit the u16 length prefix.
    #[error("string too long for unit encoding ({0} bytes)")]
    StringTooLong(usize),

    /// A table does not fit its u16 count.
    #[error("too many entries in {0}")]
    TableOverflow(&'static str),

    /// A type or method descriptor could not be parsed.
    #[error("malformed descriptor `{descriptor}`: {reason}")]
    MalformedDescriptor {
        /// The offending descriptor.
        descriptor: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A constant pool index is out of range or of the wrong kind.
    #[error("bad constant reference #{index}: {reason}")]
    BadConstant {
        /// Pool index.
        index: u16,
        /// Why it was rejected.
        reason: String,
    },

    /// A label was used but never bound.
    #[error("label {0} used but never bound")]
    UnboundLabel(u16),

    /// Generated code failed verification.
    #[error("verification failed in {method} at instruction {index}: {message}")]
    Verify {
        /// Method name.
        method: String,
        /// Instruction index.
        index: usize,
        /// What went wrong.
        message: String,
    },
}

impl UnitError {
    /// Creates a malformed descriptor error.
    pub fn malformed(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }

    /// Creates a bad constant error.
    pub fn bad_constant(index: u16, reason: impl Into<String>) -> Self {
        Self::BadConstant {
            index,
            reason: reason.into(),
        }
    }

    /// Creates a verification error.
    pub fn verify(method: impl Into<String>, index: usize, message: impl Into<String>) -> Self {
        Self::Verify {
            method: method.into(),
            index,
            message: message.into(),
        }
    }
}
