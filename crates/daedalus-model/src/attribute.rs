//! Declarative metadata literals.
//!
//! Annotation-style metadata attached to a controller method is resolved into
//! a small recursive literal tree. The registration unit re-materializes each
//! value as code, so only values that can be expressed as constants appear
//! here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered attribute map (declaration order is preserved).
pub type AttributeMap = IndexMap<String, AttributeValue>;

/// A recursively encoded metadata literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    /// `boolean` literal.
    Boolean(bool),
    /// `byte` literal.
    Byte(i8),
    /// `char` literal.
    Char(char),
    /// `short` literal.
    Short(i16),
    /// `int` literal.
    Int(i32),
    /// `long` literal.
    Long(i64),
    /// `float` literal.
    Float(f32),
    /// `double` literal.
    Double(f64),
    /// String literal.
    String(String),
    /// Class literal, by fully qualified name.
    Class(String),
    /// Enum constant.
    Enum {
        /// Fully qualified enum type name.
        #[serde(rename = "type")]
        ty: String,
        /// Constant name.
        constant: String,
    },
    /// Array of values.
    List(Vec<AttributeValue>),
    /// Nested metadata (member name to value).
    Map(AttributeMap),
}

impl AttributeValue {
    /// Creates an enum constant value.
    pub fn enum_constant(ty: impl Into<String>, constant: impl Into<String>) -> Self {
        Self::Enum {
            ty: ty.into(),
            constant: constant.into(),
        }
    }

    /// Creates a class literal value.
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    /// Creates a nested map from `(name, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, AttributeValue)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns a short name of the literal kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Byte(_) => "byte",
            Self::Char(_) => "char",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Class(_) => "class",
            Self::Enum { .. } => "enum",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<Vec<AttributeValue>> for AttributeValue {
    fn from(value: Vec<AttributeValue>) -> Self {
        Self::List(value)
    }
}
