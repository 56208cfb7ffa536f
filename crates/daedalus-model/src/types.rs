//! Resolved declared types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::names;

/// The eight primitive value kinds of the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl PrimitiveKind {
    /// All primitive kinds, in descriptor order.
    pub const ALL: [Self; 8] = [
        Self::Boolean,
        Self::Byte,
        Self::Char,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
    ];

    /// Returns the source-level name (`int`, `boolean`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// Returns the name of the reference type that boxes this primitive.
    #[must_use]
    pub const fn boxed_class(self) -> &'static str {
        match self {
            Self::Boolean => "lang.Boolean",
            Self::Byte => "lang.Byte",
            Self::Char => "lang.Character",
            Self::Short => "lang.Short",
            Self::Int => "lang.Integer",
            Self::Long => "lang.Long",
            Self::Float => "lang.Float",
            Self::Double => "lang.Double",
        }
    }

    /// Returns the primitive boxed by `class`, if `class` is a box type.
    #[must_use]
    pub fn from_boxed(class: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.boxed_class() == class)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PrimitiveKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ModelError::UnknownPrimitive(s.to_string()))
    }
}

/// A fully resolved declared type.
///
/// Class types carry their generic type arguments; a class type with no
/// arguments is either non-generic or used raw.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// No value (`void`). Only valid as a return type.
    Void,
    /// A primitive value type.
    Primitive(PrimitiveKind),
    /// A class or interface, optionally parameterized.
    Class {
        /// Fully qualified name.
        name: String,
        /// Generic type arguments, empty for raw or non-generic types.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeRef>,
    },
    /// An array of the element type.
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// A non-generic class type.
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// A parameterized class type.
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self::Class {
            name: name.into(),
            args,
        }
    }

    /// An array type.
    #[must_use]
    pub fn array(element: TypeRef) -> Self {
        Self::Array(Box::new(element))
    }

    /// A primitive type.
    #[must_use]
    pub const fn primitive(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }

    /// `int`.
    #[must_use]
    pub const fn int() -> Self {
        Self::Primitive(PrimitiveKind::Int)
    }

    /// `boolean`.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::Primitive(PrimitiveKind::Boolean)
    }

    /// `long`.
    #[must_use]
    pub const fn long() -> Self {
        Self::Primitive(PrimitiveKind::Long)
    }

    /// The string type.
    #[must_use]
    pub fn string() -> Self {
        Self::class(names::STRING)
    }

    /// The request context type.
    #[must_use]
    pub fn context() -> Self {
        Self::class(names::CONTEXT)
    }

    /// `byte[]`.
    #[must_use]
    pub fn byte_array() -> Self {
        Self::array(Self::Primitive(PrimitiveKind::Byte))
    }

    /// `Optional<T>`.
    #[must_use]
    pub fn optional(inner: TypeRef) -> Self {
        Self::generic(names::OPTIONAL, vec![inner])
    }

    /// `List<T>`.
    #[must_use]
    pub fn list(inner: TypeRef) -> Self {
        Self::generic(names::LIST, vec![inner])
    }

    /// `Set<T>`.
    #[must_use]
    pub fn set(inner: TypeRef) -> Self {
        Self::generic(names::SET, vec![inner])
    }

    /// Returns the class name of a class type.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the generic arguments of a class type (empty otherwise).
    #[must_use]
    pub fn type_args(&self) -> &[TypeRef] {
        match self {
            Self::Class { args, .. } => args,
            _ => &[],
        }
    }

    /// Returns `true` if this is a class type named `name`, raw or not.
    #[must_use]
    pub fn is_class(&self, name: &str) -> bool {
        self.class_name() == Some(name)
    }

    /// Returns `true` for class types with at least one type argument.
    #[must_use]
    pub fn is_parameterized(&self) -> bool {
        !self.type_args().is_empty()
    }

    /// Returns the primitive kind of a primitive type.
    #[must_use]
    pub const fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` for `void`.
    #[must_use]
    pub const fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    /// Returns `true` for class and array types.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Class { .. } | Self::Array(_))
    }

    /// Returns the single type argument of `Container<T>` when this type is
    /// that container.
    #[must_use]
    pub fn single_arg_of(&self, container: &str) -> Option<&TypeRef> {
        match self {
            Self::Class { name, args } if name == container && args.len() == 1 => args.first(),
            _ => None,
        }
    }

    /// Returns the type with all generic arguments removed.
    #[must_use]
    pub fn erasure(&self) -> TypeRef {
        match self {
            Self::Class { name, .. } => Self::class(name.clone()),
            Self::Array(element) => Self::array(element.erasure()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Primitive(kind) => write!(f, "{kind}"),
            Self::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Self::Array(element) => write!(f, "{element}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_class_round_trip() {
        for kind in PrimitiveKind::ALL {
            assert_eq!(PrimitiveKind::from_boxed(kind.boxed_class()), Some(kind));
        }
        assert_eq!(PrimitiveKind::from_boxed(names::STRING), None);
    }

    #[test]
    fn test_primitive_from_str() {
        assert_eq!("long".parse::<PrimitiveKind>(), Ok(PrimitiveKind::Long));
        assert!("integer".parse::<PrimitiveKind>().is_err());
    }

    #[test]
    fn test_erasure_drops_args_recursively() {
        let ty = TypeRef::array(TypeRef::list(TypeRef::class("app.Pet")));
        assert_eq!(ty.erasure(), TypeRef::array(TypeRef::class(names::LIST)));
    }

    #[test]
    fn test_display() {
        let ty = TypeRef::generic(
            names::MAP,
            vec![TypeRef::string(), TypeRef::list(TypeRef::int())],
        );
        assert_eq!(ty.to_string(), "util.Map<lang.String, util.List<int>>");
        assert_eq!(TypeRef::byte_array().to_string(), "byte[]");
    }

    #[test]
    fn test_single_arg_of() {
        let ty = TypeRef::optional(TypeRef::string());
        assert_eq!(ty.single_arg_of(names::OPTIONAL), Some(&TypeRef::string()));
        assert_eq!(ty.single_arg_of(names::LIST), None);
        assert_eq!(TypeRef::class(names::OPTIONAL).single_arg_of(names::OPTIONAL), None);
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(TypeRef::list(TypeRef::class("app.Pet"))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"class": {"name": "util.List", "args": [{"class": {"name": "app.Pet"}}]}})
        );
        let back: TypeRef = serde_json::from_value(serde_json::json!({"primitive": "int"})).unwrap();
        assert_eq!(back, TypeRef::int());
    }
}
