//! Type and method descriptors.
//!
//! Descriptors are the low-level type tags stored in the constant pool:
//!
//! | Type | Tag |
//! |------|-----|
//! | `boolean` `byte` `char` `short` `int` `long` `float` `double` | `Z` `B` `C` `S` `I` `J` `F` `D` |
//! | class `a.b.C` | `La.b.C;` |
//! | array of `T` | `[` + tag of `T` |
//! | no return value | `V` |
//!
//! A method descriptor is `(` + parameter tags + `)` + return tag.

use std::fmt;

use crate::error::{UnitError, UnitResult};

/// A low-level field (value) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `L<name>;`
    Object(String),
    /// `[<element>`
    Array(Box<FieldType>),
}

impl FieldType {
    /// A class type.
    pub fn object(name: impl Into<String>) -> Self {
        Self::Object(name.into())
    }

    /// An array type.
    #[must_use]
    pub fn array(element: FieldType) -> Self {
        Self::Array(Box::new(element))
    }

    /// Returns `true` for class and array types.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }

    /// Renders the descriptor tag.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            Self::Boolean => out.push('Z'),
            Self::Byte => out.push('B'),
            Self::Char => out.push('C'),
            Self::Short => out.push('S'),
            Self::Int => out.push('I'),
            Self::Long => out.push('J'),
            Self::Float => out.push('F'),
            Self::Double => out.push('D'),
            Self::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            Self::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
        }
    }

    /// The name used by class constants: the class name for class types,
    /// the descriptor for arrays.
    #[must_use]
    pub fn class_name(&self) -> String {
        match self {
            Self::Object(name) => name.clone(),
            other => other.descriptor(),
        }
    }

    /// Inverse of [`class_name`](Self::class_name).
    ///
    /// # Errors
    ///
    /// Returns `UnitError::MalformedDescriptor` for a malformed array
    /// descriptor.
    pub fn from_class_name(name: &str) -> UnitResult<Self> {
        if name.starts_with('[') {
            Self::parse(name)
        } else if name.is_empty() {
            Err(UnitError::malformed(name, "empty class name"))
        } else {
            Ok(Self::Object(name.to_string()))
        }
    }

    /// Parses a complete field descriptor.
    ///
    /// # Errors
    ///
    /// Returns `UnitError::MalformedDescriptor` if the input is not exactly
    /// one field descriptor.
    pub fn parse(descriptor: &str) -> UnitResult<Self> {
        let mut cursor = Cursor::new(descriptor);
        let ty = cursor.field_type()?;
        cursor.finish()?;
        Ok(ty)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

/// A method signature: parameter types and an optional return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    /// Parameter types in order.
    pub params: Vec<FieldType>,
    /// Return type, `None` for `V`.
    pub ret: Option<FieldType>,
}

impl MethodType {
    /// Creates a method type.
    #[must_use]
    pub fn new(params: Vec<FieldType>, ret: Option<FieldType>) -> Self {
        Self { params, ret }
    }

    /// A method type with no return value.
    #[must_use]
    pub fn void(params: Vec<FieldType>) -> Self {
        Self { params, ret: None }
    }

    /// A method type returning `ret`.
    #[must_use]
    pub fn returning(params: Vec<FieldType>, ret: FieldType) -> Self {
        Self {
            params,
            ret: Some(ret),
        }
    }

    /// Renders the descriptor.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for param in &self.params {
            param.write_descriptor(&mut out);
        }
        out.push(')');
        match &self.ret {
            Some(ret) => ret.write_descriptor(&mut out),
            None => out.push('V'),
        }
        out
    }

    /// Parses a method descriptor.
    ///
    /// # Errors
    ///
    /// Returns `UnitError::MalformedDescriptor` on malformed input.
    pub fn parse(descriptor: &str) -> UnitResult<Self> {
        let mut cursor = Cursor::new(descriptor);
        cursor.expect('(')?;
        let mut params = Vec::new();
        while cursor.peek() != Some(')') {
            params.push(cursor.field_type()?);
        }
        cursor.expect(')')?;
        let ret = if cursor.peek() == Some('V') {
            cursor.bump();
            None
        } else {
            Some(cursor.field_type()?)
        };
        cursor.finish()?;
        Ok(Self { params, ret })
    }
}

impl fmt::Display for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, reason: impl Into<String>) -> UnitError {
        UnitError::malformed(self.src, reason)
    }

    fn expect(&mut self, expected: char) -> UnitResult<()> {
        match self.bump() {
            Some(ch) if ch == expected => Ok(()),
            Some(ch) => Err(self.error(format!("expected `{expected}`, found `{ch}`"))),
            None => Err(self.error(format!("expected `{expected}`, found end of input"))),
        }
    }

    fn finish(&self) -> UnitResult<()> {
        if self.pos == self.src.len() {
            Ok(())
        } else {
            Err(self.error(format!("trailing input at offset {}", self.pos)))
        }
    }

    fn field_type(&mut self) -> UnitResult<FieldType> {
        let tag = self
            .bump()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        Ok(match tag {
            'Z' => FieldType::Boolean,
            'B' => FieldType::Byte,
            'C' => FieldType::Char,
            'S' => FieldType::Short,
            'I' => FieldType::Int,
            'J' => FieldType::Long,
            'F' => FieldType::Float,
            'D' => FieldType::Double,
            '[' => FieldType::array(self.field_type()?),
            'L' => {
                let rest = &self.src[self.pos..];
                let end = rest
                    .find(';')
                    .ok_or_else(|| self.error("unterminated class type"))?;
                if end == 0 {
                    return Err(self.error("empty class name"));
                }
                let name = rest[..end].to_string();
                self.pos += end + 1;
                FieldType::Object(name)
            }
            other => return Err(self.error(format!("unknown type tag `{other}`"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_descriptor_round_trip() {
        let ty = MethodType::returning(
            vec![
                FieldType::object("daedalus.runtime.Context"),
                FieldType::Int,
                FieldType::array(FieldType::Byte),
            ],
            FieldType::object("lang.Object"),
        );
        let descriptor = ty.descriptor();
        assert_eq!(
            descriptor,
            "(Ldaedalus.runtime.Context;I[B)Llang.Object;"
        );
        assert_eq!(MethodType::parse(&descriptor).unwrap(), ty);
    }

    #[test]
    fn test_void_descriptor() {
        let ty = MethodType::parse("()V").unwrap();
        assert!(ty.params.is_empty());
        assert_eq!(ty.ret, None);
    }

    #[test]
    fn test_malformed_descriptors() {
        assert!(MethodType::parse("(I").is_err());
        assert!(MethodType::parse("(Lfoo)V").is_err());
        assert!(MethodType::parse("()VV").is_err());
        assert!(FieldType::parse("Q").is_err());
        assert!(FieldType::parse("L;").is_err());
    }

    #[test]
    fn test_class_name_for_arrays() {
        let array = FieldType::array(FieldType::object("app.Pet"));
        assert_eq!(array.class_name(), "[Lapp.Pet;");
        assert_eq!(FieldType::from_class_name("[Lapp.Pet;").unwrap(), array);
        assert_eq!(
            FieldType::from_class_name("app.Pet").unwrap(),
            FieldType::object("app.Pet")
        );
    }
}
