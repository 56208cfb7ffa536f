//! Constant pool.
//!
//! Every literal and symbolic reference used by a unit's code lives in the
//! pool; instructions refer to entries by `u16` index. Entries are interned,
//! so adding an equal constant twice returns the same index.

use std::collections::HashMap;
use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::descriptor::{FieldType, MethodType};
use crate::error::{UnitError, UnitResult};
use crate::wire::{put_count, put_str, Reader};

const TAG_INT: u8 = 1;
const TAG_LONG: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_DOUBLE: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_CLASS: u8 = 6;
const TAG_FIELD: u8 = 7;
const TAG_METHOD: u8 = 8;
const TAG_INTERFACE_METHOD: u8 = 9;

/// A symbolic reference to a field or method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Declaring type.
    pub owner: String,
    /// Member name.
    pub name: String,
    /// Field or method descriptor.
    pub descriptor: String,
}

impl MemberRef {
    /// Creates a member reference.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Parses the descriptor as a field type.
    pub fn field_type(&self) -> UnitResult<FieldType> {
        FieldType::parse(&self.descriptor)
    }

    /// Parses the descriptor as a method type.
    pub fn method_type(&self) -> UnitResult<MethodType> {
        MethodType::parse(&self.descriptor)
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.descriptor)
    }
}

/// A constant pool entry.
///
/// Floating point values are stored as raw bits so that entries can be
/// hashed and interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 32-bit float bits.
    Float(u32),
    /// 64-bit float bits.
    Double(u64),
    /// String literal.
    Str(String),
    /// Class reference: a class name, or an array descriptor.
    Class(String),
    /// Field reference.
    Field(MemberRef),
    /// Class method reference.
    Method(MemberRef),
    /// Interface method reference.
    InterfaceMethod(MemberRef),
}

impl Constant {
    /// A float constant.
    #[must_use]
    pub fn float(value: f32) -> Self {
        Self::Float(value.to_bits())
    }

    /// A double constant.
    #[must_use]
    pub fn double(value: f64) -> Self {
        Self::Double(value.to_bits())
    }

    /// A class constant for `ty`.
    #[must_use]
    pub fn class_of(ty: &FieldType) -> Self {
        Self::Class(ty.class_name())
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => TAG_INT,
            Self::Long(_) => TAG_LONG,
            Self::Float(_) => TAG_FLOAT,
            Self::Double(_) => TAG_DOUBLE,
            Self::Str(_) => TAG_STRING,
            Self::Class(_) => TAG_CLASS,
            Self::Field(_) => TAG_FIELD,
            Self::Method(_) => TAG_METHOD,
            Self::InterfaceMethod(_) => TAG_INTERFACE_METHOD,
        }
    }

    /// Short kind name, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Class(_) => "class",
            Self::Field(_) => "field",
            Self::Method(_) => "method",
            Self::InterfaceMethod(_) => "interface method",
        }
    }

    fn encode(&self, buf: &mut BytesMut) -> UnitResult<()> {
        buf.put_u8(self.tag());
        match self {
            Self::Int(v) => buf.put_i32(*v),
            Self::Long(v) => buf.put_i64(*v),
            Self::Float(bits) => buf.put_u32(*bits),
            Self::Double(bits) => buf.put_u64(*bits),
            Self::Str(s) | Self::Class(s) => put_str(buf, s)?,
            Self::Field(m) | Self::Method(m) | Self::InterfaceMethod(m) => {
                put_str(buf, &m.owner)?;
                put_str(buf, &m.name)?;
                put_str(buf, &m.descriptor)?;
            }
        }
        Ok(())
    }

    fn decode(reader: &mut Reader<'_>) -> UnitResult<Self> {
        let tag = reader.u8("constant tag")?;
        Ok(match tag {
            TAG_INT => Self::Int(reader.i32("int constant")?),
            TAG_LONG => Self::Long(reader.i64("long constant")?),
            TAG_FLOAT => Self::Float(reader.u32("float constant")?),
            TAG_DOUBLE => Self::Double(reader.u64("double constant")?),
            TAG_STRING => Self::Str(reader.string("string constant")?),
            TAG_CLASS => Self::Class(reader.string("class constant")?),
            TAG_FIELD | TAG_METHOD | TAG_INTERFACE_METHOD => {
                let member = MemberRef {
                    owner: reader.string("member owner")?,
                    name: reader.string("member name")?,
                    descriptor: reader.string("member descriptor")?,
                };
                match tag {
                    TAG_FIELD => Self::Field(member),
                    TAG_METHOD => Self::Method(member),
                    _ => Self::InterfaceMethod(member),
                }
            }
            other => return Err(UnitError::UnknownConstantTag(other)),
        })
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "int {v}"),
            Self::Long(v) => write!(f, "long {v}"),
            Self::Float(bits) => write!(f, "float {}", f32::from_bits(*bits)),
            Self::Double(bits) => write!(f, "double {}", f64::from_bits(*bits)),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Class(name) => write!(f, "class {name}"),
            Self::Field(m) => write!(f, "field {m}"),
            Self::Method(m) => write!(f, "method {m}"),
            Self::InterfaceMethod(m) => write!(f, "interface {m}"),
        }
    }
}

/// An interning constant pool.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    index: HashMap<Constant, u16>,
}

impl PartialEq for ConstantPool {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for ConstantPool {}

impl ConstantPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.entries.iter()
    }

    /// Adds `constant`, returning the index of the existing entry if an
    /// equal one was added before.
    pub fn intern(&mut self, constant: Constant) -> UnitResult<u16> {
        if let Some(&idx) = self.index.get(&constant) {
            return Ok(idx);
        }
        let idx =
            u16::try_from(self.entries.len()).map_err(|_| UnitError::TableOverflow("constant pool"))?;
        self.index.insert(constant.clone(), idx);
        self.entries.push(constant);
        Ok(idx)
    }

    /// Returns the entry at `index`.
    pub fn get(&self, index: u16) -> UnitResult<&Constant> {
        self.entries
            .get(usize::from(index))
            .ok_or_else(|| UnitError::bad_constant(index, "index out of range"))
    }

    /// Returns the class name at `index`.
    pub fn class_at(&self, index: u16) -> UnitResult<&str> {
        match self.get(index)? {
            Constant::Class(name) => Ok(name),
            other => Err(UnitError::bad_constant(
                index,
                format!("expected class, found {}", other.kind_name()),
            )),
        }
    }

    /// Returns the field reference at `index`.
    pub fn field_at(&self, index: u16) -> UnitResult<&MemberRef> {
        match self.get(index)? {
            Constant::Field(member) => Ok(member),
            other => Err(UnitError::bad_constant(
                index,
                format!("expected field, found {}", other.kind_name()),
            )),
        }
    }

    /// Returns the method reference at `index`; `interface` selects which
    /// of the two method kinds is expected.
    pub fn method_at(&self, index: u16, interface: bool) -> UnitResult<&MemberRef> {
        match (self.get(index)?, interface) {
            (Constant::Method(member), false) | (Constant::InterfaceMethod(member), true) => {
                Ok(member)
            }
            (other, _) => Err(UnitError::bad_constant(
                index,
                format!(
                    "expected {}, found {}",
                    if interface { "interface method" } else { "method" },
                    other.kind_name()
                ),
            )),
        }
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) -> UnitResult<()> {
        put_count(buf, self.entries.len(), "constant pool")?;
        for entry in &self.entries {
            entry.encode(buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> UnitResult<Self> {
        let count = reader.u16("constant pool count")?;
        let mut pool = Self::new();
        for _ in 0..count {
            let constant = Constant::decode(reader)?;
            // Duplicates are legal on the wire; keep positions stable.
            let idx = u16::try_from(pool.entries.len())
                .map_err(|_| UnitError::TableOverflow("constant pool"))?;
            pool.index.entry(constant.clone()).or_insert(idx);
            pool.entries.push(constant);
        }
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.intern(Constant::Str("GET".into())).unwrap();
        let b = pool.intern(Constant::Class("lang.Object".into())).unwrap();
        let c = pool.intern(Constant::Str("GET".into())).unwrap();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_typed_lookups() {
        let mut pool = ConstantPool::new();
        let m = pool
            .intern(Constant::InterfaceMethod(MemberRef::new(
                "daedalus.runtime.Provider",
                "get",
                "()Llang.Object;",
            )))
            .unwrap();
        assert!(pool.method_at(m, true).is_ok());
        assert!(matches!(
            pool.method_at(m, false),
            Err(UnitError::BadConstant { .. })
        ));
        assert!(pool.class_at(m).is_err());
        assert!(pool.get(99).is_err());
    }

    #[test]
    fn test_pool_encoding() {
        let mut pool = ConstantPool::new();
        pool.intern(Constant::Int(-1)).unwrap();
        pool.intern(Constant::double(1.5)).unwrap();
        pool.intern(Constant::Field(MemberRef::new("a.B", "x", "I")))
            .unwrap();
        let mut buf = BytesMut::new();
        pool.encode(&mut buf).unwrap();
        let decoded = ConstantPool::decode(&mut Reader::new(&buf)).unwrap();
        assert_eq!(decoded, pool);
        assert_eq!(decoded.get(1).unwrap(), &Constant::double(1.5));
    }

    #[test]
    fn test_unknown_tag() {
        let bytes = [0u8, 1, 42];
        assert_eq!(
            ConstantPool::decode(&mut Reader::new(&bytes)),
            Err(UnitError::UnknownConstantTag(42))
        );
    }
}
