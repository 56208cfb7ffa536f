//! Units: the binary artifacts emitted by the route compiler.
//!
//! Encoded layout:
//!
//! ```text
//! ┌───────┬─────────┬──────┬──────┬────────────┬──────┬────────┬─────────┐
//! │ magic │ version │ kind │ name │ interfaces │ pool │ fields │ methods │
//! │ DUNT  │ u16 BE  │ u8   │ str  │ u16 + str* │      │        │         │
//! └───────┴─────────┴──────┴──────┴────────────┴──────┴────────┴─────────┘
//! ```
//!
//! A field is `name, descriptor`. A method is `name, descriptor, max_stack,
//! max_locals, instruction count, instructions`.

use std::fmt;

use bytes::{Bytes, BytesMut, BufMut};
use serde::{Deserialize, Serialize};

use crate::code::CodeBuilder;
use crate::descriptor::{FieldType, MethodType};
use crate::error::{UnitError, UnitResult};
use crate::insn::Instruction;
use crate::pool::ConstantPool;
use crate::verify::{verify_method, Hierarchy};
use crate::wire::{put_count, put_str, Reader};

/// Leading bytes of every encoded unit.
pub const MAGIC: [u8; 4] = *b"DUNT";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// File extension used for written units.
pub const FILE_EXTENSION: &str = "dunit";

/// What a unit implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Implements the dispatch interface for one controller method.
    Handler,
    /// Implements the installation interface for one controller.
    Registration,
}

impl UnitKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Handler => 1,
            Self::Registration => 2,
        }
    }

    fn from_tag(tag: u8) -> UnitResult<Self> {
        match tag {
            1 => Ok(Self::Handler),
            2 => Ok(Self::Registration),
            other => Err(UnitError::UnknownKind(other)),
        }
    }

    /// Returns the kind's name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handler => "handler",
            Self::Registration => "registration",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instance field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: FieldType,
}

/// A method with verified code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Method name.
    pub name: String,
    /// Method signature.
    pub ty: MethodType,
    /// Operand stack depth required.
    pub max_stack: u16,
    /// Local slots required.
    pub max_locals: u16,
    /// Instructions.
    pub code: Vec<Instruction>,
}

/// A decoded or freshly built unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Fully qualified unit name.
    pub name: String,
    /// Unit kind.
    pub kind: UnitKind,
    /// Implemented interfaces.
    pub interfaces: Vec<String>,
    /// Constant pool shared by all methods.
    pub pool: ConstantPool,
    /// Instance fields.
    pub fields: Vec<FieldDef>,
    /// Methods.
    pub methods: Vec<MethodDef>,
}

impl Unit {
    /// Finds a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Finds a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Encodes the unit.
    pub fn encode(&self) -> UnitResult<Bytes> {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_slice(&MAGIC);
        buf.put_u16(FORMAT_VERSION);
        buf.put_u8(self.kind.tag());
        put_str(&mut buf, &self.name)?;

        put_count(&mut buf, self.interfaces.len(), "interfaces")?;
        for iface in &self.interfaces {
            put_str(&mut buf, iface)?;
        }

        self.pool.encode(&mut buf)?;

        put_count(&mut buf, self.fields.len(), "fields")?;
        for field in &self.fields {
            put_str(&mut buf, &field.name)?;
            put_str(&mut buf, &field.ty.descriptor())?;
        }

        put_count(&mut buf, self.methods.len(), "methods")?;
        for method in &self.methods {
            put_str(&mut buf, &method.name)?;
            put_str(&mut buf, &method.ty.descriptor())?;
            buf.put_u16(method.max_stack);
            buf.put_u16(method.max_locals);
            put_count(&mut buf, method.code.len(), "code")?;
            for insn in &method.code {
                insn.encode(&mut buf);
            }
        }
        Ok(buf.freeze())
    }

    /// Decodes a unit. Trailing bytes are rejected.
    pub fn decode(bytes: &[u8]) -> UnitResult<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.array::<4>("magic")?;
        if magic != MAGIC {
            return Err(UnitError::BadMagic(magic));
        }
        let version = reader.u16("version")?;
        if version != FORMAT_VERSION {
            return Err(UnitError::UnsupportedVersion(version));
        }
        let kind = UnitKind::from_tag(reader.u8("kind")?)?;
        let name = reader.string("unit name")?;

        let count = reader.u16("interface count")?;
        let interfaces = (0..count)
            .map(|_| reader.string("interface name"))
            .collect::<UnitResult<Vec<_>>>()?;

        let pool = ConstantPool::decode(&mut reader)?;

        let count = reader.u16("field count")?;
        let mut fields = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let name = reader.string("field name")?;
            let ty = FieldType::parse(&reader.string("field descriptor")?)?;
            fields.push(FieldDef { name, ty });
        }

        let count = reader.u16("method count")?;
        let mut methods = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let name = reader.string("method name")?;
            let ty = MethodType::parse(&reader.string("method descriptor")?)?;
            let max_stack = reader.u16("max stack")?;
            let max_locals = reader.u16("max locals")?;
            let len = reader.u16("code length")?;
            let code = (0..len)
                .map(|_| Instruction::decode(&mut reader))
                .collect::<UnitResult<Vec<_>>>()?;
            methods.push(MethodDef {
                name,
                ty,
                max_stack,
                max_locals,
                code,
            });
        }

        if reader.remaining() > 0 {
            return Err(UnitError::malformed(
                name,
                format!("{} trailing bytes after unit", reader.remaining()),
            ));
        }

        Ok(Self {
            name,
            kind,
            interfaces,
            pool,
            fields,
            methods,
        })
    }

    /// Re-verifies every method against `hierarchy`, checking the recorded
    /// frame sizes.
    pub fn verify(&self, hierarchy: &Hierarchy) -> UnitResult<()> {
        let mut hierarchy = hierarchy.clone();
        for iface in &self.interfaces {
            hierarchy.add(self.name.clone(), iface.clone());
        }
        for method in &self.methods {
            let frame = verify_method(
                &self.name,
                &method.name,
                &method.ty,
                &method.code,
                &self.pool,
                &hierarchy,
            )?;
            if frame.max_stack > method.max_stack || frame.max_locals > method.max_locals {
                return Err(UnitError::verify(
                    &method.name,
                    0,
                    format!(
                        "frame {}/{} exceeds declared {}/{}",
                        frame.max_stack, frame.max_locals, method.max_stack, method.max_locals
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Disassembly listing.
impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)?;
        if !self.interfaces.is_empty() {
            write!(f, " implements {}", self.interfaces.join(", "))?;
        }
        writeln!(f)?;
        for field in &self.fields {
            writeln!(f, "  field {} {}", field.name, field.ty)?;
        }
        for method in &self.methods {
            writeln!(
                f,
                "  method {} {} stack={} locals={}",
                method.name, method.ty, method.max_stack, method.max_locals
            )?;
            for (i, insn) in method.code.iter().enumerate() {
                writeln!(f, "    {i:>3}: {}", insn.display(&self.pool))?;
            }
        }
        Ok(())
    }
}

/// Incremental builder for a [`Unit`].
///
/// Methods are verified as they are added; the unit itself is recorded as a
/// subtype of each interface it implements.
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    unit: Unit,
    hierarchy: Hierarchy,
}

impl UnitBuilder {
    /// Starts a unit.
    pub fn new(name: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            unit: Unit {
                name: name.into(),
                kind,
                interfaces: Vec::new(),
                pool: ConstantPool::new(),
                fields: Vec::new(),
                methods: Vec::new(),
            },
            hierarchy: Hierarchy::new(),
        }
    }

    /// Uses `hierarchy` for assignability checks.
    #[must_use]
    pub fn with_hierarchy(mut self, hierarchy: &Hierarchy) -> Self {
        self.hierarchy.extend(hierarchy);
        self
    }

    /// The unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.unit.name
    }

    /// Declares an implemented interface.
    pub fn implements(&mut self, iface: impl Into<String>) -> &mut Self {
        let iface = iface.into();
        self.hierarchy.add(self.unit.name.clone(), iface.clone());
        self.unit.interfaces.push(iface);
        self
    }

    /// Declares an instance field.
    pub fn field(&mut self, name: impl Into<String>, ty: FieldType) -> &mut Self {
        self.unit.fields.push(FieldDef {
            name: name.into(),
            ty,
        });
        self
    }

    /// Adds a method, verifying its code.
    pub fn method(
        &mut self,
        name: impl Into<String>,
        ty: MethodType,
        code: CodeBuilder,
    ) -> UnitResult<&mut Self> {
        let name = name.into();
        let code = code.finish(&mut self.unit.pool)?;
        let frame = verify_method(
            &self.unit.name,
            &name,
            &ty,
            &code,
            &self.unit.pool,
            &self.hierarchy,
        )?;
        self.unit.methods.push(MethodDef {
            name,
            ty,
            max_stack: frame.max_stack,
            max_locals: frame.max_locals,
            code,
        });
        Ok(self)
    }

    /// Finishes the unit.
    #[must_use]
    pub fn build(self) -> Unit {
        self.unit
    }
}

/// An encoded unit ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// Fully qualified unit name.
    pub name: String,
    /// Unit kind.
    pub kind: UnitKind,
    /// Encoded bytes.
    pub bytes: Bytes,
}

impl GeneratedUnit {
    /// Encodes `unit`.
    pub fn from_unit(unit: &Unit) -> UnitResult<Self> {
        Ok(Self {
            name: unit.name.clone(),
            kind: unit.kind,
            bytes: unit.encode()?,
        })
    }

    /// Decodes the bytes back into a [`Unit`].
    pub fn decode(&self) -> UnitResult<Unit> {
        Unit::decode(&self.bytes)
    }

    /// File name the unit is written under.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{FILE_EXTENSION}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Unit {
        let provider = FieldType::object("rt.Provider");
        let mut builder = UnitBuilder::new("gen.Sample", UnitKind::Handler);
        builder.implements("rt.Handler").field("provider", provider.clone());
        let mut init = CodeBuilder::new();
        init.load(0)
            .load(1)
            .put_field("gen.Sample", "provider", &provider)
            .return_void();
        builder
            .method("<init>", MethodType::void(vec![provider]), init)
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_encode_decode() {
        let unit = sample();
        let bytes = unit.encode().unwrap();
        assert_eq!(&bytes[..4], b"DUNT");
        let decoded = Unit::decode(&bytes).unwrap();
        assert_eq!(decoded, unit);
        assert!(decoded.verify(&Hierarchy::new()).is_ok());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(sample().encode().unwrap(), sample().encode().unwrap());
    }

    #[test]
    fn test_rejects_bad_header() {
        assert_eq!(
            Unit::decode(b"NOPE\0\x01"),
            Err(UnitError::BadMagic(*b"NOPE"))
        );
        assert_eq!(
            Unit::decode(b"DUNT\0\x09"),
            Err(UnitError::UnsupportedVersion(9))
        );
        assert!(matches!(
            Unit::decode(b"DUN"),
            Err(UnitError::Truncated { .. })
        ));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = sample().encode().unwrap().to_vec();
        bytes.push(0);
        assert!(matches!(
            Unit::decode(&bytes),
            Err(UnitError::MalformedDescriptor { .. })
        ));
    }

    #[test]
    fn test_disassembly() {
        let listing = sample().to_string();
        assert!(listing.starts_with("handler gen.Sample implements rt.Handler\n"));
        assert!(listing.contains("  field provider Lrt.Provider;\n"));
        assert!(listing.contains("  method <init> (Lrt.Provider;)V stack=2 locals=2\n"));
        assert!(listing.contains("putfield #0 field gen.Sample.provider:Lrt.Provider;"));
    }

    #[test]
    fn test_method_is_verified_on_add() {
        let mut builder = UnitBuilder::new("gen.Bad", UnitKind::Handler);
        let mut code = CodeBuilder::new();
        code.pop().return_void();
        assert!(builder
            .method("apply", MethodType::void(vec![]), code)
            .is_err());
    }

    #[test]
    fn test_file_name() {
        let generated = GeneratedUnit::from_unit(&sample()).unwrap();
        assert_eq!(generated.file_name(), "gen.Sample.dunit");
        assert_eq!(generated.decode().unwrap().name, "gen.Sample");
    }
}
