//! Instruction set.
//!
//! A small stack machine. Every value occupies one stack slot and one local
//! slot regardless of its type. Branch targets are instruction indices, not
//! byte offsets.
//!
//! | Opcode | Mnemonic | Operand | Stack |
//! |--------|----------|---------|-------|
//! | `0x01` | `load` | `u8` local | → v |
//! | `0x02` | `store` | `u8` local | v → |
//! | `0x03` | `null` | | → null |
//! | `0x04` | `int` | `i32` | → int |
//! | `0x05` | `ldc` | `u16` pool | → value |
//! | `0x10` | `getfield` | `u16` field | obj → v |
//! | `0x11` | `putfield` | `u16` field | obj, v → |
//! | `0x12` | `getstatic` | `u16` field | → v |
//! | `0x20` | `invokevirtual` | `u16` method | obj, args → [ret] |
//! | `0x21` | `invokeinterface` | `u16` interface method | obj, args → [ret] |
//! | `0x22` | `invokestatic` | `u16` method | args → [ret] |
//! | `0x23` | `invokespecial` | `u16` method | obj, args → [ret] |
//! | `0x30` | `new` | `u16` class | → uninit |
//! | `0x31` | `newarray` | `u16` element class | len → array |
//! | `0x32` | `arraystore` | | array, index, v → |
//! | `0x33` | `checkcast` | `u16` class | obj → obj |
//! | `0x40` | `dup` | | v → v, v |
//! | `0x41` | `pop` | | v → |
//! | `0x42` | `swap` | | a, b → b, a |
//! | `0x50` | `iffalse` | `u16` target | int → |
//! | `0x51` | `goto` | `u16` target | |
//! | `0x60` | `return` | | |
//! | `0x61` | `returnvalue` | | v → |

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{UnitError, UnitResult};
use crate::pool::ConstantPool;
use crate::wire::Reader;

/// A single instruction.
///
/// `K` is the type of constant references: `u16` pool indices in an encoded
/// unit, [`Constant`](crate::Constant) values while code is being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<K = u16> {
    /// Push a local.
    Load(u8),
    /// Pop into a local.
    Store(u8),
    /// Push null.
    PushNull,
    /// Push an int.
    PushInt(i32),
    /// Push a literal constant.
    Ldc(K),
    /// Read an instance field.
    GetField(K),
    /// Write an instance field.
    PutField(K),
    /// Read a static field.
    GetStatic(K),
    /// Call a class method.
    InvokeVirtual(K),
    /// Call an interface method.
    InvokeInterface(K),
    /// Call a static method.
    InvokeStatic(K),
    /// Call a constructor.
    InvokeSpecial(K),
    /// Allocate an uninitialized object.
    New(K),
    /// Allocate a reference array.
    NewArray(K),
    /// Store into an array element.
    ArrayStore,
    /// Checked reference cast.
    CheckCast(K),
    /// Duplicate the top of stack.
    Dup,
    /// Discard the top of stack.
    Pop,
    /// Swap the two topmost values.
    Swap,
    /// Branch when the popped int is zero.
    IfFalse(u16),
    /// Unconditional branch.
    Goto(u16),
    /// Return from a `V` method.
    Return,
    /// Return the popped value.
    ReturnValue,
}

impl<K> Instruction<K> {
    /// Returns the opcode byte.
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        match self {
            Self::Load(_) => 0x01,
            Self::Store(_) => 0x02,
            Self::PushNull => 0x03,
            Self::PushInt(_) => 0x04,
            Self::Ldc(_) => 0x05,
            Self::GetField(_) => 0x10,
            Self::PutField(_) => 0x11,
            Self::GetStatic(_) => 0x12,
            Self::InvokeVirtual(_) => 0x20,
            Self::InvokeInterface(_) => 0x21,
            Self::InvokeStatic(_) => 0x22,
            Self::InvokeSpecial(_) => 0x23,
            Self::New(_) => 0x30,
            Self::NewArray(_) => 0x31,
            Self::ArrayStore => 0x32,
            Self::CheckCast(_) => 0x33,
            Self::Dup => 0x40,
            Self::Pop => 0x41,
            Self::Swap => 0x42,
            Self::IfFalse(_) => 0x50,
            Self::Goto(_) => 0x51,
            Self::Return => 0x60,
            Self::ReturnValue => 0x61,
        }
    }

    /// Returns the assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Load(_) => "load",
            Self::Store(_) => "store",
            Self::PushNull => "null",
            Self::PushInt(_) => "int",
            Self::Ldc(_) => "ldc",
            Self::GetField(_) => "getfield",
            Self::PutField(_) => "putfield",
            Self::GetStatic(_) => "getstatic",
            Self::InvokeVirtual(_) => "invokevirtual",
            Self::InvokeInterface(_) => "invokeinterface",
            Self::InvokeStatic(_) => "invokestatic",
            Self::InvokeSpecial(_) => "invokespecial",
            Self::New(_) => "new",
            Self::NewArray(_) => "newarray",
            Self::ArrayStore => "arraystore",
            Self::CheckCast(_) => "checkcast",
            Self::Dup => "dup",
            Self::Pop => "pop",
            Self::Swap => "swap",
            Self::IfFalse(_) => "iffalse",
            Self::Goto(_) => "goto",
            Self::Return => "return",
            Self::ReturnValue => "returnvalue",
        }
    }

    /// Returns `true` if control never falls through to the next
    /// instruction.
    #[must_use]
    pub const fn ends_block(&self) -> bool {
        matches!(self, Self::Goto(_) | Self::Return | Self::ReturnValue)
    }

    /// Returns the branch target, if any.
    #[must_use]
    pub const fn branch_target(&self) -> Option<u16> {
        match self {
            Self::IfFalse(target) | Self::Goto(target) => Some(*target),
            _ => None,
        }
    }

    /// Returns the constant reference, if any.
    pub fn constant(&self) -> Option<&K> {
        match self {
            Self::Ldc(k)
            | Self::GetField(k)
            | Self::PutField(k)
            | Self::GetStatic(k)
            | Self::InvokeVirtual(k)
            | Self::InvokeInterface(k)
            | Self::InvokeStatic(k)
            | Self::InvokeSpecial(k)
            | Self::New(k)
            | Self::NewArray(k)
            | Self::CheckCast(k) => Some(k),
            _ => None,
        }
    }

    /// Rewrites the constant reference with `f`, leaving other operands
    /// unchanged.
    pub fn try_map<L, E>(self, f: impl FnOnce(K) -> Result<L, E>) -> Result<Instruction<L>, E> {
        Ok(match self {
            Self::Load(n) => Instruction::Load(n),
            Self::Store(n) => Instruction::Store(n),
            Self::PushNull => Instruction::PushNull,
            Self::PushInt(v) => Instruction::PushInt(v),
            Self::Ldc(k) => Instruction::Ldc(f(k)?),
            Self::GetField(k) => Instruction::GetField(f(k)?),
            Self::PutField(k) => Instruction::PutField(f(k)?),
            Self::GetStatic(k) => Instruction::GetStatic(f(k)?),
            Self::InvokeVirtual(k) => Instruction::InvokeVirtual(f(k)?),
            Self::InvokeInterface(k) => Instruction::InvokeInterface(f(k)?),
            Self::InvokeStatic(k) => Instruction::InvokeStatic(f(k)?),
            Self::InvokeSpecial(k) => Instruction::InvokeSpecial(f(k)?),
            Self::New(k) => Instruction::New(f(k)?),
            Self::NewArray(k) => Instruction::NewArray(f(k)?),
            Self::ArrayStore => Instruction::ArrayStore,
            Self::CheckCast(k) => Instruction::CheckCast(f(k)?),
            Self::Dup => Instruction::Dup,
            Self::Pop => Instruction::Pop,
            Self::Swap => Instruction::Swap,
            Self::IfFalse(t) => Instruction::IfFalse(t),
            Self::Goto(t) => Instruction::Goto(t),
            Self::Return => Instruction::Return,
            Self::ReturnValue => Instruction::ReturnValue,
        })
    }

    pub(crate) fn with_target(self, target: u16) -> Self {
        match self {
            Self::IfFalse(_) => Self::IfFalse(target),
            Self::Goto(_) => Self::Goto(target),
            other => other,
        }
    }
}

impl Instruction<u16> {
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.opcode());
        match self {
            Self::Load(n) | Self::Store(n) => buf.put_u8(*n),
            Self::PushInt(v) => buf.put_i32(*v),
            Self::IfFalse(t) | Self::Goto(t) => buf.put_u16(*t),
            other => {
                if let Some(k) = other.constant() {
                    buf.put_u16(*k);
                }
            }
        }
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> UnitResult<Self> {
        const CTX: &str = "instruction operand";
        let opcode = reader.u8("opcode")?;
        Ok(match opcode {
            0x01 => Self::Load(reader.u8(CTX)?),
            0x02 => Self::Store(reader.u8(CTX)?),
            0x03 => Self::PushNull,
            0x04 => Self::PushInt(reader.i32(CTX)?),
            0x05 => Self::Ldc(reader.u16(CTX)?),
            0x10 => Self::GetField(reader.u16(CTX)?),
            0x11 => Self::PutField(reader.u16(CTX)?),
            0x12 => Self::GetStatic(reader.u16(CTX)?),
            0x20 => Self::InvokeVirtual(reader.u16(CTX)?),
            0x21 => Self::InvokeInterface(reader.u16(CTX)?),
            0x22 => Self::InvokeStatic(reader.u16(CTX)?),
            0x23 => Self::InvokeSpecial(reader.u16(CTX)?),
            0x30 => Self::New(reader.u16(CTX)?),
            0x31 => Self::NewArray(reader.u16(CTX)?),
            0x32 => Self::ArrayStore,
            0x33 => Self::CheckCast(reader.u16(CTX)?),
            0x40 => Self::Dup,
            0x41 => Self::Pop,
            0x42 => Self::Swap,
            0x50 => Self::IfFalse(reader.u16(CTX)?),
            0x51 => Self::Goto(reader.u16(CTX)?),
            0x60 => Self::Return,
            0x61 => Self::ReturnValue,
            other => return Err(UnitError::UnknownOpcode(other)),
        })
    }

    /// Formats the instruction with its constant resolved against `pool`.
    #[must_use]
    pub fn display<'a>(&'a self, pool: &'a ConstantPool) -> DisplayInstruction<'a> {
        DisplayInstruction { insn: self, pool }
    }
}

/// Helper returned by [`Instruction::display`].
pub struct DisplayInstruction<'a> {
    insn: &'a Instruction,
    pool: &'a ConstantPool,
}

impl fmt::Display for DisplayInstruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let insn = self.insn;
        f.write_str(insn.mnemonic())?;
        match insn {
            Instruction::Load(n) | Instruction::Store(n) => write!(f, " {n}"),
            Instruction::PushInt(v) => write!(f, " {v}"),
            Instruction::IfFalse(t) | Instruction::Goto(t) => write!(f, " -> {t}"),
            other => match other.constant() {
                Some(&k) => match self.pool.get(k) {
                    Ok(constant) => write!(f, " #{k} {constant}"),
                    Err(_) => write!(f, " #{k} <invalid>"),
                },
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> Vec<Instruction> {
        vec![
            Instruction::Load(1),
            Instruction::Store(2),
            Instruction::PushNull,
            Instruction::PushInt(-7),
            Instruction::Ldc(3),
            Instruction::GetField(4),
            Instruction::PutField(5),
            Instruction::GetStatic(6),
            Instruction::InvokeVirtual(7),
            Instruction::InvokeInterface(8),
            Instruction::InvokeStatic(9),
            Instruction::InvokeSpecial(10),
            Instruction::New(11),
            Instruction::NewArray(12),
            Instruction::ArrayStore,
            Instruction::CheckCast(13),
            Instruction::Dup,
            Instruction::Pop,
            Instruction::Swap,
            Instruction::IfFalse(20),
            Instruction::Goto(21),
            Instruction::Return,
            Instruction::ReturnValue,
        ]
    }

    #[test]
    fn test_every_opcode_decodes_to_itself() {
        let mut buf = BytesMut::new();
        let insns = all();
        for insn in &insns {
            insn.encode(&mut buf);
        }
        let mut reader = Reader::new(&buf);
        for insn in &insns {
            assert_eq!(&Instruction::decode(&mut reader).unwrap(), insn);
        }
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(
            Instruction::decode(&mut Reader::new(&[0xee])),
            Err(UnitError::UnknownOpcode(0xee))
        );
    }

    #[test]
    fn test_display_resolves_constants() {
        let mut pool = ConstantPool::new();
        let idx = pool
            .intern(crate::Constant::Str("GET".into()))
            .unwrap();
        assert_eq!(
            Instruction::Ldc(idx).display(&pool).to_string(),
            "ldc #0 string \"GET\""
        );
        assert_eq!(Instruction::Goto(4).display(&pool).to_string(), "goto -> 4");
        assert_eq!(Instruction::Ldc(9).display(&pool).to_string(), "ldc #9 <invalid>");
    }
}
