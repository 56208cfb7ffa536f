//! Code builder.
//!
//! [`CodeBuilder`] assembles a method body with symbolic constants and
//! forward labels. [`CodeBuilder::finish`] interns the constants into a pool
//! and patches branch targets.

use crate::descriptor::{FieldType, MethodType};
use crate::error::{UnitError, UnitResult};
use crate::insn::Instruction;
use crate::pool::{Constant, ConstantPool, MemberRef};

/// A branch target that may be bound after it is first used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(u16);

/// Assembler for a single method body.
///
/// ```
/// use daedalus_unit::{CodeBuilder, ConstantPool, FieldType, MethodType};
///
/// let mut code = CodeBuilder::new();
/// let done = code.new_label();
/// code.load(1)
///     .invoke_interface("app.Flag", "isSet", &MethodType::returning(vec![], FieldType::Boolean))
///     .if_false(done)
///     .push_int(1)
///     .return_value();
/// code.bind(done).push_int(0).return_value();
///
/// let mut pool = ConstantPool::new();
/// let insns = code.finish(&mut pool).unwrap();
/// assert_eq!(insns.len(), 7);
/// assert_eq!(insns[2].branch_target(), Some(5));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CodeBuilder {
    insns: Vec<Instruction<Constant>>,
    labels: Vec<Option<u16>>,
}

impl CodeBuilder {
    /// Creates an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.insns.len()
    }

    /// Returns `true` if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// Emits a raw instruction.
    pub fn emit(&mut self, insn: Instruction<Constant>) -> &mut Self {
        self.insns.push(insn);
        self
    }

    /// `load n`
    pub fn load(&mut self, slot: u8) -> &mut Self {
        self.emit(Instruction::Load(slot))
    }

    /// `store n`
    pub fn store(&mut self, slot: u8) -> &mut Self {
        self.emit(Instruction::Store(slot))
    }

    /// `null`
    pub fn push_null(&mut self) -> &mut Self {
        self.emit(Instruction::PushNull)
    }

    /// `int v`
    pub fn push_int(&mut self, value: i32) -> &mut Self {
        self.emit(Instruction::PushInt(value))
    }

    /// `ldc` of an arbitrary literal constant.
    pub fn ldc(&mut self, constant: Constant) -> &mut Self {
        self.emit(Instruction::Ldc(constant))
    }

    /// `ldc` of a string literal.
    pub fn push_str(&mut self, value: &str) -> &mut Self {
        self.ldc(Constant::Str(value.to_string()))
    }

    /// `ldc` of a class literal.
    pub fn push_class(&mut self, ty: &FieldType) -> &mut Self {
        self.ldc(Constant::class_of(ty))
    }

    /// `getfield`
    pub fn get_field(&mut self, owner: &str, name: &str, ty: &FieldType) -> &mut Self {
        self.emit(Instruction::GetField(field(owner, name, ty)))
    }

    /// `putfield`
    pub fn put_field(&mut self, owner: &str, name: &str, ty: &FieldType) -> &mut Self {
        self.emit(Instruction::PutField(field(owner, name, ty)))
    }

    /// `getstatic`
    pub fn get_static(&mut self, owner: &str, name: &str, ty: &FieldType) -> &mut Self {
        self.emit(Instruction::GetStatic(field(owner, name, ty)))
    }

    /// `invokevirtual`
    pub fn invoke_virtual(&mut self, owner: &str, name: &str, ty: &MethodType) -> &mut Self {
        self.emit(Instruction::InvokeVirtual(method(owner, name, ty)))
    }

    /// `invokeinterface`
    pub fn invoke_interface(&mut self, owner: &str, name: &str, ty: &MethodType) -> &mut Self {
        self.emit(Instruction::InvokeInterface(Constant::InterfaceMethod(
            MemberRef::new(owner, name, ty.descriptor()),
        )))
    }

    /// `invokestatic`
    pub fn invoke_static(&mut self, owner: &str, name: &str, ty: &MethodType) -> &mut Self {
        self.emit(Instruction::InvokeStatic(method(owner, name, ty)))
    }

    /// `invokespecial`
    pub fn invoke_special(&mut self, owner: &str, name: &str, ty: &MethodType) -> &mut Self {
        self.emit(Instruction::InvokeSpecial(method(owner, name, ty)))
    }

    /// `new`
    pub fn new_object(&mut self, class: &str) -> &mut Self {
        self.emit(Instruction::New(Constant::Class(class.to_string())))
    }

    /// `newarray` with `element` as component type.
    pub fn new_array(&mut self, element: &FieldType) -> &mut Self {
        self.emit(Instruction::NewArray(Constant::class_of(element)))
    }

    /// `arraystore`
    pub fn array_store(&mut self) -> &mut Self {
        self.emit(Instruction::ArrayStore)
    }

    /// `checkcast`
    pub fn check_cast(&mut self, ty: &FieldType) -> &mut Self {
        self.emit(Instruction::CheckCast(Constant::class_of(ty)))
    }

    /// `dup`
    pub fn dup(&mut self) -> &mut Self {
        self.emit(Instruction::Dup)
    }

    /// `pop`
    pub fn pop(&mut self) -> &mut Self {
        self.emit(Instruction::Pop)
    }

    /// `swap`
    pub fn swap(&mut self) -> &mut Self {
        self.emit(Instruction::Swap)
    }

    /// `return`
    pub fn return_void(&mut self) -> &mut Self {
        self.emit(Instruction::Return)
    }

    /// `returnvalue`
    pub fn return_value(&mut self) -> &mut Self {
        self.emit(Instruction::ReturnValue)
    }

    /// Creates an unbound label.
    pub fn new_label(&mut self) -> Label {
        let id = u16::try_from(self.labels.len()).unwrap_or(u16::MAX);
        self.labels.push(None);
        Label(id)
    }

    /// Binds `label` to the next emitted instruction.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let at = u16::try_from(self.insns.len()).unwrap_or(u16::MAX);
        if let Some(slot) = self.labels.get_mut(usize::from(label.0)) {
            *slot = Some(at);
        }
        self
    }

    /// `iffalse label`
    pub fn if_false(&mut self, label: Label) -> &mut Self {
        self.emit(Instruction::IfFalse(label.0))
    }

    /// `goto label`
    pub fn goto(&mut self, label: Label) -> &mut Self {
        self.emit(Instruction::Goto(label.0))
    }

    /// Interns every constant into `pool` and resolves labels.
    pub fn finish(self, pool: &mut ConstantPool) -> UnitResult<Vec<Instruction>> {
        if self.insns.len() > usize::from(u16::MAX) {
            return Err(UnitError::TableOverflow("code"));
        }
        let labels = self.labels;
        self.insns
            .into_iter()
            .map(|insn| {
                let insn = match insn.branch_target() {
                    Some(label) => {
                        let target = labels
                            .get(usize::from(label))
                            .copied()
                            .flatten()
                            .ok_or(UnitError::UnboundLabel(label))?;
                        insn.with_target(target)
                    }
                    None => insn,
                };
                insn.try_map(|constant| pool.intern(constant))
            })
            .collect()
    }
}

fn field(owner: &str, name: &str, ty: &FieldType) -> Constant {
    Constant::Field(MemberRef::new(owner, name, ty.descriptor()))
}

fn method(owner: &str, name: &str, ty: &MethodType) -> Constant {
    Constant::Method(MemberRef::new(owner, name, ty.descriptor()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_label_is_an_error() {
        let mut code = CodeBuilder::new();
        let label = code.new_label();
        code.goto(label);
        let mut pool = ConstantPool::new();
        assert_eq!(code.finish(&mut pool), Err(UnitError::UnboundLabel(0)));
    }

    #[test]
    fn test_constants_are_interned() {
        let mut code = CodeBuilder::new();
        code.push_str("GET").push_str("GET").pop().pop().return_void();
        let mut pool = ConstantPool::new();
        let insns = code.finish(&mut pool).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(insns[0], Instruction::Ldc(0));
        assert_eq!(insns[1], Instruction::Ldc(0));
    }
}
