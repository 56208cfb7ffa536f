//! Stack verifier.
//!
//! Generated code is verified before it is written: every instruction is
//! reachable with a consistent stack shape, every operand has the type the
//! instruction expects, and every path ends in a return of the declared
//! type. The same pass computes `max_stack` and `max_locals`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::descriptor::{FieldType, MethodType};
use crate::error::{UnitError, UnitResult};
use crate::insn::Instruction;
use crate::pool::{Constant, ConstantPool};

/// The root of the reference type hierarchy; every reference type is
/// assignable to it.
pub const ROOT_CLASS: &str = "lang.Object";

/// Class of string literals.
pub const STRING_CLASS: &str = "lang.String";

/// Class of class literals.
pub const CLASS_CLASS: &str = "lang.Class";

/// A verification type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VType {
    /// Any int-like value (`Z`, `B`, `C`, `S`, `I`).
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// The null reference.
    Null,
    /// An initialized reference of the named class (or array descriptor).
    Ref(String),
    /// A reference allocated by `new` whose constructor has not run.
    Uninit(String),
}

impl VType {
    /// The verification type of a value of `ty`.
    #[must_use]
    pub fn of(ty: &FieldType) -> Self {
        match ty {
            FieldType::Boolean
            | FieldType::Byte
            | FieldType::Char
            | FieldType::Short
            | FieldType::Int => Self::Int,
            FieldType::Long => Self::Long,
            FieldType::Float => Self::Float,
            FieldType::Double => Self::Double,
            reference => Self::Ref(reference.class_name()),
        }
    }

    /// A reference of class `name`.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    const fn is_reference(&self) -> bool {
        matches!(self, Self::Null | Self::Ref(_))
    }
}

impl fmt::Display for VType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("int"),
            Self::Long => f.write_str("long"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Null => f.write_str("null"),
            Self::Ref(name) => f.write_str(name),
            Self::Uninit(name) => write!(f, "uninitialized {name}"),
        }
    }
}

/// Known supertype edges.
///
/// Types not mentioned here are only assignable to themselves and to
/// [`ROOT_CLASS`].
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    supers: HashMap<String, Vec<String>>,
}

impl Hierarchy {
    /// An empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `sub` extends or implements `sup`.
    pub fn add(&mut self, sub: impl Into<String>, sup: impl Into<String>) -> &mut Self {
        self.supers.entry(sub.into()).or_default().push(sup.into());
        self
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, sub: impl Into<String>, sup: impl Into<String>) -> Self {
        self.add(sub, sup);
        self
    }

    /// Merges the edges of `other` into `self`.
    pub fn extend(&mut self, other: &Hierarchy) {
        for (sub, sups) in &other.supers {
            for sup in sups {
                self.add(sub.clone(), sup.clone());
            }
        }
    }

    /// Returns `true` if `sub` is `sup` or a transitive subtype of it.
    #[must_use]
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup || sup == ROOT_CLASS {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([sub]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            if let Some(sups) = self.supers.get(next) {
                for s in sups {
                    if s == sup {
                        return true;
                    }
                    queue.push_back(s);
                }
            }
        }
        false
    }

    /// Returns `true` if a value of `from` may be used where `to` is
    /// expected.
    #[must_use]
    pub fn is_assignable(&self, from: &VType, to: &FieldType) -> bool {
        match (from, to) {
            (
                VType::Int,
                FieldType::Boolean
                | FieldType::Byte
                | FieldType::Char
                | FieldType::Short
                | FieldType::Int,
            )
            | (VType::Long, FieldType::Long)
            | (VType::Float, FieldType::Float)
            | (VType::Double, FieldType::Double) => true,
            (VType::Null, target) => target.is_reference(),
            (VType::Ref(name), target @ (FieldType::Object(_) | FieldType::Array(_))) => {
                self.is_subtype(name, &target.class_name())
            }
            _ => false,
        }
    }

    fn merge(&self, a: &VType, b: &VType) -> Option<VType> {
        match (a, b) {
            _ if a == b => Some(a.clone()),
            (VType::Null, VType::Ref(_)) => Some(b.clone()),
            (VType::Ref(_), VType::Null) => Some(a.clone()),
            (VType::Ref(x), VType::Ref(y)) => Some(if self.is_subtype(x, y) {
                b.clone()
            } else if self.is_subtype(y, x) {
                a.clone()
            } else {
                VType::reference(ROOT_CLASS)
            }),
            _ => None,
        }
    }
}

/// Result of verifying one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Deepest operand stack reached on any path.
    pub max_stack: u16,
    /// Number of local slots used, including the receiver and parameters.
    pub max_locals: u16,
}

#[derive(Debug, Clone, PartialEq)]
struct State {
    stack: Vec<VType>,
    locals: Vec<Option<VType>>,
}

enum Flow {
    Next,
    Branch(u16),
    Jump(u16),
    Exit,
}

struct Checker<'a> {
    method: &'a str,
    ret: Option<&'a FieldType>,
    pool: &'a ConstantPool,
    hierarchy: &'a Hierarchy,
    index: usize,
}

impl Checker<'_> {
    fn fail(&self, message: impl Into<String>) -> UnitError {
        UnitError::verify(self.method, self.index, message)
    }

    fn pop(&self, state: &mut State) -> UnitResult<VType> {
        state
            .stack
            .pop()
            .ok_or_else(|| self.fail("operand stack underflow"))
    }

    fn pop_assignable(&self, state: &mut State, expected: &FieldType) -> UnitResult<VType> {
        let value = self.pop(state)?;
        if !self.hierarchy.is_assignable(&value, expected) {
            return Err(self.fail(format!("expected {expected}, found {value}")));
        }
        Ok(value)
    }

    fn pop_reference(&self, state: &mut State) -> UnitResult<VType> {
        let value = self.pop(state)?;
        if !value.is_reference() {
            return Err(self.fail(format!("expected a reference, found {value}")));
        }
        Ok(value)
    }

    fn step(&self, insn: &Instruction, state: &mut State) -> UnitResult<Flow> {
        match insn {
            Instruction::Load(slot) => {
                let value = state
                    .locals
                    .get(usize::from(*slot))
                    .cloned()
                    .flatten()
                    .ok_or_else(|| self.fail(format!("local {slot} is not initialized")))?;
                state.stack.push(value);
            }
            Instruction::Store(slot) => {
                let value = self.pop(state)?;
                let slot = usize::from(*slot);
                if state.locals.len() <= slot {
                    state.locals.resize(slot + 1, None);
                }
                state.locals[slot] = Some(value);
            }
            Instruction::PushNull => state.stack.push(VType::Null),
            Instruction::PushInt(_) => state.stack.push(VType::Int),
            Instruction::Ldc(k) => {
                let value = match self.pool.get(*k)? {
                    Constant::Int(_) => VType::Int,
                    Constant::Long(_) => VType::Long,
                    Constant::Float(_) => VType::Float,
                    Constant::Double(_) => VType::Double,
                    Constant::Str(_) => VType::reference(STRING_CLASS),
                    Constant::Class(_) => VType::reference(CLASS_CLASS),
                    other => {
                        return Err(self.fail(format!("ldc of a {} constant", other.kind_name())))
                    }
                };
                state.stack.push(value);
            }
            Instruction::GetField(k) => {
                let field = self.pool.field_at(*k)?;
                let ty = field.field_type()?;
                self.pop_assignable(state, &FieldType::object(field.owner.clone()))?;
                state.stack.push(VType::of(&ty));
            }
            Instruction::PutField(k) => {
                let field = self.pool.field_at(*k)?;
                let ty = field.field_type()?;
                self.pop_assignable(state, &ty)?;
                self.pop_assignable(state, &FieldType::object(field.owner.clone()))?;
            }
            Instruction::GetStatic(k) => {
                let ty = self.pool.field_at(*k)?.field_type()?;
                state.stack.push(VType::of(&ty));
            }
            Instruction::InvokeVirtual(k)
            | Instruction::InvokeInterface(k)
            | Instruction::InvokeStatic(k)
            | Instruction::InvokeSpecial(k) => {
                let interface = matches!(insn, Instruction::InvokeInterface(_));
                let member = self.pool.method_at(*k, interface)?;
                let ty = member.method_type()?;
                for param in ty.params.iter().rev() {
                    self.pop_assignable(state, param)?;
                }
                match insn {
                    Instruction::InvokeStatic(_) => {}
                    Instruction::InvokeSpecial(_) => {
                        if member.name != "<init>" {
                            return Err(self.fail("invokespecial of a non-constructor"));
                        }
                        match self.pop(state)? {
                            VType::Uninit(class) if class == member.owner => {
                                let ready = VType::Ref(class.clone());
                                let pending = VType::Uninit(class);
                                for v in &mut state.stack {
                                    if *v == pending {
                                        *v = ready.clone();
                                    }
                                }
                                for v in state.locals.iter_mut().flatten() {
                                    if *v == pending {
                                        *v = ready.clone();
                                    }
                                }
                            }
                            other => {
                                return Err(self.fail(format!(
                                    "constructor of {} called on {other}",
                                    member.owner
                                )))
                            }
                        }
                    }
                    _ => {
                        self.pop_assignable(state, &FieldType::object(member.owner.clone()))?;
                    }
                }
                if let Some(ret) = &ty.ret {
                    state.stack.push(VType::of(ret));
                }
            }
            Instruction::New(k) => {
                let class = self.pool.class_at(*k)?;
                state.stack.push(VType::Uninit(class.to_string()));
            }
            Instruction::NewArray(k) => {
                let element = FieldType::from_class_name(self.pool.class_at(*k)?)?;
                self.pop_assignable(state, &FieldType::Int)?;
                state
                    .stack
                    .push(VType::Ref(FieldType::array(element).class_name()));
            }
            Instruction::ArrayStore => {
                let value = self.pop_reference(state)?;
                self.pop_assignable(state, &FieldType::Int)?;
                match self.pop(state)? {
                    VType::Ref(array) if array.starts_with('[') => {
                        let element = match FieldType::parse(&array)? {
                            FieldType::Array(element) => *element,
                            other => other,
                        };
                        if !self.hierarchy.is_assignable(&value, &element) {
                            return Err(self.fail(format!(
                                "cannot store {value} into {array}"
                            )));
                        }
                    }
                    other => return Err(self.fail(format!("expected an array, found {other}"))),
                }
            }
            Instruction::CheckCast(k) => {
                let class = self.pool.class_at(*k)?.to_string();
                self.pop_reference(state)?;
                state.stack.push(VType::Ref(class));
            }
            Instruction::Dup => {
                let top = self.pop(state)?;
                state.stack.push(top.clone());
                state.stack.push(top);
            }
            Instruction::Pop => {
                self.pop(state)?;
            }
            Instruction::Swap => {
                let a = self.pop(state)?;
                let b = self.pop(state)?;
                state.stack.push(a);
                state.stack.push(b);
            }
            Instruction::IfFalse(target) => {
                self.pop_assignable(state, &FieldType::Boolean)?;
                return Ok(Flow::Branch(*target));
            }
            Instruction::Goto(target) => return Ok(Flow::Jump(*target)),
            Instruction::Return => {
                if let Some(ret) = self.ret {
                    return Err(self.fail(format!("`return` in a method returning {ret}")));
                }
                return Ok(Flow::Exit);
            }
            Instruction::ReturnValue => {
                let Some(ret) = self.ret else {
                    return Err(self.fail("`returnvalue` in a void method"));
                };
                self.pop_assignable(state, ret)?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Next)
    }
}

fn merge_into(hierarchy: &Hierarchy, slot: &mut Option<State>, incoming: &State) -> Option<bool> {
    let Some(current) = slot else {
        *slot = Some(incoming.clone());
        return Some(true);
    };
    if current.stack.len() != incoming.stack.len() {
        return None;
    }
    let mut merged = current.clone();
    for (dst, src) in merged.stack.iter_mut().zip(&incoming.stack) {
        *dst = hierarchy.merge(dst, src)?;
    }
    let len = merged.locals.len().max(incoming.locals.len());
    merged.locals.resize(len, None);
    for (i, dst) in merged.locals.iter_mut().enumerate() {
        let src = incoming.locals.get(i).cloned().flatten();
        *dst = match (dst.as_ref(), src.as_ref()) {
            (Some(a), Some(b)) => hierarchy.merge(a, b),
            _ => None,
        };
    }
    let changed = merged != *current;
    *current = merged;
    Some(changed)
}

/// Verifies an instance method of `owner` and computes its frame size.
///
/// Local 0 holds the receiver; parameters follow in order.
pub fn verify_method(
    owner: &str,
    name: &str,
    ty: &MethodType,
    code: &[Instruction],
    pool: &ConstantPool,
    hierarchy: &Hierarchy,
) -> UnitResult<Frame> {
    let mut checker = Checker {
        method: name,
        ret: ty.ret.as_ref(),
        pool,
        hierarchy,
        index: 0,
    };
    if code.is_empty() {
        return Err(checker.fail("empty method body"));
    }

    let mut entry_locals = vec![Some(VType::reference(owner))];
    entry_locals.extend(ty.params.iter().map(|p| Some(VType::of(p))));
    let mut states: Vec<Option<State>> = vec![None; code.len()];
    states[0] = Some(State {
        stack: Vec::new(),
        locals: entry_locals,
    });

    let mut max_stack = 0usize;
    let mut max_locals = ty.params.len() + 1;
    let mut worklist = VecDeque::from([0usize]);

    while let Some(index) = worklist.pop_front() {
        checker.index = index;
        let Some(mut state) = states[index].clone() else {
            continue;
        };
        let flow = checker.step(&code[index], &mut state)?;
        max_stack = max_stack.max(state.stack.len());
        max_locals = max_locals.max(state.locals.len());

        let mut successors = Vec::with_capacity(2);
        match flow {
            Flow::Next => successors.push(index + 1),
            Flow::Branch(target) => {
                successors.push(index + 1);
                successors.push(usize::from(target));
            }
            Flow::Jump(target) => successors.push(usize::from(target)),
            Flow::Exit => {}
        }
        for next in successors {
            if next >= code.len() {
                return Err(checker.fail("control falls off the end of the method"));
            }
            match merge_into(hierarchy, &mut states[next], &state) {
                Some(true) => worklist.push_back(next),
                Some(false) => {}
                None => {
                    return Err(checker.fail(format!(
                        "inconsistent stack shape at join point {next}"
                    )))
                }
            }
        }
    }

    if let Some(dead) = states.iter().position(Option::is_none) {
        checker.index = dead;
        return Err(checker.fail("unreachable instruction"));
    }

    Ok(Frame {
        max_stack: u16::try_from(max_stack).map_err(|_| UnitError::TableOverflow("stack"))?,
        max_locals: u16::try_from(max_locals).map_err(|_| UnitError::TableOverflow("locals"))?,
    })
}

/// Runs straight-line `code` from an empty stack and the given locals and
/// returns the resulting operand stack.
///
/// Branches and returns are rejected; this is meant for checking the net
/// effect of a code fragment.
pub fn stack_effect(
    code: &[Instruction],
    pool: &ConstantPool,
    locals: &[VType],
    hierarchy: &Hierarchy,
) -> UnitResult<Vec<VType>> {
    let mut checker = Checker {
        method: "<fragment>",
        ret: None,
        pool,
        hierarchy,
        index: 0,
    };
    let mut state = State {
        stack: Vec::new(),
        locals: locals.iter().cloned().map(Some).collect(),
    };
    for (index, insn) in code.iter().enumerate() {
        checker.index = index;
        if insn.branch_target().is_some() || insn.ends_block() {
            return Err(checker.fail(format!("`{}` in a straight-line fragment", insn.mnemonic())));
        }
        checker.step(insn, &mut state)?;
    }
    Ok(state.stack)
}
