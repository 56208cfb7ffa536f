//! In-memory loader and interpreter for generated units.
//!
//! The [`Loader`] decodes and verifies units; the resulting [`Machine`]
//! executes their methods against native runtime objects. Runtime static
//! members (`List.of`, `Optional.ofNullable`, box `valueOf`, ...) are
//! implemented natively; application statics such as binder methods are
//! registered on the loader.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use daedalus_model::{names, PrimitiveKind};
use daedalus_unit::{
    Constant, FieldType, GeneratedUnit, Hierarchy, Instruction, MemberRef, Unit, UnitKind,
};
use tracing::{debug, trace};

use crate::context::{SyntheticContext, NO_CONTENT};
use crate::error::{TestError, TestResult};
use crate::router::RecordingRouter;
use crate::value::{ArrayRef, Instance, Value};

/// Default instruction budget per top-level invocation.
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

type StaticFn = Arc<dyn Fn(&[Value]) -> TestResult<Value> + Send + Sync>;

/// Collects units and links them into a [`Machine`].
#[derive(Clone)]
pub struct Loader {
    units: HashMap<String, Unit>,
    hierarchy: Hierarchy,
    statics: HashMap<(String, String), StaticFn>,
    step_limit: usize,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .field("step_limit", &self.step_limit)
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Creates a loader knowing only the runtime type hierarchy.
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            hierarchy: Hierarchy::new()
                .with(names::CLASS, names::TYPE)
                .with(names::REIFIED, names::TYPE),
            statics: HashMap::new(),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Records that `sub` is assignable to `sup`.
    #[must_use]
    pub fn with_subtype(mut self, sub: impl Into<String>, sup: impl Into<String>) -> Self {
        self.hierarchy.add(sub, sup);
        self
    }

    /// Registers an application static method, e.g. a binder.
    #[must_use]
    pub fn with_static<F>(mut self, owner: impl Into<String>, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> TestResult<Value> + Send + Sync + 'static,
    {
        self.statics.insert((owner.into(), name.into()), Arc::new(body));
        self
    }

    /// Sets the instruction budget per invocation.
    #[must_use]
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Decodes and adds a unit.
    pub fn load(&mut self, bytes: &[u8]) -> TestResult<&Unit> {
        self.add(Unit::decode(bytes)?)
    }

    /// Adds an encoded unit.
    pub fn load_generated(&mut self, unit: &GeneratedUnit) -> TestResult<&Unit> {
        self.load(&unit.bytes)
    }

    /// Adds every unit of `units`.
    pub fn load_all<'a, I>(&mut self, units: I) -> TestResult<()>
    where
        I: IntoIterator<Item = &'a GeneratedUnit>,
    {
        for unit in units {
            self.load_generated(unit)?;
        }
        Ok(())
    }

    /// Adds a decoded unit.
    pub fn add(&mut self, unit: Unit) -> TestResult<&Unit> {
        let name = unit.name.clone();
        if self.units.contains_key(&name) {
            return Err(TestError::DuplicateUnit(name));
        }
        for iface in &unit.interfaces {
            self.hierarchy.add(name.clone(), iface.clone());
        }
        debug!(unit = %name, kind = %unit.kind, "loaded unit");
        Ok(self.units.entry(name).or_insert(unit))
    }

    /// Verifies every unit and links them.
    ///
    /// Every unit instantiated by another unit must be loaded.
    pub fn link(self) -> TestResult<Machine> {
        for unit in self.units.values() {
            unit.verify(&self.hierarchy)?;
            for method in &unit.methods {
                for insn in &method.code {
                    if let Instruction::New(k) = insn {
                        let class = unit.pool.class_at(*k)?;
                        if !self.units.contains_key(class) {
                            return Err(TestError::UnknownUnit(class.to_string()));
                        }
                    }
                }
            }
        }
        Ok(Machine {
            units: self.units,
            hierarchy: self.hierarchy,
            statics: self.statics,
            step_limit: self.step_limit,
        })
    }
}

/// Executes loaded units.
pub struct Machine {
    units: HashMap<String, Unit>,
    hierarchy: Hierarchy,
    statics: HashMap<(String, String), StaticFn>,
    step_limit: usize,
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

struct Budget {
    left: usize,
    limit: usize,
}

impl Budget {
    fn tick(&mut self) -> TestResult<()> {
        self.left = self
            .left
            .checked_sub(1)
            .ok_or(TestError::StepLimit(self.limit))?;
        Ok(())
    }
}

impl Machine {
    /// The loaded unit called `name`.
    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    /// Names of the loaded units of `kind`, sorted.
    pub fn unit_names(&self, kind: UnitKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .units
            .values()
            .filter(|u| u.kind == kind)
            .map(|u| u.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Creates an instance of unit `name` by running `<init>(provider)`.
    pub fn instantiate(&self, name: &str, provider: Value) -> TestResult<Value> {
        if !self.units.contains_key(name) {
            return Err(TestError::UnknownUnit(name.to_string()));
        }
        let instance = Value::Instance(Arc::new(Instance::new(name)));
        self.invoke(&instance, "<init>", vec![provider])?;
        Ok(instance)
    }

    /// Invokes method `name` on `receiver`.
    pub fn invoke(&self, receiver: &Value, name: &str, args: Vec<Value>) -> TestResult<Value> {
        let mut budget = Budget {
            left: self.step_limit,
            limit: self.step_limit,
        };
        self.call(receiver, name, args, &mut budget)
    }

    /// Instantiates registration unit `name` with `provider` and installs it
    /// on `router`.
    pub fn install(&self, name: &str, provider: Value, router: &RecordingRouter) -> TestResult<()> {
        let registration = self.instantiate(name, provider)?;
        self.invoke(&registration, "install", vec![router.to_value()])?;
        Ok(())
    }

    /// Dispatches `ctx` to a handler instance.
    pub fn dispatch(&self, handler: &Value, ctx: &SyntheticContext) -> TestResult<Value> {
        self.invoke(handler, "apply", vec![ctx.to_value()])
    }

    fn call(
        &self,
        receiver: &Value,
        name: &str,
        args: Vec<Value>,
        budget: &mut Budget,
    ) -> TestResult<Value> {
        match receiver {
            Value::Instance(instance) => {
                let unit = self
                    .units
                    .get(&instance.unit)
                    .ok_or_else(|| TestError::UnknownUnit(instance.unit.clone()))?;
                let mut locals = Vec::with_capacity(args.len() + 1);
                locals.push(receiver.clone());
                locals.extend(args);
                self.run(unit, name, locals, budget)
            }
            Value::Native(object) => object.invoke(name, &args),
            Value::Boxed(kind, inner) if name == unbox_name(*kind) => Ok((**inner).clone()),
            Value::Null => Err(TestError::fault(format!("call of {name} on null"))),
            other => Err(TestError::no_method(
                other.class_name().unwrap_or_default(),
                name,
            )),
        }
    }

    fn run(&self, unit: &Unit, name: &str, mut locals: Vec<Value>, budget: &mut Budget) -> TestResult<Value> {
        let method = unit
            .method(name)
            .ok_or_else(|| TestError::no_method(&unit.name, name))?;
        trace!(unit = %unit.name, method = name, "enter");
        let mut stack: Vec<Value> = Vec::with_capacity(usize::from(method.max_stack));
        let mut pc = 0usize;

        loop {
            budget.tick()?;
            let insn = method
                .code
                .get(pc)
                .ok_or_else(|| TestError::fault(format!("pc {pc} out of range in {name}")))?;
            pc += 1;
            match insn {
                Instruction::Load(slot) => {
                    let value = locals
                        .get(usize::from(*slot))
                        .cloned()
                        .ok_or_else(|| TestError::fault(format!("load of unset local {slot}")))?;
                    stack.push(value);
                }
                Instruction::Store(slot) => {
                    let value = pop(&mut stack)?;
                    let slot = usize::from(*slot);
                    if locals.len() <= slot {
                        locals.resize(slot + 1, Value::Null);
                    }
                    locals[slot] = value;
                }
                Instruction::PushNull => stack.push(Value::Null),
                Instruction::PushInt(i) => stack.push(Value::Int(*i)),
                Instruction::Ldc(k) => stack.push(match unit.pool.get(*k)? {
                    Constant::Int(i) => Value::Int(*i),
                    Constant::Long(l) => Value::Long(*l),
                    Constant::Float(bits) => Value::Float(f32::from_bits(*bits)),
                    Constant::Double(bits) => Value::Double(f64::from_bits(*bits)),
                    Constant::Str(s) => Value::Str(s.clone()),
                    Constant::Class(class) => Value::Class(class.clone()),
                    other => return Err(TestError::fault(format!("ldc of {other}"))),
                }),
                Instruction::GetField(k) => {
                    let field = unit.pool.field_at(*k)?;
                    let value = instance(&pop(&mut stack)?)?.field(&field.name);
                    stack.push(value);
                }
                Instruction::PutField(k) => {
                    let field = unit.pool.field_at(*k)?;
                    let value = pop(&mut stack)?;
                    instance(&pop(&mut stack)?)?.set_field(&field.name, value);
                }
                Instruction::GetStatic(k) => {
                    stack.push(static_field(unit.pool.field_at(*k)?));
                }
                Instruction::InvokeVirtual(k)
                | Instruction::InvokeInterface(k)
                | Instruction::InvokeStatic(k)
                | Instruction::InvokeSpecial(k) => {
                    let interface = matches!(insn, Instruction::InvokeInterface(_));
                    let member = unit.pool.method_at(*k, interface)?;
                    let ty = member.method_type()?;
                    let split = stack
                        .len()
                        .checked_sub(ty.params.len())
                        .ok_or_else(|| TestError::fault("operand stack underflow"))?;
                    let args = stack.split_off(split);
                    let result = if matches!(insn, Instruction::InvokeStatic(_)) {
                        self.call_static(member, &args)?
                    } else {
                        let receiver = pop(&mut stack)?;
                        self.call(&receiver, &member.name, args, budget)?
                    };
                    if ty.ret.is_some() {
                        stack.push(result);
                    }
                }
                Instruction::New(k) => {
                    let class = unit.pool.class_at(*k)?;
                    stack.push(Value::Instance(Arc::new(Instance::new(class))));
                }
                Instruction::NewArray(k) => {
                    let element = FieldType::from_class_name(unit.pool.class_at(*k)?)?;
                    let len = pop(&mut stack)?.as_int()?;
                    let len = usize::try_from(len)
                        .map_err(|_| TestError::fault(format!("negative array size {len}")))?;
                    stack.push(Value::Array(ArrayRef::new(
                        FieldType::array(element).class_name(),
                        len,
                    )));
                }
                Instruction::ArrayStore => {
                    let value = pop(&mut stack)?;
                    let index = pop(&mut stack)?.as_int()?;
                    match pop(&mut stack)? {
                        Value::Array(array) => array.store(index, value)?,
                        other => return Err(TestError::mismatch("array", other)),
                    }
                }
                Instruction::CheckCast(k) => {
                    let target = unit.pool.class_at(*k)?;
                    let top = stack
                        .last()
                        .ok_or_else(|| TestError::fault("operand stack underflow"))?;
                    if let Some(class) = top.class_name() {
                        if !self.hierarchy.is_subtype(&class, target) {
                            return Err(TestError::mismatch(target, top));
                        }
                    }
                }
                Instruction::Dup => {
                    let top = stack
                        .last()
                        .cloned()
                        .ok_or_else(|| TestError::fault("operand stack underflow"))?;
                    stack.push(top);
                }
                Instruction::Pop => {
                    pop(&mut stack)?;
                }
                Instruction::Swap => {
                    let a = pop(&mut stack)?;
                    let b = pop(&mut stack)?;
                    stack.push(a);
                    stack.push(b);
                }
                Instruction::IfFalse(target) => {
                    if pop(&mut stack)?.as_int()? == 0 {
                        pc = usize::from(*target);
                    }
                }
                Instruction::Goto(target) => pc = usize::from(*target),
                Instruction::Return => return Ok(Value::Null),
                Instruction::ReturnValue => return pop(&mut stack),
            }
        }
    }

    fn call_static(&self, member: &MemberRef, args: &[Value]) -> TestResult<Value> {
        if let Some(body) = self.statics.get(&(member.owner.clone(), member.name.clone())) {
            return body(args);
        }
        let owner = member.owner.as_str();
        match (owner, member.name.as_str(), args) {
            (names::OPTIONAL, "ofNullable", [value]) => Ok(Value::Optional(match value {
                Value::Null => None,
                other => Some(Box::new(other.clone())),
            })),
            (names::LIST, "of", [array]) => Ok(Value::List(array.array_items()?)),
            (names::MAP, "ofEntries", [array]) => {
                let items = array.array_items()?;
                if items.len() % 2 != 0 {
                    return Err(TestError::fault("odd number of map entry items"));
                }
                Ok(Value::Map(
                    items
                        .chunks(2)
                        .map(|pair| (pair[0].clone(), pair[1].clone()))
                        .collect(),
                ))
            }
            (names::MEDIA_TYPE, "valueOf", [value]) => Ok(Value::MediaType(value.as_str()?.to_string())),
            (names::REIFIED, "parameterized", [base, args]) => Ok(Value::Reified {
                base: base.as_class()?.to_string(),
                args: args.array_items()?,
            }),
            (_, "valueOf", [value]) => match PrimitiveKind::from_boxed(owner) {
                Some(kind) => Ok(Value::Boxed(kind, Box::new(value.clone()))),
                None => Err(TestError::no_method(owner, "valueOf")),
            },
            _ => Err(TestError::no_method(owner, &member.name)),
        }
    }
}

fn pop(stack: &mut Vec<Value>) -> TestResult<Value> {
    stack
        .pop()
        .ok_or_else(|| TestError::fault("operand stack underflow"))
}

fn instance(value: &Value) -> TestResult<&Instance> {
    match value {
        Value::Instance(instance) => Ok(instance),
        other => Err(TestError::mismatch("unit instance", other)),
    }
}

fn static_field(field: &MemberRef) -> Value {
    if field.owner == names::STATUS_CODE && field.name == "NO_CONTENT" {
        Value::StatusCode(NO_CONTENT)
    } else {
        Value::Enum {
            ty: field.owner.clone(),
            constant: field.name.clone(),
        }
    }
}

const fn unbox_name(kind: PrimitiveKind) -> &'static str {
    match kind {
        PrimitiveKind::Boolean => "booleanValue",
        PrimitiveKind::Byte => "byteValue",
        PrimitiveKind::Char => "charValue",
        PrimitiveKind::Short => "shortValue",
        PrimitiveKind::Int => "intValue",
        PrimitiveKind::Long => "longValue",
        PrimitiveKind::Float => "floatValue",
        PrimitiveKind::Double => "doubleValue",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerStub;
    use daedalus_unit::{CodeBuilder, MethodType, UnitBuilder};

    fn provider_type() -> FieldType {
        FieldType::object(names::PROVIDER)
    }

    /// A handler returning `provider.get().answer()` boxed.
    fn answer_unit() -> Unit {
        let name = "gen.Answer";
        let mut unit = UnitBuilder::new(name, UnitKind::Handler);
        unit.implements(names::HANDLER).field("provider", provider_type());

        let mut init = CodeBuilder::new();
        init.load(0)
            .load(1)
            .put_field(name, "provider", &provider_type())
            .return_void();
        unit.method("<init>", MethodType::void(vec![provider_type()]), init)
            .unwrap();

        let mut apply = CodeBuilder::new();
        apply
            .load(0)
            .get_field(name, "provider", &provider_type())
            .invoke_interface(
                names::PROVIDER,
                "get",
                &MethodType::returning(vec![], FieldType::object(names::OBJECT)),
            )
            .check_cast(&FieldType::object("app.Deep"))
            .invoke_virtual("app.Deep", "answer", &MethodType::returning(vec![], FieldType::Int))
            .invoke_static(
                "lang.Integer",
                "valueOf",
                &MethodType::returning(vec![FieldType::Int], FieldType::object("lang.Integer")),
            )
            .return_value();
        unit.method(
            "apply",
            MethodType::returning(
                vec![FieldType::object(names::CONTEXT)],
                FieldType::object(names::OBJECT),
            ),
            apply,
        )
        .unwrap();
        unit.build()
    }

    fn machine() -> Machine {
        let mut loader = Loader::new();
        loader.add(answer_unit()).unwrap();
        loader.link().unwrap()
    }

    #[test]
    fn test_instantiate_and_dispatch() {
        let machine = machine();
        let stub = ControllerStub::new("app.Deep").returning("answer", Value::Int(42));
        let handler = machine.instantiate("gen.Answer", stub.provider()).unwrap();
        let result = machine
            .dispatch(&handler, &SyntheticContext::builder().build())
            .unwrap();
        assert_eq!(result, Value::boxed_int(42));
        assert_eq!(stub.calls().len(), 1);
    }

    #[test]
    fn test_checkcast_failure() {
        let machine = machine();
        let wrong = ControllerStub::new("app.Shallow").returning("answer", Value::Int(1));
        let handler = machine.instantiate("gen.Answer", wrong.provider()).unwrap();
        let err = machine
            .dispatch(&handler, &SyntheticContext::builder().build())
            .unwrap_err();
        assert!(matches!(err, TestError::TypeMismatch { .. }));
    }

    #[test]
    fn test_step_limit() {
        let mut loader = Loader::new().with_step_limit(5);
        loader.add(answer_unit()).unwrap();
        let machine = loader.link().unwrap();
        let stub = ControllerStub::new("app.Deep").returning("answer", Value::Int(1));
        let handler = machine.instantiate("gen.Answer", stub.provider()).unwrap();
        assert_eq!(
            machine
                .dispatch(&handler, &SyntheticContext::builder().build())
                .unwrap_err(),
            TestError::StepLimit(5)
        );
    }

    #[test]
    fn test_duplicate_and_unknown_units() {
        let mut loader = Loader::new();
        loader.add(answer_unit()).unwrap();
        assert_eq!(
            loader.add(answer_unit()).unwrap_err(),
            TestError::DuplicateUnit("gen.Answer".into())
        );
        let machine = loader.link().unwrap();
        assert!(matches!(
            machine.instantiate("gen.Missing", Value::Null),
            Err(TestError::UnknownUnit(_))
        ));
    }

    #[test]
    fn test_load_encoded_unit() {
        let bytes = answer_unit().encode().unwrap();
        let mut loader = Loader::new();
        assert_eq!(loader.load(&bytes).unwrap().name, "gen.Answer");
        assert_eq!(loader.link().unwrap().unit_names(UnitKind::Handler), vec!["gen.Answer"]);
    }
}
