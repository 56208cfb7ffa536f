//! Type encoding helpers.
//!
//! Pure mappings from resolved [`TypeRef`]s to low-level type tags, boxing
//! and unboxing sequences, class literals and array construction.

use daedalus_model::{MethodDescriptor, PrimitiveKind, TypeRef};
use daedalus_unit::{CodeBuilder, FieldType, MethodType};

use crate::runtime;

/// The low-level type of a value of `ty`, after erasure.
///
/// Returns `None` for `void`.
pub fn field_type(ty: &TypeRef) -> Option<FieldType> {
    Some(match ty {
        TypeRef::Void => return None,
        TypeRef::Primitive(kind) => runtime::primitive(*kind),
        TypeRef::Class { name, .. } => FieldType::object(name.clone()),
        TypeRef::Array(element) => FieldType::array(field_type(element)?),
    })
}

/// The low-level signature of a controller method.
///
/// A `void` parameter type has no low-level form; it is typed as `Object`
/// here and rejected by the binding strategies.
pub fn method_type(method: &MethodDescriptor) -> MethodType {
    let params = method
        .params
        .iter()
        .map(|p| {
            field_type(&p.ty).unwrap_or_else(|| FieldType::object(daedalus_model::names::OBJECT))
        })
        .collect();
    MethodType::new(params, field_type(&method.return_type))
}

/// Boxes the primitive on top of the stack.
pub fn emit_box(code: &mut CodeBuilder, kind: PrimitiveKind) {
    runtime::box_value(kind).emit(code);
}

/// Unboxes the box object on top of the stack.
pub fn emit_unbox(code: &mut CodeBuilder, kind: PrimitiveKind) {
    runtime::unbox_value(kind).emit(code);
}

/// The class literal used at runtime to denote `ty`.
///
/// Primitives are denoted by their box class, arrays by their descriptor and
/// class types by their erasure.
pub fn class_literal(ty: &TypeRef) -> Option<FieldType> {
    match ty {
        TypeRef::Primitive(kind) => Some(FieldType::object(kind.boxed_class())),
        other => field_type(other),
    }
}

/// Pushes the class literal of `ty`. `void` pushes the context class, which
/// is what a `void` handler effectively returns.
pub fn emit_class_literal(code: &mut CodeBuilder, ty: &TypeRef) {
    let literal = class_literal(ty)
        .unwrap_or_else(|| FieldType::object(daedalus_model::names::CONTEXT));
    code.push_class(&literal);
}

/// Pushes a runtime `Type` denoting `ty` with its generic arguments.
///
/// Non-parameterized types are pushed as class literals; a parameterized
/// type becomes `Reified.parameterized(base, [args...])`, with each argument
/// encoded the same way.
pub fn emit_type_literal(code: &mut CodeBuilder, ty: &TypeRef) {
    match ty {
        TypeRef::Class { name, args } if !args.is_empty() => {
            emit_reified(code, name, args);
        }
        other => emit_class_literal(code, other),
    }
}

/// Pushes `Reified.parameterized(base, [args...])`.
pub fn emit_reified(code: &mut CodeBuilder, base: &str, args: &[TypeRef]) {
    code.push_class(&FieldType::object(base));
    emit_array(
        code,
        &FieldType::object(daedalus_model::names::TYPE),
        args,
        emit_type_literal,
    );
    runtime::reified_parameterized().emit(code);
}

/// Pushes a new array of `element` holding one value per item; `push` emits
/// the code producing each item's value.
pub fn emit_array<T>(
    code: &mut CodeBuilder,
    element: &FieldType,
    items: &[T],
    mut push: impl FnMut(&mut CodeBuilder, &T),
) {
    code.push_int(i32::try_from(items.len()).unwrap_or(i32::MAX))
        .new_array(element);
    for (i, item) in items.iter().enumerate() {
        code.dup().push_int(i32::try_from(i).unwrap_or(i32::MAX));
        push(code, item);
        code.array_store();
    }
}
