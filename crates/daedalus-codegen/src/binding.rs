//! Parameter binding strategies.
//!
//! Each [`BindingKind`] has exactly one strategy. A strategy appends code that
//! leaves exactly one value of the parameter's erased type on the stack,
//! reading the request context from local slot [`CONTEXT_SLOT`]. A strategy
//! that does not accept the declared type fails with
//! [`CompileError::UnsupportedBinding`] before emitting anything.
//!
//! | Kind | Accepted types |
//! |------|----------------|
//! | path, query, header, cookie, form | `String`, primitives, classes, `Optional<T>`, `List<T>`, `Set<T>` |
//! | body | `Body`, `byte[]`, `InputStream`, `String`, primitives, classes, parameterized types |
//! | upload | `FileUpload`, `List<FileUpload>`, `Path`, `byte[]` |
//! | context | `Context`, `Optional<T>`, primitives, any reference type |
//! | bound | any class type |

use daedalus_model::{names, BindingKind, MethodDescriptor, ParamDescriptor, PrimitiveKind, TypeRef};
use daedalus_unit::{CodeBuilder, FieldType, MethodType};

use crate::error::{CompileError, CompileResult};
use crate::runtime::{self, body, context, upload, value};
use crate::types::{emit_reified, emit_unbox, field_type};

/// Local slot holding the request context inside the dispatch method.
pub const CONTEXT_SLOT: u8 = 1;

/// Emits the code that produces one argument value.
pub trait BindingStrategy: Sync {
    /// Appends code leaving the value of `param` on the stack.
    fn emit(
        &self,
        code: &mut CodeBuilder,
        method: &MethodDescriptor,
        param: &ParamDescriptor,
    ) -> CompileResult<()>;
}

/// Returns the strategy for `kind`.
pub fn strategy_for(kind: &BindingKind) -> &'static dyn BindingStrategy {
    match kind {
        BindingKind::Path => &ValueBinding { source: "path" },
        BindingKind::Query => &ValueBinding { source: "query" },
        BindingKind::Header => &ValueBinding { source: "header" },
        BindingKind::Cookie => &ValueBinding { source: "cookie" },
        BindingKind::Form => &ValueBinding { source: "form" },
        BindingKind::Body => &BodyBinding,
        BindingKind::Upload => &UploadBinding,
        BindingKind::Context => &ContextBinding,
        BindingKind::Bound { .. } => &BoundBinding,
    }
}

/// Emits the argument for `param` using the strategy of its binding kind.
pub fn emit_param(
    code: &mut CodeBuilder,
    method: &MethodDescriptor,
    param: &ParamDescriptor,
) -> CompileResult<()> {
    strategy_for(&param.binding).emit(code, method, param)
}

fn reject(method: &MethodDescriptor, param: &ParamDescriptor, reason: &str) -> CompileError {
    CompileError::unsupported(
        method.qualified_name(),
        param.name.clone(),
        param.binding.as_str(),
        param.ty.to_string(),
        reason,
    )
}

/// A plain class type (no type arguments), as a low-level type.
fn plain_class(ty: &TypeRef) -> Option<FieldType> {
    match ty {
        TypeRef::Class { name, args } if args.is_empty() => Some(FieldType::object(name.clone())),
        _ => None,
    }
}

/// Element of `Container<T>` when `T` is a plain class.
fn container_element(ty: &TypeRef, container: &str) -> Option<Option<FieldType>> {
    ty.single_arg_of(container).map(plain_class)
}

fn is_request_only(name: &str) -> bool {
    [
        names::CONTEXT,
        names::BODY,
        names::FILE_UPLOAD,
        names::INPUT_STREAM,
        names::FILE_PATH,
        names::VALUE,
    ]
    .contains(&name)
}

/// Converts a named request value: path variables, query parameters,
/// headers, cookies and form fields.
#[derive(Debug, Clone, Copy)]
pub struct ValueBinding {
    source: &'static str,
}

enum Conversion {
    String,
    Primitive(PrimitiveKind),
    Class(FieldType),
    Optional(FieldType),
    List(FieldType),
    Set(FieldType),
}

impl ValueBinding {
    fn conversion(method: &MethodDescriptor, param: &ParamDescriptor) -> CompileResult<Conversion> {
        let ty = &param.ty;
        match ty {
            TypeRef::Void => Err(reject(method, param, "void is not a value type")),
            TypeRef::Primitive(kind) => Ok(Conversion::Primitive(*kind)),
            TypeRef::Array(_) => Err(reject(
                method,
                param,
                "arrays cannot be converted from a request value",
            )),
            TypeRef::Class { name, .. } if is_request_only(name) => Err(reject(
                method,
                param,
                "this type is not convertible from a request value",
            )),
            TypeRef::Class { name, args } if args.is_empty() => Ok(if name == names::STRING {
                Conversion::String
            } else {
                Conversion::Class(FieldType::object(name.clone()))
            }),
            _ => {
                let containers: [(&str, fn(FieldType) -> Conversion); 3] = [
                    (names::OPTIONAL, Conversion::Optional),
                    (names::LIST, Conversion::List),
                    (names::SET, Conversion::Set),
                ];
                for (container, make) in containers {
                    match container_element(ty, container) {
                        Some(Some(element)) => return Ok(make(element)),
                        Some(None) => {
                            return Err(reject(
                                method,
                                param,
                                "container elements must be plain classes",
                            ))
                        }
                        None => {}
                    }
                }
                Err(reject(
                    method,
                    param,
                    "only Optional, List and Set are supported as parameterized value types",
                ))
            }
        }
    }
}

impl BindingStrategy for ValueBinding {
    fn emit(
        &self,
        code: &mut CodeBuilder,
        method: &MethodDescriptor,
        param: &ParamDescriptor,
    ) -> CompileResult<()> {
        let conversion = Self::conversion(method, param)?;
        code.load(CONTEXT_SLOT).push_str(param.source_name());
        context::lookup(self.source).emit(code);
        match conversion {
            Conversion::String => value::string(param.nullable).emit(code),
            Conversion::Primitive(kind) => value::primitive_value(kind).emit(code),
            Conversion::Class(class) => {
                code.push_class(&class);
                value::to(param.nullable).emit(code);
                code.check_cast(&class);
            }
            Conversion::Optional(element) => {
                code.push_class(&element);
                value::to_optional().emit(code);
            }
            Conversion::List(element) => {
                code.push_class(&element);
                value::to_list().emit(code);
            }
            Conversion::Set(element) => {
                code.push_class(&element);
                value::to_set().emit(code);
            }
        }
        Ok(())
    }
}

/// Converts the request body.
#[derive(Debug, Clone, Copy)]
pub struct BodyBinding;

impl BindingStrategy for BodyBinding {
    fn emit(
        &self,
        code: &mut CodeBuilder,
        method: &MethodDescriptor,
        param: &ParamDescriptor,
    ) -> CompileResult<()> {
        let ty = &param.ty;
        match ty {
            TypeRef::Void => return Err(reject(method, param, "void is not a body type")),
            TypeRef::Class { name, .. } if name == names::CONTEXT => {
                return Err(reject(method, param, "the context is bound by the context kind"))
            }
            _ => {}
        }

        code.load(CONTEXT_SLOT);
        context::body().emit(code);
        if ty.is_class(names::BODY) {
            return Ok(());
        }
        if *ty == TypeRef::byte_array() {
            body::bytes().emit(code);
        } else if ty.is_class(names::INPUT_STREAM) {
            body::stream().emit(code);
        } else if *ty == TypeRef::string() {
            body::value().emit(code);
        } else if let TypeRef::Primitive(kind) = ty {
            let boxed = FieldType::object(kind.boxed_class());
            code.push_class(&boxed);
            body::to().emit(code);
            code.check_cast(&boxed);
            emit_unbox(code, *kind);
        } else if let TypeRef::Class { name, args } = ty.clone() {
            if args.is_empty() {
                code.push_class(&FieldType::object(name.clone()));
            } else {
                emit_reified(code, &name, &args);
            }
            body::to().emit(code);
            code.check_cast(&FieldType::object(name));
        } else if let Some(array) = field_type(ty) {
            code.push_class(&array);
            body::to().emit(code);
            code.check_cast(&array);
        } else {
            return Err(reject(method, param, "the body cannot be converted to this type"));
        }
        Ok(())
    }
}

/// Binds multipart file uploads.
#[derive(Debug, Clone, Copy)]
pub struct UploadBinding;

impl BindingStrategy for UploadBinding {
    fn emit(
        &self,
        code: &mut CodeBuilder,
        method: &MethodDescriptor,
        param: &ParamDescriptor,
    ) -> CompileResult<()> {
        let ty = &param.ty;
        let files = ty
            .single_arg_of(names::LIST)
            .is_some_and(|element| *element == TypeRef::class(names::FILE_UPLOAD));
        let single: Option<Vec<runtime::Call>> = if *ty == TypeRef::class(names::FILE_UPLOAD) {
            Some(vec![])
        } else if *ty == TypeRef::class(names::FILE_PATH) {
            Some(vec![upload::path()])
        } else if *ty == TypeRef::byte_array() {
            Some(vec![upload::bytes()])
        } else {
            None
        };

        code.load(CONTEXT_SLOT).push_str(param.source_name());
        if files {
            context::files().emit(code);
            return Ok(());
        }
        let Some(then) = single else {
            return Err(reject(
                method,
                param,
                "expected FileUpload, List<FileUpload>, Path or byte[]",
            ));
        };
        context::file().emit(code);
        for call in then {
            call.emit(code);
        }
        Ok(())
    }
}

/// Passes the context itself, or a typed value held by it.
#[derive(Debug, Clone, Copy)]
pub struct ContextBinding;

impl BindingStrategy for ContextBinding {
    fn emit(
        &self,
        code: &mut CodeBuilder,
        method: &MethodDescriptor,
        param: &ParamDescriptor,
    ) -> CompileResult<()> {
        let ty = &param.ty;
        if ty.is_void() {
            return Err(reject(method, param, "void is not a context value"));
        }
        if ty.is_class(names::CONTEXT) {
            code.load(CONTEXT_SLOT);
            return Ok(());
        }
        if let Some(inner) = ty.single_arg_of(names::OPTIONAL) {
            let Some(element) = plain_class(inner) else {
                return Err(reject(
                    method,
                    param,
                    "Optional context values must wrap a plain class",
                ));
            };
            code.load(CONTEXT_SLOT).push_class(&element);
            context::require().emit(code);
            runtime::optional_of_nullable().emit(code);
            return Ok(());
        }
        if let TypeRef::Primitive(kind) = ty {
            let boxed = FieldType::object(kind.boxed_class());
            code.load(CONTEXT_SLOT).push_class(&boxed);
            context::require().emit(code);
            code.check_cast(&boxed);
            emit_unbox(code, *kind);
            return Ok(());
        }
        let Some(erased) = field_type(ty) else {
            return Err(reject(method, param, "void is not a context value"));
        };
        code.load(CONTEXT_SLOT).push_class(&erased);
        context::require().emit(code);
        code.check_cast(&erased);
        Ok(())
    }
}

/// Binds an object assembled from the request, optionally through a static
/// binder method.
#[derive(Debug, Clone, Copy)]
pub struct BoundBinding;

impl BindingStrategy for BoundBinding {
    fn emit(
        &self,
        code: &mut CodeBuilder,
        method: &MethodDescriptor,
        param: &ParamDescriptor,
    ) -> CompileResult<()> {
        let class = match &param.ty {
            TypeRef::Class { name, .. } => FieldType::object(name.clone()),
            TypeRef::Primitive(_) => {
                return Err(reject(method, param, "primitives cannot be bound objects"))
            }
            TypeRef::Array(_) => return Err(reject(method, param, "arrays cannot be bound objects")),
            TypeRef::Void => return Err(reject(method, param, "void is not a bound object")),
        };
        let binder = match &param.binding {
            BindingKind::Bound { binder } => binder.as_ref(),
            _ => None,
        };
        code.load(CONTEXT_SLOT);
        match binder {
            Some(binder) => {
                let ty = MethodType::returning(vec![runtime::object(names::CONTEXT)], class);
                code.invoke_static(&binder.owner, &binder.name, &ty);
            }
            None => {
                code.push_class(&class);
                context::bind().emit(code);
                code.check_cast(&class);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_model::MethodRef;
    use daedalus_unit::{stack_effect, ConstantPool, Instruction, VType};

    fn method() -> MethodDescriptor {
        MethodDescriptor::builder("app.Pets", "handle").build()
    }

    /// Runs the strategy for `param` and returns the resulting stack.
    fn effect(param: &ParamDescriptor) -> CompileResult<Vec<VType>> {
        let mut code = CodeBuilder::new();
        emit_param(&mut code, &method(), param)?;
        let mut pool = ConstantPool::new();
        let insns = code.finish(&mut pool)?;
        let locals = [VType::reference("gen.H"), VType::reference(names::CONTEXT)];
        Ok(stack_effect(&insns, &pool, &locals, &runtime::hierarchy())?)
    }

    fn assert_binds(param: ParamDescriptor) {
        let expected = VType::of(&field_type(&param.ty).unwrap());
        assert_eq!(effect(&param).unwrap(), vec![expected], "{param:?}");
    }

    fn assert_rejected(param: ParamDescriptor) {
        assert!(
            matches!(effect(&param), Err(CompileError::UnsupportedBinding { .. })),
            "{param:?}"
        );
    }

    #[test]
    fn test_value_kinds_accept_table() {
        let types = [
            TypeRef::string(),
            TypeRef::int(),
            TypeRef::boolean(),
            TypeRef::long(),
            TypeRef::primitive(PrimitiveKind::Double),
            TypeRef::primitive(PrimitiveKind::Char),
            TypeRef::class("lang.Integer"),
            TypeRef::class("app.PetId"),
            TypeRef::optional(TypeRef::string()),
            TypeRef::list(TypeRef::class("lang.Integer")),
            TypeRef::set(TypeRef::string()),
        ];
        let kinds = [
            BindingKind::Path,
            BindingKind::Query,
            BindingKind::Header,
            BindingKind::Cookie,
            BindingKind::Form,
        ];
        for kind in &kinds {
            for ty in &types {
                assert_binds(ParamDescriptor::new("p", kind.clone(), ty.clone()));
                assert_binds(ParamDescriptor::new("p", kind.clone(), ty.clone()).nullable());
            }
        }
    }

    #[test]
    fn test_value_kinds_reject() {
        for ty in [
            TypeRef::byte_array(),
            TypeRef::context(),
            TypeRef::class(names::FILE_UPLOAD),
            TypeRef::class(names::BODY),
            TypeRef::generic(names::MAP, vec![TypeRef::string(), TypeRef::string()]),
            TypeRef::list(TypeRef::list(TypeRef::string())),
        ] {
            assert_rejected(ParamDescriptor::query("q", ty));
        }
    }

    #[test]
    fn test_nullable_string_uses_value_or_null() {
        let mut code = CodeBuilder::new();
        emit_param(
            &mut code,
            &method(),
            &ParamDescriptor::header("h", TypeRef::string()).nullable(),
        )
        .unwrap();
        let mut pool = ConstantPool::new();
        let insns = code.finish(&mut pool).unwrap();
        let Instruction::InvokeInterface(k) = insns[3] else {
            panic!("expected interface call, got {:?}", insns[3]);
        };
        assert_eq!(pool.method_at(k, true).unwrap().name, "valueOrNull");
    }

    #[test]
    fn test_source_name_is_looked_up() {
        let mut code = CodeBuilder::new();
        emit_param(
            &mut code,
            &method(),
            &ParamDescriptor::query("limit", TypeRef::int()).with_source("max"),
        )
        .unwrap();
        let mut pool = ConstantPool::new();
        code.finish(&mut pool).unwrap();
        assert!(pool.iter().any(|c| *c == daedalus_unit::Constant::Str("max".into())));
        assert!(!pool.iter().any(|c| *c == daedalus_unit::Constant::Str("limit".into())));
    }

    #[test]
    fn test_body_accept_table() {
        for ty in [
            TypeRef::class(names::BODY),
            TypeRef::byte_array(),
            TypeRef::class(names::INPUT_STREAM),
            TypeRef::string(),
            TypeRef::int(),
            TypeRef::class("app.Pet"),
            TypeRef::list(TypeRef::class("app.Pet")),
            TypeRef::array(TypeRef::class("app.Pet")),
        ] {
            assert_binds(ParamDescriptor::body("b", ty));
        }
        for ty in [TypeRef::context(), TypeRef::array(TypeRef::Void)] {
            assert_rejected(ParamDescriptor::body("b", ty));
        }
    }

    #[test]
    fn test_upload_accept_table() {
        for ty in [
            TypeRef::class(names::FILE_UPLOAD),
            TypeRef::list(TypeRef::class(names::FILE_UPLOAD)),
            TypeRef::class(names::FILE_PATH),
            TypeRef::byte_array(),
        ] {
            assert_binds(ParamDescriptor::upload("f", ty));
        }
        for ty in [
            TypeRef::string(),
            TypeRef::list(TypeRef::string()),
            TypeRef::class(names::LIST),
        ] {
            assert_rejected(ParamDescriptor::upload("f", ty));
        }
    }

    #[test]
    fn test_context_accept_table() {
        for ty in [
            TypeRef::context(),
            TypeRef::class("app.Session"),
            TypeRef::optional(TypeRef::class("app.Session")),
            TypeRef::long(),
            TypeRef::array(TypeRef::string()),
        ] {
            assert_binds(ParamDescriptor::context("c", ty));
        }
        assert_rejected(ParamDescriptor::context(
            "c",
            TypeRef::optional(TypeRef::list(TypeRef::string())),
        ));
    }

    #[test]
    fn test_raw_context_is_passed_through() {
        let mut code = CodeBuilder::new();
        emit_param(&mut code, &method(), &ParamDescriptor::context("ctx", TypeRef::context()))
            .unwrap();
        let insns = code.finish(&mut ConstantPool::new()).unwrap();
        assert_eq!(insns, vec![Instruction::Load(CONTEXT_SLOT)]);
    }

    #[test]
    fn test_bound_with_and_without_binder() {
        let ty = TypeRef::class("app.Filter");
        assert_binds(ParamDescriptor::bound("f", ty.clone(), None));
        assert_binds(ParamDescriptor::bound(
            "f",
            ty,
            Some(MethodRef::new("app.Filters", "parse")),
        ));
        assert_rejected(ParamDescriptor::bound("f", TypeRef::int(), None));
        assert_rejected(ParamDescriptor::bound("f", TypeRef::byte_array(), None));
    }

    #[test]
    fn test_rejection_names_method_and_parameter() {
        let err = effect(&ParamDescriptor::path("id", TypeRef::byte_array())).unwrap_err();
        let CompileError::UnsupportedBinding { method, param, kind, .. } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(method, "app.Pets.handle");
        assert_eq!(param, "id");
        assert_eq!(kind, "path");
    }
}
