//! Host runtime members referenced by generated code.
//!
//! Generated units link against the host runtime by name only. This module
//! is the single catalogue of every member a unit may call, so the code
//! generators and any runtime implementation agree on owners, names and
//! signatures.
//!
//! | Owner | Member | Signature |
//! |-------|--------|-----------|
//! | `Context` | `path` `query` `header` `cookie` `form` | `(String) -> Value` |
//! | `Context` | `body` | `() -> Body` |
//! | `Context` | `file` / `files` | `(String) -> FileUpload` / `(String) -> List` |
//! | `Context` | `require` / `bind` | `(Class) -> Object` |
//! | `Context` | `isResponseStarted` | `() -> boolean` |
//! | `Context` | `send` | `(StatusCode) -> Context` |
//! | `Value` | `value` / `valueOrNull` | `() -> String` |
//! | `Value` | `<primitive>Value` | `() -> <primitive>` |
//! | `Value` | `to` / `toNullable` | `(Class) -> Object` |
//! | `Value` | `toOptional` / `toList` / `toSet` | `(Class) -> Optional / List / Set` |
//! | `Body` | `bytes` / `stream` / `value` / `to` | `() -> byte[]` / `() -> InputStream` / `() -> String` / `(Type) -> Object` |
//! | `FileUpload` | `path` / `bytes` | `() -> Path` / `() -> byte[]` |
//! | `Provider` | `get` | `() -> Object` |
//! | `Router` | `route` | `(String, String, Handler) -> Route` |
//! | `Route` | `setReturnType` / `setConsumes` / `setProduces` / `setAttribute` | `-> Route` |
//! | `Optional` | `ofNullable` (static) | `(Object) -> Optional` |
//! | `List` | `of` (static) | `(Object[]) -> List` |
//! | `Map` | `ofEntries` (static) | `(Object[] k, v, ...) -> Map` |
//! | `MediaType` | `valueOf` (static) | `(String) -> MediaType` |
//! | `Reified` | `parameterized` (static) | `(Type, Type[]) -> Reified` |
//! | box types | `valueOf` (static) / `<primitive>Value` | boxing / unboxing |
//! | `StatusCode` | `NO_CONTENT` (static field) | `StatusCode` |

use daedalus_model::names;
use daedalus_model::PrimitiveKind;
use daedalus_unit::{CodeBuilder, FieldType, Hierarchy, MethodType};

/// How a member is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatch {
    /// `invokeinterface`
    Interface,
    /// `invokevirtual`
    Virtual,
    /// `invokestatic`
    Static,
}

/// A runtime method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    /// Declaring type.
    pub owner: &'static str,
    /// Method name.
    pub name: &'static str,
    /// Invocation kind.
    pub dispatch: Dispatch,
    /// Signature.
    pub ty: MethodType,
}

impl Call {
    fn new(
        owner: &'static str,
        name: &'static str,
        dispatch: Dispatch,
        params: Vec<FieldType>,
        ret: Option<FieldType>,
    ) -> Self {
        Self {
            owner,
            name,
            dispatch,
            ty: MethodType::new(params, ret),
        }
    }

    fn interface(owner: &'static str, name: &'static str, params: Vec<FieldType>, ret: FieldType) -> Self {
        Self::new(owner, name, Dispatch::Interface, params, Some(ret))
    }

    fn statik(owner: &'static str, name: &'static str, params: Vec<FieldType>, ret: FieldType) -> Self {
        Self::new(owner, name, Dispatch::Static, params, Some(ret))
    }

    /// Appends the call instruction to `code`.
    pub fn emit(&self, code: &mut CodeBuilder) {
        match self.dispatch {
            Dispatch::Interface => code.invoke_interface(self.owner, self.name, &self.ty),
            Dispatch::Virtual => code.invoke_virtual(self.owner, self.name, &self.ty),
            Dispatch::Static => code.invoke_static(self.owner, self.name, &self.ty),
        };
    }
}

/// `L<name>;`
pub fn object(name: &str) -> FieldType {
    FieldType::object(name)
}

/// The low-level type of a primitive kind.
pub const fn primitive(kind: PrimitiveKind) -> FieldType {
    match kind {
        PrimitiveKind::Boolean => FieldType::Boolean,
        PrimitiveKind::Byte => FieldType::Byte,
        PrimitiveKind::Char => FieldType::Char,
        PrimitiveKind::Short => FieldType::Short,
        PrimitiveKind::Int => FieldType::Int,
        PrimitiveKind::Long => FieldType::Long,
        PrimitiveKind::Float => FieldType::Float,
        PrimitiveKind::Double => FieldType::Double,
    }
}

/// Supertype edges of the runtime types that generated code relies on.
pub fn hierarchy() -> Hierarchy {
    Hierarchy::new()
        .with(names::CLASS, names::TYPE)
        .with(names::REIFIED, names::TYPE)
}

/// Name of the provider field held by every generated unit.
pub const PROVIDER_FIELD: &str = "provider";

/// Constructor name.
pub const CONSTRUCTOR: &str = "<init>";

/// Name of the dispatch method of [`names::HANDLER`].
pub const APPLY: &str = "apply";

/// Name of the installation method of [`names::INSTALLER`].
pub const INSTALL: &str = "install";

/// Static field holding the no-content status code.
pub const NO_CONTENT: &str = "NO_CONTENT";

/// `<init>(Provider)V`
pub fn constructor_type() -> MethodType {
    MethodType::void(vec![object(names::PROVIDER)])
}

/// `apply(Context) -> Object`
pub fn apply_type() -> MethodType {
    MethodType::returning(vec![object(names::CONTEXT)], object(names::OBJECT))
}

/// `install(Router)V`
pub fn install_type() -> MethodType {
    MethodType::void(vec![object(names::ROUTER)])
}

/// Context members.
pub mod context {
    use super::{object, Call};
    use daedalus_model::names;
    use daedalus_unit::FieldType;

    /// `ctx.<source>(String) -> Value` for a value source (`path`, `query`,
    /// `header`, `cookie`, `form`).
    pub fn lookup(source: &'static str) -> Call {
        Call::interface(names::CONTEXT, source, vec![object(names::STRING)], object(names::VALUE))
    }

    /// `ctx.body() -> Body`
    pub fn body() -> Call {
        Call::interface(names::CONTEXT, "body", vec![], object(names::BODY))
    }

    /// `ctx.file(String) -> FileUpload`
    pub fn file() -> Call {
        Call::interface(
            names::CONTEXT,
            "file",
            vec![object(names::STRING)],
            object(names::FILE_UPLOAD),
        )
    }

    /// `ctx.files(String) -> List`
    pub fn files() -> Call {
        Call::interface(names::CONTEXT, "files", vec![object(names::STRING)], object(names::LIST))
    }

    /// `ctx.require(Class) -> Object`
    pub fn require() -> Call {
        Call::interface(names::CONTEXT, "require", vec![object(names::CLASS)], object(names::OBJECT))
    }

    /// `ctx.bind(Class) -> Object`
    pub fn bind() -> Call {
        Call::interface(names::CONTEXT, "bind", vec![object(names::CLASS)], object(names::OBJECT))
    }

    /// `ctx.isResponseStarted() -> boolean`
    pub fn is_response_started() -> Call {
        Call::interface(names::CONTEXT, "isResponseStarted", vec![], FieldType::Boolean)
    }

    /// `ctx.send(StatusCode) -> Context`
    pub fn send() -> Call {
        Call::interface(
            names::CONTEXT,
            "send",
            vec![object(names::STATUS_CODE)],
            object(names::CONTEXT),
        )
    }
}

/// Request value members.
pub mod value {
    use super::{object, primitive, Call};
    use daedalus_model::{names, PrimitiveKind};

    /// `value() -> String`, or `valueOrNull()` when `nullable`.
    pub fn string(nullable: bool) -> Call {
        let name = if nullable { "valueOrNull" } else { "value" };
        Call::interface(names::VALUE, name, vec![], object(names::STRING))
    }

    /// `<primitive>Value() -> <primitive>`
    pub fn primitive_value(kind: PrimitiveKind) -> Call {
        Call::interface(names::VALUE, super::unbox_name(kind), vec![], primitive(kind))
    }

    /// `to(Class) -> Object`, or `toNullable(Class)` when `nullable`.
    pub fn to(nullable: bool) -> Call {
        let name = if nullable { "toNullable" } else { "to" };
        Call::interface(names::VALUE, name, vec![object(names::CLASS)], object(names::OBJECT))
    }

    /// `toOptional(Class) -> Optional`
    pub fn to_optional() -> Call {
        Call::interface(names::VALUE, "toOptional", vec![object(names::CLASS)], object(names::OPTIONAL))
    }

    /// `toList(Class) -> List`
    pub fn to_list() -> Call {
        Call::interface(names::VALUE, "toList", vec![object(names::CLASS)], object(names::LIST))
    }

    /// `toSet(Class) -> Set`
    pub fn to_set() -> Call {
        Call::interface(names::VALUE, "toSet", vec![object(names::CLASS)], object(names::SET))
    }
}

/// Request body members.
pub mod body {
    use super::{object, Call};
    use daedalus_model::names;
    use daedalus_unit::FieldType;

    /// `bytes() -> byte[]`
    pub fn bytes() -> Call {
        Call::interface(names::BODY, "bytes", vec![], FieldType::array(FieldType::Byte))
    }

    /// `stream() -> InputStream`
    pub fn stream() -> Call {
        Call::interface(names::BODY, "stream", vec![], object(names::INPUT_STREAM))
    }

    /// `value() -> String`
    pub fn value() -> Call {
        Call::interface(names::BODY, "value", vec![], object(names::STRING))
    }

    /// `to(Type) -> Object`
    pub fn to() -> Call {
        Call::interface(names::BODY, "to", vec![object(names::TYPE)], object(names::OBJECT))
    }
}

/// File upload members.
pub mod upload {
    use super::{object, Call};
    use daedalus_model::names;
    use daedalus_unit::FieldType;

    /// `path() -> Path`
    pub fn path() -> Call {
        Call::interface(names::FILE_UPLOAD, "path", vec![], object(names::FILE_PATH))
    }

    /// `bytes() -> byte[]`
    pub fn bytes() -> Call {
        Call::interface(names::FILE_UPLOAD, "bytes", vec![], FieldType::array(FieldType::Byte))
    }
}

/// `provider.get() -> Object`
pub fn provider_get() -> Call {
    Call::interface(names::PROVIDER, "get", vec![], object(names::OBJECT))
}

/// `router.route(String, String, Handler) -> Route`
pub fn router_route() -> Call {
    Call::interface(
        names::ROUTER,
        "route",
        vec![object(names::STRING), object(names::STRING), object(names::HANDLER)],
        object(names::ROUTE),
    )
}

/// Route members.
pub mod route {
    use super::{object, Call};
    use daedalus_model::names;

    /// `setReturnType(Type) -> Route`
    pub fn set_return_type() -> Call {
        Call::interface(names::ROUTE, "setReturnType", vec![object(names::TYPE)], object(names::ROUTE))
    }

    /// `setConsumes(List) -> Route`
    pub fn set_consumes() -> Call {
        Call::interface(names::ROUTE, "setConsumes", vec![object(names::LIST)], object(names::ROUTE))
    }

    /// `setProduces(List) -> Route`
    pub fn set_produces() -> Call {
        Call::interface(names::ROUTE, "setProduces", vec![object(names::LIST)], object(names::ROUTE))
    }

    /// `setAttribute(String, Object) -> Route`
    pub fn set_attribute() -> Call {
        Call::interface(
            names::ROUTE,
            "setAttribute",
            vec![object(names::STRING), object(names::OBJECT)],
            object(names::ROUTE),
        )
    }
}

/// `Optional.ofNullable(Object) -> Optional`
pub fn optional_of_nullable() -> Call {
    Call::statik(names::OPTIONAL, "ofNullable", vec![object(names::OBJECT)], object(names::OPTIONAL))
}

/// `List.of(Object[]) -> List`
pub fn list_of() -> Call {
    Call::statik(
        names::LIST,
        "of",
        vec![FieldType::array(object(names::OBJECT))],
        object(names::LIST),
    )
}

/// `Map.ofEntries(Object[]) -> Map`, keys and values alternating.
pub fn map_of_entries() -> Call {
    Call::statik(
        names::MAP,
        "ofEntries",
        vec![FieldType::array(object(names::OBJECT))],
        object(names::MAP),
    )
}

/// `MediaType.valueOf(String) -> MediaType`
pub fn media_type_value_of() -> Call {
    Call::statik(names::MEDIA_TYPE, "valueOf", vec![object(names::STRING)], object(names::MEDIA_TYPE))
}

/// `Reified.parameterized(Type, Type[]) -> Reified`
pub fn reified_parameterized() -> Call {
    Call::statik(
        names::REIFIED,
        "parameterized",
        vec![object(names::TYPE), FieldType::array(object(names::TYPE))],
        object(names::REIFIED),
    )
}

/// `<Box>.valueOf(<primitive>) -> <Box>`
pub fn box_value(kind: PrimitiveKind) -> Call {
    Call::statik(kind.boxed_class(), "valueOf", vec![primitive(kind)], object(kind.boxed_class()))
}

/// `<Box>.<primitive>Value() -> <primitive>`
pub fn unbox_value(kind: PrimitiveKind) -> Call {
    Call::new(
        kind.boxed_class(),
        unbox_name(kind),
        Dispatch::Virtual,
        vec![],
        Some(primitive(kind)),
    )
}

/// `intValue`, `booleanValue`, ...
pub const fn unbox_name(kind: PrimitiveKind) -> &'static str {
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

/// Every runtime method generated code may call.
pub fn catalogue() -> Vec<Call> {
    let mut calls = vec![
        context::body(),
        context::file(),
        context::files(),
        context::require(),
        context::bind(),
        context::is_response_started(),
        context::send(),
        value::string(false),
        value::string(true),
        value::to(false),
        value::to(true),
        value::to_optional(),
        value::to_list(),
        value::to_set(),
        body::bytes(),
        body::stream(),
        body::value(),
        body::to(),
        upload::path(),
        upload::bytes(),
        provider_get(),
        router_route(),
        route::set_return_type(),
        route::set_consumes(),
        route::set_produces(),
        route::set_attribute(),
        optional_of_nullable(),
        list_of(),
        map_of_entries(),
        media_type_value_of(),
        reified_parameterized(),
    ];
    for source in ["path", "query", "header", "cookie", "form"] {
        calls.push(context::lookup(source));
    }
    for kind in PrimitiveKind::ALL {
        calls.push(value::primitive_value(kind));
        calls.push(box_value(kind));
        calls.push(unbox_value(kind));
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_has_no_duplicates() {
        let calls = catalogue();
        let unique: HashSet<_> = calls
            .iter()
            .map(|c| (c.owner, c.name, c.ty.descriptor()))
            .collect();
        assert_eq!(unique.len(), calls.len());
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(
            context::lookup("path").ty.descriptor(),
            "(Llang.String;)Ldaedalus.runtime.Value;"
        );
        assert_eq!(box_value(PrimitiveKind::Int).ty.descriptor(), "(I)Llang.Integer;");
        assert_eq!(unbox_value(PrimitiveKind::Char).name, "charValue");
        assert_eq!(
            reified_parameterized().ty.descriptor(),
            "(Llang.Type;[Llang.Type;)Ldaedalus.runtime.Reified;"
        );
    }

    #[test]
    fn test_class_literals_are_types() {
        let h = hierarchy();
        assert!(h.is_subtype(names::CLASS, names::TYPE));
        assert!(h.is_subtype(names::REIFIED, names::TYPE));
        assert!(!h.is_subtype(names::TYPE, names::CLASS));
    }
}
