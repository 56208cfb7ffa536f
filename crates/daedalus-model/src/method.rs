//! Controller and method descriptors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeMap, AttributeValue};
use crate::error::ModelError;
use crate::names;
use crate::pattern::{join_patterns, normalize_pattern};
use crate::types::{PrimitiveKind, TypeRef};

/// HTTP verbs a controller method can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// `TRACE`
    Trace,
}

impl HttpVerb {
    /// All verbs.
    pub const ALL: [Self; 8] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
        Self::Head,
        Self::Options,
        Self::Trace,
    ];

    /// Returns the upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownVerb(s.to_string()))
    }
}

/// A reference to a static method by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Fully qualified owner type name.
    pub owner: String,
    /// Method name.
    pub name: String,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

/// Where a parameter's value comes from.
///
/// This is a closed set: every variant has exactly one binding strategy in
/// the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// A `{variable}` of the path pattern.
    Path,
    /// A query string parameter.
    Query,
    /// A request header.
    Header,
    /// A request cookie.
    Cookie,
    /// A form field.
    Form,
    /// The request body.
    Body,
    /// A multipart file upload.
    Upload,
    /// The request context itself, or a typed value held by it.
    Context,
    /// An object assembled from the request, optionally by a binder method
    /// taking the context.
    Bound {
        /// Static `binder(Context) -> T` method; the context binds the object
        /// itself when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        binder: Option<MethodRef>,
    },
}

impl BindingKind {
    /// Returns the kind's name, for diagnostics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Form => "form",
            Self::Body => "body",
            Self::Upload => "upload",
            Self::Context => "context",
            Self::Bound { .. } => "bound",
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    /// Parameter name in the method signature.
    pub name: String,
    /// Logical name bound from the request; the parameter name when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Binding kind.
    pub binding: BindingKind,
    /// Declared type, with generic arguments.
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Whether a missing value binds as null instead of failing.
    #[serde(default)]
    pub nullable: bool,
}

impl ParamDescriptor {
    /// Creates a parameter bound by `binding`.
    pub fn new(name: impl Into<String>, binding: BindingKind, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            source: String::new(),
            binding,
            ty,
            nullable: false,
        }
    }

    /// A path variable parameter.
    pub fn path(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, BindingKind::Path, ty)
    }

    /// A query parameter.
    pub fn query(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, BindingKind::Query, ty)
    }

    /// A header parameter.
    pub fn header(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, BindingKind::Header, ty)
    }

    /// A cookie parameter.
    pub fn cookie(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, BindingKind::Cookie, ty)
    }

    /// A form field parameter.
    pub fn form(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, BindingKind::Form, ty)
    }

    /// A request body parameter.
    pub fn body(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, BindingKind::Body, ty)
    }

    /// A file upload parameter.
    pub fn upload(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, BindingKind::Upload, ty)
    }

    /// A context parameter.
    pub fn context(name: impl Into<String>, ty: TypeRef) -> Self {
        Self::new(name, BindingKind::Context, ty)
    }

    /// A bound object parameter.
    pub fn bound(name: impl Into<String>, ty: TypeRef, binder: Option<MethodRef>) -> Self {
        Self::new(name, BindingKind::Bound { binder }, ty)
    }

    /// Sets the logical request name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Marks the parameter as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// The name used to look the value up in the request.
    #[must_use]
    pub fn source_name(&self) -> &str {
        if self.source.is_empty() {
            &self.name
        } else {
            &self.source
        }
    }
}

/// Return-handling category of a controller method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnDescriptor {
    /// `void`.
    Void,
    /// A primitive value, boxed by the handler.
    Primitive(PrimitiveKind),
    /// A class (non-generic or raw) or array, forwarded unchanged.
    Reference(TypeRef),
    /// A status code marker, sent on the context.
    StatusCode,
    /// The raw request context, forwarded unchanged.
    Context,
    /// A parameterized generic type, forwarded unchanged and reified at
    /// registration.
    Parameterized {
        /// Erased base class.
        base: String,
        /// Type arguments.
        args: Vec<TypeRef>,
    },
}

impl ReturnDescriptor {
    /// Classifies a declared return type.
    #[must_use]
    pub fn from_type(ty: &TypeRef) -> Self {
        match ty {
            TypeRef::Void => Self::Void,
            TypeRef::Primitive(kind) => Self::Primitive(*kind),
            TypeRef::Class { name, .. } if name == names::STATUS_CODE => Self::StatusCode,
            TypeRef::Class { name, .. } if name == names::CONTEXT => Self::Context,
            TypeRef::Class { name, args } if !args.is_empty() => Self::Parameterized {
                base: name.clone(),
                args: args.clone(),
            },
            other => Self::Reference(other.erasure()),
        }
    }

    /// The erased type the controller method returns.
    #[must_use]
    pub fn erased_type(&self) -> TypeRef {
        match self {
            Self::Void => TypeRef::Void,
            Self::Primitive(kind) => TypeRef::Primitive(*kind),
            Self::Reference(ty) => ty.erasure(),
            Self::StatusCode => TypeRef::class(names::STATUS_CODE),
            Self::Context => TypeRef::class(names::CONTEXT),
            Self::Parameterized { base, .. } => TypeRef::class(base.clone()),
        }
    }
}

/// A resolved controller method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Fully qualified controller type name.
    pub owner: String,
    /// Method name.
    pub name: String,
    /// Parameters in declaration order.
    #[serde(default)]
    pub params: Vec<ParamDescriptor>,
    /// Declared return type.
    #[serde(default = "void_type")]
    pub return_type: TypeRef,
    /// HTTP verb.
    pub verb: HttpVerb,
    /// Normalized path pattern.
    pub pattern: String,
    /// Consumed media types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    /// Produced media types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    /// Declarative metadata, in declaration order.
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub attributes: AttributeMap,
}

fn void_type() -> TypeRef {
    TypeRef::Void
}

impl MethodDescriptor {
    /// Starts building a descriptor for `owner.name`.
    pub fn builder(owner: impl Into<String>, name: impl Into<String>) -> MethodDescriptorBuilder {
        MethodDescriptorBuilder::new(owner, name)
    }

    /// The return-handling category.
    #[must_use]
    pub fn returns(&self) -> ReturnDescriptor {
        ReturnDescriptor::from_type(&self.return_type)
    }

    /// Parameter names in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    /// `owner.name`, for diagnostics.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

/// Builder for [`MethodDescriptor`].
///
/// Defaults: `GET /`, no parameters, `void` return.
#[derive(Debug, Clone)]
#[must_use]
pub struct MethodDescriptorBuilder {
    inner: MethodDescriptor,
}

impl MethodDescriptorBuilder {
    fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            inner: MethodDescriptor {
                owner: owner.into(),
                name: name.into(),
                params: Vec::new(),
                return_type: TypeRef::Void,
                verb: HttpVerb::Get,
                pattern: "/".to_string(),
                consumes: Vec::new(),
                produces: Vec::new(),
                attributes: AttributeMap::new(),
            },
        }
    }

    /// Sets the HTTP verb.
    pub fn verb(mut self, verb: HttpVerb) -> Self {
        self.inner.verb = verb;
        self
    }

    /// Sets the path pattern; it is normalized on [`build`](Self::build).
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.inner.pattern = pattern.into();
        self
    }

    /// Appends a parameter.
    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.inner.params.push(param);
        self
    }

    /// Sets the declared return type.
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.inner.return_type = ty;
        self
    }

    /// Appends a consumed media type.
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.inner.consumes.push(media_type.into());
        self
    }

    /// Appends a produced media type.
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.inner.produces.push(media_type.into());
        self
    }

    /// Adds a declarative attribute.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.inner.attributes.insert(name.into(), value.into());
        self
    }

    /// Finishes the descriptor.
    #[must_use]
    pub fn build(mut self) -> MethodDescriptor {
        self.inner.pattern = normalize_pattern(&self.inner.pattern);
        self.inner
    }
}

/// A controller and its methods in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerDescriptor {
    /// Fully qualified controller type name.
    pub name: String,
    /// Controller-level path prefix.
    ///
    /// Method patterns are stored with the prefix already applied, so the
    /// prefix is read from descriptor documents but never written back.
    #[serde(default, skip_serializing)]
    pub path: String,
    /// Methods in discovery order.
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

impl ControllerDescriptor {
    /// Creates an empty controller.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: String::new(),
            methods: Vec::new(),
        }
    }

    /// Sets the path prefix for methods appended afterwards.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Appends a method, mounting its pattern under the controller prefix.
    #[must_use]
    pub fn with_method(mut self, mut method: MethodDescriptor) -> Self {
        method.pattern = self.mount(&method.pattern);
        self.methods.push(method);
        self
    }

    /// `pattern` under this controller's prefix, normalized.
    ///
    /// ```
    /// use daedalus_model::ControllerDescriptor;
    ///
    /// let pets = ControllerDescriptor::new("app.PetController").with_path("/api/");
    /// assert_eq!(pets.mount("pets/{id}"), "/api/pets/{id}");
    /// assert_eq!(ControllerDescriptor::new("app.Health").mount("health/"), "/health");
    /// ```
    pub fn mount(&self, pattern: &str) -> String {
        join_patterns(&self.path, pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_parse_case_insensitive() {
        assert_eq!("get".parse::<HttpVerb>(), Ok(HttpVerb::Get));
        assert_eq!("Delete".parse::<HttpVerb>(), Ok(HttpVerb::Delete));
        assert_eq!(
            "FETCH".parse::<HttpVerb>(),
            Err(ModelError::UnknownVerb("FETCH".to_string()))
        );
    }

    #[test]
    fn test_source_name_fallback() {
        let param = ParamDescriptor::query("limit", TypeRef::int());
        assert_eq!(param.source_name(), "limit");
        let param = param.with_source("max");
        assert_eq!(param.source_name(), "max");
    }

    #[test]
    fn test_return_descriptor_classification() {
        assert_eq!(ReturnDescriptor::from_type(&TypeRef::Void), ReturnDescriptor::Void);
        assert_eq!(
            ReturnDescriptor::from_type(&TypeRef::int()),
            ReturnDescriptor::Primitive(PrimitiveKind::Int)
        );
        assert_eq!(
            ReturnDescriptor::from_type(&TypeRef::class(names::STATUS_CODE)),
            ReturnDescriptor::StatusCode
        );
        assert_eq!(
            ReturnDescriptor::from_type(&TypeRef::context()),
            ReturnDescriptor::Context
        );
        assert_eq!(
            ReturnDescriptor::from_type(&TypeRef::class(names::LIST)),
            ReturnDescriptor::Reference(TypeRef::class(names::LIST))
        );
        assert_eq!(
            ReturnDescriptor::from_type(&TypeRef::list(TypeRef::class("app.Pet"))),
            ReturnDescriptor::Parameterized {
                base: names::LIST.to_string(),
                args: vec![TypeRef::class("app.Pet")],
            }
        );
    }

    #[test]
    fn test_controller_prefix_applies_to_later_methods() {
        let method = |name: &str, pattern: &str| {
            MethodDescriptor::builder("app.Pets", name)
                .pattern(pattern)
                .build()
        };
        let controller = ControllerDescriptor::new("app.Pets")
            .with_method(method("root", "/"))
            .with_path("/api")
            .with_method(method("list", "pets"))
            .with_method(method("index", "/"));
        let patterns: Vec<&str> = controller.methods.iter().map(|m| m.pattern.as_str()).collect();
        assert_eq!(patterns, ["/", "/api/pets", "/api"]);
    }

    #[test]
    fn test_controller_prefix_is_not_serialized() {
        let controller = ControllerDescriptor::new("app.Pets").with_path("/api");
        let json = serde_json::to_value(&controller).unwrap();
        assert!(json.get("path").is_none());
    }

    #[test]
    fn test_builder_normalizes_pattern() {
        let method = MethodDescriptor::builder("app.Pets", "list")
            .pattern("pets/")
            .build();
        assert_eq!(method.pattern, "/pets");
        assert_eq!(method.verb, HttpVerb::Get);
        assert_eq!(method.returns(), ReturnDescriptor::Void);
    }

    #[test]
    fn test_controller_from_json() {
        let json = serde_json::json!({
            "name": "app.PetController",
            "methods": [{
                "owner": "app.PetController",
                "name": "getPet",
                "verb": "GET",
                "pattern": "/pets/{id}",
                "params": [{"name": "id", "binding": "path", "type": {"primitive": "int"}}],
                "return_type": {"class": {"name": "app.Pet"}},
                "attributes": {"Role": {"string": "admin"}}
            }, {
                "owner": "app.PetController",
                "name": "search",
                "verb": "GET",
                "pattern": "/pets",
                "params": [{
                    "name": "filter",
                    "binding": {"bound": {"binder": {"owner": "app.Filters", "name": "parse"}}},
                    "type": {"class": {"name": "app.Filter"}}
                }]
            }]
        });
        let controller: ControllerDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(controller.methods.len(), 2);
        let get = &controller.methods[0];
        assert_eq!(get.params[0].binding, BindingKind::Path);
        assert_eq!(get.attributes["Role"], AttributeValue::from("admin"));
        let search = &controller.methods[1];
        assert_eq!(search.return_type, TypeRef::Void);
        assert_eq!(
            search.params[0].binding,
            BindingKind::Bound {
                binder: Some(MethodRef::new("app.Filters", "parse"))
            }
        );
    }
}
