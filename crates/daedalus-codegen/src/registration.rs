//! Registration unit generation.
//!
//! One registration unit per controller installs every handler unit of the
//! controller on a router:
//!
//! ```text
//! route = router.route(verb, pattern, new Handler(this.provider))
//! route.setReturnType(<type literal>)
//! route.setConsumes(List.of(MediaType.valueOf(..), ..))   when non-empty
//! route.setProduces(List.of(MediaType.valueOf(..), ..))   when non-empty
//! route.setAttribute(name, <encoded value>)               per kept attribute
//! ```
//!
//! # Attribute filtering
//!
//! Binding, verb, media-type and nullability annotations are already
//! reflected in the route itself and are not forwarded as attributes. Names
//! are matched on the fully qualified or the simple name. Nested maps are
//! filtered with the same rules and omitted when nothing is left; lists are
//! kept even when empty.

use std::collections::HashSet;

use daedalus_model::names::{self, simple_name};
use daedalus_model::{AttributeMap, AttributeValue, ControllerDescriptor, MethodDescriptor};
use daedalus_unit::{CodeBuilder, Constant, FieldType, Hierarchy, Unit, UnitBuilder, UnitKind};

use crate::error::CompileResult;
use crate::handler::constructor;
use crate::naming::{handler_name, registration_name};
use crate::runtime::{self, object, route, PROVIDER_FIELD};
use crate::types::{emit_array, emit_box, emit_type_literal};

/// Attribute names excluded from every route by default.
pub const DEFAULT_EXCLUDED_ATTRIBUTES: &[&str] = &[
    "Path",
    "GET",
    "POST",
    "PUT",
    "DELETE",
    "PATCH",
    "HEAD",
    "OPTIONS",
    "TRACE",
    "Consumes",
    "Produces",
    "PathParam",
    "QueryParam",
    "HeaderParam",
    "CookieParam",
    "FormParam",
    "ContextParam",
    "BindParam",
    "Param",
    "Nullable",
    "NonNull",
    "Nonnull",
    "NotNull",
    "CheckForNull",
];

const ROUTE_SLOT: u8 = 2;
const ROUTER_SLOT: u8 = 1;

/// Decides which declarative attributes reach the route.
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    excluded: HashSet<String>,
}

impl Default for AttributeFilter {
    fn default() -> Self {
        Self {
            excluded: DEFAULT_EXCLUDED_ATTRIBUTES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl AttributeFilter {
    /// Creates a filter excluding the defaults plus `extra`.
    pub fn with_excluded<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::default();
        filter.excluded.extend(extra.into_iter().map(Into::into));
        filter
    }

    /// Returns `true` if an attribute called `name` is dropped.
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name) || self.excluded.contains(simple_name(name))
    }

    /// Filters an attribute map, recursing into nested values.
    #[must_use]
    pub fn filter(&self, attributes: &AttributeMap) -> AttributeMap {
        attributes
            .iter()
            .filter(|(name, _)| !self.is_excluded(name))
            .filter_map(|(name, value)| self.filter_value(value).map(|v| (name.clone(), v)))
            .collect()
    }

    fn filter_value(&self, value: &AttributeValue) -> Option<AttributeValue> {
        match value {
            AttributeValue::Map(map) => {
                let kept = self.filter(map);
                (!kept.is_empty()).then_some(AttributeValue::Map(kept))
            }
            AttributeValue::List(items) => Some(AttributeValue::List(
                items.iter().filter_map(|v| self.filter_value(v)).collect(),
            )),
            other => Some(other.clone()),
        }
    }
}

/// Generates the registration unit for `controller`.
///
/// The controller's methods must already have compiled into handler units;
/// given that, this does not fail on user input.
pub fn generate_registration(
    controller: &ControllerDescriptor,
    filter: &AttributeFilter,
) -> CompileResult<Unit> {
    let name = registration_name(&controller.name);
    let handlers: Vec<String> = controller.methods.iter().map(handler_name).collect();
    let mut unit = UnitBuilder::new(name.clone(), UnitKind::Registration)
        .with_hierarchy(&registration_hierarchy(controller));
    unit.implements(names::INSTALLER)
        .field(PROVIDER_FIELD, object(names::PROVIDER));
    unit.method(
        runtime::CONSTRUCTOR,
        runtime::constructor_type(),
        constructor(&name),
    )?;

    let mut install = CodeBuilder::new();
    for (method, handler) in controller.methods.iter().zip(&handlers) {
        emit_route(&mut install, &name, method, handler, filter);
    }
    install.return_void();
    unit.method(runtime::INSTALL, runtime::install_type(), install)?;
    Ok(unit.build())
}

fn emit_route(
    code: &mut CodeBuilder,
    unit: &str,
    method: &MethodDescriptor,
    handler: &str,
    filter: &AttributeFilter,
) {
    code.load(ROUTER_SLOT)
        .push_str(method.verb.as_str())
        .push_str(&method.pattern)
        .new_object(handler)
        .dup()
        .load(0)
        .get_field(unit, PROVIDER_FIELD, &object(names::PROVIDER))
        .invoke_special(handler, runtime::CONSTRUCTOR, &runtime::constructor_type());
    runtime::router_route().emit(code);
    code.store(ROUTE_SLOT);

    code.load(ROUTE_SLOT);
    emit_type_literal(code, &method.return_type);
    route::set_return_type().emit(code);
    code.pop();

    for (media_types, setter) in [
        (&method.consumes, route::set_consumes()),
        (&method.produces, route::set_produces()),
    ] {
        if media_types.is_empty() {
            continue;
        }
        code.load(ROUTE_SLOT);
        emit_array(code, &object(names::OBJECT), media_types, |code, media_type| {
            code.push_str(media_type);
            runtime::media_type_value_of().emit(code);
        });
        runtime::list_of().emit(code);
        setter.emit(code);
        code.pop();
    }

    for (name, value) in &filter.filter(&method.attributes) {
        code.load(ROUTE_SLOT).push_str(name);
        emit_attribute(code, value);
        route::set_attribute().emit(code);
        code.pop();
    }
}

/// Pushes `value` as an object reference.
pub fn emit_attribute(code: &mut CodeBuilder, value: &AttributeValue) {
    use daedalus_model::PrimitiveKind as P;

    match value {
        AttributeValue::Boolean(b) => {
            code.push_int(i32::from(*b));
            emit_box(code, P::Boolean);
        }
        AttributeValue::Byte(b) => {
            code.push_int(i32::from(*b));
            emit_box(code, P::Byte);
        }
        AttributeValue::Char(c) => {
            code.push_int(i32::try_from(u32::from(*c)).unwrap_or(i32::MAX));
            emit_box(code, P::Char);
        }
        AttributeValue::Short(s) => {
            code.push_int(i32::from(*s));
            emit_box(code, P::Short);
        }
        AttributeValue::Int(i) => {
            code.push_int(*i);
            emit_box(code, P::Int);
        }
        AttributeValue::Long(l) => {
            code.ldc(Constant::Long(*l));
            emit_box(code, P::Long);
        }
        AttributeValue::Float(f) => {
            code.ldc(Constant::float(*f));
            emit_box(code, P::Float);
        }
        AttributeValue::Double(d) => {
            code.ldc(Constant::double(*d));
            emit_box(code, P::Double);
        }
        AttributeValue::String(s) => {
            code.push_str(s);
        }
        AttributeValue::Class(class) => {
            code.push_class(&FieldType::object(class.clone()));
        }
        AttributeValue::Enum { ty, constant } => {
            code.get_static(ty, constant, &FieldType::object(ty.clone()));
        }
        AttributeValue::List(items) => {
            emit_array(code, &object(names::OBJECT), items, emit_attribute);
            runtime::list_of().emit(code);
        }
        AttributeValue::Map(map) => {
            let entries: Vec<(&String, &AttributeValue)> = map.iter().collect();
            code.push_int(i32::try_from(entries.len() * 2).unwrap_or(i32::MAX))
                .new_array(&object(names::OBJECT));
            for (i, (key, value)) in entries.into_iter().enumerate() {
                let slot = i32::try_from(i * 2).unwrap_or(i32::MAX);
                code.dup().push_int(slot).push_str(key).array_store();
                code.dup().push_int(slot.saturating_add(1));
                emit_attribute(code, value);
                code.array_store();
            }
            runtime::map_of_entries().emit(code);
        }
    }
}

/// Hierarchy needed to verify a registration unit of `controller` on its own.
#[must_use]
pub fn registration_hierarchy(controller: &ControllerDescriptor) -> Hierarchy {
    let mut hierarchy = runtime::hierarchy();
    for method in &controller.methods {
        hierarchy.add(handler_name(method), names::HANDLER);
    }
    hierarchy
}
