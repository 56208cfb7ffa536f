//! Compiler driver.
//!
//! Compiles controllers into encoded units. A controller either compiles
//! completely (all handler units plus its registration unit) or fails with a
//! [`CompileError`]; nothing is emitted for a failing controller.

use std::collections::{HashMap, HashSet};

use daedalus_model::{ControllerDescriptor, MethodDescriptor};
use daedalus_unit::{GeneratedUnit, UnitKind};
use tracing::{debug, info, info_span, warn};

use crate::error::{CompileError, CompileResult};
use crate::handler::generate_handler;
use crate::naming::handler_name;
use crate::registration::{generate_registration, AttributeFilter};

/// Compiler options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Attribute names excluded in addition to the built-in set.
    pub excluded_attributes: Vec<String>,
}

/// Units generated for one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledController {
    /// Controller type name.
    pub controller: String,
    /// One handler unit per method, in discovery order.
    pub handlers: Vec<GeneratedUnit>,
    /// The registration unit.
    pub registration: GeneratedUnit,
}

impl CompiledController {
    /// All units, handlers first.
    pub fn units(&self) -> impl Iterator<Item = &GeneratedUnit> {
        self.handlers.iter().chain(std::iter::once(&self.registration))
    }

    /// Total encoded size in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.units().map(|u| u.bytes.len()).sum()
    }
}

/// Compiles controller descriptors into handler and registration units.
#[derive(Debug, Clone, Default)]
pub struct RouteCompiler {
    filter: AttributeFilter,
}

impl RouteCompiler {
    /// Creates a compiler.
    #[must_use]
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            filter: AttributeFilter::with_excluded(options.excluded_attributes),
        }
    }

    /// The attribute filter applied to every route.
    #[must_use]
    pub fn attribute_filter(&self) -> &AttributeFilter {
        &self.filter
    }

    /// Compiles a single method into its handler unit.
    pub fn compile_handler(&self, method: &MethodDescriptor) -> CompileResult<GeneratedUnit> {
        let unit = generate_handler(method)?;
        let generated = GeneratedUnit::from_unit(&unit)?;
        debug!(
            unit = %generated.name,
            kind = %UnitKind::Handler,
            bytes = generated.bytes.len(),
            "generated unit"
        );
        Ok(generated)
    }

    /// Compiles a controller.
    pub fn compile_controller(
        &self,
        controller: &ControllerDescriptor,
    ) -> CompileResult<CompiledController> {
        let span = info_span!("compile_controller", controller = %controller.name);
        let _guard = span.enter();

        check_controller(controller)?;

        let handlers = controller
            .methods
            .iter()
            .map(|method| self.compile_handler(method))
            .collect::<CompileResult<Vec<_>>>()?;

        let registration = GeneratedUnit::from_unit(&generate_registration(controller, &self.filter)?)?;
        debug!(
            unit = %registration.name,
            kind = %UnitKind::Registration,
            bytes = registration.bytes.len(),
            "generated unit"
        );

        let compiled = CompiledController {
            controller: controller.name.clone(),
            handlers,
            registration,
        };
        info!(
            handlers = compiled.handlers.len(),
            bytes = compiled.total_bytes(),
            "compiled controller"
        );
        Ok(compiled)
    }

    /// Compiles every controller, stopping at the first failure.
    pub fn compile_all(
        &self,
        controllers: &[ControllerDescriptor],
    ) -> CompileResult<Vec<CompiledController>> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(controllers.len());
        for controller in controllers {
            if !seen.insert(controller.name.as_str()) {
                return Err(CompileError::invalid_controller(
                    &controller.name,
                    "controller is declared more than once",
                ));
            }
            match self.compile_controller(controller) {
                Ok(units) => compiled.push(units),
                Err(err) => {
                    warn!(controller = %controller.name, error = %err, "compilation failed");
                    return Err(err);
                }
            }
        }
        Ok(compiled)
    }
}

fn check_controller(controller: &ControllerDescriptor) -> CompileResult<()> {
    if controller.name.is_empty() {
        return Err(CompileError::invalid_controller(
            &controller.name,
            "controller name is empty",
        ));
    }

    let mut names: HashMap<String, &MethodDescriptor> = HashMap::new();
    for method in &controller.methods {
        if method.owner != controller.name {
            return Err(CompileError::invalid_controller(
                &controller.name,
                format!("method {} belongs to {}", method.name, method.owner),
            ));
        }
        let unit = handler_name(method);
        if let Some(first) = names.get(&unit) {
            return Err(CompileError::DuplicateRoute {
                verb: method.verb.as_str().to_string(),
                pattern: method.pattern.clone(),
                unit,
                first: first.qualified_name(),
                second: method.qualified_name(),
            });
        }
        names.insert(unit, method);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_model::{AttributeValue, HttpVerb, ParamDescriptor, TypeRef};
    use daedalus_unit::Unit;

    fn pets() -> ControllerDescriptor {
        ControllerDescriptor::new("app.Pets")
            .with_method(
                MethodDescriptor::builder("app.Pets", "get")
                    .verb(HttpVerb::Get)
                    .pattern("/pets/{id}")
                    .param(ParamDescriptor::path("id", TypeRef::int()))
                    .returns(TypeRef::class("app.Pet"))
                    .build(),
            )
            .with_method(
                MethodDescriptor::builder("app.Pets", "create")
                    .verb(HttpVerb::Post)
                    .pattern("/pets")
                    .param(ParamDescriptor::body("pet", TypeRef::class("app.Pet")))
                    .returns(TypeRef::class(daedalus_model::names::STATUS_CODE))
                    .consumes("application/json")
                    .build(),
            )
    }

    #[test]
    fn test_compile_controller() {
        let compiled = RouteCompiler::default().compile_controller(&pets()).unwrap();
        assert_eq!(compiled.controller, "app.Pets");
        assert_eq!(compiled.handlers.len(), 2);
        assert_eq!(compiled.registration.name, "app.Pets$Routes");
        assert_eq!(compiled.units().count(), 3);
        for unit in compiled.units() {
            let decoded = unit.decode().unwrap();
            assert_eq!(decoded.name, unit.name);
        }
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let controller = ControllerDescriptor::new("app.C")
            .with_method(MethodDescriptor::builder("app.C", "a").pattern("/x").build())
            .with_method(MethodDescriptor::builder("app.C", "b").pattern("x/").build());
        let err = RouteCompiler::default()
            .compile_controller(&controller)
            .unwrap_err();
        let CompileError::DuplicateRoute { first, second, unit, .. } = err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(first, "app.C.a");
        assert_eq!(second, "app.C.b");
        assert_eq!(unit, "app.C$GET_sx");
    }

    #[test]
    fn test_foreign_method_is_rejected() {
        let controller = ControllerDescriptor::new("app.C")
            .with_method(MethodDescriptor::builder("app.Other", "a").build());
        assert!(matches!(
            RouteCompiler::default().compile_controller(&controller),
            Err(CompileError::InvalidController { .. })
        ));
    }

    #[test]
    fn test_failing_method_fails_controller() {
        let controller = pets().with_method(
            MethodDescriptor::builder("app.Pets", "bad")
                .pattern("/bad")
                .param(ParamDescriptor::upload("f", TypeRef::string()))
                .build(),
        );
        assert!(matches!(
            RouteCompiler::default().compile_controller(&controller),
            Err(CompileError::UnsupportedBinding { .. })
        ));
    }

    #[test]
    fn test_body_of_void_array_fails_controller() {
        let controller = pets().with_method(
            MethodDescriptor::builder("app.Pets", "upload")
                .verb(HttpVerb::Put)
                .pattern("/raw")
                .param(ParamDescriptor::body("b", TypeRef::array(TypeRef::Void)))
                .build(),
        );
        let err = RouteCompiler::default()
            .compile_controller(&controller)
            .unwrap_err();
        let CompileError::UnsupportedBinding { param, .. } = &err else {
            panic!("unexpected error {err}");
        };
        assert_eq!(param, "b");
    }

    #[test]
    fn test_compile_all_rejects_repeated_controller() {
        let err = RouteCompiler::default()
            .compile_all(&[pets(), pets()])
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidController { .. }));
    }

    #[test]
    fn test_options_extend_attribute_filter() {
        let compiler = RouteCompiler::new(CompilerOptions {
            excluded_attributes: vec!["app.Internal".to_string()],
        });
        let controller = ControllerDescriptor::new("app.C").with_method(
            MethodDescriptor::builder("app.C", "a")
                .attribute("app.Internal", AttributeValue::Boolean(true))
                .build(),
        );
        let compiled = compiler.compile_controller(&controller).unwrap();
        let registration: Unit = compiled.registration.decode().unwrap();
        assert!(!registration
            .pool
            .iter()
            .any(|c| *c == daedalus_unit::Constant::Str("app.Internal".into())));
        assert!(compiler.attribute_filter().is_excluded("app.Internal"));
    }
}
