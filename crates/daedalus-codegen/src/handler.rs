//! Handler unit generation.
//!
//! A handler unit adapts one controller method to the dispatch interface:
//!
//! ```text
//! handler <owner>$<VERB><pattern>$<params> implements Handler
//!   field provider Provider
//!   <init>(Provider)   stores the provider
//!   apply(Context)     provider.get() -> controller, bind each argument,
//!                      invoke the method, adapt the return value
//! ```

use daedalus_model::{names, MethodDescriptor, ReturnDescriptor};
use daedalus_unit::{CodeBuilder, Unit, UnitBuilder, UnitKind};

use crate::binding::{emit_param, CONTEXT_SLOT};
use crate::error::CompileResult;
use crate::naming::handler_name;
use crate::runtime::{self, context, object, PROVIDER_FIELD};
use crate::types::{emit_box, method_type};

/// Generates the handler unit for `method`.
pub fn generate_handler(method: &MethodDescriptor) -> CompileResult<Unit> {
    let name = handler_name(method);
    let mut unit = UnitBuilder::new(name.clone(), UnitKind::Handler)
        .with_hierarchy(&runtime::hierarchy());
    unit.implements(names::HANDLER)
        .field(PROVIDER_FIELD, object(names::PROVIDER));
    unit.method(
        runtime::CONSTRUCTOR,
        runtime::constructor_type(),
        constructor(&name),
    )?;
    unit.method(runtime::APPLY, runtime::apply_type(), apply(&name, method)?)?;
    Ok(unit.build())
}

/// `this.provider = provider`
pub(crate) fn constructor(unit: &str) -> CodeBuilder {
    let mut code = CodeBuilder::new();
    code.load(0)
        .load(1)
        .put_field(unit, PROVIDER_FIELD, &object(names::PROVIDER))
        .return_void();
    code
}

fn apply(unit: &str, method: &MethodDescriptor) -> CompileResult<CodeBuilder> {
    let owner = object(&method.owner);
    let mut code = CodeBuilder::new();
    code.load(0)
        .get_field(unit, PROVIDER_FIELD, &object(names::PROVIDER));
    runtime::provider_get().emit(&mut code);
    code.check_cast(&owner);

    for param in &method.params {
        emit_param(&mut code, method, param)?;
    }
    code.invoke_virtual(&method.owner, &method.name, &method_type(method));

    match method.returns() {
        ReturnDescriptor::Void => {
            // An untouched response is completed with 204.
            let untouched = code.new_label();
            code.load(CONTEXT_SLOT);
            context::is_response_started().emit(&mut code);
            code.if_false(untouched)
                .load(CONTEXT_SLOT)
                .return_value()
                .bind(untouched)
                .load(CONTEXT_SLOT)
                .get_static(
                    names::STATUS_CODE,
                    runtime::NO_CONTENT,
                    &object(names::STATUS_CODE),
                );
            context::send().emit(&mut code);
            code.return_value();
        }
        ReturnDescriptor::Primitive(kind) => {
            emit_box(&mut code, kind);
            code.return_value();
        }
        ReturnDescriptor::StatusCode => {
            code.load(CONTEXT_SLOT).swap();
            context::send().emit(&mut code);
            code.return_value();
        }
        ReturnDescriptor::Reference(_)
        | ReturnDescriptor::Context
        | ReturnDescriptor::Parameterized { .. } => {
            code.return_value();
        }
    }
    Ok(code)
}
