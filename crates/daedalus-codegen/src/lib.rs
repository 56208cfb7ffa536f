//! # Daedalus Codegen
//!
//! Build-time route compiler. Every controller method becomes one handler
//! unit implementing the dispatch interface, and every controller becomes one
//! registration unit implementing the installation interface. The generated
//! units contain only direct calls; nothing is looked up reflectively at
//! request time.
//!
//! - [`RouteCompiler`] - compile controllers into encoded units
//! - [`generate_handler`] / [`generate_registration`] - the two unit generators
//! - [`BindingStrategy`] - one strategy per [`BindingKind`](daedalus_model::BindingKind)
//! - [`naming`] - the injective unit naming scheme
//! - [`runtime`] - the catalogue of host runtime members units link against
//!
//! # Example
//!
//! ```
//! use daedalus_codegen::RouteCompiler;
//! use daedalus_model::{ControllerDescriptor, HttpVerb, MethodDescriptor, ParamDescriptor, TypeRef};
//!
//! let controller = ControllerDescriptor::new("app.PetController").with_method(
//!     MethodDescriptor::builder("app.PetController", "getPet")
//!         .verb(HttpVerb::Get)
//!         .pattern("/pets/{id}")
//!         .param(ParamDescriptor::path("id", TypeRef::int()))
//!         .returns(TypeRef::class("app.Pet"))
//!         .build(),
//! );
//!
//! let compiled = RouteCompiler::default().compile_controller(&controller).unwrap();
//! assert_eq!(compiled.handlers[0].name, "app.PetController$GET_spets_s_oid_c$id");
//! assert_eq!(compiled.registration.name, "app.PetController$Routes");
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-codegen/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod binding;
mod compiler;
mod error;
mod handler;
pub mod naming;
mod registration;
pub mod runtime;
pub mod types;

pub use binding::{
    emit_param, strategy_for, BindingStrategy, BodyBinding, BoundBinding, ContextBinding,
    UploadBinding, ValueBinding, CONTEXT_SLOT,
};
pub use compiler::{CompiledController, CompilerOptions, RouteCompiler};
pub use error::{CompileError, CompileResult};
pub use handler::generate_handler;
pub use naming::{handler_name, registration_name, UnitKey};
pub use registration::{
    emit_attribute, generate_registration, registration_hierarchy, AttributeFilter,
    DEFAULT_EXCLUDED_ATTRIBUTES,
};
