//! # Daedalus
//!
//! **Build-time MVC route compiler for the Themis Platform**
//!
//! Daedalus turns controller descriptors into small precompiled units that a
//! host router loads at startup, so no reflection happens while requests are
//! served:
//!
//! - **Handler units** – one per controller method, implementing
//!   `Handler.apply(Context)`: they pull the controller from its provider,
//!   convert request values to the declared parameter types, invoke the
//!   method and adapt the result
//! - **Registration units** – one per controller (`<Controller>$Routes`),
//!   implementing `Installer.install(Router)`: they register every route
//!   with its return type, media types and attributes
//!
//! ## Quick Start
//!
//! ```
//! use daedalus::prelude::*;
//!
//! let pets = ControllerDescriptor::new("app.PetController").with_method(
//!     MethodDescriptor::builder("app.PetController", "getPet")
//!         .verb(HttpVerb::Get)
//!         .pattern("/pets/{id}")
//!         .param(ParamDescriptor::path("id", TypeRef::int()))
//!         .returns(TypeRef::class("app.Pet"))
//!         .build(),
//! );
//!
//! let compiled = RouteCompiler::default().compile_controller(&pets).unwrap();
//! assert_eq!(compiled.registration.name, "app.PetController$Routes");
//! assert_eq!(compiled.handlers[0].name, "app.PetController$GET_spets_s_oid_c$id");
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! descriptors (JSON) → RouteCompiler → GeneratedUnit bytes → unit files + manifest
//! ```
//!
//! The [`build`] crate drives the pipeline from configuration; the
//! `daedalus-build` binary wraps it for build scripts and CI.

#![doc(html_root_url = "https://docs.rs/daedalus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export descriptor types
pub use daedalus_model as model;

// Re-export the unit format
pub use daedalus_unit as unit;

// Re-export the compiler
pub use daedalus_codegen as codegen;

// Re-export configuration
pub use daedalus_config as config;

// Re-export telemetry
pub use daedalus_telemetry as telemetry;

// Re-export build integration
pub use daedalus_build as build;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use daedalus::prelude::*;
///
/// let options = CompilerOptions::default();
/// assert!(options.excluded_attributes.is_empty());
/// ```
pub mod prelude {
    pub use daedalus_model::{
        AttributeValue, BindingKind, ControllerDescriptor, HttpVerb, MethodDescriptor, MethodRef,
        ParamDescriptor, TypeRef,
    };

    pub use daedalus_unit::{GeneratedUnit, UnitKind};

    pub use daedalus_codegen::{CompileError, CompiledController, CompilerOptions, RouteCompiler};

    pub use daedalus_config::{ConfigLoader, DaedalusConfig};

    pub use daedalus_build::{BuildError, BuildReport, Manifest, RouteBuild};
}
