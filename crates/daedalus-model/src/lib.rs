//! # Daedalus Model
//!
//! Resolved, immutable descriptors consumed by the Daedalus route compiler.
//!
//! The metadata source (an annotation processor, a source scanner, or a JSON
//! document produced by another tool) resolves every controller method into a
//! [`MethodDescriptor`] before compilation starts. Nothing in this crate
//! performs discovery or type resolution; it only describes the result.
//!
//! - [`TypeRef`] / [`PrimitiveKind`] - resolved declared types
//! - [`ParamDescriptor`] / [`BindingKind`] - where each argument comes from
//! - [`ReturnDescriptor`] - the return-handling category of a method
//! - [`AttributeValue`] - declarative metadata literals
//! - [`ControllerDescriptor`] - one controller and its methods, in discovery order
//!
//! # Example
//!
//! ```
//! use daedalus_model::{HttpVerb, MethodDescriptor, ParamDescriptor, TypeRef};
//!
//! let method = MethodDescriptor::builder("app.PetController", "getPet")
//!     .verb(HttpVerb::Get)
//!     .pattern("pets/{id}/")
//!     .param(ParamDescriptor::path("id", TypeRef::int()))
//!     .returns(TypeRef::class("app.Pet"))
//!     .build();
//!
//! assert_eq!(method.pattern, "/pets/{id}");
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-model/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod attribute;
mod error;
mod method;
pub mod names;
pub mod pattern;
mod types;

pub use attribute::{AttributeMap, AttributeValue};
pub use error::ModelError;
pub use method::{
    BindingKind, ControllerDescriptor, HttpVerb, MethodDescriptor, MethodDescriptorBuilder,
    MethodRef, ParamDescriptor, ReturnDescriptor,
};
pub use types::{PrimitiveKind, TypeRef};
