//! # Daedalus Test
//!
//! Test utilities for the Daedalus route compiler: load generated units into
//! memory and execute them against synthetic runtime objects, without a host
//! runtime.
//!
//! ## Key Features
//!
//! - **Loader / Machine**: decode, verify and interpret handler and
//!   registration units
//! - **SyntheticContext**: a request context built fluently, recording what
//!   the handler sent
//! - **RecordingRouter**: captures every route an installation unit registers
//! - **ControllerStub**: controller methods as Rust closures, with call recording
//!
//! ## Example
//!
//! ```ignore
//! use daedalus_codegen::RouteCompiler;
//! use daedalus_test::{ControllerStub, Loader, RecordingRouter, SyntheticContext, Value};
//!
//! let compiled = RouteCompiler::default().compile_controller(&controller)?;
//! let mut loader = Loader::new();
//! loader.load_all(compiled.units())?;
//! let machine = loader.link()?;
//!
//! let pets = ControllerStub::new("app.PetController")
//!     .on("getPet", |args| Ok(Value::record("app.Pet", [("id", args[0].clone())])));
//! let router = RecordingRouter::new();
//! machine.install(&compiled.registration.name, pets.provider(), &router)?;
//!
//! let route = router.find("GET", "/pets/{id}").unwrap();
//! let ctx = SyntheticContext::builder().path("id", "7").build();
//! let pet = machine.dispatch(route.handler(), &ctx)?;
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod controller;
mod error;
mod machine;
mod router;
mod value;

pub use context::{SyntheticContext, SyntheticContextBuilder, UploadedFile, NO_CONTENT};
pub use controller::{Call, ControllerStub, Provider};
pub use error::{TestError, TestResult};
pub use machine::{Loader, Machine, DEFAULT_STEP_LIMIT};
pub use router::{RecordedRoute, RecordingRouter};
pub use value::{ArrayRef, Instance, NativeObject, Value};
