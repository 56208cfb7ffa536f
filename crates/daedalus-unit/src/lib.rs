//! # Daedalus Unit
//!
//! The binary code unit format produced by the Daedalus route compiler.
//!
//! A unit is a small, self-describing class file: a name, the interfaces it
//! implements, a constant pool, instance fields and methods whose bodies are
//! instructions for a one-slot-per-value stack machine.
//!
//! - [`CodeBuilder`] - assemble a method body with symbolic constants and labels
//! - [`UnitBuilder`] - assemble and verify a whole unit
//! - [`Unit`] - encode, decode, re-verify and disassemble
//! - [`verify_method`] / [`stack_effect`] - the stack verifier
//!
//! # Example
//!
//! ```
//! use daedalus_unit::{CodeBuilder, FieldType, MethodType, Unit, UnitBuilder, UnitKind};
//!
//! let provider = FieldType::object("daedalus.runtime.Provider");
//! let mut unit = UnitBuilder::new("app.Example", UnitKind::Handler);
//! unit.field("provider", provider.clone());
//!
//! let mut init = CodeBuilder::new();
//! init.load(0)
//!     .load(1)
//!     .put_field("app.Example", "provider", &provider)
//!     .return_void();
//! unit.method("<init>", MethodType::void(vec![provider]), init).unwrap();
//!
//! let unit = unit.build();
//! let bytes = unit.encode().unwrap();
//! assert_eq!(Unit::decode(&bytes).unwrap(), unit);
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-unit/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod code;
mod descriptor;
mod error;
mod insn;
mod pool;
mod unit;
pub mod verify;
mod wire;

pub use code::{CodeBuilder, Label};
pub use descriptor::{FieldType, MethodType};
pub use error::{UnitError, UnitResult};
pub use insn::{DisplayInstruction, Instruction};
pub use pool::{Constant, ConstantPool, MemberRef};
pub use unit::{
    FieldDef, GeneratedUnit, MethodDef, Unit, UnitBuilder, UnitKind, FILE_EXTENSION,
    FORMAT_VERSION, MAGIC,
};
pub use verify::{stack_effect, verify_method, Frame, Hierarchy, VType};
