//! Build integration for the Daedalus route compiler.
//!
//! Reads controller descriptors (JSON), compiles them, and writes one file
//! per generated unit plus a manifest listing them.
//!
//! # Output layout
//!
//! ```text
//! target/daedalus/
//! ├── app.PetController$GET_spets_s_oid_c$id.dunit
//! ├── app.PetController$Routes.dunit
//! └── daedalus-manifest.json
//! ```
//!
//! With incremental output enabled, unit files whose bytes did not change are
//! left untouched. With pruning enabled, files listed in the previous
//! manifest but no longer generated are deleted. Files the manifest never
//! listed are never removed.
//!
//! # Example
//!
//! ```no_run
//! use daedalus_build::RouteBuild;
//! use daedalus_config::DaedalusConfig;
//!
//! # fn main() -> Result<(), daedalus_build::BuildError> {
//! let report = RouteBuild::new(DaedalusConfig::default())
//!     .run_files(&["build/controllers.json".into()])?;
//! for entry in report.manifest.registrations() {
//!     println!("{} installs {} handlers", entry.name, entry.handlers.len());
//! }
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/daedalus-build/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod descriptors;
mod error;
mod manifest;
mod pipeline;
mod writer;

pub use descriptors::{load_descriptor_file, load_descriptors, parse_descriptors};
pub use error::{BuildError, BuildResult};
pub use manifest::{unit_file_name, Manifest, ManifestEntry, MANIFEST_VERSION};
pub use pipeline::{telemetry_config, BuildReport, RouteBuild};
pub use writer::{OutputWriter, WriteOutcome};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
