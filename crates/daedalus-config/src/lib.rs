//! Typed configuration for the Daedalus route compiler.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides (`DAEDALUS__SECTION__KEY`)
//! - Strict parsing (unknown fields are errors)
//! - Layered configuration (defaults → file → env)
//!
//! # Sections
//!
//! - [`OutputConfig`] - output directory, manifest and unit file names,
//!   incremental writes
//! - [`CompilerConfig`] - extra excluded attribute names, failure policy
//! - [`LoggingConfig`] - log level and format
//! - [`MetricsConfig`] - build metrics
//!
//! # Configuration File Format
//!
//! ```toml
//! [output]
//! dir = "target/daedalus"
//! manifest_name = "daedalus-manifest.json"
//! unit_extension = "dunit"
//! incremental = true
//! prune_stale = true
//!
//! [compiler]
//! excluded_attributes = ["Traced"]
//! fail_fast = true
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! output_file = "target/daedalus-metrics.prom"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `DAEDALUS__OUTPUT__DIR=build/units`
//! - `DAEDALUS__COMPILER__EXCLUDED_ATTRIBUTES=Traced,app.Audit`
//! - `DAEDALUS__LOGGING__LEVEL=debug`

#![doc(html_root_url = "https://docs.rs/daedalus-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{DaedalusConfig, DaedalusConfigBuilder};
pub use error::{ConfigError, Origin};
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{CompilerConfig, LogFormat, LoggingConfig, MetricsConfig, OutputConfig};
