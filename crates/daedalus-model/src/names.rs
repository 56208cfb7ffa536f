//! Well-known type names of the host runtime.
//!
//! Generated units reference these types by name only. The host runtime is
//! expected to provide them with the members listed in
//! `daedalus_codegen::runtime`.

/// Root of the reference type hierarchy.
pub const OBJECT: &str = "lang.Object";
/// Immutable string.
pub const STRING: &str = "lang.String";
/// Runtime class literal.
pub const CLASS: &str = "lang.Class";
/// Common supertype of class literals and reified generic types.
pub const TYPE: &str = "lang.Type";

/// Optional container.
pub const OPTIONAL: &str = "util.Optional";
/// Ordered list container.
pub const LIST: &str = "util.List";
/// Set container.
pub const SET: &str = "util.Set";
/// Map container.
pub const MAP: &str = "util.Map";

/// Byte stream.
pub const INPUT_STREAM: &str = "io.InputStream";
/// File system path.
pub const FILE_PATH: &str = "io.Path";

/// Per-request context handed to every handler.
pub const CONTEXT: &str = "daedalus.runtime.Context";
/// A single request value (path variable, query parameter, header, ...).
pub const VALUE: &str = "daedalus.runtime.Value";
/// Request body.
pub const BODY: &str = "daedalus.runtime.Body";
/// Uploaded file.
pub const FILE_UPLOAD: &str = "daedalus.runtime.FileUpload";
/// HTTP status code marker.
pub const STATUS_CODE: &str = "daedalus.runtime.StatusCode";
/// Media type.
pub const MEDIA_TYPE: &str = "daedalus.runtime.MediaType";
/// Router receiving registrations.
pub const ROUTER: &str = "daedalus.runtime.Router";
/// Route handle returned by the router.
pub const ROUTE: &str = "daedalus.runtime.Route";
/// Controller instance provider.
pub const PROVIDER: &str = "daedalus.runtime.Provider";
/// Dispatch interface implemented by handler units.
pub const HANDLER: &str = "daedalus.runtime.Handler";
/// Installation interface implemented by registration units.
pub const INSTALLER: &str = "daedalus.runtime.Installer";
/// Reified generic type builder.
pub const REIFIED: &str = "daedalus.runtime.Reified";

/// Returns the simple (unqualified) part of a type or annotation name.
///
/// ```
/// assert_eq!(daedalus_model::names::simple_name("app.web.GET"), "GET");
/// assert_eq!(daedalus_model::names::simple_name("GET"), "GET");
/// ```
#[must_use]
pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
