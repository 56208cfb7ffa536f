//! Synthetic request context.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use daedalus_model::{names, PrimitiveKind};
use parking_lot::Mutex;

use crate::error::{TestError, TestResult};
use crate::value::{convert, parse_primitive, NativeObject, Value};

/// Status code sent by a void handler that did not start the response.
pub const NO_CONTENT: u16 = 204;

#[derive(Debug, Default)]
struct Request {
    path: HashMap<String, Vec<String>>,
    query: HashMap<String, Vec<String>>,
    header: HashMap<String, Vec<String>>,
    cookie: HashMap<String, Vec<String>>,
    form: HashMap<String, Vec<String>>,
    body: Vec<u8>,
    payload: Option<Value>,
    files: HashMap<String, Vec<UploadedFile>>,
    values: HashMap<String, Value>,
    bound: HashMap<String, Value>,
}

#[derive(Debug, Default)]
struct Response {
    started: bool,
    sent: Vec<u16>,
}

#[derive(Debug, Default)]
struct Inner {
    request: Request,
    response: Mutex<Response>,
}

/// An in-memory request context handed to generated handlers.
///
/// Built fluently before dispatch; afterwards it records what the handler
/// sent.
///
/// # Example
///
/// ```
/// use daedalus_test::SyntheticContext;
///
/// let ctx = SyntheticContext::builder()
///     .path("id", "7")
///     .query("tag", "a")
///     .query("tag", "b")
///     .build();
/// assert!(!ctx.is_response_started());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyntheticContext {
    inner: Arc<Inner>,
}

impl SyntheticContext {
    /// Starts building a context.
    pub fn builder() -> SyntheticContextBuilder {
        SyntheticContextBuilder::default()
    }

    /// Whether the response has been started.
    pub fn is_response_started(&self) -> bool {
        self.inner.response.lock().started
    }

    /// Marks the response as started, as if the controller wrote to it.
    pub fn start_response(&self) {
        self.inner.response.lock().started = true;
    }

    /// Status codes sent so far, in order.
    pub fn sent_statuses(&self) -> Vec<u16> {
        self.inner.response.lock().sent.clone()
    }

    /// Returns `true` if `value` is this very context.
    pub fn is_same(&self, value: &Value) -> bool {
        value
            .downcast_native::<Self>()
            .is_some_and(|other| Arc::ptr_eq(&self.inner, &other.inner))
    }

    /// This context as a machine value.
    pub fn to_value(&self) -> Value {
        Value::native(self.clone())
    }

    fn lookup(&self, source: &str, name: &str) -> Value {
        let request = &self.inner.request;
        let table = match source {
            "path" => &request.path,
            "query" => &request.query,
            "header" => &request.header,
            "cookie" => &request.cookie,
            _ => &request.form,
        };
        Value::native(RequestValue {
            description: format!("{source} `{name}`"),
            values: table.get(name).cloned().unwrap_or_default(),
        })
    }
}

impl NativeObject for SyntheticContext {
    fn class_name(&self) -> &str {
        names::CONTEXT
    }

    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value> {
        let request = &self.inner.request;
        match (method, args) {
            ("path" | "query" | "header" | "cookie" | "form", [name]) => {
                Ok(self.lookup(method, name.as_str()?))
            }
            ("body", []) => Ok(Value::native(RequestBody {
                bytes: request.body.clone(),
                payload: request.payload.clone(),
            })),
            ("file", [name]) => {
                let name = name.as_str()?;
                request
                    .files
                    .get(name)
                    .and_then(|files| files.first())
                    .map(|file| Value::native(file.clone()))
                    .ok_or_else(|| TestError::Missing(format!("file `{name}`")))
            }
            ("files", [name]) => Ok(Value::List(
                request
                    .files
                    .get(name.as_str()?)
                    .map(|files| files.iter().cloned().map(Value::native).collect())
                    .unwrap_or_default(),
            )),
            ("require", [class]) => {
                let class = class.as_class()?;
                request
                    .values
                    .get(class)
                    .cloned()
                    .ok_or_else(|| TestError::Missing(format!("context value {class}")))
            }
            ("bind", [class]) => {
                let class = class.as_class()?;
                request
                    .bound
                    .get(class)
                    .cloned()
                    .ok_or_else(|| TestError::Missing(format!("bound object {class}")))
            }
            ("isResponseStarted", []) => Ok(Value::Int(i32::from(self.is_response_started()))),
            ("send", [Value::StatusCode(code)]) => {
                let mut response = self.inner.response.lock();
                response.started = true;
                response.sent.push(*code);
                Ok(self.to_value())
            }
            _ => Err(TestError::no_method(names::CONTEXT, method)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builder for [`SyntheticContext`].
#[derive(Debug, Default)]
#[must_use]
pub struct SyntheticContextBuilder {
    request: Request,
}

fn push(table: &mut HashMap<String, Vec<String>>, name: impl Into<String>, value: impl Into<String>) {
    table.entry(name.into()).or_default().push(value.into());
}

impl SyntheticContextBuilder {
    /// Adds a path variable.
    pub fn path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push(&mut self.request.path, name, value);
        self
    }

    /// Adds a query parameter value; repeat for multi-valued parameters.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push(&mut self.request.query, name, value);
        self
    }

    /// Adds a header value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push(&mut self.request.header, name, value);
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push(&mut self.request.cookie, name, value);
        self
    }

    /// Adds a form field value.
    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push(&mut self.request.form, name, value);
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.request.body = bytes.into();
        self
    }

    /// Sets the decoded body object returned for non-scalar body types.
    pub fn body_object(mut self, value: Value) -> Self {
        self.request.payload = Some(value);
        self
    }

    /// Adds an uploaded file under the multipart field `name`.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let name = name.into();
        let file = UploadedFile {
            field: name.clone(),
            file_name: file_name.into(),
            bytes: bytes.into(),
        };
        self.request.files.entry(name).or_default().push(file);
        self
    }

    /// Stores a typed context value under its class.
    pub fn value(mut self, class: impl Into<String>, value: Value) -> Self {
        self.request.values.insert(class.into(), value);
        self
    }

    /// Stores the object returned when the context binds `class`.
    pub fn bound(mut self, class: impl Into<String>, value: Value) -> Self {
        self.request.bound.insert(class.into(), value);
        self
    }

    /// Finishes the context.
    pub fn build(self) -> SyntheticContext {
        SyntheticContext {
            inner: Arc::new(Inner {
                request: self.request,
                response: Mutex::new(Response::default()),
            }),
        }
    }
}

/// A named request value (`Value` runtime type).
#[derive(Debug, Clone)]
struct RequestValue {
    description: String,
    values: Vec<String>,
}

impl RequestValue {
    fn first(&self) -> TestResult<&str> {
        self.values
            .first()
            .map(String::as_str)
            .ok_or_else(|| TestError::Missing(self.description.clone()))
    }

    fn convert_all(&self, class: &str) -> TestResult<Vec<Value>> {
        self.values.iter().map(|raw| convert(raw, class)).collect()
    }
}

impl NativeObject for RequestValue {
    fn class_name(&self) -> &str {
        names::VALUE
    }

    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value> {
        match (method, args) {
            ("value", []) => Ok(Value::str(self.first()?)),
            ("valueOrNull", []) => Ok(self.values.first().map_or(Value::Null, Value::str)),
            ("to", [class]) => convert(self.first()?, class.as_class()?),
            ("toNullable", [class]) => match self.values.first() {
                Some(raw) => convert(raw, class.as_class()?),
                None => Ok(Value::Null),
            },
            ("toOptional", [class]) => Ok(Value::Optional(match self.values.first() {
                Some(raw) => Some(Box::new(convert(raw, class.as_class()?)?)),
                None => None,
            })),
            ("toList", [class]) => Ok(Value::List(self.convert_all(class.as_class()?)?)),
            ("toSet", [class]) => {
                let mut set: Vec<Value> = Vec::new();
                for value in self.convert_all(class.as_class()?)? {
                    if !set.contains(&value) {
                        set.push(value);
                    }
                }
                Ok(Value::Set(set))
            }
            (name, []) => {
                let kind = PrimitiveKind::ALL
                    .into_iter()
                    .find(|kind| name.strip_suffix("Value") == Some(kind.name()))
                    .ok_or_else(|| TestError::no_method(names::VALUE, name))?;
                parse_primitive(self.first()?, kind)
            }
            _ => Err(TestError::no_method(names::VALUE, method)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The request body (`Body` runtime type).
#[derive(Debug, Clone)]
struct RequestBody {
    bytes: Vec<u8>,
    payload: Option<Value>,
}

impl RequestBody {
    fn text(&self) -> TestResult<String> {
        String::from_utf8(self.bytes.clone())
            .map_err(|_| TestError::conversion("<binary body>", names::STRING))
    }
}

impl NativeObject for RequestBody {
    fn class_name(&self) -> &str {
        names::BODY
    }

    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value> {
        match (method, args) {
            ("bytes", []) => Ok(Value::Bytes(self.bytes.clone())),
            ("stream", []) => Ok(Value::record(
                names::INPUT_STREAM,
                [("bytes", Value::Bytes(self.bytes.clone()))],
            )),
            ("value", []) => Ok(Value::Str(self.text()?)),
            ("to", [Value::Class(class)]) if class == names::STRING => {
                Ok(Value::Str(self.text()?))
            }
            ("to", [Value::Class(class)]) if PrimitiveKind::from_boxed(class).is_some() => {
                convert(self.text()?.trim(), class)
            }
            ("to", [ty @ (Value::Class(_) | Value::Reified { .. })]) => self
                .payload
                .clone()
                .ok_or_else(|| TestError::Missing(format!("body object of type {ty}"))),
            _ => Err(TestError::no_method(names::BODY, method)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An uploaded file (`FileUpload` runtime type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Multipart field name.
    pub field: String,
    /// Client file name.
    pub file_name: String,
    /// Content.
    pub bytes: Vec<u8>,
}

impl NativeObject for UploadedFile {
    fn class_name(&self) -> &str {
        names::FILE_UPLOAD
    }

    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value> {
        match (method, args) {
            ("path", []) => Ok(Value::record(
                names::FILE_PATH,
                [("name", Value::str(self.file_name.clone()))],
            )),
            ("bytes", []) => Ok(Value::Bytes(self.bytes.clone())),
            _ => Err(TestError::no_method(names::FILE_UPLOAD, method)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
