//! Controller stubs and providers.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use daedalus_model::names;
use parking_lot::Mutex;

use crate::error::{TestError, TestResult};
use crate::value::{NativeObject, Value};

type MethodFn = Arc<dyn Fn(&[Value]) -> TestResult<Value> + Send + Sync>;

/// A recorded controller invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Method name.
    pub method: String,
    /// Arguments as received.
    pub args: Vec<Value>,
}

struct Inner {
    class: String,
    methods: Mutex<HashMap<String, MethodFn>>,
    calls: Mutex<Vec<Call>>,
}

/// A stand-in controller whose methods are Rust closures.
///
/// Every invocation is recorded with its arguments.
///
/// # Example
///
/// ```
/// use daedalus_test::{ControllerStub, Value};
///
/// let pets = ControllerStub::new("app.PetController")
///     .on("count", |_| Ok(Value::Int(3)));
/// assert_eq!(pets.class(), "app.PetController");
/// ```
#[derive(Clone)]
pub struct ControllerStub {
    inner: Arc<Inner>,
}

impl ControllerStub {
    /// Creates a stub for controller `class` with no methods.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                class: class.into(),
                methods: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Defines method `name`, replacing any previous definition.
    #[must_use]
    pub fn on<F>(self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> TestResult<Value> + Send + Sync + 'static,
    {
        self.inner.methods.lock().insert(name.into(), Arc::new(body));
        self
    }

    /// Defines method `name` returning `value` on every call.
    #[must_use]
    pub fn returning(self, name: impl Into<String>, value: Value) -> Self {
        self.on(name, move |_| Ok(value.clone()))
    }

    /// Controller class name.
    pub fn class(&self) -> &str {
        &self.inner.class
    }

    /// Invocations so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().clone()
    }

    /// Wraps the stub in a provider returning it.
    pub fn provider(&self) -> Value {
        Value::native(Provider::new(Value::native(self.clone())))
    }
}

impl fmt::Debug for ControllerStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<String> = self.inner.methods.lock().keys().cloned().collect();
        methods.sort();
        f.debug_struct("ControllerStub")
            .field("class", &self.inner.class)
            .field("methods", &methods)
            .finish_non_exhaustive()
    }
}

impl NativeObject for ControllerStub {
    fn class_name(&self) -> &str {
        &self.inner.class
    }

    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value> {
        let body = self
            .inner
            .methods
            .lock()
            .get(method)
            .cloned()
            .ok_or_else(|| TestError::no_method(&self.inner.class, method))?;
        self.inner.calls.lock().push(Call {
            method: method.to_string(),
            args: args.to_vec(),
        });
        body(args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A provider (`Provider` runtime type) returning a fixed instance.
#[derive(Debug, Clone)]
pub struct Provider {
    instance: Value,
}

impl Provider {
    /// Creates a provider of `instance`.
    pub fn new(instance: Value) -> Self {
        Self { instance }
    }
}

impl NativeObject for Provider {
    fn class_name(&self) -> &str {
        names::PROVIDER
    }

    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value> {
        match (method, args) {
            ("get", []) => Ok(self.instance.clone()),
            _ => Err(TestError::no_method(names::PROVIDER, method)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_records_calls() {
        let stub = ControllerStub::new("app.C").on("add", |args| {
            Ok(Value::Int(args[0].as_int()? + args[1].as_int()?))
        });
        let result = stub.invoke("add", &[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(5));
        assert_eq!(stub.calls().len(), 1);
        assert_eq!(stub.calls()[0].method, "add");
    }

    #[test]
    fn test_unknown_method() {
        let stub = ControllerStub::new("app.C");
        assert_eq!(
            stub.invoke("missing", &[]).unwrap_err(),
            TestError::no_method("app.C", "missing")
        );
    }

    #[test]
    fn test_provider_returns_stub() {
        let stub = ControllerStub::new("app.C");
        let provider = stub.provider();
        let Value::Native(provider) = provider else { panic!() };
        let got = provider.invoke("get", &[]).unwrap();
        assert_eq!(got.class_name().as_deref(), Some("app.C"));
    }
}
