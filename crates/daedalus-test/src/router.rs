//! Recording router.

use std::any::Any;
use std::sync::Arc;

use daedalus_model::names;
use parking_lot::Mutex;

use crate::error::{TestError, TestResult};
use crate::value::{NativeObject, Value};

#[derive(Debug, Default)]
struct RouteState {
    return_type: Option<Value>,
    consumes: Vec<Value>,
    produces: Vec<Value>,
    attributes: Vec<(String, Value)>,
}

#[derive(Debug)]
struct RouteInner {
    verb: String,
    pattern: String,
    handler: Value,
    state: Mutex<RouteState>,
}

/// A route registered by an installation unit.
#[derive(Debug, Clone)]
pub struct RecordedRoute {
    inner: Arc<RouteInner>,
}

impl RecordedRoute {
    /// HTTP verb.
    pub fn verb(&self) -> &str {
        &self.inner.verb
    }

    /// Path pattern.
    pub fn pattern(&self) -> &str {
        &self.inner.pattern
    }

    /// The handler instance.
    pub fn handler(&self) -> &Value {
        &self.inner.handler
    }

    /// The declared return type, if set.
    pub fn return_type(&self) -> Option<Value> {
        self.inner.state.lock().return_type.clone()
    }

    /// Consumed media types.
    pub fn consumes(&self) -> Vec<String> {
        media_types(&self.inner.state.lock().consumes)
    }

    /// Produced media types.
    pub fn produces(&self) -> Vec<String> {
        media_types(&self.inner.state.lock().produces)
    }

    /// Attributes, in the order they were set.
    pub fn attributes(&self) -> Vec<(String, Value)> {
        self.inner.state.lock().attributes.clone()
    }

    /// The attribute called `name`.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.inner
            .state
            .lock()
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }
}

fn media_types(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| match v {
            Value::MediaType(m) => m.clone(),
            other => other.to_string(),
        })
        .collect()
}

fn list(value: &Value) -> TestResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.clone()),
        other => Err(TestError::mismatch(names::LIST, other)),
    }
}

impl NativeObject for RecordedRoute {
    fn class_name(&self) -> &str {
        names::ROUTE
    }

    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value> {
        {
            let mut state = self.inner.state.lock();
            match (method, args) {
                ("setReturnType", [ty]) => state.return_type = Some(ty.clone()),
                ("setConsumes", [types]) => state.consumes = list(types)?,
                ("setProduces", [types]) => state.produces = list(types)?,
                ("setAttribute", [name, value]) => {
                    state.attributes.push((name.as_str()?.to_string(), value.clone()));
                }
                _ => return Err(TestError::no_method(names::ROUTE, method)),
            }
        }
        Ok(Value::native(self.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A router (`Router` runtime type) that records every route.
#[derive(Debug, Clone, Default)]
pub struct RecordingRouter {
    routes: Arc<Mutex<Vec<RecordedRoute>>>,
}

impl RecordingRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes in registration order.
    pub fn routes(&self) -> Vec<RecordedRoute> {
        self.routes.lock().clone()
    }

    /// Finds the route for `verb` and `pattern`.
    pub fn find(&self, verb: &str, pattern: &str) -> Option<RecordedRoute> {
        self.routes
            .lock()
            .iter()
            .find(|r| r.verb() == verb && r.pattern() == pattern)
            .cloned()
    }

    /// This router as a machine value.
    pub fn to_value(&self) -> Value {
        Value::native(self.clone())
    }
}

impl NativeObject for RecordingRouter {
    fn class_name(&self) -> &str {
        names::ROUTER
    }

    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value> {
        let ("route", [verb, pattern, handler]) = (method, args) else {
            return Err(TestError::no_method(names::ROUTER, method));
        };
        let route = RecordedRoute {
            inner: Arc::new(RouteInner {
                verb: verb.as_str()?.to_string(),
                pattern: pattern.as_str()?.to_string(),
                handler: handler.clone(),
                state: Mutex::new(RouteState::default()),
            }),
        };
        self.routes.lock().push(route.clone());
        Ok(Value::native(route))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
