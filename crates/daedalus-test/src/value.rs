//! Runtime values of the in-memory machine.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use daedalus_model::{names, PrimitiveKind};
use parking_lot::Mutex;

use crate::error::{TestError, TestResult};

/// A host object implemented in Rust.
///
/// Every runtime type a generated unit calls into (context, router, route,
/// provider, controller) is a native object. Natives are shared: cloning the
/// [`Value`] that holds one clones the handle, not the object.
pub trait NativeObject: fmt::Debug + Send + Sync {
    /// Runtime class name, used for casts.
    fn class_name(&self) -> &str;

    /// Invokes an instance method.
    fn invoke(&self, method: &str, args: &[Value]) -> TestResult<Value>;

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;
}

/// A generated unit instance.
#[derive(Debug)]
pub struct Instance {
    /// Unit name.
    pub unit: String,
    fields: Mutex<HashMap<String, Value>>,
}

impl Instance {
    pub(crate) fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            fields: Mutex::new(HashMap::new()),
        }
    }

    /// Reads a field; unset fields read as null.
    pub fn field(&self, name: &str) -> Value {
        self.fields.lock().get(name).cloned().unwrap_or(Value::Null)
    }

    pub(crate) fn set_field(&self, name: &str, value: Value) {
        self.fields.lock().insert(name.to_string(), value);
    }
}

/// A mutable array shared by reference.
#[derive(Debug, Clone)]
pub struct ArrayRef {
    /// Array class name, e.g. `[Llang.Object;`.
    pub class: String,
    items: Arc<Mutex<Vec<Value>>>,
}

impl ArrayRef {
    pub(crate) fn new(class: String, len: usize) -> Self {
        Self {
            class,
            items: Arc::new(Mutex::new(vec![Value::Null; len])),
        }
    }

    /// A snapshot of the elements.
    pub fn items(&self) -> Vec<Value> {
        self.items.lock().clone()
    }

    pub(crate) fn store(&self, index: i32, value: Value) -> TestResult<()> {
        let mut items = self.items.lock();
        let len = items.len();
        match usize::try_from(index).ok().filter(|i| *i < len) {
            Some(i) => {
                items[i] = value;
                Ok(())
            }
            None => Err(TestError::fault(format!(
                "array index {index} out of bounds {len}"
            ))),
        }
    }
}

/// A value on the operand stack, in a local, a field or an array.
#[derive(Debug, Clone)]
pub enum Value {
    /// The null reference.
    Null,
    /// Any int-like primitive (`boolean`, `byte`, `char`, `short`, `int`).
    Int(i32),
    /// `long`.
    Long(i64),
    /// `float`.
    Float(f32),
    /// `double`.
    Double(f64),
    /// A boxed primitive.
    Boxed(PrimitiveKind, Box<Value>),
    /// A string.
    Str(String),
    /// A class literal.
    Class(String),
    /// A reified parameterized type.
    Reified {
        /// Base class.
        base: String,
        /// Type arguments (class literals or reified types).
        args: Vec<Value>,
    },
    /// An array.
    Array(ArrayRef),
    /// `byte[]` produced by the runtime.
    Bytes(Vec<u8>),
    /// An immutable list.
    List(Vec<Value>),
    /// An immutable set, in insertion order.
    Set(Vec<Value>),
    /// An immutable map, in insertion order.
    Map(Vec<(Value, Value)>),
    /// An optional value.
    Optional(Option<Box<Value>>),
    /// A media type.
    MediaType(String),
    /// A status code.
    StatusCode(u16),
    /// An enum constant.
    Enum {
        /// Enum type.
        ty: String,
        /// Constant name.
        constant: String,
    },
    /// A plain data object of an application class.
    Record {
        /// Class name.
        class: String,
        /// Fields in order.
        fields: Vec<(String, Value)>,
    },
    /// A generated unit instance.
    Instance(Arc<Instance>),
    /// A host object.
    Native(Arc<dyn NativeObject>),
}

impl Value {
    /// Wraps a host object.
    pub fn native<T: NativeObject + 'static>(object: T) -> Self {
        Self::Native(Arc::new(object))
    }

    /// A string value.
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// A boxed int.
    pub fn boxed_int(value: i32) -> Self {
        Self::Boxed(PrimitiveKind::Int, Box::new(Self::Int(value)))
    }

    /// A record of `class` with the given fields.
    pub fn record<K, I>(class: impl Into<String>, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Record {
            class: class.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Returns the host object if it is a `T`.
    pub fn downcast_native<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Native(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Runtime class of a reference value; `None` for null and primitives.
    pub fn class_name(&self) -> Option<String> {
        Some(match self {
            Self::Null | Self::Int(_) | Self::Long(_) | Self::Float(_) | Self::Double(_) => {
                return None
            }
            Self::Boxed(kind, _) => kind.boxed_class().to_string(),
            Self::Str(_) => names::STRING.to_string(),
            Self::Class(_) => names::CLASS.to_string(),
            Self::Reified { .. } => names::REIFIED.to_string(),
            Self::Array(array) => array.class.clone(),
            Self::Bytes(_) => "[B".to_string(),
            Self::List(_) => names::LIST.to_string(),
            Self::Set(_) => names::SET.to_string(),
            Self::Map(_) => names::MAP.to_string(),
            Self::Optional(_) => names::OPTIONAL.to_string(),
            Self::MediaType(_) => names::MEDIA_TYPE.to_string(),
            Self::StatusCode(_) => names::STATUS_CODE.to_string(),
            Self::Enum { ty, .. } => ty.clone(),
            Self::Record { class, .. } => class.clone(),
            Self::Instance(instance) => instance.unit.clone(),
            Self::Native(object) => object.class_name().to_string(),
        })
    }

    /// The string content, or a type mismatch.
    pub fn as_str(&self) -> TestResult<&str> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(TestError::mismatch(names::STRING, other)),
        }
    }

    /// The int content, or a type mismatch.
    pub fn as_int(&self) -> TestResult<i32> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(TestError::mismatch("int", other)),
        }
    }

    /// The class named by a class literal, or a type mismatch.
    pub fn as_class(&self) -> TestResult<&str> {
        match self {
            Self::Class(name) => Ok(name),
            other => Err(TestError::mismatch(names::CLASS, other)),
        }
    }

    /// The elements of a runtime array, or a type mismatch.
    pub fn array_items(&self) -> TestResult<Vec<Value>> {
        match self {
            Self::Array(array) => Ok(array.items()),
            other => Err(TestError::mismatch("array", other)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Boxed(k1, v1), Self::Boxed(k2, v2)) => k1 == k2 && v1 == v2,
            (Self::Str(a), Self::Str(b))
            | (Self::Class(a), Self::Class(b))
            | (Self::MediaType(a), Self::MediaType(b)) => a == b,
            (Self::Reified { base: b1, args: a1 }, Self::Reified { base: b2, args: a2 }) => {
                b1 == b2 && a1 == a2
            }
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(&a.items, &b.items),
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Optional(a), Self::Optional(b)) => a == b,
            (Self::StatusCode(a), Self::StatusCode(b)) => a == b,
            (
                Self::Enum { ty: t1, constant: c1 },
                Self::Enum { ty: t2, constant: c2 },
            ) => t1 == t2 && c1 == c2,
            (
                Self::Record { class: c1, fields: f1 },
                Self::Record { class: c2, fields: f2 },
            ) => c1 == c2 && f1 == f2,
            (Self::Instance(a), Self::Instance(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Long(l) => write!(f, "{l}L"),
            Self::Float(v) => write!(f, "{v}f"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Boxed(_, inner) => write!(f, "{inner}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Class(name) => f.write_str(name),
            Self::Reified { base, args } => {
                write!(f, "{base}<")?;
                join(f, args)?;
                f.write_str(">")
            }
            Self::Array(array) => {
                f.write_str("[")?;
                join(f, &array.items())?;
                f.write_str("]")
            }
            Self::Bytes(bytes) => write!(f, "byte[{}]", bytes.len()),
            Self::List(items) => {
                f.write_str("List[")?;
                join(f, items)?;
                f.write_str("]")
            }
            Self::Set(items) => {
                f.write_str("Set[")?;
                join(f, items)?;
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                f.write_str("}")
            }
            Self::Optional(None) => f.write_str("Optional.empty"),
            Self::Optional(Some(inner)) => write!(f, "Optional[{inner}]"),
            Self::MediaType(m) => f.write_str(m),
            Self::StatusCode(code) => write!(f, "status {code}"),
            Self::Enum { ty, constant } => write!(f, "{ty}.{constant}"),
            Self::Record { class, fields } => {
                write!(f, "{class}(")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                f.write_str(")")
            }
            Self::Instance(instance) => write!(f, "<{}>", instance.unit),
            Self::Native(object) => write!(f, "<{}>", object.class_name()),
        }
    }
}

/// Parses `raw` as a primitive of `kind`, producing its stack value.
pub(crate) fn parse_primitive(raw: &str, kind: PrimitiveKind) -> TestResult<Value> {
    let fail = || TestError::conversion(raw, kind.name());
    Ok(match kind {
        PrimitiveKind::Boolean => match raw {
            "true" => Value::Int(1),
            "false" => Value::Int(0),
            _ => return Err(fail()),
        },
        PrimitiveKind::Byte => Value::Int(i32::from(raw.parse::<i8>().map_err(|_| fail())?)),
        PrimitiveKind::Short => Value::Int(i32::from(raw.parse::<i16>().map_err(|_| fail())?)),
        PrimitiveKind::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    Value::Int(i32::try_from(u32::from(c)).map_err(|_| fail())?)
                }
                _ => return Err(fail()),
            }
        }
        PrimitiveKind::Int => Value::Int(raw.parse().map_err(|_| fail())?),
        PrimitiveKind::Long => Value::Long(raw.parse().map_err(|_| fail())?),
        PrimitiveKind::Float => Value::Float(raw.parse().map_err(|_| fail())?),
        PrimitiveKind::Double => Value::Double(raw.parse().map_err(|_| fail())?),
    })
}

/// Converts a raw request string to an instance of `class`.
///
/// Strings stay strings, box classes are parsed, and any other class becomes
/// a record with a single `value` field.
pub(crate) fn convert(raw: &str, class: &str) -> TestResult<Value> {
    if class == names::STRING {
        return Ok(Value::str(raw));
    }
    if let Some(kind) = PrimitiveKind::from_boxed(class) {
        return Ok(Value::Boxed(kind, Box::new(parse_primitive(raw, kind)?)));
    }
    Ok(Value::record(class, [("value", Value::str(raw))]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitive() {
        assert_eq!(parse_primitive("true", PrimitiveKind::Boolean).unwrap(), Value::Int(1));
        assert_eq!(parse_primitive("x", PrimitiveKind::Char).unwrap(), Value::Int(120));
        assert_eq!(parse_primitive("-5", PrimitiveKind::Long).unwrap(), Value::Long(-5));
        assert!(parse_primitive("300", PrimitiveKind::Byte).is_err());
        assert!(parse_primitive("yes", PrimitiveKind::Boolean).is_err());
    }

    #[test]
    fn test_convert() {
        assert_eq!(convert("7", "lang.Integer").unwrap(), Value::boxed_int(7));
        assert_eq!(convert("a", names::STRING).unwrap(), Value::str("a"));
        assert_eq!(
            convert("x1", "app.PetId").unwrap(),
            Value::record("app.PetId", [("value", Value::str("x1"))])
        );
    }

    #[test]
    fn test_display_reified() {
        let ty = Value::Reified {
            base: names::LIST.into(),
            args: vec![Value::Class("app.Pet".into())],
        };
        assert_eq!(ty.to_string(), "util.List<app.Pet>");
    }

    #[test]
    fn test_class_names() {
        assert_eq!(Value::boxed_int(1).class_name().as_deref(), Some("lang.Integer"));
        assert_eq!(Value::Int(1).class_name(), None);
        assert_eq!(Value::Bytes(vec![]).class_name().as_deref(), Some("[B"));
    }
}
