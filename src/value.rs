//! Dynamic value types
//!
//! This module defines the runtime representation of the opaque values a
//! deferred can be settled with: scalars, objects (including callable
//! native-function objects and objects with getter properties), and
//! deferred-value handles themselves.

use crate::deferred::Deferred;
use crate::error::{messages, Error, Result};
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Type alias for native function implementations
pub type NativeFn = Rc<dyn Fn(&[Value]) -> Result<Value>>;

/// A dynamic value
#[derive(Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object (includes native functions and error objects)
    Object(Rc<RefCell<Object>>),
    /// A deferred-value handle
    Deferred(Deferred),
}

impl Value {
    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is callable
    pub fn is_callable(&self) -> bool {
        if let Value::Object(obj) = self {
            matches!(obj.borrow().kind, ObjectKind::NativeFunction { .. })
        } else {
            false
        }
    }

    /// Get the typeof string
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // Historical quirk
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Deferred(_) => "object",
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::NativeFunction { .. } => "function",
                _ => "object",
            },
        }
    }

    /// Strict equality (===)
    ///
    /// Objects and deferreds compare by reference identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() || b.is_nan() {
                    false
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Deferred(a), Value::Deferred(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Create a new ordinary object value
    pub fn new_object() -> Value {
        Value::Object(Rc::new(RefCell::new(Object::new())))
    }

    /// Create a new callable native-function value
    pub fn native_function(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Value {
        Value::Object(Rc::new(RefCell::new(Object {
            kind: ObjectKind::NativeFunction {
                name: name.into(),
                func: Rc::new(func),
            },
            properties: HashMap::default(),
            getters: HashMap::default(),
        })))
    }

    /// Create a new error value with `name`/`message` properties
    pub fn new_error(name: &str, message: &str) -> Value {
        let mut properties = HashMap::default();
        properties.insert("name".to_string(), Value::String(name.to_string()));
        properties.insert("message".to_string(), Value::String(message.to_string()));
        Value::Object(Rc::new(RefCell::new(Object {
            kind: ObjectKind::Error {
                name: name.to_string(),
                message: message.to_string(),
            },
            properties,
            getters: HashMap::default(),
        })))
    }

    /// Get a property from an object
    ///
    /// Getter properties are invoked and may throw; plain data reads cannot.
    /// Each call performs at most one read of the named member.
    pub fn get_property(&self, key: &str) -> Result<Option<Value>> {
        match self {
            Value::Object(obj_rc) => {
                // Release the borrow before invoking a getter; it may
                // touch the same object.
                let getter = obj_rc.borrow().getters.get(key).cloned();
                if let Some(getter) = getter {
                    return getter(&[]).map(Some);
                }
                Ok(obj_rc.borrow().properties.get(key).cloned())
            }
            _ => Ok(None),
        }
    }

    /// Set a data property on an object
    pub fn set_property(&self, key: &str, value: Value) -> bool {
        match self {
            Value::Object(obj) => {
                obj.borrow_mut().properties.insert(key.to_string(), value);
                true
            }
            _ => false,
        }
    }

    /// Install a getter for a property on an object
    pub fn set_getter(&self, key: &str, func: impl Fn(&[Value]) -> Result<Value> + 'static) -> bool {
        match self {
            Value::Object(obj) => {
                obj.borrow_mut()
                    .getters
                    .insert(key.to_string(), Rc::new(func));
                true
            }
            _ => false,
        }
    }

    /// Invoke the value as a function
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let func = match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::NativeFunction { func, .. } => Some(func.clone()),
                _ => None,
            },
            _ => None,
        };
        match func {
            Some(func) => func(args),
            None => Err(Error::type_error(messages::not_a_function(
                &self.to_string(),
            ))),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Deferred(_) => write!(f, "[Deferred]"),
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Ordinary => write!(f, "{{...}}"),
                ObjectKind::NativeFunction { name, .. } => write!(f, "[Native: {}]", name),
                ObjectKind::Error { name, message } => write!(f, "{}: {}", name, message),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Deferred(_) => write!(f, "[Deferred]"),
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Ordinary => write!(f, "[object Object]"),
                ObjectKind::NativeFunction { name, .. } => write!(f, "[Native: {}]", name),
                ObjectKind::Error { name, message } => write!(f, "{}: {}", name, message),
            },
        }
    }
}

/// A heap object
#[derive(Clone)]
pub struct Object {
    /// Object kind
    pub kind: ObjectKind,
    /// Data properties
    pub properties: HashMap<String, Value>,
    /// Getter properties (property name -> getter function)
    pub getters: HashMap<String, NativeFn>,
}

impl Object {
    /// Create a new ordinary object
    pub fn new() -> Self {
        Self {
            kind: ObjectKind::Ordinary,
            properties: HashMap::default(),
            getters: HashMap::default(),
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

/// Object kind
#[derive(Clone)]
pub enum ObjectKind {
    /// Ordinary object
    Ordinary,
    /// Native function
    NativeFunction { name: String, func: NativeFn },
    /// Error object
    Error { name: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Number(1.0).type_of(), "number");
        assert_eq!(Value::new_object().type_of(), "object");
        let func = Value::native_function("noop", |_| Ok(Value::Undefined));
        assert_eq!(func.type_of(), "function");
    }

    #[test]
    fn test_strict_equals_nan() {
        let nan = Value::Number(f64::NAN);
        assert!(!nan.strict_equals(&nan.clone()));
    }

    #[test]
    fn test_strict_equals_object_identity() {
        let a = Value::new_object();
        let b = Value::new_object();
        assert!(a.strict_equals(&a.clone()));
        assert!(!a.strict_equals(&b));
    }

    #[test]
    fn test_data_property_read() {
        let obj = Value::new_object();
        obj.set_property("answer", Value::Number(42.0));
        let read = obj.get_property("answer").unwrap();
        assert_eq!(read, Some(Value::Number(42.0)));
        assert_eq!(obj.get_property("missing").unwrap(), None);
    }

    #[test]
    fn test_getter_property_invoked_per_read() {
        use std::cell::Cell;

        let obj = Value::new_object();
        let reads = Rc::new(Cell::new(0u32));
        let counter = reads.clone();
        obj.set_getter("then", move |_| {
            counter.set(counter.get() + 1);
            Ok(Value::Number(f64::from(counter.get())))
        });

        assert_eq!(obj.get_property("then").unwrap(), Some(Value::Number(1.0)));
        assert_eq!(obj.get_property("then").unwrap(), Some(Value::Number(2.0)));
        assert_eq!(reads.get(), 2);
    }

    #[test]
    fn test_getter_property_can_throw() {
        let obj = Value::new_object();
        obj.set_getter("then", |_| {
            Err(Error::thrown(Value::String("getter boom".to_string())))
        });
        let err = obj.get_property("then").unwrap_err();
        assert_eq!(err.into_reason(), Value::String("getter boom".to_string()));
    }

    #[test]
    fn test_call_native_function() {
        let double = Value::native_function("double", |args| {
            if let Some(Value::Number(n)) = args.first() {
                Ok(Value::Number(n * 2.0))
            } else {
                Ok(Value::Undefined)
            }
        });
        assert_eq!(double.call(&[Value::Number(21.0)]).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_call_non_callable_is_type_error() {
        let err = Value::Number(1.0).call(&[]).unwrap_err();
        assert!(err.to_string().contains("is not a function"));
    }

    #[test]
    fn test_new_error_properties() {
        let error = Value::new_error("TypeError", "bad value");
        assert_eq!(
            error.get_property("name").unwrap(),
            Some(Value::String("TypeError".to_string()))
        );
        assert_eq!(
            error.get_property("message").unwrap(),
            Some(Value::String("bad value".to_string()))
        );
    }
}
