// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script value representation shared by modules, host bindings and realms.
//!
//! Values are thread-safe handles so that compiled programs and module
//! records can be shared between workers, while every worker still builds
//! its own objects inside its own [`Realm`](crate::Realm).

use crate::error::Exception;
use crate::realm::Realm;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A script value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object handle
    Object(JsObject),
    /// Function handle
    Function(JsFunction),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            // NaN never equals itself
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Value {
    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value is nullish (null or undefined).
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Converts the value to a boolean (ToBoolean).
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Returns the object handle if this value is an object.
    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the function handle if this value is callable.
    pub fn as_function(&self) -> Option<&JsFunction> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Returns the string contents if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Reads a property, yielding undefined for non-objects and missing keys.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(object) => object.get(key),
            _ => Value::Undefined,
        }
    }

    /// Own enumerable keys; empty for anything that is not an object.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Object(object) => object.keys(),
            _ => Vec::new(),
        }
    }

    /// Projects a JSON document into a fresh value graph.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                let object = JsObject::new();
                for (index, item) in items.iter().enumerate() {
                    object.set(index.to_string(), Value::from_json(item));
                }
                object.set("length", Value::Number(items.len() as f64));
                Value::Object(object)
            }
            serde_json::Value::Object(map) => Value::Object(JsObject::from_entries(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }

    /// Converts the value into JSON. Functions become null and integral
    /// numbers are emitted as integers.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_inner(&mut Vec::new())
    }

    fn to_json_inner(&self, seen: &mut Vec<JsObject>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(object) => {
                if seen.iter().any(|o| o.ptr_eq(object)) {
                    return serde_json::Value::Null;
                }
                seen.push(object.clone());
                let mut map = serde_json::Map::new();
                for key in object.keys() {
                    map.insert(key.clone(), object.get(&key).to_json_inner(seen));
                }
                seen.pop();
                serde_json::Value::Object(map)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(function) => write!(f, "[Function: {}]", function.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<JsObject> for Value {
    fn from(object: JsObject) -> Self {
        Value::Object(object)
    }
}

impl From<JsFunction> for Value {
    fn from(function: JsFunction) -> Self {
        Value::Function(function)
    }
}

#[derive(Default)]
struct PropertyMap {
    values: FxHashMap<String, Value>,
    /// Insertion order of the keys in `values`
    order: Vec<String>,
}

/// A shared, mutable object with insertion-ordered own properties.
///
/// Equality is identity: two handles are equal only when they point at the
/// same object.
#[derive(Clone, Default)]
pub struct JsObject {
    inner: Arc<RwLock<PropertyMap>>,
}

impl JsObject {
    /// Creates a new empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an object populated from key/value pairs, in order.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let object = Self::new();
        for (key, value) in entries {
            object.set(key, value);
        }
        object
    }

    /// Gets a property value, or undefined when absent.
    pub fn get(&self, key: &str) -> Value {
        self.get_own(key).unwrap_or_default()
    }

    /// Gets an own property if present.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        self.inner.read().values.get(key).cloned()
    }

    /// Sets a property value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let mut props = self.inner.write();
        if props.values.insert(key.clone(), value.into()).is_none() {
            props.order.push(key);
        }
    }

    /// Deletes a property, returning whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut props = self.inner.write();
        if props.values.remove(key).is_some() {
            props.order.retain(|k| k != key);
            return true;
        }
        false
    }

    /// Checks if an own property exists.
    pub fn has(&self, key: &str) -> bool {
        self.inner.read().values.contains_key(key)
    }

    /// Own keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Number of own properties.
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Whether the object has no own properties.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &JsObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys only: objects may be cyclic
        f.debug_struct("JsObject").field("keys", &self.keys()).finish()
    }
}

type NativeFn = dyn Fn(&mut Realm, &[Value]) -> Result<Value, Exception> + Send + Sync;

struct NativeFunction {
    name: String,
    func: Box<NativeFn>,
}

/// A callable implemented in Rust.
#[derive(Clone)]
pub struct JsFunction {
    inner: Arc<NativeFunction>,
}

impl JsFunction {
    /// Wraps a closure as a script function.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Realm, &[Value]) -> Result<Value, Exception> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(NativeFunction {
                name: name.into(),
                func: Box::new(func),
            }),
        }
    }

    /// The function name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Calls the function in the given realm.
    pub fn call(&self, realm: &mut Realm, args: &[Value]) -> Result<Value, Exception> {
        (self.inner.func)(realm, args)
    }

    /// Whether both handles refer to the same function.
    pub fn ptr_eq(&self, other: &JsFunction) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_identity_equality() {
        let a = JsObject::new();
        let b = JsObject::new();
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let object = JsObject::new();
        object.set("b", 1);
        object.set("a", 2);
        object.set("b", 3);
        assert_eq!(object.keys(), vec!["b", "a"]);
        assert!(object.delete("b"));
        assert_eq!(object.keys(), vec!["a"]);
    }

    #[test]
    fn test_json_projection() {
        let value = Value::from_json(&json!({"name": "spacey", "tags": ["a"], "n": 1.5}));
        assert_eq!(value.get("name"), Value::from("spacey"));
        assert_eq!(value.get("tags").get("length"), Value::Number(1.0));
        assert_eq!(value.to_json(), json!({"name": "spacey", "tags": {"0": "a", "length": 1}, "n": 1.5}));
    }

    #[test]
    fn test_to_json_breaks_cycles() {
        let object = JsObject::new();
        object.set("self", object.clone());
        assert_eq!(Value::Object(object).to_json(), json!({"self": null}));
    }

    #[test]
    fn test_to_boolean() {
        assert!(!Value::Undefined.to_boolean());
        assert!(!Value::Number(0.0).to_boolean());
        assert!(Value::from("x").to_boolean());
        assert!(Value::Object(JsObject::new()).to_boolean());
    }
}
