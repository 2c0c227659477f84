//! Loosely typed values: both the decoder's input and its output.
//!
//! Raw JSON arrives as `Nil | Bool | Number | String | List | Map`. Decoding
//! adds three shapes raw JSON can't express: `Dict` (keys are decoded domain
//! values, not strings), `Instance` (a frozen struct) and `Object` (whatever
//! an opaque constructor built).
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde_json::Number;

use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::path::Path;
use crate::types::Type;

// ------------------------------- Value ----------------------------------- //

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Dict(IndexMap<Key, Value>),
    Instance(Instance),
    Object(Object),
}

pub(crate) static NIL: Value = Value::Nil;

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Struct/interface/dict shape: anything addressable by key.
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Map(_) | Value::Dict(_) | Value::Instance(_))
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().and_then(Number::as_f64)
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Property lookup on any mapping shape. `None` for non-mappings and
    /// missing keys alike.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            Value::Instance(i) => i.get(key),
            Value::Dict(d) => d.get(&Key::Str(key.to_string())),
            _ => None,
        }
    }

    /// Same as `get`, but a missing property reads as nil.
    pub fn prop(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NIL)
    }

    /// Mapping entries with their keys lifted to values (`Map` and `Instance`
    /// keys become strings, `Dict` keys keep their decoded form).
    pub fn entries(&self) -> Option<Vec<(Value, &Value)>> {
        match self {
            Value::Map(m) => Some(m.iter().map(|(k, v)| (Value::String(k.clone()), v)).collect()),
            Value::Instance(i) => Some(
                i.fields().iter().map(|(k, v)| (Value::String(k.clone()), v)).collect(),
            ),
            Value::Dict(d) => Some(d.iter().map(|(k, v)| (k.to_value(), v)).collect()),
            _ => None,
        }
    }

    /// Flatten any mapping shape into string-keyed fields, for merging.
    pub fn to_fields(&self) -> Option<IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m.clone()),
            Value::Instance(i) => Some(i.fields().clone()),
            Value::Dict(d) => Some(d.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()),
            _ => None,
        }
    }

    /// Printable JSON view used in diagnostics. Not an encoder: dict keys are
    /// stringified and opaque objects show only their class.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Nil => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Number(n) => J::Number(n.clone()),
            Value::String(s) => J::String(s.clone()),
            Value::List(xs) => J::Array(xs.iter().map(Value::to_json).collect()),
            Value::Map(m) => J::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Value::Dict(d) => {
                J::Object(d.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect())
            }
            Value::Instance(i) => {
                J::Object(i.fields().iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
            Value::Object(o) => J::String(format!("<{}>", o.ty().display_name())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Instance(a), Value::Instance(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same(b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Nil,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => Value::Number(n),
            J::String(s) => Value::String(s),
            J::Array(xs) => Value::List(xs.into_iter().map(Value::from).collect()),
            J::Object(m) => Value::Map(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        Value::from(v.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become nil.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Nil)
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

impl From<Vec<Value>> for Value {
    fn from(xs: Vec<Value>) -> Self {
        Value::List(xs)
    }
}

impl From<Instance> for Value {
    fn from(i: Instance) -> Self {
        Value::Instance(i)
    }
}

// -------------------------------- Key ------------------------------------ //

/// A decoded dict key. JSON keys are always strings; a domain type may turn
/// them into numbers or booleans.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
}

impl Key {
    pub fn from_value(v: &Value) -> Option<Key> {
        match v {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Key::Int(i)),
                None => n.as_f64().map(|f| Key::Float(OrderedFloat(f))),
            },
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::from(*i),
            Key::Float(f) => Value::from(f.0),
            Key::Str(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(i) => write!(f, "{i}"),
            Key::Float(x) => write!(f, "{}", x.0),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

// ------------------------------ Instance --------------------------------- //

#[derive(Debug)]
struct InstanceData {
    ty: Type,
    fields: IndexMap<String, Value>,
}

/// A constructed struct value. Read-only: there is no way to reach the fields
/// mutably, and cloning shares the same allocation.
#[derive(Clone, Debug)]
pub struct Instance(Arc<InstanceData>);

impl Instance {
    /// Only the struct constructor builds instances.
    pub(crate) fn new(ty: Type, fields: IndexMap<String, Value>) -> Self {
        Instance(Arc::new(InstanceData { ty, fields }))
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.fields.get(field)
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.0.fields
    }

    pub fn len(&self) -> usize {
        self.0.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.fields.is_empty()
    }

    /// Same allocation, not merely equal contents.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_instance_of(&self, ty: &Type) -> bool {
        self.0.ty.ptr_eq(ty)
    }

    /// A new instance with `field` replaced, validated by the struct's
    /// constructor. `self` is unchanged.
    pub fn update(&self, field: &str, value: impl Into<Value>) -> Result<Instance, DecodeError> {
        let mut fields = self.0.fields.clone();
        fields.insert(field.to_string(), value.into());
        let path = Path::root(self.0.ty.display_name());
        let cfg = DecodeConfig::default();
        match crate::construct::construct(&self.0.ty, Value::Map(fields), &path, &cfg)? {
            Value::Instance(i) => Ok(i),
            other => Err(DecodeError::content(
                &path,
                &other,
                "struct constructor returned a non-instance",
            )),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.0.ty.ptr_eq(&other.0.ty) && self.0.fields == other.0.fields)
    }
}

// ------------------------------- Object ---------------------------------- //

/// Product of an opaque constructor. Identity is the allocation.
#[derive(Clone)]
pub struct Object {
    ty: Type,
    data: Arc<dyn Any + Send + Sync>,
}

impl Object {
    pub(crate) fn new(ty: Type, data: Arc<dyn Any + Send + Sync>) -> Self {
        Self { ty, data }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn same(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object(<{}>)", self.ty.display_name())
    }
}
