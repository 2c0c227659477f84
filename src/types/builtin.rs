//! Builtin leaf types, shared process-wide.
use chrono::DateTime;
use once_cell::sync::Lazy;

use super::Type;
use crate::value::Value;

static NIL: Lazy<Type> = Lazy::new(|| Type::irreducible("Nil", Value::is_nil));
static STRING: Lazy<Type> =
    Lazy::new(|| Type::irreducible("String", |v| matches!(v, Value::String(_))));
static NUMBER: Lazy<Type> =
    Lazy::new(|| Type::irreducible("Number", |v| matches!(v, Value::Number(_))));
static INTEGER: Lazy<Type> = Lazy::new(|| Type::irreducible("Integer", is_integer));
static BOOLEAN: Lazy<Type> =
    Lazy::new(|| Type::irreducible("Boolean", |v| matches!(v, Value::Bool(_))));
static ANY: Lazy<Type> = Lazy::new(|| Type::irreducible("Any", |_| true));
static OBJECT: Lazy<Type> = Lazy::new(|| Type::irreducible("Object", Value::is_mapping));
static ARRAY: Lazy<Type> = Lazy::new(|| Type::irreducible("Array", |v| v.as_list().is_some()));
static DATE_TIME: Lazy<Type> = Lazy::new(|| Type::irreducible("DateTime", is_rfc3339));

pub fn nil() -> Type {
    NIL.clone()
}

pub fn string() -> Type {
    STRING.clone()
}

pub fn number() -> Type {
    NUMBER.clone()
}

pub fn integer() -> Type {
    INTEGER.clone()
}

pub fn boolean() -> Type {
    BOOLEAN.clone()
}

pub fn any() -> Type {
    ANY.clone()
}

pub fn object() -> Type {
    OBJECT.clone()
}

pub fn array() -> Type {
    ARRAY.clone()
}

pub fn date_time() -> Type {
    DATE_TIME.clone()
}

pub const NAMES: [&str; 9] = [
    "Nil", "String", "Number", "Integer", "Boolean", "Any", "Object", "Array", "DateTime",
];

/// Builtin by its display name.
pub fn lookup(name: &str) -> Option<Type> {
    let t = match name {
        "Nil" => nil(),
        "String" => string(),
        "Number" => number(),
        "Integer" => integer(),
        "Boolean" => boolean(),
        "Any" => any(),
        "Object" => object(),
        "Array" => array(),
        "DateTime" => date_time(),
        _ => return None,
    };
    Some(t)
}

fn is_integer(v: &Value) -> bool {
    match v.as_number() {
        Some(n) if n.is_i64() || n.is_u64() => true,
        Some(n) => n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0),
        None => false,
    }
}

fn is_rfc3339(v: &Value) -> bool {
    v.as_str().is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_shared_handles() {
        assert!(string().ptr_eq(&string()));
        assert!(lookup("Number").unwrap().ptr_eq(&number()));
        assert!(lookup("Float").is_none());
        for name in NAMES {
            assert_eq!(lookup(name).unwrap().display_name(), name);
        }
    }

    #[test]
    fn leaf_membership() {
        assert!(integer().is(&Value::from(3)));
        assert!(integer().is(&Value::from(3.0)));
        assert!(!integer().is(&Value::from(3.5)));
        assert!(date_time().is(&Value::from("2024-05-01T12:00:00Z")));
        assert!(!date_time().is(&Value::from("yesterday")));
        assert!(any().is(&Value::Nil));
        assert!(!string().is(&Value::Nil));
    }
}
