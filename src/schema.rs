//! Schema documents: named type declarations in JSON, built into `Type`s.
//!
//! ```json
//! {
//!   "root": "Tree",
//!   "types": {
//!     "Tree": { "kind": "struct", "props": {
//!       "value": "Number",
//!       "children": { "kind": "list", "of": "Tree" }
//!     }}
//!   }
//! }
//! ```
//!
//! Every declared name gets a lazy cell before anything is built, so names
//! can reference each other (and themselves) in any order.
use std::path::Path as FsPath;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::path_de;
use crate::types::builtin;
use crate::types::{Dispatch, Predicate, Type};
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// ERRORS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },
    #[error("unknown type `{name}` referenced from `{from}`")]
    UnknownType { name: String, from: String },
    #[error("type `{0}` shadows a builtin")]
    ShadowsBuiltin(String),
    #[error("invalid pattern in `{name}`: {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },
    #[error("dispatch case `{tag}` of `{union}` selects `{case}`, which is not a member")]
    CaseNotMember {
        union: String,
        tag: String,
        case: String,
    },
    #[error("`{0}` is an alias cycle and never reaches a concrete type")]
    AliasCycle(String),
    #[error("root type `{0}` is not declared")]
    UnknownRoot(String),
    #[error("failed to read schema: {0}")]
    Io(#[from] std::io::Error),
}

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDoc {
    #[serde(default)]
    pub root: Option<String>,
    pub types: IndexMap<String, TypeExpr>,
}

/// A type name, or an inline descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeExpr {
    Ref(String),
    Node(Box<TypeNode>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeNode {
    Struct {
        props: IndexMap<String, TypeExpr>,
    },
    Interface {
        props: IndexMap<String, TypeExpr>,
    },
    List {
        of: TypeExpr,
    },
    Maybe {
        of: TypeExpr,
    },
    Tuple {
        items: Vec<TypeExpr>,
    },
    Dict {
        domain: TypeExpr,
        codomain: TypeExpr,
    },
    Union {
        members: Vec<TypeExpr>,
        #[serde(default)]
        dispatch: Option<DispatchRule>,
    },
    Intersection {
        members: Vec<TypeExpr>,
    },
    Enums {
        values: Vec<String>,
    },
    Refinement {
        of: TypeExpr,
        #[serde(default)]
        minimum: Option<f64>,
        #[serde(default)]
        maximum: Option<f64>,
        #[serde(default)]
        min_length: Option<usize>,
        #[serde(default)]
        max_length: Option<usize>,
        #[serde(default)]
        pattern: Option<String>,
    },
}

/// Discriminator-field dispatch for a union: `value[field]` names the case.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchRule {
    pub field: String,
    pub cases: IndexMap<String, TypeExpr>,
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct Registry {
    types: IndexMap<String, Type>,
    root: Option<String>,
}

impl Registry {
    pub fn from_doc(doc: SchemaDoc) -> Result<Self, SchemaError> {
        for name in doc.types.keys() {
            if builtin::lookup(name).is_some() {
                return Err(SchemaError::ShadowsBuiltin(name.clone()));
            }
        }
        if let Some(root) = &doc.root {
            if !doc.types.contains_key(root) {
                return Err(SchemaError::UnknownRoot(root.clone()));
            }
        }

        let cells: IndexMap<String, Type> =
            doc.types.keys().map(|name| (name.clone(), Type::lazy(name.clone()))).collect();
        let builder = Builder { cells: &cells };

        let mut types = IndexMap::with_capacity(doc.types.len());
        for (name, expr) in &doc.types {
            let built = builder.build(expr, name)?.named(name.clone());
            let filled = cells[name].define(built.clone());
            debug_assert!(filled.is_ok(), "cell for `{name}` filled twice");
            types.insert(name.clone(), built);
        }

        for (name, cell) in &cells {
            if cell.resolve().is_none() {
                return Err(SchemaError::AliasCycle(name.clone()));
            }
        }

        tracing::debug!(types = types.len(), root = ?doc.root, "schema registry built");
        Ok(Registry { types, root: doc.root })
    }

    pub fn from_json_str(src: &str) -> Result<Self, SchemaError> {
        Registry::from_doc(path_de::from_str_with_path(src)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        Registry::from_doc(path_de::from_value_with_path(value)?)
    }

    pub fn load(path: impl AsRef<FsPath>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading schema");
        let bytes = std::fs::read(path)?;
        Registry::from_doc(path_de::from_slice_with_path(&bytes)?)
    }

    /// A declared type, falling back to the builtins.
    pub fn get(&self, name: &str) -> Option<Type> {
        self.types.get(name).cloned().or_else(|| builtin::lookup(name))
    }

    pub fn root(&self) -> Option<Type> {
        self.root.as_deref().and_then(|name| self.types.get(name)).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.types.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILD
// ————————————————————————————————————————————————————————————————————————————

struct Builder<'a> {
    cells: &'a IndexMap<String, Type>,
}

impl Builder<'_> {
    /// `from` is the declaration being built, for error messages.
    fn build(&self, expr: &TypeExpr, from: &str) -> Result<Type, SchemaError> {
        match expr {
            TypeExpr::Ref(name) => self.reference(name, from),
            TypeExpr::Node(node) => self.build_node(node, from),
        }
    }

    fn reference(&self, name: &str, from: &str) -> Result<Type, SchemaError> {
        self.cells
            .get(name)
            .cloned()
            .or_else(|| builtin::lookup(name))
            .ok_or_else(|| SchemaError::UnknownType {
                name: name.to_string(),
                from: from.to_string(),
            })
    }

    fn build_all(&self, exprs: &[TypeExpr], from: &str) -> Result<Vec<Type>, SchemaError> {
        exprs.iter().map(|e| self.build(e, from)).collect()
    }

    fn build_props(
        &self,
        props: &IndexMap<String, TypeExpr>,
        from: &str,
    ) -> Result<Vec<(String, Type)>, SchemaError> {
        props.iter().map(|(k, e)| Ok((k.clone(), self.build(e, from)?))).collect()
    }

    fn build_node(&self, node: &TypeNode, from: &str) -> Result<Type, SchemaError> {
        let ty = match node {
            TypeNode::Struct { props } => Type::structure(self.build_props(props, from)?),
            TypeNode::Interface { props } => Type::interface(self.build_props(props, from)?),
            TypeNode::List { of } => Type::list(self.build(of, from)?),
            TypeNode::Maybe { of } => Type::maybe(self.build(of, from)?),
            TypeNode::Tuple { items } => Type::tuple(self.build_all(items, from)?),
            TypeNode::Dict { domain, codomain } => {
                Type::dict(self.build(domain, from)?, self.build(codomain, from)?)
            }
            TypeNode::Union { members, dispatch } => {
                let members = self.build_all(members, from)?;
                match dispatch {
                    None => Type::union(members),
                    Some(rule) => {
                        let cases = rule
                            .cases
                            .iter()
                            .map(|(tag, e)| Ok((tag.clone(), self.build(e, from)?)))
                            .collect::<Result<IndexMap<_, _>, SchemaError>>()?;
                        for (tag, case) in &cases {
                            if !members.iter().any(|m| m.ptr_eq(case)) {
                                return Err(SchemaError::CaseNotMember {
                                    union: from.to_string(),
                                    tag: tag.clone(),
                                    case: case.display_name(),
                                });
                            }
                        }
                        Type::union_with(members, Dispatch::by_field(rule.field.clone(), cases))
                    }
                }
            }
            TypeNode::Intersection { members } => {
                Type::intersection(self.build_all(members, from)?)
            }
            TypeNode::Enums { values } => Type::enums(values.iter().cloned()),
            TypeNode::Refinement { of, minimum, maximum, min_length, max_length, pattern } => {
                let rules = Rules {
                    minimum: *minimum,
                    maximum: *maximum,
                    min_length: *min_length,
                    max_length: *max_length,
                    pattern: pattern
                        .as_deref()
                        .map(Regex::new)
                        .transpose()
                        .map_err(|source| SchemaError::Pattern { name: from.to_string(), source })?,
                };
                Type::subtype(self.build(of, from)?, rules.into_predicate())
            }
        };
        Ok(ty)
    }
}

// ------------------------------- Refinements ------------------------------- //

struct Rules {
    minimum: Option<f64>,
    maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<Regex>,
}

impl Rules {
    fn describe(&self) -> String {
        let parts: Vec<String> = [
            self.minimum.map(|n| format!(">= {n}")),
            self.maximum.map(|n| format!("<= {n}")),
            self.min_length.map(|n| format!("length >= {n}")),
            self.max_length.map(|n| format!("length <= {n}")),
            self.pattern.as_ref().map(|re| format!("/{}/", re.as_str())),
        ]
        .into_iter()
        .flatten()
        .collect();
        if parts.is_empty() {
            "any".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Number bounds apply to numbers, length bounds to strings and lists,
    /// the pattern to strings. A rule that doesn't apply to the value fails.
    fn test(&self, v: &Value) -> bool {
        if self.minimum.is_some() || self.maximum.is_some() {
            let Some(n) = v.as_f64() else {
                return false;
            };
            if !within(n, self.minimum, self.maximum) {
                return false;
            }
        }
        if self.min_length.is_some() || self.max_length.is_some() {
            let len = match v {
                Value::String(s) => s.chars().count(),
                Value::List(xs) => xs.len(),
                _ => return false,
            };
            if !within(len, self.min_length, self.max_length) {
                return false;
            }
        }
        match &self.pattern {
            Some(re) => v.as_str().is_some_and(|s| re.is_match(s)),
            None => true,
        }
    }

    fn into_predicate(self) -> Predicate {
        let name = self.describe();
        Predicate::new(name, move |v| self.test(v))
    }
}

fn within<T: PartialOrd>(x: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|min| x >= min) && max.is_none_or(|max| x <= max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn registry(doc: serde_json::Value) -> Registry {
        Registry::from_json_value(doc).unwrap()
    }

    #[test]
    fn recursive_declarations_decode() {
        let reg = registry(json!({
            "root": "Tree",
            "types": {
                "Tree": {"kind": "struct", "props": {
                    "value": "Number",
                    "children": {"kind": "list", "of": "Tree"}
                }}
            }
        }));
        let tree = reg.root().unwrap();
        assert_eq!(tree.display_name(), "Tree");

        let ok = Value::from(json!({
            "value": 1,
            "children": [{"value": 2, "children": []}]
        }));
        let out = decode(&ok, &tree).unwrap();
        assert!(out.as_instance().unwrap().is_instance_of(&tree));

        let bad = Value::from(json!({
            "value": 1,
            "children": [{"value": "x", "children": []}]
        }));
        let err = decode(&bad, &tree).unwrap_err();
        assert_eq!(err.path().to_string(), "Tree/children: Array<Tree>/0: Tree/value: Number");
    }

    #[test]
    fn references_resolve_to_the_declared_type() {
        let reg = registry(json!({
            "types": {
                "List": {"kind": "struct", "props": {
                    "head": "Number",
                    "tail": {"kind": "maybe", "of": "List"}
                }}
            }
        }));
        let list = reg.get("List").unwrap();
        let crate::types::Kind::Struct { props } = list.kind() else {
            panic!("expected a struct")
        };
        let crate::types::Kind::Maybe(tail) = props["tail"].kind() else {
            panic!("expected a maybe")
        };
        assert!(tail.resolve().unwrap().ptr_eq(&list));
    }

    #[test]
    fn forward_references_and_aliases() {
        let reg = registry(json!({
            "types": {
                "Order": {"kind": "struct", "props": {
                    "id": "Id",
                    "lines": {"kind": "list", "of": "Line"}
                }},
                "Line": {"kind": "tuple", "items": ["String", "Integer"]},
                "Id": "String"
            }
        }));
        assert_eq!(reg.names().collect::<Vec<_>>(), ["Order", "Line", "Id"]);
        assert!(reg.root().is_none());
        assert_eq!(reg.get("Id").unwrap().display_name(), "Id");
        assert!(reg.get("Number").unwrap().ptr_eq(&builtin::number()));

        let order = reg.get("Order").unwrap();
        let v = Value::from(json!({"id": "o-1", "lines": [["apple", 3]]}));
        assert!(decode(&v, &order).is_ok());
        let short = Value::from(json!({"id": "o-1", "lines": [["apple"]]}));
        let err = decode(&short, &order).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TupleLengthMismatch);
    }

    #[test]
    fn refinement_rules() {
        let reg = registry(json!({
            "types": {
                "Port": {
                    "kind": "refinement", "of": "Integer",
                    "minimum": 1, "maximum": 65535
                },
                "Slug": {
                    "kind": "refinement", "of": "String",
                    "min_length": 1, "pattern": "^[a-z-]+$"
                }
            }
        }));
        let port = reg.get("Port").unwrap();
        assert!(decode(&Value::from(8080), &port).is_ok());
        let err = decode(&Value::from(0), &port).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValueContent);
        assert_eq!(err.to_string(), "Invalid value 0 supplied to Port (expected a valid Port)");

        let slug = reg.get("Slug").unwrap();
        assert!(decode(&Value::from("hello-world"), &slug).is_ok());
        assert!(decode(&Value::from("Hello"), &slug).is_err());
        assert!(decode(&Value::from(""), &slug).is_err());
    }

    #[test]
    fn union_dispatch_by_field() {
        let reg = registry(json!({
            "types": {
                "Shape": {
                    "kind": "union",
                    "members": ["Circle", "Square"],
                    "dispatch": {
                        "field": "type",
                        "cases": {"circle": "Circle", "square": "Square"}
                    }
                },
                "Circle": {"kind": "interface", "props": {"type": "String", "r": "Number"}},
                "Square": {"kind": "interface", "props": {"type": "String", "side": "Number"}}
            }
        }));
        let shape = reg.get("Shape").unwrap();
        assert!(decode(&Value::from(json!({"type": "square", "side": 2})), &shape).is_ok());
        let err = decode(&Value::from(json!({"type": "hexagon"})), &shape).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousUnionDispatch);
    }

    #[test]
    fn enums_dicts_and_maybes() {
        let reg = registry(json!({
            "types": {
                "Color": {"kind": "enums", "values": ["red", "green"]},
                "Palette": {
                    "kind": "dict",
                    "domain": "String",
                    "codomain": {"kind": "maybe", "of": "Color"}
                }
            }
        }));
        let palette = reg.get("Palette").unwrap();
        assert!(decode(&Value::from(json!({"bg": "red", "fg": null})), &palette).is_ok());
        let err = decode(&Value::from(json!({"bg": "blue"})), &palette).unwrap_err();
        assert_eq!(err.path().to_string(), "Palette/bg: ?Color");
    }

    #[test]
    fn rejected_documents() {
        let err = Registry::from_json_value(json!({"types": {"A": {"kind": "list", "of": "B"}}}))
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnknownType { ref name, ref from } if name == "B" && from == "A"
        ));

        let err = Registry::from_json_value(json!({"types": {"String": "Number"}})).unwrap_err();
        assert!(matches!(err, SchemaError::ShadowsBuiltin(_)));

        let err = Registry::from_json_value(json!({"root": "Nope", "types": {}})).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownRoot(_)));

        let err = Registry::from_json_value(json!({"types": {"A": "B", "B": "A"}})).unwrap_err();
        assert!(matches!(err, SchemaError::AliasCycle(_)));

        let err = Registry::from_json_value(json!({
            "types": {"A": {"kind": "refinement", "of": "String", "pattern": "("}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Pattern { .. }));

        let err = Registry::from_json_value(json!({
            "types": {
                "Pet": {"kind": "union", "members": ["Cat"],
                        "dispatch": {"field": "type", "cases": {"cat": "Cat", "dog": "Dog"}}},
                "Cat": {"kind": "interface", "props": {"type": "String"}},
                "Dog": {"kind": "interface", "props": {"type": "String"}}
            }
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::CaseNotMember { ref tag, ref union, .. } if tag == "dog" && union == "Pet"
        ));
        assert!(err.to_string().contains("selects `Dog`, which is not a member"));

        let err = Registry::from_json_str(r#"{"types": []}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Parse { ref path, .. } if path == "types"));
    }
}
