//! Recursive structural decoder.
//!
//! `decode(value, type)` walks the value and the descriptor together:
//! 1. a custom hook, if the type has one, replaces the whole rule;
//! 2. opaque classes are identity-or-wrap;
//! 3. otherwise one strategy per kind: shape check, recurse into children
//!    with an extended path, then merge or construct.
//!
//! The first failure wins; nothing is accumulated or retried.
use indexmap::IndexMap;

use crate::config::DecodeConfig;
use crate::construct::{construct, construct_key, key_label};
use crate::error::DecodeError;
use crate::path::Path;
use crate::types::{Kind, Props, Type};
use crate::value::{NIL, Value};

/// Decode with the default (strict) configuration.
pub fn decode(value: &Value, ty: &Type) -> Result<Value, DecodeError> {
    Decoder::default().decode(value, ty)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Decoder {
    config: DecodeConfig,
}

impl Decoder {
    pub fn new(config: DecodeConfig) -> Self {
        Self { config }
    }

    pub fn strict() -> Self {
        Self::new(DecodeConfig::strict())
    }

    pub fn fast() -> Self {
        Self::new(DecodeConfig::fast())
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Top-level call: the path starts at the type's display name.
    pub fn decode(&self, value: &Value, ty: &Type) -> Result<Value, DecodeError> {
        self.decode_at(value, ty, &Path::root(ty.display_name()))
    }

    /// The validating constructor under this decoder's mode.
    pub fn construct(&self, ty: &Type, value: Value, path: &Path) -> Result<Value, DecodeError> {
        construct(ty, value, path, &self.config)
    }

    pub fn decode_at(&self, value: &Value, ty: &Type, path: &Path) -> Result<Value, DecodeError> {
        tracing::trace!(kind = ty.kind().tag(), path = %path, "decode");

        if let Some(hook) = ty.hook() {
            let out = hook
                .decode_json(value)
                .map_err(|e| DecodeError::content(path, value, e.to_string()))?;
            return self.construct(ty, out, path);
        }

        let strict = self.config.checks();
        match ty.kind() {
            // no recursion, no path use
            Kind::Opaque(_) => self.construct(ty, value.clone(), path),

            Kind::Maybe(inner) => {
                if value.is_nil() {
                    Ok(Value::Nil)
                } else {
                    self.decode_at(value, inner, path)
                }
            }

            Kind::Subtype { inner, predicate } => {
                let out = self.decode_at(value, inner, path)?;
                if strict && !predicate.test(&out) {
                    let reason = format!("expected a valid {}", ty.display_name());
                    return Err(DecodeError::content(path, value, reason));
                }
                Ok(out)
            }

            Kind::Struct { props } => {
                if let Value::Instance(i) = value {
                    if i.is_instance_of(ty) {
                        return self.construct(ty, value.clone(), path);
                    }
                }
                if strict && !value.is_mapping() {
                    return Err(DecodeError::shape(path, value, expected("an object", ty)));
                }
                let fields = self.decode_props(props, value, path)?;
                self.construct(ty, Value::Map(fields), path)
            }

            Kind::Interface { props } => {
                if strict && !value.is_mapping() {
                    return Err(DecodeError::shape(path, value, expected("an object", ty)));
                }
                Ok(Value::Map(self.decode_props(props, value, path)?))
            }

            Kind::List(element) => {
                if strict && value.as_list().is_none() {
                    return Err(DecodeError::shape(path, value, expected("an array", ty)));
                }
                let name = element.display_name();
                value
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .enumerate()
                    .map(|(i, x)| self.decode_at(x, element, &path.extend(format!("{i}: {name}"))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }

            Kind::Union { dispatch, .. } => {
                let member = dispatch
                    .select(value)
                    .ok_or_else(|| DecodeError::union_dispatch(path, value, ty.display_name()))?;
                tracing::trace!(
                    union = %ty.display_name(),
                    member = %member.display_name(),
                    "dispatch"
                );
                self.decode_at(value, &member, path)
            }

            Kind::Tuple(types) => {
                if strict {
                    let Some(xs) = value.as_list() else {
                        return Err(DecodeError::shape(path, value, expected("an array", ty)));
                    };
                    if xs.len() != types.len() {
                        return Err(DecodeError::tuple_length(path, value, types.len(), xs.len()));
                    }
                }
                let xs = value.as_list().unwrap_or_default();
                types
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        let x = xs.get(i).unwrap_or(&NIL);
                        self.decode_at(x, t, &path.extend(format!("{i}: {}", t.display_name())))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }

            Kind::Dict { domain, codomain } => {
                let entries = match value.entries() {
                    Some(es) => es,
                    None if strict => {
                        return Err(DecodeError::shape(path, value, expected("an object", ty)));
                    }
                    None => Vec::new(),
                };
                let domain_path = path.extend(domain.display_name());
                let codomain_name = codomain.display_name();
                let mut out = IndexMap::with_capacity(entries.len());
                for (k, v) in entries {
                    let seg = path.extend(format!("{}: {codomain_name}", key_label(&k)));
                    let key = construct_key(domain, k, &domain_path, &self.config)?;
                    out.insert(key, self.decode_at(v, codomain, &seg)?);
                }
                Ok(Value::Dict(out))
            }

            Kind::Intersection(types) => {
                let decoded = types
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        self.decode_at(value, t, &path.extend(format!("{i}: {}", t.display_name())))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                // an empty intersection has nothing to merge
                if !decoded.is_empty() && decoded.iter().all(Value::is_mapping) {
                    let mut merged = IndexMap::new();
                    for fields in decoded.iter().filter_map(Value::to_fields) {
                        merged.extend(fields);
                    }
                    self.construct(ty, Value::Map(merged), path)
                } else {
                    self.construct(ty, value.clone(), path)
                }
            }

            Kind::Enums(_) | Kind::Irreducible(_) => self.construct(ty, value.clone(), path),

            Kind::Lazy(_) => match ty.resolve() {
                Some(target) => self.decode_at(value, target, path),
                None => {
                    let reason = "unresolved lazy reference";
                    Err(DecodeError::type_argument(path, ty.display_name(), reason))
                }
            },
        }
    }

    fn decode_props(
        &self,
        props: &Props,
        value: &Value,
        path: &Path,
    ) -> Result<IndexMap<String, Value>, DecodeError> {
        let mut fields = IndexMap::with_capacity(props.len());
        for (k, t) in props {
            let seg = path.extend(format!("{k}: {}", t.display_name()));
            fields.insert(k.clone(), self.decode_at(value.prop(k), t, &seg)?);
        }
        Ok(fields)
    }
}

/// Shape-error expectation, e.g. `an object for type Point`.
fn expected(what: &str, ty: &Type) -> String {
    format!("{what} for type {}", ty.display_name())
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::types::builtin::{integer, number, string};
    use crate::types::{Dispatch, HookError, Leaf};
    use crate::value::Key;

    fn v(j: serde_json::Value) -> Value {
        Value::from(j)
    }

    fn point() -> Type {
        Type::structure([("x", number()), ("y", number())]).named("Point")
    }

    fn positive() -> Type {
        Type::refinement(number(), "positive", |v| v.as_f64().is_some_and(|n| n > 0.0))
    }

    /// Accepts positive integers and numeric strings (JSON object keys).
    fn positive_int() -> Type {
        let is = |v: &Value| v.as_number().and_then(|n| n.as_i64()).is_some_and(|n| n > 0);
        let leaf = Leaf::new(is).with_ctor(|v, path| {
            let n = match &v {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            match n {
                Some(n) if n > 0 => Ok(Value::from(n)),
                _ => Err(DecodeError::invalid(path, &v)),
            }
        });
        Type::leaf("PositiveInt", leaf)
    }

    fn tree() -> Type {
        let cell = Type::lazy("Tree");
        let tree = Type::structure([("value", number()), ("children", Type::list(cell.clone()))])
            .named("Tree");
        cell.define(tree.clone()).unwrap();
        tree
    }

    #[test]
    fn point_decodes_to_frozen_instance_and_back_to_itself() {
        let p = point();
        let out = decode(&v(json!({"x": 0, "y": 0})), &p).unwrap();
        let inst = out.as_instance().expect("instance");
        assert!(inst.is_instance_of(&p));
        assert_eq!(inst.get("x"), Some(&Value::from(0)));
        assert_eq!(inst.get("y"), Some(&Value::from(0)));

        let again = decode(&out, &p).unwrap();
        assert!(again.as_instance().unwrap().ptr_eq(inst));
    }

    #[test]
    fn first_missing_property_in_declaration_order() {
        let err = decode(&v(json!({})), &point()).unwrap_err();
        assert_eq!(err.path().segments(), vec!["Point", "x: Number"]);

        let err = decode(&v(json!({"x": 1})), &point()).unwrap_err();
        assert_eq!(err.path().segments(), vec!["Point", "y: Number"]);
        assert_eq!(err.kind(), ErrorKind::InvalidValueContent);
        assert_eq!(err.to_string(), "Invalid value null supplied to Point/y: Number");
    }

    #[test]
    fn shape_is_checked_before_properties() {
        let err = decode(&Value::from(1), &point()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValueShape);
        assert_eq!(err.path().segments(), vec!["Point"]);
        assert_eq!(
            err.to_string(),
            "Invalid value 1 supplied to Point (expected an object for type Point)"
        );
    }

    #[test]
    fn list_keeps_order_and_length() {
        let out = decode(&v(json!([1, 2, 3])), &Type::list(number())).unwrap();
        assert_eq!(out, v(json!([1, 2, 3])));

        let err = decode(&v(json!([1, "two", 3])), &Type::list(number())).unwrap_err();
        assert_eq!(err.path().to_string(), "Array<Number>/1: Number");

        let err = decode(&v(json!({"0": 1})), &Type::list(number())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValueShape);
    }

    #[test]
    fn tuple_arity_beats_element_checks() {
        let pair = Type::tuple(vec![number(), number()]);
        let err = decode(&v(json!([1, 2, 3])), &pair).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TupleLengthMismatch);
        let err = decode(&v(json!(["a"])), &pair).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TupleLengthMismatch);

        let err = decode(&v(json!([1, "x"])), &pair).unwrap_err();
        assert_eq!(err.path().to_string(), "[Number, Number]/1: Number");
        assert_eq!(decode(&v(json!([1, 2])), &pair).unwrap(), v(json!([1, 2])));
    }

    #[test]
    fn maybe_stops_at_nil() {
        let t = Type::maybe(number());
        assert_eq!(decode(&Value::Nil, &t).unwrap(), Value::Nil);
        assert_eq!(decode(&Value::from(5), &t).unwrap(), Value::from(5));
        assert!(decode(&Value::from("5"), &t).is_err());
    }

    #[test]
    fn subtype_checks_predicate_on_decoded_value() {
        let positive = positive().named("Positive");
        assert_eq!(decode(&Value::from(2), &positive).unwrap(), Value::from(2));
        let err = decode(&Value::from(-2), &positive).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValueContent);
        assert_eq!(
            err.to_string(),
            "Invalid value -2 supplied to Positive (expected a valid Positive)"
        );
    }

    #[test]
    fn union_dispatch_is_deterministic() {
        let t = Type::union(vec![number(), string()]);
        let raw = Value::from("a");
        let Kind::Union { dispatch, .. } = t.kind() else { unreachable!() };
        let first = dispatch.select(&raw).unwrap();
        let second = dispatch.select(&raw).unwrap();
        assert!(first.ptr_eq(&second) && first.ptr_eq(&string()));
        assert_eq!(decode(&raw, &t).unwrap(), raw);

        let err = decode(&Value::Bool(true), &t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousUnionDispatch);
        assert!(err.to_string().contains("no type returned by dispatch of union Number | String"));
    }

    #[test]
    fn union_dispatch_by_discriminator_keeps_the_path() {
        let circle = Type::structure([("type", string()), ("r", number())]).named("Circle");
        let square = Type::structure([("type", string()), ("side", number())]).named("Square");
        let cases: IndexMap<String, Type> = [
            ("circle".to_string(), circle.clone()),
            ("square".to_string(), square.clone()),
        ]
        .into_iter()
        .collect();
        let dispatch = Dispatch::by_field("type", cases);
        let shape = Type::union_with(vec![circle.clone(), square], dispatch).named("Shape");

        let out = decode(&v(json!({"type": "circle", "r": 2})), &shape).unwrap();
        assert!(out.as_instance().unwrap().is_instance_of(&circle));

        let err = decode(&v(json!({"type": "square", "side": "big"})), &shape).unwrap_err();
        assert_eq!(err.path().to_string(), "Shape/side: Number");

        let err = decode(&v(json!({"type": "blob"})), &shape).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousUnionDispatch);
    }

    #[test]
    fn dict_keys_are_decoded_by_the_domain() {
        let t = Type::dict(positive_int(), string());
        let out = decode(&v(json!({"1": "a"})), &t).unwrap();
        let Value::Dict(d) = out else {
            panic!("expected a dict")
        };
        assert_eq!(d.len(), 1);
        assert_eq!(d.get(&Key::Int(1)), Some(&Value::from("a")));
        assert!(d.get(&Key::from("1")).is_none());

        let err = decode(&v(json!({"-3": "a"})), &t).unwrap_err();
        assert_eq!(err.path().to_string(), "{[key: PositiveInt]: String}/PositiveInt");

        let err = decode(&v(json!({"2": 7})), &t).unwrap_err();
        assert_eq!(err.path().to_string(), "{[key: PositiveInt]: String}/2: String");

        let err = decode(&v(json!([["1", "a"]])), &t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValueShape);
    }

    #[test]
    fn intersection_of_disjoint_structs_merges_fields() {
        let named = Type::structure([("name", string())]).named("Named");
        let aged = Type::structure([("age", integer())]).named("Aged");
        let person = Type::intersection(vec![named, aged]).named("Person");
        let out = decode(&v(json!({"name": "Ada", "age": 36, "extra": true})), &person).unwrap();
        assert_eq!(out, v(json!({"name": "Ada", "age": 36})));

        let err = decode(&v(json!({"name": "Ada"})), &person).unwrap_err();
        assert_eq!(err.path().to_string(), "Person/1: Aged/age: Integer");
    }

    #[test]
    fn intersection_of_leaves_returns_the_raw_value() {
        let even =
            Type::refinement(integer(), "even", |v| v.as_f64().is_some_and(|n| n % 2.0 == 0.0));
        let t = Type::intersection(vec![positive(), even]);
        assert_eq!(decode(&Value::from(4), &t).unwrap(), Value::from(4));
        let err = decode(&Value::from(3), &t).unwrap_err();
        assert_eq!(
            err.path().segments(),
            vec!["{Number | positive} & {Integer | even}", "1: {Integer | even}"]
        );
    }

    #[test]
    fn empty_intersection_passes_the_value_through() {
        let t = Type::intersection(vec![]);
        assert_eq!(decode(&Value::from(5), &t).unwrap(), Value::from(5));
        assert_eq!(decode(&v(json!({"a": 1})), &t).unwrap(), v(json!({"a": 1})));
        assert_eq!(Decoder::fast().decode(&Value::from("s"), &t).unwrap(), Value::from("s"));
    }

    #[test]
    fn interface_yields_a_plain_mapping() {
        let t = Type::interface([("a", string()), ("b", Type::maybe(number()))]);
        let out = decode(&v(json!({"a": "x", "c": 1})), &t).unwrap();
        assert_eq!(out, v(json!({"a": "x", "b": null})));
        assert!(out.as_instance().is_none());

        let err = decode(&Value::from(1), &t).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValueShape);
        assert_eq!(err.path().segments(), vec!["{a: String, b: ?Number}"]);
    }

    #[test]
    fn recursive_types_through_lazy_cells() {
        let t = tree();
        let raw = v(json!({
            "value": 1,
            "children": [
                {"value": 2, "children": []},
                {"value": 3, "children": [{"value": 4, "children": []}]}
            ]
        }));
        let out = decode(&raw, &t).unwrap();
        let root = out.as_instance().unwrap();
        let kids = root.get("children").and_then(Value::as_list).unwrap();
        assert_eq!(kids.len(), 2);
        assert!(kids[1].as_instance().unwrap().is_instance_of(&t));

        let bad = v(json!({"value": 1, "children": [{"value": "two", "children": []}]}));
        let err = decode(&bad, &t).unwrap_err();
        assert_eq!(err.path().to_string(), "Tree/children: Array<Tree>/0: Tree/value: Number");
    }

    #[test]
    fn unfilled_lazy_is_a_type_argument_error_in_both_modes() {
        let pending = Type::lazy("Pending");
        let t = Type::list(pending);
        for decoder in [Decoder::strict(), Decoder::fast()] {
            let err = decoder.decode(&v(json!([1])), &t).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTypeArgument);
            assert_eq!(err.path().to_string(), "Array<Pending>/0: Pending");
        }
    }

    #[test]
    fn custom_hook_output_goes_through_the_constructor() {
        let parse = |v: &Value| -> Result<Value, HookError> {
            let s = v.as_str().ok_or("expected a string like \"21C\"")?;
            let n: f64 = s.trim_end_matches('C').parse()?;
            Ok(Value::from(json!({"degrees": n})))
        };
        let celsius = Type::structure([("degrees", number())]).named("Celsius").with_hook(parse);
        let out = decode(&Value::from("21C"), &celsius).unwrap();
        let inst = out.as_instance().unwrap();
        assert!(inst.is_instance_of(&celsius));
        assert_eq!(inst.get("degrees").and_then(Value::as_f64), Some(21.0));

        let err = decode(&Value::from(21), &celsius).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValueContent);
        assert!(err.to_string().contains("expected a string"));
    }

    #[test]
    fn opaque_is_identity_or_wrap() {
        let tag = Type::opaque("Tag", |v| Arc::new(v.as_str().unwrap_or_default().to_uppercase()));
        let out = decode(&Value::from("abc"), &tag).unwrap();
        let obj = out.as_object().unwrap();
        assert_eq!(obj.downcast_ref::<String>().map(String::as_str), Some("ABC"));

        let again = decode(&out, &tag).unwrap();
        assert!(again.as_object().unwrap().same(obj));
    }

    #[test]
    fn fast_mode_skips_shape_and_predicate_checks_but_still_constructs() {
        let fast = Decoder::fast();
        let out = fast.decode(&Value::from(1), &point()).unwrap();
        let inst = out.as_instance().unwrap();
        assert_eq!(inst.get("x"), Some(&Value::Nil));

        let pair = Type::tuple(vec![number(), number()]);
        assert_eq!(fast.decode(&v(json!([1, 2, 3])), &pair).unwrap(), v(json!([1, 2])));

        assert_eq!(fast.decode(&Value::from(-1), &positive()).unwrap(), Value::from(-1));

        let out = fast.decode(&Value::from("x"), &Type::list(number())).unwrap();
        assert_eq!(out, Value::List(vec![]));

        // leaf constructors are the leaf's own definition
        let keyed = Type::dict(positive_int(), string());
        let err = fast.decode(&v(json!({"0": "a"})), &keyed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValueContent);

        let iface = Type::interface([("a", string()), ("b", number())]);
        assert_eq!(fast.decode(&Value::from(1), &iface).unwrap(), v(json!({"a": null, "b": null})));

        let out = fast.decode(&v(json!([1, 2])), &Type::dict(string(), number())).unwrap();
        assert_eq!(out, Value::Dict(IndexMap::new()));

        let either = Type::union(vec![number(), string()]);
        let err = fast.decode(&Value::Bool(true), &either).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousUnionDispatch);
    }

    #[test]
    fn explicit_paths_are_extended_not_replaced() {
        let base = Path::root("Order").extend("lines: Array<Point>").extend("3: Point");
        let err = Decoder::default().decode_at(&v(json!({"x": 1})), &point(), &base).unwrap_err();
        assert_eq!(err.path().to_string(), "Order/lines: Array<Point>/3: Point/y: Number");
    }

    proptest! {
        #[test]
        fn list_decode_is_elementwise(xs in proptest::collection::vec(any::<i64>(), 0..32)) {
            let raw = Value::List(xs.iter().map(|&x| Value::from(x)).collect());
            let out = decode(&raw, &Type::list(number())).unwrap();
            let items = out.as_list().unwrap();
            prop_assert_eq!(items.len(), xs.len());
            let root = Path::root("Array<Number>");
            for (i, (item, x)) in items.iter().zip(raw.as_list().unwrap()).enumerate() {
                let at = root.extend(format!("{i}: Number"));
                let one = Decoder::default().decode_at(x, &number(), &at).unwrap();
                prop_assert_eq!(item, &one);
            }
        }
    }
}
