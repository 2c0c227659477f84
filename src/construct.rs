//! The validating constructor, `type(value, path)`.
//!
//! Every struct, intersection, leaf and hook decode ends here. Three rules
//! hold for every kind:
//! - an existing instance of a struct comes back as the same allocation;
//! - whatever the decoder skipped (predicates, enum/intersection membership,
//!   leaf validity) is checked here, with the caller's path;
//! - struct instances are built once and never handed out mutably.
//!
//! Custom decode hooks are not consulted: construction never re-decodes.
use indexmap::IndexMap;

use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::path::Path;
use crate::types::{Kind, Type};
use crate::value::{Instance, Key, Object, Value};

pub fn construct(
    ty: &Type,
    value: Value,
    path: &Path,
    cfg: &DecodeConfig,
) -> Result<Value, DecodeError> {
    let strict = cfg.checks();
    match ty.kind() {
        Kind::Irreducible(leaf) => match leaf.ctor() {
            Some(ctor) => ctor(value, path),
            None if strict && !leaf.is(&value) => Err(DecodeError::invalid(path, &value)),
            None => Ok(value),
        },

        Kind::Enums(keys) => {
            if strict && !value.as_str().is_some_and(|s| keys.contains(s)) {
                let reason = format!("expected one of {}", ty.shape_name());
                return Err(DecodeError::content(path, &value, reason));
            }
            Ok(value)
        }

        Kind::Maybe(inner) => {
            if value.is_nil() {
                Ok(Value::Nil)
            } else {
                construct(inner, value, path, cfg)
            }
        }

        Kind::Subtype { inner, predicate } => {
            let out = construct(inner, value, path, cfg)?;
            if strict && !predicate.test(&out) {
                let reason = format!("expected a valid {}", ty.display_name());
                return Err(DecodeError::content(path, &out, reason));
            }
            Ok(out)
        }

        Kind::Struct { props } => {
            if let Value::Instance(i) = &value {
                if i.is_instance_of(ty) {
                    return Ok(value);
                }
            }
            if strict && !value.is_mapping() {
                return Err(DecodeError::shape(path, &value, "an object"));
            }
            let fields = construct_props(props, &value, path, cfg)?;
            Ok(Value::Instance(Instance::new(ty.clone(), fields)))
        }

        Kind::Interface { props } => {
            if strict && !value.is_mapping() {
                return Err(DecodeError::shape(path, &value, "an object"));
            }
            Ok(Value::Map(construct_props(props, &value, path, cfg)?))
        }

        Kind::List(element) => {
            let xs = match value {
                Value::List(xs) => xs,
                other if strict => return Err(DecodeError::shape(path, &other, "an array")),
                _ => Vec::new(),
            };
            let name = element.display_name();
            xs.into_iter()
                .enumerate()
                .map(|(i, x)| construct(element, x, &path.extend(format!("{i}: {name}")), cfg))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }

        Kind::Union { dispatch, .. } => match dispatch.select(&value) {
            Some(member) => construct(&member, value, path, cfg),
            None => Err(DecodeError::union_dispatch(path, &value, ty.display_name())),
        },

        Kind::Tuple(types) => {
            let xs = match value {
                Value::List(xs) => xs,
                other if strict => return Err(DecodeError::shape(path, &other, "an array")),
                _ => Vec::new(),
            };
            if strict && xs.len() != types.len() {
                let (expected, actual) = (types.len(), xs.len());
                return Err(DecodeError::tuple_length(path, &Value::List(xs), expected, actual));
            }
            let mut xs = xs.into_iter();
            types
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let x = xs.next().unwrap_or_default();
                    construct(t, x, &path.extend(format!("{i}: {}", t.display_name())), cfg)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }

        Kind::Dict { domain, codomain } => {
            let entries = match value.entries() {
                Some(es) => es,
                None if strict => return Err(DecodeError::shape(path, &value, "an object")),
                None => Vec::new(),
            };
            let domain_path = path.extend(domain.display_name());
            let codomain_name = codomain.display_name();
            let mut out = IndexMap::with_capacity(entries.len());
            for (k, v) in entries {
                let seg = path.extend(format!("{}: {codomain_name}", key_label(&k)));
                let key = construct_key(domain, k, &domain_path, cfg)?;
                out.insert(key, construct(codomain, v.clone(), &seg, cfg)?);
            }
            Ok(Value::Dict(out))
        }

        Kind::Intersection(types) => {
            if strict && !types.iter().all(|t| t.is(&value)) {
                let reason = format!("expected a valid {}", ty.display_name());
                return Err(DecodeError::content(path, &value, reason));
            }
            Ok(value)
        }

        Kind::Opaque(class) => match value {
            Value::Object(o) if o.ty().ptr_eq(ty) => Ok(Value::Object(o)),
            other => Ok(Value::Object(Object::new(ty.clone(), class.instantiate(other)))),
        },

        Kind::Lazy(_) => match ty.resolve() {
            Some(target) => construct(target, value, path, cfg),
            None => {
                let reason = "unresolved lazy reference";
                Err(DecodeError::type_argument(path, ty.display_name(), reason))
            }
        },
    }
}

fn construct_props(
    props: &crate::types::Props,
    value: &Value,
    path: &Path,
    cfg: &DecodeConfig,
) -> Result<IndexMap<String, Value>, DecodeError> {
    let mut fields = IndexMap::with_capacity(props.len());
    for (k, t) in props {
        let seg = path.extend(format!("{k}: {}", t.display_name()));
        fields.insert(k.clone(), construct(t, value.prop(k).clone(), &seg, cfg)?);
    }
    Ok(fields)
}

/// Run a raw key through the domain's constructor and turn the result back
/// into a key.
pub(crate) fn construct_key(
    domain: &Type,
    raw: Value,
    path: &Path,
    cfg: &DecodeConfig,
) -> Result<Key, DecodeError> {
    let out = construct(domain, raw, path, cfg)?;
    Key::from_value(&out)
        .ok_or_else(|| DecodeError::content(path, &out, "not usable as a dict key"))
}

/// Keys print bare in paths (`1: String`, not `"1": String`).
pub(crate) fn key_label(k: &Value) -> String {
    match Key::from_value(k) {
        Some(key) => key.to_string(),
        None => k.to_string(),
    }
}
