//! Membership: does a value already inhabit a type?
//!
//! Used by the default union dispatch and by the constructor's intersection
//! check. Structs accept their own instances and also any mapping whose
//! declared properties inhabit their types, so raw JSON can be dispatched
//! and merged intersection results can be checked.
use super::{Kind, Props, Type};
use crate::value::Value;

impl Type {
    pub fn is(&self, v: &Value) -> bool {
        match self.kind() {
            Kind::Irreducible(leaf) => leaf.is(v),
            Kind::Enums(keys) => v.as_str().is_some_and(|s| keys.contains(s)),
            Kind::Maybe(inner) => v.is_nil() || inner.is(v),
            Kind::Subtype { inner, predicate } => inner.is(v) && predicate.test(v),
            Kind::Struct { props } => match v {
                Value::Instance(i) if i.is_instance_of(self) => true,
                _ => props_match(props, v),
            },
            Kind::Interface { props } => props_match(props, v),
            Kind::List(element) => v.as_list().is_some_and(|xs| xs.iter().all(|x| element.is(x))),
            Kind::Union { members, .. } => members.iter().any(|m| m.is(v)),
            Kind::Tuple(types) => v.as_list().is_some_and(|xs| {
                xs.len() == types.len() && xs.iter().zip(types).all(|(x, t)| t.is(x))
            }),
            Kind::Dict { domain, codomain } => v
                .entries()
                .is_some_and(|es| es.iter().all(|(k, x)| domain.is(k) && codomain.is(x))),
            Kind::Intersection(types) => types.iter().all(|t| t.is(v)),
            Kind::Opaque(_) => v.as_object().is_some_and(|o| o.ty().ptr_eq(self)),
            Kind::Lazy(_) => self.resolve().is_some_and(|t| t.is(v)),
        }
    }
}

fn props_match(props: &Props, v: &Value) -> bool {
    v.is_mapping() && props.iter().all(|(k, t)| t.is(v.prop(k)))
}
