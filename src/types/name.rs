//! Human-readable type names for paths and messages.
use super::{Kind, Props, Type};

impl Type {
    /// The declared name, or one derived from the shape
    /// (`Struct{x: Number}`, `Array<String>`, `?Number`, ...).
    pub fn display_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => self.shape_name(),
        }
    }

    /// The name derived from the shape alone, ignoring this type's own
    /// declared name (children still print by theirs).
    pub fn shape_name(&self) -> String {
        match self.kind() {
            Kind::Irreducible(_) => "Irreducible".to_string(),
            Kind::Enums(keys) => {
                keys.iter().map(|k| format!("{k:?}")).collect::<Vec<_>>().join(" | ")
            }
            Kind::Maybe(inner) => format!("?{}", inner.display_name()),
            Kind::Subtype { inner, predicate } => {
                format!("{{{} | {}}}", inner.display_name(), predicate.name())
            }
            Kind::Struct { props } => format!("Struct{}", props_name(props)),
            Kind::Interface { props } => props_name(props),
            Kind::List(element) => format!("Array<{}>", element.display_name()),
            Kind::Union { members, .. } => join_names(members, " | "),
            Kind::Tuple(types) => format!("[{}]", join_names(types, ", ")),
            Kind::Dict { domain, codomain } => {
                format!("{{[key: {}]: {}}}", domain.display_name(), codomain.display_name())
            }
            Kind::Intersection(types) => join_names(types, " & "),
            Kind::Opaque(_) => "Opaque".to_string(),
            Kind::Lazy(cell) => cell.get().map_or_else(|| "Lazy".to_string(), Type::display_name),
        }
    }
}

fn props_name(props: &Props) -> String {
    let inner = props
        .iter()
        .map(|(k, t)| format!("{k}: {}", t.display_name()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{inner}}}")
}

fn join_names(types: &[Type], sep: &str) -> String {
    types.iter().map(Type::display_name).collect::<Vec<_>>().join(sep)
}
