//! Type descriptors.
//!
//! A `Type` is an immutable, cheaply cloned handle. Its `Kind` is the closed
//! algebra the decoder matches on; anything else a type can do (a custom
//! decode hook, a display name) hangs off the shared definition.
//!
//! Recursive shapes go through `Type::lazy`: the cell is created first,
//! referenced from inside the shape, and filled with `define` once the
//! shape exists.
pub mod builtin;
pub mod is;
pub mod name;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::OnceCell;

use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::path::Path;
use crate::value::Value;

pub type Props = IndexMap<String, Type>;
pub type IsFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type Ctor = Arc<dyn Fn(Value, &Path) -> Result<Value, DecodeError> + Send + Sync>;
pub type ClassCtor = Arc<dyn Fn(Value) -> Arc<dyn Any + Send + Sync> + Send + Sync>;
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Max lazy-to-lazy hops before a reference counts as unresolvable.
const MAX_LAZY_HOPS: usize = 64;

// ------------------------------- Kinds ----------------------------------- //

#[derive(Clone)]
pub enum Kind {
    Irreducible(Leaf),
    Enums(IndexSet<String>),
    Maybe(Type),
    Subtype { inner: Type, predicate: Predicate },
    Struct { props: Props },
    Interface { props: Props },
    List(Type),
    Union { members: Vec<Type>, dispatch: Dispatch },
    Tuple(Vec<Type>),
    Dict { domain: Type, codomain: Type },
    Intersection(Vec<Type>),
    /// Escape hatch: a constructor outside the algebra.
    Opaque(Class),
    Lazy(Arc<OnceCell<Type>>),
}

impl Kind {
    pub fn tag(&self) -> &'static str {
        match self {
            Kind::Irreducible(_) => "irreducible",
            Kind::Enums(_) => "enums",
            Kind::Maybe(_) => "maybe",
            Kind::Subtype { .. } => "subtype",
            Kind::Struct { .. } => "struct",
            Kind::Interface { .. } => "interface",
            Kind::List(_) => "list",
            Kind::Union { .. } => "union",
            Kind::Tuple(_) => "tuple",
            Kind::Dict { .. } => "dict",
            Kind::Intersection(_) => "intersection",
            Kind::Opaque(_) => "opaque",
            Kind::Lazy(_) => "lazy",
        }
    }
}

/// Leaf behaviour: a membership test, plus optionally a constructor that may
/// transform its input (e.g. parse a numeric dict key). Without a
/// constructor, construction is "check membership, return the value".
#[derive(Clone)]
pub struct Leaf {
    is: IsFn,
    ctor: Option<Ctor>,
}

impl Leaf {
    pub fn new(is: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self { is: Arc::new(is), ctor: None }
    }

    pub fn with_ctor(
        mut self,
        ctor: impl Fn(Value, &Path) -> Result<Value, DecodeError> + Send + Sync + 'static,
    ) -> Self {
        self.ctor = Some(Arc::new(ctor));
        self
    }

    pub fn is(&self, v: &Value) -> bool {
        (self.is)(v)
    }

    pub fn ctor(&self) -> Option<&Ctor> {
        self.ctor.as_ref()
    }
}

#[derive(Clone)]
pub struct Predicate {
    name: String,
    test: IsFn,
}

impl Predicate {
    pub fn new(
        name: impl Into<String>,
        test: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), test: Arc::new(test) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn test(&self, v: &Value) -> bool {
        (self.test)(v)
    }
}

/// Union member selection. Must be a pure function of the value.
#[derive(Clone)]
pub struct Dispatch(Arc<dyn Fn(&Value) -> Option<Type> + Send + Sync>);

impl Dispatch {
    pub fn new(f: impl Fn(&Value) -> Option<Type> + Send + Sync + 'static) -> Self {
        Dispatch(Arc::new(f))
    }

    /// First member that already accepts the value.
    pub fn first_match(members: Vec<Type>) -> Self {
        Dispatch::new(move |v| members.iter().find(|t| t.is(v)).cloned())
    }

    /// Discriminator field: `value[field]` must be a string naming a case.
    pub fn by_field(field: impl Into<String>, cases: IndexMap<String, Type>) -> Self {
        let field = field.into();
        Dispatch::new(move |v| {
            v.get(&field).and_then(Value::as_str).and_then(|tag| cases.get(tag)).cloned()
        })
    }

    pub fn select(&self, v: &Value) -> Option<Type> {
        (self.0)(v)
    }
}

/// Opaque constructor: builds a payload from the raw value.
#[derive(Clone)]
pub struct Class {
    ctor: ClassCtor,
}

impl Class {
    pub fn instantiate(&self, v: Value) -> Arc<dyn Any + Send + Sync> {
        (self.ctor)(v)
    }
}

/// Optional per-type override of the decode rule. Its output still goes
/// through the type's constructor.
pub trait CustomDecodable: Send + Sync {
    fn decode_json(&self, value: &Value) -> Result<Value, HookError>;
}

impl<F> CustomDecodable for F
where
    F: Fn(&Value) -> Result<Value, HookError> + Send + Sync,
{
    fn decode_json(&self, value: &Value) -> Result<Value, HookError> {
        self(value)
    }
}

// -------------------------------- Type ----------------------------------- //

#[derive(Clone)]
struct TypeDef {
    name: Option<String>,
    hook: Option<Arc<dyn CustomDecodable>>,
    kind: Kind,
}

#[derive(Clone)]
pub struct Type(Arc<TypeDef>);

impl Type {
    fn from_kind(kind: Kind) -> Self {
        Type(Arc::new(TypeDef { name: None, hook: None, kind }))
    }

    fn map_def(self, f: impl FnOnce(&mut TypeDef)) -> Self {
        let mut def = Arc::try_unwrap(self.0).unwrap_or_else(|shared| (*shared).clone());
        f(&mut def);
        Type(Arc::new(def))
    }

    // ---- builders ----

    pub fn irreducible(
        name: impl Into<String>,
        is: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Type::leaf(name, Leaf::new(is))
    }

    pub fn leaf(name: impl Into<String>, leaf: Leaf) -> Self {
        Type::from_kind(Kind::Irreducible(leaf)).named(name)
    }

    pub fn enums<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Type::from_kind(Kind::Enums(keys.into_iter().map(Into::into).collect()))
    }

    pub fn maybe(inner: Type) -> Self {
        Type::from_kind(Kind::Maybe(inner))
    }

    pub fn subtype(inner: Type, predicate: Predicate) -> Self {
        Type::from_kind(Kind::Subtype { inner, predicate })
    }

    pub fn refinement(
        inner: Type,
        name: impl Into<String>,
        test: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Type::subtype(inner, Predicate::new(name, test))
    }

    pub fn structure<I, K>(props: I) -> Self
    where
        I: IntoIterator<Item = (K, Type)>,
        K: Into<String>,
    {
        Type::from_kind(Kind::Struct { props: collect_props(props) })
    }

    pub fn interface<I, K>(props: I) -> Self
    where
        I: IntoIterator<Item = (K, Type)>,
        K: Into<String>,
    {
        Type::from_kind(Kind::Interface { props: collect_props(props) })
    }

    pub fn list(element: Type) -> Self {
        Type::from_kind(Kind::List(element))
    }

    /// Union with the default dispatch (first member whose `is` accepts).
    pub fn union(members: Vec<Type>) -> Self {
        let dispatch = Dispatch::first_match(members.clone());
        Type::union_with(members, dispatch)
    }

    pub fn union_with(members: Vec<Type>, dispatch: Dispatch) -> Self {
        Type::from_kind(Kind::Union { members, dispatch })
    }

    pub fn tuple(types: Vec<Type>) -> Self {
        Type::from_kind(Kind::Tuple(types))
    }

    pub fn dict(domain: Type, codomain: Type) -> Self {
        Type::from_kind(Kind::Dict { domain, codomain })
    }

    pub fn intersection(types: Vec<Type>) -> Self {
        Type::from_kind(Kind::Intersection(types))
    }

    pub fn opaque(
        name: impl Into<String>,
        ctor: impl Fn(Value) -> Arc<dyn Any + Send + Sync> + Send + Sync + 'static,
    ) -> Self {
        Type::from_kind(Kind::Opaque(Class { ctor: Arc::new(ctor) })).named(name)
    }

    /// An empty reference cell, filled later with `define`.
    pub fn lazy(name: impl Into<String>) -> Self {
        Type::from_kind(Kind::Lazy(Arc::new(OnceCell::new()))).named(name)
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.map_def(|def| def.name = Some(name))
    }

    pub fn with_hook(self, hook: impl CustomDecodable + 'static) -> Self {
        self.map_def(|def| def.hook = Some(Arc::new(hook)))
    }

    /// Fill a lazy cell. Hands `target` back if `self` is not lazy or was
    /// already defined.
    pub fn define(&self, target: Type) -> Result<(), Type> {
        match &self.0.kind {
            Kind::Lazy(cell) => cell.set(target),
            _ => Err(target),
        }
    }

    // ---- accessors ----

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn kind(&self) -> &Kind {
        &self.0.kind
    }

    pub fn hook(&self) -> Option<&dyn CustomDecodable> {
        self.0.hook.as_deref()
    }

    pub fn ptr_eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Follow lazy cells to the first concrete descriptor. `None` if a cell
    /// on the way is empty or the chain doesn't end.
    pub fn resolve(&self) -> Option<&Type> {
        let mut cur = self;
        for _ in 0..MAX_LAZY_HOPS {
            match &cur.0.kind {
                Kind::Lazy(cell) => cur = cell.get()?,
                _ => return Some(cur),
            }
        }
        None
    }

    /// The validating constructor, strict mode.
    pub fn construct(&self, value: Value, path: &Path) -> Result<Value, DecodeError> {
        crate::construct::construct(self, value, path, &DecodeConfig::strict())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({}: {})", self.0.kind.tag(), self.display_name())
    }
}

fn collect_props<I, K>(props: I) -> Props
where
    I: IntoIterator<Item = (K, Type)>,
    K: Into<String>,
{
    props.into_iter().map(|(k, t)| (k.into(), t)).collect()
}
