//! Decode untyped JSON-like values into validated, immutable typed values,
//! driven by runtime type descriptors.
//!
//! ```
//! use json_decode::{Type, Value, decode, builtin};
//!
//! let point = Type::structure([("x", builtin::number()), ("y", builtin::number())])
//!     .named("Point");
//! let value = Value::from(serde_json::json!({"x": 1, "y": 2}));
//! let decoded = decode(&value, &point).unwrap();
//! assert!(decoded.as_instance().unwrap().is_instance_of(&point));
//! ```
pub mod cli;
pub mod config;
pub mod construct;
pub mod decode;
pub mod error;
pub mod jq_exec;
pub mod path;
pub mod path_de;
pub mod schema;
pub mod types;
pub mod value;

pub use config::{DecodeConfig, Mode};
pub use decode::{Decoder, decode};
pub use error::{DecodeError, ErrorKind};
pub use path::Path;
pub use schema::{Registry, SchemaError};
pub use types::builtin;
pub use types::{CustomDecodable, Dispatch, HookError, Kind, Leaf, Predicate, Type};
pub use value::{Instance, Key, Object, Value};
