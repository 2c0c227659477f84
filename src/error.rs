use thiserror::Error;

use crate::path::Path;
use crate::value::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    InvalidTypeArgument,
    InvalidValueShape,
    TupleLengthMismatch,
    AmbiguousUnionDispatch,
    InvalidValueContent,
}

/// A decode failure. Every variant carries the path rendered up to the
/// failing node and the printable form of the offending value.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Programmer error: the descriptor can't be used (e.g. an unfilled lazy
    /// reference). Raised in every mode.
    #[error(
        "Invalid argument type {type_name} supplied to decode(value, type) at {path} (expected a type{})",
        suffix(.reason)
    )]
    InvalidTypeArgument {
        path: Path,
        type_name: String,
        reason: Option<String>,
    },

    #[error("Invalid value {value} supplied to {path} (expected {expected})")]
    InvalidValueShape {
        path: Path,
        value: String,
        expected: String,
    },

    #[error(
        "Invalid value {value} supplied to {path} (expected an array of length {expected}, got {actual})"
    )]
    TupleLengthMismatch {
        path: Path,
        value: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Invalid value {value} supplied to {path} (no type returned by dispatch of union {union})"
    )]
    AmbiguousUnionDispatch {
        path: Path,
        value: String,
        union: String,
    },

    #[error("Invalid value {value} supplied to {path}{}", paren(.reason))]
    InvalidValueContent {
        path: Path,
        value: String,
        reason: Option<String>,
    },
}

fn suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

fn paren(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default()
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::InvalidTypeArgument { .. } => ErrorKind::InvalidTypeArgument,
            DecodeError::InvalidValueShape { .. } => ErrorKind::InvalidValueShape,
            DecodeError::TupleLengthMismatch { .. } => ErrorKind::TupleLengthMismatch,
            DecodeError::AmbiguousUnionDispatch { .. } => ErrorKind::AmbiguousUnionDispatch,
            DecodeError::InvalidValueContent { .. } => ErrorKind::InvalidValueContent,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DecodeError::InvalidTypeArgument { path, .. }
            | DecodeError::InvalidValueShape { path, .. }
            | DecodeError::TupleLengthMismatch { path, .. }
            | DecodeError::AmbiguousUnionDispatch { path, .. }
            | DecodeError::InvalidValueContent { path, .. } => path,
        }
    }

    // ---- constructors used by the decoder, the boundary and leaf types ----

    pub fn type_argument(
        path: &Path,
        type_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DecodeError::InvalidTypeArgument {
            path: path.clone(),
            type_name: type_name.into(),
            reason: Some(reason.into()),
        }
    }

    pub fn shape(path: &Path, value: &Value, expected: impl Into<String>) -> Self {
        DecodeError::InvalidValueShape {
            path: path.clone(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    pub fn tuple_length(path: &Path, value: &Value, expected: usize, actual: usize) -> Self {
        DecodeError::TupleLengthMismatch {
            path: path.clone(),
            value: value.to_string(),
            expected,
            actual,
        }
    }

    pub fn union_dispatch(path: &Path, value: &Value, union: impl Into<String>) -> Self {
        DecodeError::AmbiguousUnionDispatch {
            path: path.clone(),
            value: value.to_string(),
            union: union.into(),
        }
    }

    pub fn invalid(path: &Path, value: &Value) -> Self {
        DecodeError::InvalidValueContent {
            path: path.clone(),
            value: value.to_string(),
            reason: None,
        }
    }

    pub fn content(path: &Path, value: &Value, reason: impl Into<String>) -> Self {
        DecodeError::InvalidValueContent {
            path: path.clone(),
            value: value.to_string(),
            reason: Some(reason.into()),
        }
    }
}
