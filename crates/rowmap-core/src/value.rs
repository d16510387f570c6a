//! Scalar values exchanged with the database.

use serde::{Deserialize, Serialize};

use crate::types::{BindKind, SqlType};

/// A database scalar.
///
/// This is the single value currency of the workspace: field slots, bound
/// parameters, and raw result cells are all `Value`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean, bound as 0/1 on engines without a native bool type.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for `Null` and the empty string.
    ///
    /// Used by auto-increment detection: a key that was never assigned is
    /// "empty" whether the slot holds NULL or "".
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Null) || matches!(self, Value::Text(s) if s.is_empty())
    }

    /// Numeric view of the value, if one exists.
    ///
    /// Booleans read as 0/1 and numeric text parses; non-numeric text,
    /// blobs, and NULL have no numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null | Value::Blob(_) => None,
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integer view of the value, if one exists.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Float(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null | Value::Blob(_) => None,
        }
    }

    /// The parameter kind this value binds as.
    ///
    /// Floats bind as `Str`: the textual form travels to the engine and
    /// column affinity re-types it there.
    pub fn bind_kind(&self) -> BindKind {
        match self {
            Value::Null => BindKind::Null,
            Value::Bool(_) => BindKind::Bool,
            Value::Int(_) => BindKind::Int,
            Value::Float(_) | Value::Text(_) => BindKind::Str,
            Value::Blob(_) => BindKind::Blob,
        }
    }

    /// Borrow the text content, if this is a `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Loose, coercing equality used by dirty tracking.
    ///
    /// Numbers compare numerically across variants (`Int(1)` equals
    /// `Float(1.0)` equals `Text("1")` equals `Bool(true)`); `Null` equals
    /// only `Null`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Convert a raw scalar read from a connection into the declared
    /// storage type of its field.
    ///
    /// NULL always survives unchanged. Unconvertible values pass through
    /// untouched (best effort, never an error).
    pub fn coerce(self, sql_type: SqlType) -> Value {
        if self.is_null() {
            return Value::Null;
        }
        match sql_type {
            SqlType::Integer => self.as_i64().map(Value::Int).unwrap_or(self),
            SqlType::Float => self.as_f64().map(Value::Float).unwrap_or(self),
            SqlType::Boolean => self.as_f64().map(|f| Value::Bool(f != 0.0)).unwrap_or(self),
            SqlType::Text => match self {
                Value::Text(_) => self,
                Value::Int(i) => Value::Text(i.to_string()),
                Value::Float(f) => Value::Text(f.to_string()),
                Value::Bool(b) => Value::Text(if b { "1" } else { "0" }.to_string()),
                other => other,
            },
            SqlType::Blob => self,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}
