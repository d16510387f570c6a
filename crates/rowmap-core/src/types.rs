//! Storage types and parameter-binding kinds.

use serde::{Deserialize, Serialize};

/// Semantic storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SqlType {
    /// Integer affinity.
    Integer,
    /// Floating-point affinity.
    Float,
    /// Boolean, stored as 0/1 where no native type exists.
    Boolean,
    /// Text affinity.
    #[default]
    Text,
    /// Binary large object.
    Blob,
}

/// The parameter kind actually handed to a driver when binding.
///
/// There is deliberately no floating-point member: `SqlType::Float` is an
/// internal coercion tag only, and float values always bind as `Str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindKind {
    /// NULL bind.
    Null,
    /// Integer bind.
    Int,
    /// Boolean bind.
    Bool,
    /// Blob bind.
    Blob,
    /// String bind (also used for floats).
    Str,
}

impl SqlType {
    /// The bind kind used for parameters of this storage type.
    pub fn bind_kind(self) -> BindKind {
        match self {
            SqlType::Integer => BindKind::Int,
            SqlType::Boolean => BindKind::Bool,
            SqlType::Blob => BindKind::Blob,
            // Floats are coerced on the host side and bound as strings.
            SqlType::Float | SqlType::Text => BindKind::Str,
        }
    }
}
