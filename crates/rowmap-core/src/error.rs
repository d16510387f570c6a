//! Error taxonomy for the data-access layer.
//!
//! Not-found conditions (`first` yielding nothing, an update with nothing
//! to set) are *values* (`None`, `false`, `0`), never errors. Everything in
//! this enum is fatal to the operation that raised it.

use std::fmt;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes surfaced by the driver, filter compiler, and mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Establishing the physical connection failed. Fatal; wraps the
    /// driver-level message with context.
    Connect {
        /// Human-readable context (DSN, driver message).
        context: String,
    },
    /// An empty string was handed to the statement executor.
    EmptyStatement,
    /// Schema introspection found no such table.
    NoSuchTable(String),
    /// An operation that requires a primary key was invoked on a table
    /// that declares none.
    NoPrimaryKey(String),
    /// `find(...keys)` was called with the wrong number of key values.
    KeyArity {
        /// Number of primary-key fields the schema declares.
        expected: usize,
        /// Number of values supplied by the caller.
        got: usize,
    },
    /// A non-nullable field would be written as NULL.
    NullConstraint {
        /// Table owning the field.
        table: String,
        /// Offending field name.
        field: String,
    },
    /// Native statement or connection-level execution failure.
    Exec {
        /// The SQL text that failed.
        sql: String,
        /// Driver-reported message.
        message: String,
    },
    /// BETWEEN / NOT BETWEEN compiled against an operand that is not a
    /// two-element array.
    BetweenOperand,
    /// A field name that exists in neither the field nor the adhoc map.
    NoSuchField(String),
    /// A dynamic method name that matches no accessor pattern.
    NoSuchMethod(String),
    /// A cursor-dependent operation was invoked while the cursor is not
    /// positioned at a row.
    InvalidCursor,
    /// Transaction state violation (nested begin, commit without begin,
    /// or transactions unsupported by the connection).
    Transaction(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connect { context } => {
                write!(f, "unable to connect: {context}")
            }
            Error::EmptyStatement => write!(f, "cannot execute an empty statement"),
            Error::NoSuchTable(table) => write!(f, "table `{table}` does not exist"),
            Error::NoPrimaryKey(table) => {
                write!(f, "table `{table}` does not declare a primary key")
            }
            Error::KeyArity { expected, got } => write!(
                f,
                "primary key arity mismatch: expected {expected} value(s), got {got}"
            ),
            Error::NullConstraint { table, field } => {
                write!(f, "field `{table}.{field}` cannot be NULL")
            }
            Error::Exec { sql, message } => write!(f, "statement failed: {message} (sql: {sql})"),
            Error::BetweenOperand => write!(f, "BETWEEN operator needs an array operand"),
            Error::NoSuchField(name) => write!(f, "undefined field `{name}`"),
            Error::NoSuchMethod(name) => write!(f, "undefined method `{name}`"),
            Error::InvalidCursor => write!(f, "cursor is not positioned at a row"),
            Error::Transaction(message) => write!(f, "transaction error: {message}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_between_operand() {
        assert_eq!(
            Error::BetweenOperand.to_string(),
            "BETWEEN operator needs an array operand"
        );
    }

    #[test]
    fn test_display_null_constraint() {
        let err = Error::NullConstraint {
            table: "user".into(),
            field: "username".into(),
        };
        assert_eq!(err.to_string(), "field `user.username` cannot be NULL");
    }

    #[test]
    fn test_display_key_arity() {
        let err = Error::KeyArity {
            expected: 2,
            got: 1,
        };
        assert!(err.to_string().contains("expected 2"));
        assert!(err.to_string().contains("got 1"));
    }
}
