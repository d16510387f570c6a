//! The physical-connection seam.
//!
//! A `Connection` is one handle to one database. The driver layer is
//! generic over this trait; bindings (SQLite, mocks) implement it. No
//! pooling: callers sharing a connection across threads must serialize
//! access themselves.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::Params;
use crate::types::SqlType;
use crate::value::Value;

/// One raw result record: column name / scalar pairs in select order.
pub type RawRow = Vec<(String, Value)>;

/// Column metadata produced by table introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub sql_type: SqlType,
    /// Whether NULL is accepted.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub pkey: bool,
    /// Column default, if declared.
    pub default: Option<Value>,
}

/// A blocking database connection.
pub trait Connection {
    /// Stable identity of this connection (DSN-like), used as a cache-key
    /// component.
    fn identity(&self) -> String;

    /// Run a result-producing statement.
    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<RawRow>>;

    /// Run a statement and return the affected-row count.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64>;

    /// Last value generated for an auto-increment key on this connection.
    fn last_insert_id(&mut self) -> Result<i64>;

    /// Introspect a physical table. An empty result means the table does
    /// not exist.
    fn table_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Open a transaction.
    fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> Result<()>;

    /// Whether this connection supports transactions at all.
    fn supports_transactions(&self) -> bool {
        true
    }
}
