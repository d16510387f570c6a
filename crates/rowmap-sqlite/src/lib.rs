//! SQLite binding for Rowmap.
//!
//! One [`SqliteConnection`] wraps one `rusqlite` handle (bundled build,
//! no system library needed). Floats are bound as text and re-typed by
//! SQLite's column affinity; every other scalar maps directly.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::Connection as RusqliteConnection;

use rowmap_core::{
    quote_ident, BindKind, ColumnInfo, Connection, Error, Params, RawRow, Result, SqlType, Value,
};

/// A single SQLite database connection.
pub struct SqliteConnection {
    conn: RusqliteConnection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("identity", &self.identity())
            .finish()
    }
}

impl SqliteConnection {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = RusqliteConnection::open(path).map_err(|err| Error::Connect {
            context: format!("sqlite:{}: {err}", path.display()),
        })?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a fresh in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = RusqliteConnection::open_in_memory().map_err(|err| Error::Connect {
            context: format!("sqlite::memory:: {err}"),
        })?;
        Ok(Self { conn, path: None })
    }

    /// The wrapped `rusqlite` handle, for dialect-specific work.
    pub fn raw(&mut self) -> &mut RusqliteConnection {
        &mut self.conn
    }

    fn exec_err(sql: &str, err: rusqlite::Error) -> Error {
        Error::Exec {
            sql: sql.to_string(),
            message: err.to_string(),
        }
    }
}

fn bind_params(
    stmt: &mut rusqlite::Statement<'_>,
    sql: &str,
    params: &Params,
) -> Result<()> {
    for (name, value) in params.iter() {
        let idx = stmt
            .parameter_index(name)
            .map_err(|err| SqliteConnection::exec_err(sql, err))?;
        // Parameters the statement does not mention are skipped.
        let Some(idx) = idx else { continue };
        let bound = match value.bind_kind() {
            BindKind::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
            BindKind::Bool | BindKind::Int => {
                stmt.raw_bind_parameter(idx, value.as_i64().unwrap_or_default())
            }
            BindKind::Str => match value {
                // floats travel as their textual form; column affinity
                // re-types them on the engine side
                Value::Float(f) => stmt.raw_bind_parameter(idx, f.to_string()),
                other => stmt.raw_bind_parameter(idx, other.as_str().unwrap_or_default()),
            },
            BindKind::Blob => {
                let bytes = match value {
                    Value::Blob(b) => b.as_slice(),
                    _ => &[],
                };
                stmt.raw_bind_parameter(idx, bytes)
            }
        };
        bound.map_err(|err| SqliteConnection::exec_err(sql, err))?;
    }
    Ok(())
}

fn value_from_ref(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Map a declared column type to its affinity, per the SQLite rules.
fn affinity(declared: &str) -> SqlType {
    let ty = declared.to_ascii_uppercase();
    if ty.contains("INT") {
        SqlType::Integer
    } else if ty.contains("BOOL") {
        SqlType::Boolean
    } else if ty.contains("CHAR") || ty.contains("CLOB") || ty.contains("TEXT") {
        SqlType::Text
    } else if ty.contains("REAL") || ty.contains("FLOA") || ty.contains("DOUB") {
        SqlType::Float
    } else if ty.contains("BLOB") || ty.is_empty() {
        SqlType::Blob
    } else {
        // NUMERIC affinity and everything else
        SqlType::Float
    }
}

/// Parse a `dflt_value` literal as reported by `PRAGMA table_info`.
fn parse_default(literal: &str) -> Option<Value> {
    let literal = literal.trim();
    if literal.eq_ignore_ascii_case("NULL") {
        return None;
    }
    if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
        let inner = &literal[1..literal.len() - 1];
        return Some(Value::Text(inner.replace("''", "'")));
    }
    if let Ok(i) = literal.parse::<i64>() {
        return Some(Value::Int(i));
    }
    if let Ok(f) = literal.parse::<f64>() {
        return Some(Value::Float(f));
    }
    Some(Value::Text(literal.to_string()))
}

impl Connection for SqliteConnection {
    fn identity(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite::memory:".to_string(),
        }
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<RawRow>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| Self::exec_err(sql, err))?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
        bind_params(&mut stmt, sql, params)?;
        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|err| Self::exec_err(sql, err))? {
            let mut record = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let cell = row.get_ref(i).map_err(|err| Self::exec_err(sql, err))?;
                record.push((name.clone(), value_from_ref(cell)));
            }
            out.push(record);
        }
        Ok(out)
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|err| Self::exec_err(sql, err))?;
        bind_params(&mut stmt, sql, params)?;
        let affected = stmt
            .raw_execute()
            .map_err(|err| Self::exec_err(sql, err))?;
        Ok(affected as u64)
    }

    fn last_insert_id(&mut self) -> Result<i64> {
        Ok(self.conn.last_insert_rowid())
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| Self::exec_err(&sql, err))?;
        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|err| Self::exec_err(&sql, err))? {
            let name: String = row.get(1).map_err(|err| Self::exec_err(&sql, err))?;
            let declared: String = row.get(2).map_err(|err| Self::exec_err(&sql, err))?;
            let notnull: i64 = row.get(3).map_err(|err| Self::exec_err(&sql, err))?;
            let dflt: Option<String> = row.get(4).map_err(|err| Self::exec_err(&sql, err))?;
            let pk: i64 = row.get(5).map_err(|err| Self::exec_err(&sql, err))?;
            // A rowid-aliased INTEGER PRIMARY KEY reports notnull=0 but
            // can never hold NULL.
            let nullable = notnull == 0 && pk == 0;
            out.push(ColumnInfo {
                name,
                sql_type: affinity(&declared),
                nullable,
                pkey: pk > 0,
                default: dflt.as_deref().and_then(parse_default),
            });
        }
        tracing::debug!(table, columns = out.len(), "introspected table");
        Ok(out)
    }

    fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN")
            .map_err(|err| Self::exec_err("BEGIN", err))
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|err| Self::exec_err("COMMIT", err))
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|err| Self::exec_err("ROLLBACK", err))
    }
}
