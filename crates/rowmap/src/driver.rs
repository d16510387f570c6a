//! The SQL driver: statement execution and CRUD over `Row` templates.
//!
//! A `Driver` owns one lazily-created physical connection, a single
//! linear (non-nested) transaction flag, and an optional result cache.
//! Everything blocks; callers sharing a driver across threads must
//! serialize access externally.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use regex::Regex;
use rowmap_core::{
    param_name, quote_ident, AdhocExpr, Connection, Error, Field, Params, RawRow, Result, Row,
    SqlType, Value,
};
use rowmap_query::{compile, stringify, Filter, SelectOptions};

use crate::cache::{CacheEntry, CacheStore};

// ============================================================================
// Query classification
// ============================================================================

static SELECT_RE: OnceLock<Regex> = OnceLock::new();
static CALL_RE: OnceLock<Regex> = OnceLock::new();

fn select_re() -> &'static Regex {
    SELECT_RE.get_or_init(|| {
        Regex::new(r"(?i)^[\s(]*(WITH|EXPLAIN|SELECT|PRAGMA|SHOW)\b|(?i)\bRETURNING\b")
            .expect("static pattern")
    })
}

fn call_re() -> &'static Regex {
    CALL_RE.get_or_init(|| Regex::new(r"(?i)^[\s(]*(CALL|EXEC)\b").expect("static pattern"))
}

/// Whether a statement produces a result set.
pub fn is_select_like(sql: &str) -> bool {
    select_re().is_match(sql)
}

/// Whether a statement invokes a stored procedure.
pub fn is_call_like(sql: &str) -> bool {
    call_re().is_match(sql)
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    /// Result set of a select-like statement.
    Rows(Vec<RawRow>),
    /// Affected-row count of a write.
    Affected(u64),
}

/// One page of a paginated result set.
///
/// `start`/`end` are 1-based display bounds and both zero when the page
/// holds no rows.
#[derive(Debug, Clone)]
pub struct Page {
    /// The fetched rows (empty when `page` is 0).
    pub subset: Vec<Row>,
    /// Total matching rows across all pages.
    pub total: u64,
    /// Rows in this page.
    pub count: u64,
    /// Total page count, `ceil(total / page_size)`.
    pub pages: u64,
    /// The requested 1-based page number.
    pub page: u64,
    /// 1-based ordinal of the first row in this page, 0 when empty.
    pub start: u64,
    /// 1-based ordinal of the last row in this page, 0 when empty.
    pub end: u64,
}

// ============================================================================
// Driver
// ============================================================================

type Factory<C> = Box<dyn FnMut() -> Result<C>>;

/// CRUD engine over a single connection.
pub struct Driver<C: Connection> {
    factory: Option<Factory<C>>,
    conn: Option<C>,
    cache: Option<Arc<dyn CacheStore>>,
    in_txn: bool,
}

impl<C: Connection> std::fmt::Debug for Driver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("connected", &self.conn.is_some())
            .field("cached", &self.cache.is_some())
            .field("in_txn", &self.in_txn)
            .finish()
    }
}

impl<C: Connection> Driver<C> {
    /// Driver with a lazy connection factory, run on first use. A failed
    /// attempt surfaces as [`Error::Connect`] and the factory is retried
    /// on the next call.
    pub fn new(factory: impl FnMut() -> Result<C> + 'static) -> Self {
        Self {
            factory: Some(Box::new(factory)),
            conn: None,
            cache: None,
            in_txn: false,
        }
    }

    /// Driver over an already-open connection.
    pub fn with_connection(conn: C) -> Self {
        Self {
            factory: None,
            conn: Some(conn),
            cache: None,
            in_txn: false,
        }
    }

    /// Attach a result/schema cache store.
    pub fn set_cache(&mut self, cache: Arc<dyn CacheStore>) {
        self.cache = Some(cache);
    }

    /// Direct access to the underlying connection, creating it on first
    /// use. An escape hatch for dialect-specific statements.
    pub fn connection_mut(&mut self) -> Result<&mut C> {
        self.connection()
    }

    fn connection(&mut self) -> Result<&mut C> {
        if self.conn.is_none() {
            let factory = self.factory.as_mut().ok_or_else(|| Error::Connect {
                context: "no connection factory configured".to_string(),
            })?;
            match factory() {
                Ok(conn) => self.conn = Some(conn),
                Err(err) => {
                    tracing::warn!(error = %err, "connection attempt failed");
                    return Err(Error::Connect {
                        context: err.to_string(),
                    });
                }
            }
        }
        self.conn.as_mut().ok_or_else(|| Error::Connect {
            context: "connection unavailable".to_string(),
        })
    }

    // ========================================================================
    // Statement execution
    // ========================================================================

    /// Run one statement, classified as a query or a write.
    ///
    /// Any statement error while a transaction is open rolls it back
    /// before the error propagates.
    pub fn exec(&mut self, sql: &str, params: &Params) -> Result<ExecResult> {
        if sql.trim().is_empty() {
            return Err(Error::EmptyStatement);
        }
        tracing::trace!(sql, params = params.len(), "executing statement");
        let select_like = is_select_like(sql);
        let result = {
            let conn = self.connection()?;
            if select_like {
                conn.query(sql, params).map(ExecResult::Rows)
            } else {
                conn.execute(sql, params).map(ExecResult::Affected)
            }
        };
        result.map_err(|err| {
            self.rollback_open_transaction();
            err
        })
    }

    /// `exec` with result caching for select-like statements.
    ///
    /// Only consulted for a positive TTL with a cache store attached.
    pub fn exec_cached(
        &mut self,
        sql: &str,
        params: &Params,
        ttl: u64,
        tag: Option<&str>,
    ) -> Result<ExecResult> {
        let cache = self.cache.clone();
        let Some(cache) = cache.filter(|_| ttl > 0 && is_select_like(sql)) else {
            return self.exec(sql, params);
        };
        let key = self.cache_key(sql, params, tag)?;
        if let Some(CacheEntry::Rows(rows)) = cache.get(&key) {
            tracing::trace!(key, "result cache hit");
            return Ok(ExecResult::Rows(rows));
        }
        let result = self.exec(sql, params)?;
        if let ExecResult::Rows(rows) = &result {
            cache.set(&key, CacheEntry::Rows(rows.clone()), ttl);
        }
        Ok(result)
    }

    /// Run a batch under one implicit transaction; any failure rolls the
    /// whole batch back before the error propagates.
    pub fn exec_all(&mut self, statements: &[(String, Params)]) -> Result<Vec<ExecResult>> {
        let owns_txn = !self.in_txn && self.is_support_transaction()?;
        if owns_txn {
            self.begin()?;
        }
        let mut results = Vec::with_capacity(statements.len());
        for (sql, params) in statements {
            // exec rolls back the open transaction on failure
            results.push(self.exec(sql, params)?);
        }
        if owns_txn {
            self.commit()?;
        }
        Ok(results)
    }

    fn cache_key(&mut self, sql: &str, params: &Params, tag: Option<&str>) -> Result<String> {
        let identity = self.connection()?.identity();
        let serialized = serde_json::to_string(params).unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        sql.hash(&mut hasher);
        serialized.hash(&mut hasher);
        let hash = hasher.finish();
        Ok(match tag {
            Some(tag) => format!("{hash:016x}:{tag}"),
            None => format!("{hash:016x}"),
        })
    }

    fn rollback_open_transaction(&mut self) {
        if !self.in_txn {
            return;
        }
        self.in_txn = false;
        if let Ok(conn) = self.connection() {
            if let Err(err) = conn.rollback() {
                tracing::warn!(error = %err, "automatic rollback failed");
            }
        }
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Introspect `table` into a template `Row`, optionally restricted to
    /// a column subset, with separate schema caching.
    pub fn schema(&mut self, table: &str, fields: Option<&[&str]>, ttl: u64) -> Result<Row> {
        let started = Instant::now();
        let cache = self.cache.clone().filter(|_| ttl > 0);
        let key = match &cache {
            Some(_) => {
                let identity = self.connection()?.identity();
                let subset = fields.map(|f| f.join(",")).unwrap_or_default();
                Some(format!("schema:{identity}:{table}:{subset}:{ttl}"))
            }
            None => None,
        };
        if let (Some(cache), Some(key)) = (&cache, &key) {
            if let Some(CacheEntry::Columns(columns)) = cache.get(key) {
                return Ok(build_template(table, &columns, fields));
            }
        }
        let columns = self.connection()?.table_columns(table)?;
        if columns.is_empty() {
            return Err(Error::NoSuchTable(table.to_string()));
        }
        if let (Some(cache), Some(key)) = (&cache, &key) {
            cache.set(key, CacheEntry::Columns(columns.clone()), ttl);
        }
        tracing::debug!(
            table,
            columns = columns.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "schema retrieved"
        );
        Ok(build_template(table, &columns, fields))
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Fetch every matching record as a committed, loaded clone of the
    /// template.
    pub fn find(
        &mut self,
        template: &Row,
        filter: &Filter,
        options: &SelectOptions,
        ttl: u64,
    ) -> Result<Vec<Row>> {
        let (sql, params) = stringify(template, &select_list(template), filter, options)?;
        let raw = match self.exec_cached(&sql, &params, ttl, None)? {
            ExecResult::Rows(rows) => rows,
            ExecResult::Affected(_) => Vec::new(),
        };
        let mut out = Vec::with_capacity(raw.len());
        for record in raw {
            let mut row = template.clone();
            for (name, value) in record {
                if let Some(field) = row.field_mut(&name) {
                    field.set_value(value);
                } else if let Some(adhoc) = row.adhoc_mut(&name) {
                    adhoc.hydrate(value);
                }
            }
            row.commit();
            row.set_loaded(true);
            out.push(row);
        }
        Ok(out)
    }

    /// `find` with `limit = 1`, yielding at most one row.
    pub fn first(
        &mut self,
        template: &Row,
        filter: &Filter,
        options: &SelectOptions,
        ttl: u64,
    ) -> Result<Option<Row>> {
        let mut options = options.clone();
        options.limit = 1;
        Ok(self.find(template, filter, &options, ttl)?.into_iter().next())
    }

    /// Count matching records. Grouped queries are wrapped in an outer
    /// `COUNT(*)` subquery; otherwise a `_rows` count column is selected
    /// directly.
    pub fn count(
        &mut self,
        template: &Row,
        filter: &Filter,
        options: &SelectOptions,
        ttl: u64,
    ) -> Result<u64> {
        let (sql, params) = if options.is_grouped() {
            let (inner, params) = stringify(template, &select_list(template), filter, options)?;
            (
                format!("SELECT COUNT(*) AS `_rows` FROM ({inner}) AS `_grouped`"),
                params,
            )
        } else {
            let mut options = options.clone();
            options.order = None;
            options.limit = 0;
            options.offset = 0;
            stringify(template, "COUNT(*) AS `_rows`", filter, &options)?
        };
        let raw = match self.exec_cached(&sql, &params, ttl, Some("count"))? {
            ExecResult::Rows(rows) => rows,
            ExecResult::Affected(_) => Vec::new(),
        };
        let total = raw
            .first()
            .and_then(|record| record.iter().find(|(name, _)| name == "_rows"))
            .and_then(|(_, value)| value.as_i64())
            .unwrap_or(0);
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// Fetch one page plus totals. `page` is 1-based; page 0 computes the
    /// totals only and yields an empty subset.
    pub fn paginate(
        &mut self,
        template: &Row,
        page: u64,
        page_size: u64,
        filter: &Filter,
        options: &SelectOptions,
        ttl: u64,
    ) -> Result<Page> {
        let total = self.count(template, filter, options, ttl)?;
        let pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        let subset = if page > 0 && page_size > 0 {
            let mut options = options.clone();
            options.offset = (page - 1) * page_size;
            options.limit = page_size;
            self.find(template, filter, &options, ttl)?
        } else {
            Vec::new()
        };
        let count = subset.len() as u64;
        let (start, end) = if count == 0 {
            (0, 0)
        } else {
            let start = (page - 1) * page_size + 1;
            (start, start + count - 1)
        };
        Ok(Page {
            subset,
            total,
            count,
            pages,
            page,
            start,
            end,
        })
    }

    /// Insert the row's dirty fields.
    ///
    /// At most one auto-increment key (integer, empty, non-nullable,
    /// primary) is excluded from the column list; after a successful
    /// insert through such a key the freshly-generated record is
    /// re-fetched and returned. `Ok(None)` means nothing was dirty and no
    /// SQL was issued.
    pub fn insert(&mut self, row: &mut Row) -> Result<Option<Row>> {
        let auto_key = row
            .fields()
            .iter()
            .find(|f| {
                f.pkey && f.sql_type == SqlType::Integer && f.value().is_empty() && !f.nullable
            })
            .map(|f| f.name().to_string());

        let mut columns: Vec<String> = Vec::new();
        let mut params = Params::new();
        for field in row.fields() {
            if auto_key.as_deref() == Some(field.name()) || !field.is_changed() {
                continue;
            }
            if !field.nullable && field.value().is_null() {
                return Err(Error::NullConstraint {
                    table: row.table().to_string(),
                    field: field.name().to_string(),
                });
            }
            columns.push(field.name().to_string());
            params.insert(param_name(field.name()), field.value().clone());
        }
        if columns.is_empty() {
            return Ok(None);
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(row.table()),
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            columns
                .iter()
                .map(|c| param_name(c))
                .collect::<Vec<_>>()
                .join(", "),
        );
        self.exec(&sql, &params)?;

        if let Some(key) = auto_key {
            let id = self.connection()?.last_insert_id()?;
            let mut template = row.clone();
            template.reset();
            let filter = Filter::new().push(key.clone(), Value::Int(id));
            if let Some(found) = self.first(&template, &filter, &SelectOptions::new(), 0)? {
                return Ok(Some(found));
            }
            // The record vanished between insert and refetch; fall back
            // to the caller's view of it.
            row.set(&key, Value::Int(id));
        }
        row.commit();
        row.set_loaded(true);
        Ok(Some(row.clone()))
    }

    /// Update the row's dirty non-key fields, filtered by every primary
    /// key's *initial* value so key edits update the original record.
    pub fn update(&mut self, row: &mut Row) -> Result<bool> {
        let keys: Vec<String> = row.keys().iter().map(|k| (*k).to_string()).collect();
        if keys.is_empty() {
            return Ok(false);
        }
        let mut params = Params::new();
        let mut sets: Vec<String> = Vec::new();
        for field in row.fields() {
            if field.pkey || !field.is_changed() {
                continue;
            }
            if !field.nullable && field.value().is_null() {
                return Err(Error::NullConstraint {
                    table: row.table().to_string(),
                    field: field.name().to_string(),
                });
            }
            let name = params.unique_name(&param_name(field.name()), &Params::new());
            params.insert(name.clone(), field.value().clone());
            sets.push(format!("{} = {name}", quote_ident(field.name())));
        }
        if sets.is_empty() {
            return Ok(false);
        }
        let mut wheres: Vec<String> = Vec::new();
        for key in &keys {
            if let Some(field) = row.field(key) {
                let name = params.unique_name(&param_name(key), &Params::new());
                params.insert(name.clone(), field.initial().clone());
                wheres.push(format!("{} = {name}", quote_ident(key)));
            }
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(row.table()),
            sets.join(", "),
            wheres.join(" AND "),
        );
        self.exec(&sql, &params)?;
        row.commit();
        Ok(true)
    }

    /// Delete the record the row was loaded from, identified by its
    /// primary keys' initial values.
    pub fn delete(&mut self, row: &mut Row) -> Result<bool> {
        let keys: Vec<String> = row.keys().iter().map(|k| (*k).to_string()).collect();
        if keys.is_empty() {
            return Err(Error::NoPrimaryKey(row.table().to_string()));
        }
        let identified = keys
            .iter()
            .any(|k| row.field(k).is_some_and(|f| !f.initial().is_empty()));
        if !identified {
            return Ok(false);
        }
        let mut params = Params::new();
        let mut wheres: Vec<String> = Vec::new();
        for key in &keys {
            if let Some(field) = row.field(key) {
                let name = params.unique_name(&param_name(key), &Params::new());
                params.insert(name.clone(), field.initial().clone());
                wheres.push(format!("{} = {name}", quote_ident(key)));
            }
        }
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(row.table()),
            wheres.join(" AND "),
        );
        self.exec(&sql, &params)?;
        row.set_loaded(false);
        Ok(true)
    }

    /// Delete by an arbitrary filter, returning the affected-row count.
    pub fn delete_by_clause(&mut self, row: &Row, filter: &Filter) -> Result<u64> {
        let (fragment, params) = compile(filter, &Params::new())?;
        let sql = if fragment.is_empty() {
            format!("DELETE FROM {}", quote_ident(row.table()))
        } else {
            format!("DELETE FROM {} WHERE {fragment}", quote_ident(row.table()))
        };
        match self.exec(&sql, &params)? {
            ExecResult::Affected(n) => Ok(n),
            ExecResult::Rows(_) => Ok(0),
        }
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Open a transaction. Nesting is rejected.
    pub fn begin(&mut self) -> Result<()> {
        if self.in_txn {
            return Err(Error::Transaction("transaction already open".to_string()));
        }
        if !self.is_support_transaction()? {
            return Err(Error::Transaction(
                "connection does not support transactions".to_string(),
            ));
        }
        self.connection()?.begin()?;
        self.in_txn = true;
        Ok(())
    }

    /// Commit the open transaction.
    pub fn commit(&mut self) -> Result<()> {
        if !self.in_txn {
            return Err(Error::Transaction("no open transaction".to_string()));
        }
        self.connection()?.commit()?;
        self.in_txn = false;
        Ok(())
    }

    /// Roll back the open transaction.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_txn {
            return Err(Error::Transaction("no open transaction".to_string()));
        }
        self.in_txn = false;
        self.connection()?.rollback()
    }

    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        self.in_txn
    }

    /// Whether the underlying connection supports transactions.
    pub fn is_support_transaction(&mut self) -> Result<bool> {
        Ok(self.connection()?.supports_transactions())
    }
}

/// Projection over the template: every stored field plus SQL-backed
/// adhocs aliased to their names.
fn select_list(row: &Row) -> String {
    let mut parts: Vec<String> = row
        .fields()
        .iter()
        .map(|f| quote_ident(f.name()))
        .collect();
    for adhoc in row.adhocs() {
        if let AdhocExpr::Sql(expr) = adhoc.expression() {
            parts.push(format!("{expr} AS {}", quote_ident(adhoc.name())));
        }
    }
    if parts.is_empty() {
        "*".to_string()
    } else {
        parts.join(", ")
    }
}

fn build_template(
    table: &str,
    columns: &[rowmap_core::ColumnInfo],
    subset: Option<&[&str]>,
) -> Row {
    let mut row = Row::new(table);
    for col in columns {
        if subset.is_some_and(|names| !names.contains(&col.name.as_str())) {
            continue;
        }
        let default = col.default.clone().unwrap_or(Value::Null);
        row.set_field(
            Field::new(&col.name, Value::Null, default)
                .nullable(col.nullable)
                .primary_key(col.pkey)
                .sql_type(col.sql_type),
        );
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::MockConnection;
    use rowmap_core::ColumnInfo;

    fn user_columns() -> Vec<ColumnInfo> {
        vec![
            ColumnInfo {
                name: "id".to_string(),
                sql_type: SqlType::Integer,
                nullable: false,
                pkey: true,
                default: None,
            },
            ColumnInfo {
                name: "username".to_string(),
                sql_type: SqlType::Text,
                nullable: false,
                pkey: false,
                default: None,
            },
            ColumnInfo {
                name: "active".to_string(),
                sql_type: SqlType::Integer,
                nullable: true,
                pkey: false,
                default: Some(Value::Int(1)),
            },
        ]
    }

    fn user_driver() -> Driver<MockConnection> {
        let mut conn = MockConnection::new();
        conn.set_columns("user", user_columns());
        Driver::with_connection(conn)
    }

    #[test]
    fn test_classification_table() {
        assert!(is_select_like("SELECT 1"));
        assert!(is_select_like("  ( select 1 )"));
        assert!(is_select_like("WITH t AS (SELECT 1) SELECT * FROM t"));
        assert!(is_select_like("PRAGMA table_info(user)"));
        assert!(is_select_like("EXPLAIN SELECT 1"));
        assert!(is_select_like("SHOW TABLES"));
        assert!(is_select_like("INSERT INTO t (a) VALUES (1) RETURNING id"));
        assert!(!is_select_like("INSERT INTO t (a) VALUES (1)"));
        assert!(!is_select_like("UPDATE t SET a = 1"));
        assert!(is_call_like("CALL proc()"));
        assert!(is_call_like("exec proc"));
        assert!(!is_call_like("SELECT 1"));
    }

    #[test]
    fn test_exec_rejects_empty_statement() {
        let mut driver = user_driver();
        let err = driver.exec("   ", &Params::new()).unwrap_err();
        assert_eq!(err, Error::EmptyStatement);
    }

    #[test]
    fn test_schema_builds_template() {
        let mut driver = user_driver();
        let row = driver.schema("user", None, 0).unwrap();
        assert_eq!(row.table(), "user");
        assert_eq!(row.keys(), vec!["id"]);
        assert_eq!(row.field("active").unwrap().default(), &Value::Int(1));
    }

    #[test]
    fn test_schema_missing_table() {
        let mut driver = user_driver();
        let err = driver.schema("ghost", None, 0).unwrap_err();
        assert_eq!(err, Error::NoSuchTable("ghost".to_string()));
    }

    #[test]
    fn test_schema_subset_filters_columns() {
        let mut driver = user_driver();
        let row = driver.schema("user", Some(&["id", "username"]), 0).unwrap();
        assert!(row.field("username").is_some());
        assert!(row.field("active").is_none());
    }

    #[test]
    fn test_insert_excludes_auto_increment_key() {
        let mut driver = user_driver();
        driver.conn.as_mut().unwrap().set_last_id(1);
        driver.conn.as_mut().unwrap().push_rows(vec![vec![
            ("id".to_string(), Value::Int(1)),
            ("username".to_string(), Value::Text("foo".to_string())),
            ("active".to_string(), Value::Int(1)),
        ]]);
        let mut row = driver.schema("user", None, 0).unwrap();
        row.set("username", "foo");
        let inserted = driver.insert(&mut row).unwrap().unwrap();
        let sql = &driver.conn.as_ref().unwrap().log()[0].0;
        assert_eq!(sql, "INSERT INTO `user` (`username`) VALUES (:username)");
        assert_eq!(inserted.field("id").unwrap().value(), &Value::Int(1));
        assert!(inserted.is_loaded());
        assert!(!inserted.is_changed());
    }

    #[test]
    fn test_insert_nothing_dirty_is_noop() {
        let mut driver = user_driver();
        let mut row = driver.schema("user", None, 0).unwrap();
        assert!(driver.insert(&mut row).unwrap().is_none());
        // only the introspection call hit the connection
        assert_eq!(driver.conn.as_ref().unwrap().log().len(), 0);
    }

    #[test]
    fn test_insert_null_constraint() {
        let mut driver = user_driver();
        let mut row = driver.schema("user", None, 0).unwrap();
        row.set("username", "x");
        row.commit();
        row.set("username", Value::Null);
        let err = driver.insert(&mut row).unwrap_err();
        assert_eq!(
            err,
            Error::NullConstraint {
                table: "user".to_string(),
                field: "username".to_string(),
            }
        );
    }

    #[test]
    fn test_update_uses_initial_key_value() {
        let mut driver = user_driver();
        let mut row = driver.schema("user", None, 0).unwrap();
        row.set("id", 7i64);
        row.set("username", "a");
        row.commit();
        row.set("id", 8i64);
        row.set("username", "b");
        assert!(driver.update(&mut row).unwrap());
        let (sql, params) = driver.conn.as_ref().unwrap().log()[0].clone();
        assert!(sql.contains("WHERE `id` = :id"));
        assert_eq!(params.get(":id"), Some(&Value::Int(7)));
        assert!(!row.is_changed());
    }

    #[test]
    fn test_update_without_changes_is_noop() {
        let mut driver = user_driver();
        let mut row = driver.schema("user", None, 0).unwrap();
        row.set("id", 7i64);
        row.commit();
        assert!(!driver.update(&mut row).unwrap());
    }

    #[test]
    fn test_update_without_keys_is_noop() {
        let mut driver = user_driver();
        let mut row = Row::new("user");
        row.set_field(Field::new("username", Value::Null, Value::Null));
        row.set("username", "x");
        assert!(!driver.update(&mut row).unwrap());
    }

    #[test]
    fn test_delete_requires_primary_key() {
        let mut driver = user_driver();
        let mut row = Row::new("user");
        row.set_field(Field::new("username", Value::Null, Value::Null));
        let err = driver.delete(&mut row).unwrap_err();
        assert_eq!(err, Error::NoPrimaryKey("user".to_string()));
    }

    #[test]
    fn test_delete_unidentified_row_declines() {
        let mut driver = user_driver();
        let mut row = driver.schema("user", None, 0).unwrap();
        assert!(!driver.delete(&mut row).unwrap());
    }

    #[test]
    fn test_delete_by_clause_returns_affected() {
        let mut driver = user_driver();
        driver.conn.as_mut().unwrap().set_affected(3);
        let row = driver.schema("user", None, 0).unwrap();
        let filter = Filter::new().push("active", 0i64);
        assert_eq!(driver.delete_by_clause(&row, &filter).unwrap(), 3);
        let sql = &driver.conn.as_ref().unwrap().log()[0].0;
        assert_eq!(sql, "DELETE FROM `user` WHERE `active` = :active");
    }

    #[test]
    fn test_count_reads_rows_column() {
        let mut driver = user_driver();
        driver
            .conn
            .as_mut()
            .unwrap()
            .push_rows(vec![vec![("_rows".to_string(), Value::Int(5))]]);
        let row = driver.schema("user", None, 0).unwrap();
        let n = driver
            .count(&row, &Filter::new(), &SelectOptions::new(), 0)
            .unwrap();
        assert_eq!(n, 5);
        let sql = &driver.conn.as_ref().unwrap().log()[0].0;
        assert!(sql.starts_with("SELECT COUNT(*) AS `_rows` FROM `user`"));
    }

    #[test]
    fn test_count_grouped_wraps_in_subquery() {
        let mut driver = user_driver();
        driver
            .conn
            .as_mut()
            .unwrap()
            .push_rows(vec![vec![("_rows".to_string(), Value::Int(2))]]);
        let row = driver.schema("user", None, 0).unwrap();
        let options = SelectOptions::new().group("`active`");
        let n = driver.count(&row, &Filter::new(), &options, 0).unwrap();
        assert_eq!(n, 2);
        let sql = &driver.conn.as_ref().unwrap().log()[0].0;
        assert!(sql.starts_with("SELECT COUNT(*) AS `_rows` FROM (SELECT"));
        assert!(sql.contains("GROUP BY `active`"));
    }

    #[test]
    fn test_paginate_boundaries() {
        let mut driver = user_driver();
        let template = driver.schema("user", None, 0).unwrap();
        let conn = driver.conn.as_mut().unwrap();
        conn.push_rows(vec![vec![("_rows".to_string(), Value::Int(3))]]);
        conn.push_rows(vec![vec![
            ("id".to_string(), Value::Int(2)),
            ("username".to_string(), Value::Text("b".to_string())),
        ]]);
        let page = driver
            .paginate(&template, 2, 1, &Filter::new(), &SelectOptions::new(), 0)
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 3);
        assert_eq!(page.count, 1);
        assert_eq!(page.start, 2);
        assert_eq!(page.end, 2);
        let find_sql = &driver.conn.as_ref().unwrap().log()[1].0;
        assert!(find_sql.contains("LIMIT 1 OFFSET 1"));
    }

    #[test]
    fn test_paginate_page_zero_totals_only() {
        let mut driver = user_driver();
        driver
            .conn
            .as_mut()
            .unwrap()
            .push_rows(vec![vec![("_rows".to_string(), Value::Int(3))]]);
        let template = driver.schema("user", None, 0).unwrap();
        let page = driver
            .paginate(&template, 0, 1, &Filter::new(), &SelectOptions::new(), 0)
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 3);
        assert_eq!(page.count, 0);
        assert_eq!(page.start, 0);
        assert_eq!(page.end, 0);
        assert!(page.subset.is_empty());
    }

    #[test]
    fn test_find_converts_to_declared_types() {
        let mut driver = user_driver();
        driver.conn.as_mut().unwrap().push_rows(vec![vec![
            ("id".to_string(), Value::Text("1".to_string())),
            ("username".to_string(), Value::Text("foo".to_string())),
            ("active".to_string(), Value::Text("1".to_string())),
        ]]);
        let template = driver.schema("user", None, 0).unwrap();
        let rows = driver
            .find(&template, &Filter::new(), &SelectOptions::new(), 0)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("id").unwrap().value(), &Value::Int(1));
        assert_eq!(rows[0].field("active").unwrap().value(), &Value::Int(1));
        assert!(rows[0].is_loaded());
        assert!(!rows[0].is_changed());
    }

    #[test]
    fn test_result_cache_hit_skips_connection() {
        let mut driver = user_driver();
        driver.set_cache(Arc::new(MemoryCache::new()));
        driver
            .conn
            .as_mut()
            .unwrap()
            .push_rows(vec![vec![("id".to_string(), Value::Int(1))]]);
        let params = Params::new();
        let first = driver.exec_cached("SELECT 1", &params, 60, None).unwrap();
        let second = driver.exec_cached("SELECT 1", &params, 60, None).unwrap();
        assert_eq!(first, second);
        // the second call never reached the connection
        assert_eq!(driver.conn.as_ref().unwrap().log().len(), 1);
    }

    #[test]
    fn test_zero_ttl_bypasses_cache() {
        let mut driver = user_driver();
        driver.set_cache(Arc::new(MemoryCache::new()));
        let params = Params::new();
        driver.exec_cached("SELECT 1", &params, 0, None).unwrap();
        driver.exec_cached("SELECT 1", &params, 0, None).unwrap();
        assert_eq!(driver.conn.as_ref().unwrap().log().len(), 2);
    }

    #[test]
    fn test_statement_error_rolls_back_open_transaction() {
        let mut driver = user_driver();
        driver.begin().unwrap();
        driver.conn.as_mut().unwrap().fail_next("boom");
        let err = driver.exec("UPDATE `user` SET `x` = 1", &Params::new());
        assert!(err.is_err());
        assert!(!driver.in_transaction());
        assert_eq!(
            driver.conn.as_ref().unwrap().tx_log(),
            &["begin", "rollback"]
        );
    }

    #[test]
    fn test_nested_begin_rejected() {
        let mut driver = user_driver();
        driver.begin().unwrap();
        assert!(matches!(driver.begin(), Err(Error::Transaction(_))));
    }

    #[test]
    fn test_commit_without_begin_rejected() {
        let mut driver = user_driver();
        assert!(matches!(driver.commit(), Err(Error::Transaction(_))));
    }

    #[test]
    fn test_exec_all_commits_batch() {
        let mut driver = user_driver();
        let statements = vec![
            ("UPDATE `user` SET `active` = 0".to_string(), Params::new()),
            ("UPDATE `user` SET `active` = 1".to_string(), Params::new()),
        ];
        let results = driver.exec_all(&statements).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            driver.conn.as_ref().unwrap().tx_log(),
            &["begin", "commit"]
        );
    }

    #[test]
    fn test_exec_all_rolls_back_on_failure() {
        let mut driver = user_driver();
        driver.conn.as_mut().unwrap().fail_next("boom");
        let statements = vec![("UPDATE `user` SET `active` = 0".to_string(), Params::new())];
        assert!(driver.exec_all(&statements).is_err());
        assert_eq!(
            driver.conn.as_ref().unwrap().tx_log(),
            &["begin", "rollback"]
        );
    }

    #[test]
    fn test_lazy_connection_failure_surfaces() {
        let mut driver: Driver<MockConnection> = Driver::new(|| {
            Err(Error::Connect {
                context: "refused".to_string(),
            })
        });
        let err = driver.exec("SELECT 1", &Params::new()).unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }

    #[test]
    fn test_factory_retried_after_failure() {
        let mut first = true;
        let mut driver: Driver<MockConnection> = Driver::new(move || {
            if first {
                first = false;
                Err(Error::Connect {
                    context: "refused".to_string(),
                })
            } else {
                Ok(MockConnection::new())
            }
        });
        assert!(driver.exec("SELECT 1", &Params::new()).is_err());
        assert!(driver.exec("SELECT 1", &Params::new()).is_ok());
    }
}
