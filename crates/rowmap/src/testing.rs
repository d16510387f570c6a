//! Scripted connection for tests.
//!
//! `MockConnection` replays queued result sets, records every statement
//! it sees, and can be armed to fail the next statement. It backs the
//! driver and mapper unit tests; downstream crates can use it to test
//! code built over a `Driver` without a real database.

use std::collections::{HashMap, VecDeque};

use rowmap_core::{ColumnInfo, Connection, Error, Params, RawRow, Result};

/// In-memory `Connection` with scripted replies.
#[derive(Debug, Default)]
pub struct MockConnection {
    replies: VecDeque<Vec<RawRow>>,
    log: Vec<(String, Params)>,
    columns: HashMap<String, Vec<ColumnInfo>>,
    last_id: i64,
    affected: u64,
    fail_next: Option<String>,
    tx_log: Vec<&'static str>,
    supports_tx: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            affected: 1,
            supports_tx: true,
            ..Self::default()
        }
    }

    /// Register introspection metadata for a table.
    pub fn set_columns(&mut self, table: impl Into<String>, columns: Vec<ColumnInfo>) {
        self.columns.insert(table.into(), columns);
    }

    /// Queue a result set; each select-like statement pops one.
    pub fn push_rows(&mut self, rows: Vec<RawRow>) {
        self.replies.push_back(rows);
    }

    /// Value returned by `last_insert_id`.
    pub fn set_last_id(&mut self, id: i64) {
        self.last_id = id;
    }

    /// Affected-row count reported for writes.
    pub fn set_affected(&mut self, affected: u64) {
        self.affected = affected;
    }

    /// Fail the next query or execute with this message.
    pub fn fail_next(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }

    /// Toggle transaction support.
    pub fn set_supports_transactions(&mut self, supported: bool) {
        self.supports_tx = supported;
    }

    /// Every statement seen, in order.
    pub fn log(&self) -> &[(String, Params)] {
        &self.log
    }

    /// Transaction verbs seen, in order.
    pub fn tx_log(&self) -> &[&'static str] {
        &self.tx_log
    }

    fn check_fail(&mut self, sql: &str) -> Result<()> {
        match self.fail_next.take() {
            Some(message) => Err(Error::Exec {
                sql: sql.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }
}

impl Connection for MockConnection {
    fn identity(&self) -> String {
        "mock:test".to_string()
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<RawRow>> {
        self.log.push((sql.to_string(), params.clone()));
        self.check_fail(sql)?;
        Ok(self.replies.pop_front().unwrap_or_default())
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64> {
        self.log.push((sql.to_string(), params.clone()));
        self.check_fail(sql)?;
        Ok(self.affected)
    }

    fn last_insert_id(&mut self) -> Result<i64> {
        Ok(self.last_id)
    }

    fn table_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    fn begin(&mut self) -> Result<()> {
        self.tx_log.push("begin");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.tx_log.push("commit");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.tx_log.push("rollback");
        Ok(())
    }

    fn supports_transactions(&self) -> bool {
        self.supports_tx
    }
}
