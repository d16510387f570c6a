//! Active-record cursor over loaded rows.
//!
//! A `Mapper` wraps a shared [`Driver`] with a template `Row`, a vector
//! of loaded rows, and a forward cursor. It dispatches lifecycle events
//! around save and delete, and resolves `get<Field>` / `loadBy<Field>` /
//! `findBy<Field>` style dynamic accessors through an explicit parse,
//! not reflection.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rowmap_core::{Adhoc, AdhocExpr, Connection, Error, Result, Row, Value};
use rowmap_query::{Filter, SelectOptions};

use crate::driver::Driver;
use crate::events::{
    Events, EV_AFTER_DELETE, EV_AFTER_SAVE, EV_BEFORE_DELETE, EV_BEFORE_SAVE, EV_LOAD,
};

type Method = Rc<dyn Fn(&Row) -> Value>;

#[derive(Clone, Copy)]
enum DynKind {
    Get,
    LoadBy,
    FindBy,
}

/// Cursor-based record mapper.
pub struct Mapper<C: Connection> {
    driver: Rc<RefCell<Driver<C>>>,
    events: Rc<RefCell<Events>>,
    row: Row,
    rows: Vec<Row>,
    ptr: usize,
    load_fired: Vec<bool>,
    methods: HashMap<String, Method>,
}

impl<C: Connection> Mapper<C> {
    /// Mapper over a shared driver, with no schema bound yet.
    pub fn new(driver: Rc<RefCell<Driver<C>>>) -> Self {
        Self {
            driver,
            events: Rc::new(RefCell::new(Events::new())),
            row: Row::new(""),
            rows: Vec::new(),
            ptr: 0,
            load_fired: Vec::new(),
            methods: HashMap::new(),
        }
    }

    /// Shared access to the underlying driver.
    pub fn driver(&self) -> Rc<RefCell<Driver<C>>> {
        Rc::clone(&self.driver)
    }

    /// The lifecycle event dispatcher.
    pub fn events(&self) -> Rc<RefCell<Events>> {
        Rc::clone(&self.events)
    }

    /// Register a named computation available through `get`.
    pub fn register_method(
        &mut self,
        name: impl Into<String>,
        method: impl Fn(&Row) -> Value + 'static,
    ) {
        self.methods.insert(name.into(), Rc::new(method));
    }

    // ========================================================================
    // Schema and loading
    // ========================================================================

    /// Bind the mapper to a table: fetches the schema template and resets
    /// cursor state.
    pub fn set_name(
        &mut self,
        table: &str,
        alias: Option<&str>,
        fields: Option<&[&str]>,
        ttl: u64,
    ) -> Result<&mut Self> {
        let mut template = self.driver.borrow_mut().schema(table, fields, ttl)?;
        if let Some(alias) = alias {
            template = template.with_alias(alias);
        }
        self.row = template;
        self.rows.clear();
        self.load_fired.clear();
        self.ptr = 0;
        Ok(self)
    }

    /// Load every matching row and position the cursor at the first.
    ///
    /// Uncommitted template edits are discarded first, so a load that
    /// matches nothing leaves a clean slate for the next insert.
    pub fn load(
        &mut self,
        filter: &Filter,
        options: &SelectOptions,
        ttl: u64,
    ) -> Result<&mut Self> {
        self.row.reset();
        self.rows = self.driver.borrow_mut().find(&self.row, filter, options, ttl)?;
        self.load_fired = vec![false; self.rows.len()];
        self.ptr = 0;
        Ok(self)
    }

    /// Load at most one matching row.
    pub fn first(
        &mut self,
        filter: &Filter,
        options: &SelectOptions,
        ttl: u64,
    ) -> Result<&mut Self> {
        self.row.reset();
        let found = self.driver.borrow_mut().first(&self.row, filter, options, ttl)?;
        self.rows = found.into_iter().collect();
        self.load_fired = vec![false; self.rows.len()];
        self.ptr = 0;
        Ok(self)
    }

    /// Load one row by its primary key value(s), supplied positionally in
    /// key-declaration order.
    pub fn find(&mut self, keys: &[Value]) -> Result<&mut Self> {
        let declared: Vec<String> = self.row.keys().iter().map(|k| (*k).to_string()).collect();
        if declared.is_empty() {
            return Err(Error::NoPrimaryKey(self.row.table().to_string()));
        }
        if declared.len() != keys.len() {
            return Err(Error::KeyArity {
                expected: declared.len(),
                got: keys.len(),
            });
        }
        let mut filter = Filter::new();
        for (name, value) in declared.iter().zip(keys) {
            filter = filter.push(name.clone(), value.clone());
        }
        self.first(&filter, &SelectOptions::new(), 0)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save the active row: update when the cursor points at a loaded
    /// row, otherwise insert (appending and positioning the cursor on
    /// success). A before-save veto yields `Ok(false)`; after-save fires
    /// either way.
    pub fn save(&mut self) -> Result<bool> {
        let cancelled = {
            let row = self.active_row();
            self.events.borrow_mut().dispatch(EV_BEFORE_SAVE, row).cancelled
        };
        if cancelled {
            let row = self.active_row();
            self.events.borrow_mut().dispatch(EV_AFTER_SAVE, row);
            return Ok(false);
        }

        let positioned = self.valid();
        let ok = if positioned && self.rows[self.ptr].is_loaded() {
            let ptr = self.ptr;
            self.driver.borrow_mut().update(&mut self.rows[ptr])?
        } else {
            let inserted = if positioned {
                let ptr = self.ptr;
                self.driver.borrow_mut().insert(&mut self.rows[ptr])?
            } else {
                self.driver.borrow_mut().insert(&mut self.row)?
            };
            match inserted {
                Some(new_row) => {
                    if positioned {
                        self.rows[self.ptr] = new_row;
                        self.load_fired[self.ptr] = true;
                    } else {
                        self.row.reset();
                        self.rows.push(new_row);
                        self.load_fired.push(true);
                        self.ptr = self.rows.len() - 1;
                    }
                    true
                }
                None => false,
            }
        };

        let row = self.active_row();
        self.events.borrow_mut().dispatch(EV_AFTER_SAVE, row);
        Ok(ok)
    }

    /// Delete rows.
    ///
    /// With a filter, deletes directly by clause and returns the affected
    /// count, bypassing cursor state and lifecycle events. Without one,
    /// the cursor must be positioned: the current row is deleted, removed
    /// from the in-memory set (preserving relative order of the rest),
    /// and after-delete fires with the removed row.
    pub fn delete(&mut self, filter: Option<&Filter>) -> Result<u64> {
        if let Some(filter) = filter {
            return self.driver.borrow_mut().delete_by_clause(&self.row, filter);
        }
        if !self.valid() {
            return Err(Error::InvalidCursor);
        }
        let cancelled = self
            .events
            .borrow_mut()
            .dispatch(EV_BEFORE_DELETE, &self.rows[self.ptr])
            .cancelled;
        if cancelled {
            return Ok(0);
        }
        let ptr = self.ptr;
        let deleted = self.driver.borrow_mut().delete(&mut self.rows[ptr])?;
        if !deleted {
            return Ok(0);
        }
        let removed = self.rows.remove(ptr);
        self.load_fired.remove(ptr);
        self.events.borrow_mut().dispatch(EV_AFTER_DELETE, &removed);
        Ok(1)
    }

    // ========================================================================
    // Field access
    // ========================================================================

    /// Read a field or an adhoc; when neither exists, fall back to a
    /// registered method and cache its result on the row as an adhoc.
    pub fn get(&mut self, name: &str) -> Result<Value> {
        match self.active_row_mut().get(name) {
            Ok(value) => Ok(value),
            Err(Error::NoSuchField(_)) => {
                let Some(method) = self.methods.get(name).cloned() else {
                    return Err(Error::NoSuchField(name.to_string()));
                };
                let row = self.active_row_mut();
                let value = method(&*row);
                let mut adhoc = Adhoc::new(name, AdhocExpr::Call(Rc::clone(&method)));
                adhoc.hydrate(value.clone());
                row.set_adhoc(adhoc);
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }

    /// Write a field or adhoc on the active row.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.active_row_mut().set(name, value);
    }

    /// Restore a field to its default, or drop an adhoc's cache.
    pub fn clear(&mut self, name: &str) -> Result<()> {
        self.active_row_mut().clear(name)
    }

    /// Remove an adhoc field from the active row.
    pub fn remove(&mut self, name: &str) -> bool {
        self.active_row_mut().remove(name)
    }

    /// Whether the active row knows this name.
    pub fn exists(&mut self, name: &str) -> bool {
        self.active_row_mut().exists(name)
    }

    /// Dispatch a dynamic accessor by name: `get<Field>` (zero-arg
    /// getter), `loadBy<Field>(value)`, `findBy<Field>(value)`; camelCase
    /// and snake_case are both accepted. Load/find forms return whether
    /// the cursor ended up valid.
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        let Some((kind, field)) = parse_dynamic(method) else {
            return Err(Error::NoSuchMethod(method.to_string()));
        };
        match kind {
            DynKind::Get => self.get(&field),
            DynKind::LoadBy | DynKind::FindBy => {
                let value = args.first().cloned().unwrap_or(Value::Null);
                let filter = Filter::new().push(field, value);
                match kind {
                    DynKind::LoadBy => self.load(&filter, &SelectOptions::new(), 0)?,
                    _ => self.first(&filter, &SelectOptions::new(), 0)?,
                };
                Ok(Value::Bool(self.valid()))
            }
        }
    }

    // ========================================================================
    // Cursor
    // ========================================================================

    /// Move the cursor back to the first row.
    pub fn rewind(&mut self) {
        self.ptr = 0;
    }

    /// Advance the cursor.
    pub fn next(&mut self) {
        self.ptr += 1;
    }

    /// Whether the cursor points inside the loaded set.
    pub fn valid(&self) -> bool {
        self.ptr < self.rows.len()
    }

    /// The row under the cursor, firing the one-time load event on first
    /// visit.
    pub fn current(&mut self) -> Option<&Row> {
        if !self.valid() {
            return None;
        }
        self.fire_load(self.ptr);
        Some(&self.rows[self.ptr])
    }

    /// Cursor position.
    pub fn key(&self) -> usize {
        self.ptr
    }

    /// Number of loaded rows.
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Drop loaded rows and discard template edits.
    pub fn reset(&mut self) {
        self.rows.clear();
        self.load_fired.clear();
        self.ptr = 0;
        self.row.reset();
    }

    fn fire_load(&mut self, idx: usize) {
        if self.load_fired.get(idx).copied().unwrap_or(true) {
            return;
        }
        self.load_fired[idx] = true;
        self.events.borrow_mut().dispatch(EV_LOAD, &self.rows[idx]);
    }

    fn active_row(&self) -> &Row {
        if self.ptr < self.rows.len() {
            &self.rows[self.ptr]
        } else {
            &self.row
        }
    }

    fn active_row_mut(&mut self) -> &mut Row {
        if self.ptr < self.rows.len() {
            self.fire_load(self.ptr);
            &mut self.rows[self.ptr]
        } else {
            &mut self.row
        }
    }
}

impl<C: Connection> Clone for Mapper<C> {
    /// Deep-clones the loaded rows and the template; the driver, events,
    /// and method registry stay shared.
    fn clone(&self) -> Self {
        Self {
            driver: Rc::clone(&self.driver),
            events: Rc::clone(&self.events),
            row: self.row.clone(),
            rows: self.rows.clone(),
            ptr: self.ptr,
            load_fired: self.load_fired.clone(),
            methods: self.methods.clone(),
        }
    }
}

impl<C: Connection> std::fmt::Debug for Mapper<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("table", &self.row.table())
            .field("rows", &self.rows.len())
            .field("ptr", &self.ptr)
            .finish()
    }
}

fn parse_dynamic(method: &str) -> Option<(DynKind, String)> {
    const PREFIXES: [(&str, DynKind); 5] = [
        ("loadBy", DynKind::LoadBy),
        ("load_by", DynKind::LoadBy),
        ("findBy", DynKind::FindBy),
        ("find_by", DynKind::FindBy),
        ("get", DynKind::Get),
    ];
    for (prefix, kind) in PREFIXES {
        if let Some(rest) = method.strip_prefix(prefix) {
            let rest = rest.trim_start_matches('_');
            if rest.is_empty() {
                continue;
            }
            return Some((kind, to_snake_case(rest)));
        }
    }
    None
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
