//! Table schema and record state, in one structure.
//!
//! A `Row` plays two roles: a *template* carries column metadata with all
//! values NULL, and a *hydrated* row (cloned from a template) carries one
//! physical record. The `loaded` flag distinguishes the two; deep cloning
//! is the only path from template to independent record.

use crate::error::{Error, Result};
use crate::field::{Adhoc, Field};
use crate::value::Value;

/// One table's shape and (optionally) one record's data.
#[derive(Debug, Clone)]
pub struct Row {
    table: String,
    alias: Option<String>,
    loaded: bool,
    fields: Vec<Field>,
    adhocs: Vec<Adhoc>,
}

impl Row {
    /// Create an empty schema for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            loaded: false,
            fields: Vec::new(),
            adhocs: Vec::new(),
        }
    }

    /// Set the SQL alias used in FROM clauses.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Optional SQL alias.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Whether this row was hydrated from storage.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Mark the row as hydrated (or not). Set by the driver after a fetch
    /// or a successful write.
    pub fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    /// Attach a field, replacing any same-named field and displacing any
    /// same-named adhoc (a name lives in at most one of the two maps).
    pub fn set_field(&mut self, field: Field) {
        self.adhocs.retain(|a| a.name() != field.name());
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name() == field.name()) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    /// Attach an adhoc under the same exclusivity rule.
    pub fn set_adhoc(&mut self, adhoc: Adhoc) {
        self.fields.retain(|f| f.name() != adhoc.name());
        if let Some(existing) = self.adhocs.iter_mut().find(|a| a.name() == adhoc.name()) {
            *existing = adhoc;
        } else {
            self.adhocs.push(adhoc);
        }
    }

    /// Stored fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Adhoc fields in declaration order.
    pub fn adhocs(&self) -> &[Adhoc] {
        &self.adhocs
    }

    /// Look up a stored field.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Mutable lookup of a stored field.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Look up an adhoc field.
    pub fn adhoc(&self, name: &str) -> Option<&Adhoc> {
        self.adhocs.iter().find(|a| a.name() == name)
    }

    /// Mutable lookup of an adhoc field.
    pub fn adhoc_mut(&mut self, name: &str) -> Option<&mut Adhoc> {
        self.adhocs.iter_mut().find(|a| a.name() == name)
    }

    /// Whether a name exists as a field or an adhoc.
    pub fn exists(&self, name: &str) -> bool {
        self.field(name).is_some() || self.adhoc(name).is_some()
    }

    /// Primary-key field names, in field-declaration order.
    pub fn keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.pkey)
            .map(Field::name)
            .collect()
    }

    /// True when any stored field is dirty. Adhocs never count.
    pub fn is_changed(&self) -> bool {
        self.fields.iter().any(Field::is_changed)
    }

    /// Read a field or adhoc value.
    pub fn get(&mut self, name: &str) -> Result<Value> {
        if let Some(field) = self.field(name) {
            return Ok(field.value().clone());
        }
        // Adhoc evaluation may cache, and the closure sees the row's
        // fields, so split the borrow by index.
        if let Some(idx) = self.adhocs.iter().position(|a| a.name() == name) {
            let mut adhoc = self.adhocs[idx].clone();
            let value = adhoc.eval(self);
            self.adhocs[idx] = adhoc;
            return Ok(value);
        }
        Err(Error::NoSuchField(name.to_string()))
    }

    /// Write a field or adhoc value. An unknown name creates a literal
    /// adhoc holding the value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(field) = self.field_mut(name) {
            field.set_value(value);
        } else if let Some(adhoc) = self.adhocs.iter_mut().find(|a| a.name() == name) {
            adhoc.set_value(value);
        } else {
            let mut adhoc = Adhoc::literal(name, Value::Null);
            adhoc.set_value(value);
            self.adhocs.push(adhoc);
        }
    }

    /// Restore a field to its column default, or drop an adhoc's cache.
    pub fn clear(&mut self, name: &str) -> Result<()> {
        if let Some(field) = self.field_mut(name) {
            let default = field.default().clone();
            field.set_value(default);
            return Ok(());
        }
        if let Some(adhoc) = self.adhocs.iter_mut().find(|a| a.name() == name) {
            adhoc.clear();
            return Ok(());
        }
        Err(Error::NoSuchField(name.to_string()))
    }

    /// Remove an adhoc field entirely. Stored fields cannot be removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.adhocs.len();
        self.adhocs.retain(|a| a.name() != name);
        self.adhocs.len() != before
    }

    /// Bulk-assign values to existing stored fields. Unknown names are
    /// ignored.
    pub fn from_map<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a str, Value)>) {
        for (name, value) in pairs {
            if let Some(field) = self.field_mut(name) {
                field.set_value(value);
            }
        }
    }

    /// Export field values plus evaluated adhocs, in declaration order.
    pub fn to_map(&mut self) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = self
            .fields
            .iter()
            .map(|f| (f.name().to_string(), f.value().clone()))
            .collect();
        let names: Vec<String> = self.adhocs.iter().map(|a| a.name().to_string()).collect();
        for name in names {
            // Infallible: the name was just taken from the adhoc list.
            let value = self.get(&name).unwrap_or(Value::Null);
            out.push((name, value));
        }
        out
    }

    /// Commit every field (adhoc commit is a no-op).
    pub fn commit(&mut self) {
        for field in &mut self.fields {
            field.commit();
        }
    }

    /// Discard uncommitted edits and mark the row unloaded.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.reset();
        }
        for adhoc in &mut self.adhocs {
            adhoc.clear();
        }
        self.loaded = false;
    }
}
